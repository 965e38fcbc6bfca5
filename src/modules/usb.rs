//! 数字读表摄像头库的 USB 底层操作。

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::modules::config::SessionConfig;
use crate::modules::constants::{USB_PID, USB_VID};
use crate::modules::error::CamError;
use crate::modules::types::DeviceInfo;

/// 桥接芯片使用的接口号。
const INTERFACE: u8 = 0;

/// 已声明接口上找到的批量端点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Endpoints {
    /// 批量 IN 端点地址。
    pub bulk_in: Option<u8>,
    /// 批量 OUT 端点地址。
    pub bulk_out: Option<u8>,
    /// IN 端点的最大包大小。
    pub in_packet_size: Option<u16>,
}

/// 协议层与 libusb 之间的接缝。
///
/// 读取循环和写入路径共享同一个传输对象，读只访问 IN 端点，写只访问 OUT 端点。
pub trait UsbTransport: Send + Sync + 'static {
    /// 厂商类控制传输（Host -> Device，无数据阶段）。
    fn control_out(&self, request: u8, value: u16, index: u16) -> Result<(), CamError>;

    /// 从已声明接口的第一个备用设置中查找批量端点。
    fn endpoints(&self) -> Result<Endpoints, CamError>;

    /// 批量写入，返回写入的字节数。
    fn write_bulk(&self, endpoint: u8, data: &[u8]) -> Result<usize, CamError>;

    /// 批量读取，超时返回 `Ok(0)`。
    fn read_bulk(&self, endpoint: u8, buf: &mut [u8]) -> Result<usize, CamError>;

    /// 释放接口（尽力而为）。
    fn close(&self) -> Result<(), CamError>;
}

/// 基于 rusb 的传输实现。
pub struct RusbTransport {
    /// 设备句柄。
    pub handle: DeviceHandle<Context>,
    /// 已声明的接口号。
    pub interface: u8,
    control_timeout: Duration,
    read_timeout: Duration,
}

impl RusbTransport {
    /// 包装已声明接口的设备句柄。
    pub fn new(handle: DeviceHandle<Context>, interface: u8, config: &SessionConfig) -> Self {
        Self {
            handle,
            interface,
            control_timeout: config.control_timeout,
            read_timeout: config.read_timeout,
        }
    }
}

impl UsbTransport for RusbTransport {
    fn control_out(&self, request: u8, value: u16, index: u16) -> Result<(), CamError> {
        let request_type = rusb::request_type(
            rusb::Direction::Out,
            rusb::RequestType::Vendor,
            rusb::Recipient::Device,
        );
        self.handle
            .write_control(request_type, request, value, index, &[], self.control_timeout)
            .map(|_| ())
            .map_err(|e| {
                #[cfg(feature = "logging")]
                log::error!("USB control 0x{:02x} failed: {}", request, e);
                CamError::UsbError(e.to_string())
            })
    }

    fn endpoints(&self) -> Result<Endpoints, CamError> {
        let config = self.handle.device().active_config_descriptor()?;
        let interface = config
            .interfaces()
            .find(|i| i.number() == self.interface)
            .ok_or(CamError::InterfaceNotFound)?;
        let descriptor = interface
            .descriptors()
            .next()
            .ok_or(CamError::InterfaceNotFound)?;

        let mut found = Endpoints::default();
        for endpoint in descriptor.endpoint_descriptors() {
            #[cfg(feature = "logging")]
            log::debug!(
                "  Endpoint 0x{:02x}: dir={:?}, type={:?}, max_packet={}",
                endpoint.address(),
                endpoint.direction(),
                endpoint.transfer_type(),
                endpoint.max_packet_size()
            );

            if endpoint.transfer_type() != rusb::TransferType::Bulk {
                continue;
            }
            match endpoint.direction() {
                rusb::Direction::In if found.bulk_in.is_none() => {
                    found.bulk_in = Some(endpoint.address());
                    found.in_packet_size = Some(endpoint.max_packet_size());
                }
                rusb::Direction::Out if found.bulk_out.is_none() => {
                    found.bulk_out = Some(endpoint.address());
                }
                _ => {}
            }
        }
        Ok(found)
    }

    fn write_bulk(&self, endpoint: u8, data: &[u8]) -> Result<usize, CamError> {
        match self.handle.write_bulk(endpoint, data, self.control_timeout) {
            Ok(written) => {
                #[cfg(feature = "logging")]
                log::debug!("USB transmit: {} bytes sent", written);
                Ok(written)
            }
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("USB transmit failed: {}", e);
                Err(CamError::SendFailed(e.to_string()))
            }
        }
    }

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8]) -> Result<usize, CamError> {
        match self.handle.read_bulk(endpoint, buf, self.read_timeout) {
            Ok(read) => Ok(read),
            Err(rusb::Error::Timeout) => Ok(0),
            Err(e) => Err(CamError::ReceiveFailed(e.to_string())),
        }
    }

    fn close(&self) -> Result<(), CamError> {
        self.handle.release_interface(self.interface)?;
        Ok(())
    }
}

/// 扫描所有 USB 设备。
pub fn scan_devices() -> Vec<DeviceInfo> {
    #[cfg(feature = "logging")]
    log::info!("Scanning USB devices...");
    let context = match rusb::Context::new() {
        Ok(c) => c,
        Err(_e) => {
            #[cfg(feature = "logging")]
            log::error!("Failed to create USB context: {}", _e);
            return Vec::new();
        }
    };

    let mut devices = Vec::new();

    match context.devices() {
        Ok(dev_list) => {
            for device in dev_list.iter() {
                if let Ok(desc) = device.device_descriptor() {
                    devices.push(DeviceInfo {
                        vid: desc.vendor_id(),
                        pid: desc.product_id(),
                        info: format!("{:04x}:{:04x}", desc.vendor_id(), desc.product_id()),
                    });
                }
            }
        }
        Err(_e) => {
            #[cfg(feature = "logging")]
            log::error!("Failed to get device list: {}", _e);
        }
    }

    #[cfg(feature = "logging")]
    log::info!("Found {} USB devices", devices.len());
    devices
}

/// 检查 FTDI 桥接芯片是否存在。
pub fn is_camera_present() -> bool {
    let present = scan_devices()
        .iter()
        .any(|d| d.vid == USB_VID && d.pid == USB_PID);

    #[cfg(feature = "logging")]
    {
        if present {
            log::info!("FTDI bridge found");
        } else {
            log::info!("FTDI bridge not found");
        }
    }
    present
}

/// 打开桥接芯片并声明接口 0。
///
/// 找不到匹配的设备时返回 [`CamError::DeviceNotFound`]，其余失败为 USB 错误。
pub fn open_device(config: &SessionConfig) -> Result<RusbTransport, CamError> {
    #[cfg(feature = "logging")]
    log::info!(
        "Opening FTDI bridge (VID={:04x}, PID={:04x})...",
        config.vid,
        config.pid
    );

    let context = rusb::Context::new()?;

    for device in context.devices()?.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(_) => continue,
        };
        if desc.vendor_id() != config.vid || desc.product_id() != config.pid {
            continue;
        }

        let handle = device.open()?;

        #[cfg(feature = "logging")]
        {
            let product = handle
                .read_product_string_ascii(&desc)
                .unwrap_or_else(|_| "FTDI".to_string());
            log::info!("Device: {}", product);
        }

        // Linux 上 ftdi_sio 会占用接口
        if let Ok(true) = handle.kernel_driver_active(INTERFACE) {
            #[cfg(feature = "logging")]
            log::info!("Detaching kernel driver...");
            if let Err(_e) = handle.detach_kernel_driver(INTERFACE) {
                #[cfg(feature = "logging")]
                log::warn!("Failed to detach kernel driver: {}", _e);
            }
        }

        if let Ok(0) = handle.active_configuration() {
            handle.set_active_configuration(1)?;
        }

        handle.claim_interface(INTERFACE).map_err(|e| {
            #[cfg(feature = "logging")]
            log::error!("Failed to claim interface {}: {}", INTERFACE, e);
            CamError::UsbError(e.to_string())
        })?;

        #[cfg(feature = "logging")]
        log::info!("Interface {} claimed", INTERFACE);
        return Ok(RusbTransport::new(handle, INTERFACE, config));
    }

    #[cfg(feature = "logging")]
    log::error!("FTDI bridge not found");
    Err(CamError::DeviceNotFound(config.vid, config.pid))
}
