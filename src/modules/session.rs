//! 会话状态机：连接、读取循环、命令发送和 ROI 重新配置。
//!
//! ```text
//! Idle --connect--> Configuring --init--> Streaming <--> Reconfiguring
//!   ^                    |                    |
//!   +------ 失败 --------+---- disconnect ----+
//! ```
//!
//! 每个会话只有一个读取线程和一条写入路径。写入路径由 `&mut self` 串行化，
//! 因此同一会话上不会有两个 ROI 序列重叠。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[cfg(feature = "logging")]
use crate::modules::command::hex;
use crate::modules::command::Command;
use crate::modules::config::SessionConfig;
use crate::modules::constants::FTDI_HEADER_SIZE;
#[cfg(feature = "logging")]
use crate::modules::constants::ROI_NUM_POINTS;
use crate::modules::error::CamError;
use crate::modules::extractor::{Extracted, FrameExtractor};
use crate::modules::ftdi;
use crate::modules::roi::{build_roi_payload, RoiConfig};
use crate::modules::types::{SessionState, StreamEvent, StreamStats};
use crate::modules::usb::{RusbTransport, UsbTransport};

/// 读取循环与会话共享的计数器。
#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    bytes: AtomicU64,
    read_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> StreamStats {
        StreamStats {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// 已连接设备的会话内字段，Idle 时不存在。
struct Link<T: UsbTransport> {
    transport: Arc<T>,
    out_endpoint: Option<u8>,
    cancel: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

/// 摄像头会话。
pub struct Session<T: UsbTransport = RusbTransport> {
    config: SessionConfig,
    state: SessionState,
    link: Option<Link<T>>,
    raw_enabled: bool,
}

impl<T: UsbTransport> Session<T> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            link: None,
            raw_enabled: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// 当前读取统计；未连接时为 `None`。
    pub fn stats(&self) -> Option<StreamStats> {
        self.link.as_ref().map(|l| l.counters.snapshot())
    }

    /// 在已打开的传输上建立会话。
    ///
    /// 依次执行桥接芯片初始化、START、等待、SEND，然后启动读取线程，
    /// 返回帧/结果事件的接收端。任何失败都会回到 Idle。
    pub fn connect(&mut self, transport: T) -> Result<Receiver<StreamEvent>, CamError> {
        if self.state != SessionState::Idle {
            return Err(CamError::InvalidState(self.state));
        }
        self.state = SessionState::Configuring;

        match self.configure(transport) {
            Ok(rx) => {
                self.state = SessionState::Streaming;
                Ok(rx)
            }
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("Connect failed: {}", e);
                self.teardown();
                Err(e)
            }
        }
    }

    fn configure(&mut self, transport: T) -> Result<Receiver<StreamEvent>, CamError> {
        let transport = Arc::new(transport);
        let endpoints = match ftdi::bring_up(transport.as_ref(), self.config.baud) {
            Ok(eps) => eps,
            Err(e) => {
                let _ = transport.close();
                return Err(e);
            }
        };
        #[cfg(feature = "logging")]
        log::info!("FTDI configured (D2XX sequence)");

        let in_endpoint = endpoints.bulk_in.ok_or(CamError::EndpointNotFound)?;
        let packet_size = endpoints
            .in_packet_size
            .map(usize::from)
            .filter(|&p| p > 0)
            .unwrap_or(self.config.default_packet_size);

        self.link = Some(Link {
            transport: Arc::clone(&transport),
            out_endpoint: endpoints.bulk_out,
            cancel: Arc::new(AtomicBool::new(false)),
            reader: None,
            counters: Arc::new(Counters::default()),
        });

        // 只发 START + SEND，不切换输出模式，保留 AI 结果
        self.send_command(Command::Start)?;
        thread::sleep(self.config.init_delay);
        self.send_command(Command::Send)?;
        #[cfg(feature = "logging")]
        log::info!("Sensor initialized, streaming (AI mode)");

        let (tx, rx) = mpsc::channel();
        let link = self.link.as_mut().ok_or(CamError::NotConnected)?;
        let reader = ReadLoop {
            transport,
            endpoint: in_endpoint,
            packet_size,
            cancel: Arc::clone(&link.cancel),
            counters: Arc::clone(&link.counters),
            events: tx,
            config: self.config.clone(),
        };
        let handle = thread::Builder::new()
            .name("digitcam-reader".to_string())
            .spawn(move || reader.run())
            .map_err(|e| CamError::UsbError(e.to_string()))?;
        link.reader = Some(handle);

        Ok(rx)
    }

    /// 断开连接：设置取消标志、等待读取线程退出、关闭设备。
    ///
    /// 关闭失败会被忽略。Idle 时调用无效果。
    pub fn disconnect(&mut self) {
        if self.link.is_none() && self.state == SessionState::Idle {
            return;
        }
        self.teardown();
        #[cfg(feature = "logging")]
        log::info!("Disconnected");
    }

    fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.cancel.store(true, Ordering::SeqCst);
            // 取消最多要等一次进行中的读取
            if let Some(reader) = link.reader.take() {
                if reader.join().is_err() {
                    #[cfg(feature = "logging")]
                    log::error!("Reader thread panicked");
                }
            }
            if let Err(_e) = link.transport.close() {
                #[cfg(feature = "logging")]
                log::warn!("Close failed: {}", _e);
            }
        }
        self.state = SessionState::Idle;
        self.raw_enabled = false;
    }

    /// 发送原始字节到 OUT 端点。
    ///
    /// 没有 OUT 端点时只记录日志，不报错。
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), CamError> {
        let link = self.link.as_ref().ok_or_else(|| {
            #[cfg(feature = "logging")]
            log::warn!("Not connected");
            CamError::NotConnected
        })?;
        let endpoint = match link.out_endpoint {
            Some(ep) => ep,
            None => {
                #[cfg(feature = "logging")]
                log::warn!("No OUT endpoint, dropping {} bytes", bytes.len());
                return Ok(());
            }
        };

        #[cfg(feature = "logging")]
        log::info!("TX -> {}", hex(bytes));

        let written = link.transport.write_bulk(endpoint, bytes)?;
        if written != bytes.len() {
            return Err(CamError::SendFailed(format!(
                "incomplete write: {} of {}",
                written,
                bytes.len()
            )));
        }
        #[cfg(feature = "logging")]
        log::debug!("TX OK: {} bytes", written);
        Ok(())
    }

    /// 发送一条命令并等待写入完成。
    pub fn send_command(&mut self, command: Command) -> Result<(), CamError> {
        #[cfg(feature = "logging")]
        log::info!("CMD: {}", command);
        self.send_raw(&command.encode())
    }

    pub fn show_full_image(&mut self) -> Result<(), CamError> {
        self.send_command(Command::ShowFullImage)
    }

    pub fn show_roi(&mut self) -> Result<(), CamError> {
        self.send_command(Command::ShowRoi)
    }

    /// 打开或关闭 RAW 输出。
    pub fn set_raw(&mut self, enabled: bool) -> Result<(), CamError> {
        let command = if enabled {
            Command::EnableRaw
        } else {
            Command::DisableRaw
        };
        self.send_command(command)?;
        self.raw_enabled = enabled;
        Ok(())
    }

    /// 切换 RAW 输出，返回切换后的状态。
    pub fn toggle_raw(&mut self) -> Result<bool, CamError> {
        let enabled = !self.raw_enabled;
        self.set_raw(enabled)?;
        Ok(enabled)
    }

    pub fn raw_enabled(&self) -> bool {
        self.raw_enabled
    }

    /// 读寄存器。结果出现在之后的入站数据中，不做请求/响应匹配。
    pub fn read_register(&mut self, addr: u16) -> Result<(), CamError> {
        self.send_command(Command::ReadRegister(addr))
    }

    pub fn write_register(&mut self, addr: u16, value: u8) -> Result<(), CamError> {
        self.send_command(Command::WriteRegister { addr, value })
    }

    /// 发送 ROI 配置。
    ///
    /// 顺序：SET_MODE，阻塞等待设置延时，帧头 + 80 字节载荷，
    /// 然后重新发送 START 和 SEND。最后这一步不可省略：
    /// 不重新初始化的话，传感器之后收到模式切换命令会卡死。
    /// SET_MODE 发出后，即使载荷写入失败也会执行重新初始化，
    /// 然后返回第一个错误。
    pub fn send_roi_config(&mut self, roi: &RoiConfig) -> Result<(), CamError> {
        if self.state != SessionState::Streaming {
            return Err(CamError::InvalidState(self.state));
        }
        self.state = SessionState::Reconfiguring;
        let result = self.reconfigure(roi);
        if self.link.is_some() {
            self.state = SessionState::Streaming;
        }
        result
    }

    fn reconfigure(&mut self, roi: &RoiConfig) -> Result<(), CamError> {
        self.send_command(Command::SetRoiMode)?;
        thread::sleep(self.config.roi_setup_delay);

        let written = self.write_roi_payload(roi);
        #[cfg(feature = "logging")]
        if let Err(e) = &written {
            log::error!("ROI write failed: {}, restoring sensor session", e);
        }
        let restored = self.restore_session();
        written.and(restored)
    }

    fn write_roi_payload(&mut self, roi: &RoiConfig) -> Result<(), CamError> {
        let payload = build_roi_payload(roi);

        #[cfg(feature = "logging")]
        {
            log::info!("--- ROI PAYLOAD ---");
            for i in 0..ROI_NUM_POINTS {
                if let Some((x, y)) = payload.point(i) {
                    log::info!("  P{}: x={} y={}", i + 1, x, y);
                }
            }
            log::info!("  numDials: {}", payload.num_dials());
            let (bx, by) = payload.boundary();
            log::info!("  Boundary: {} x {}", bx, by);
            for row in payload.hex_rows() {
                log::debug!("  {}", row);
            }
            log::info!("--- END ---");
        }

        self.send_raw(&payload.frame())?;
        #[cfg(feature = "logging")]
        log::info!("ROI sent: {} digits, 0 dials", payload.num_digits());
        Ok(())
    }

    /// ROI 写入后重新发送 START 和 SEND；START 失败时仍尝试 SEND。
    fn restore_session(&mut self) -> Result<(), CamError> {
        #[cfg(feature = "logging")]
        log::info!("Re-initializing sensor session...");
        thread::sleep(self.config.roi_recovery_delay);
        let started = self.send_command(Command::Start);
        thread::sleep(self.config.roi_recovery_delay);
        let sent = self.send_command(Command::Send);
        #[cfg(feature = "logging")]
        if started.is_ok() && sent.is_ok() {
            log::info!("Sensor session restored");
        }
        started.and(sent)
    }
}

impl Session<RusbTransport> {
    /// 查找并打开桥接芯片，然后建立会话。
    pub fn open(&mut self) -> Result<Receiver<StreamEvent>, CamError> {
        if self.state != SessionState::Idle {
            return Err(CamError::InvalidState(self.state));
        }
        let transport = crate::modules::usb::open_device(&self.config)?;
        self.connect(transport)
    }
}

impl<T: UsbTransport> Default for Session<T> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<T: UsbTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// 读取线程的上下文。
struct ReadLoop<T: UsbTransport> {
    transport: Arc<T>,
    endpoint: u8,
    packet_size: usize,
    cancel: Arc<AtomicBool>,
    counters: Arc<Counters>,
    events: Sender<StreamEvent>,
    config: SessionConfig,
}

impl<T: UsbTransport> ReadLoop<T> {
    /// 循环读取直到取消标志被设置；读取错误只退避重试。
    fn run(self) {
        let mut extractor = FrameExtractor::new(self.config.buffer_bound)
            .with_max_frame(self.config.max_frame_size);
        let mut buf = vec![0u8; self.config.transfer_size];
        let mut fps_count = 0u64;
        let mut last_fps = Instant::now();

        #[cfg(feature = "logging")]
        log::info!("Streaming from EP 0x{:02x} (pkt={})", self.endpoint, self.packet_size);

        while !self.cancel.load(Ordering::SeqCst) {
            match self.transport.read_bulk(self.endpoint, &mut buf) {
                Ok(n) if n > FTDI_HEADER_SIZE => {
                    let added = extractor.push_packet(&buf[..n], self.packet_size);
                    self.counters.bytes.fetch_add(added as u64, Ordering::Relaxed);
                    fps_count += self.dispatch(&mut extractor);
                }
                Ok(_) => {}
                Err(_e) => {
                    if self.cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    #[cfg(feature = "logging")]
                    log::warn!("Read err: {}", _e);
                    self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(self.config.read_backoff);
                }
            }

            let elapsed = last_fps.elapsed();
            if elapsed >= self.config.throughput_interval && elapsed > Duration::ZERO {
                let stats = self.counters.snapshot();
                let _ = self.events.send(StreamEvent::Throughput {
                    fps: fps_count as f64 / elapsed.as_secs_f64(),
                    frames: stats.frames,
                    bytes: stats.bytes,
                });
                fps_count = 0;
                last_fps = Instant::now();
            }
        }

        #[cfg(feature = "logging")]
        log::info!("Read loop stopped");
    }

    /// 把提取出的结果和帧发给接收端，返回帧数。
    fn dispatch(&self, extractor: &mut FrameExtractor) -> u64 {
        let mut frames = 0;
        while let Some(item) = extractor.poll() {
            let event = match item {
                Extracted::Result(result) => StreamEvent::Result(result),
                Extracted::Frame(frame) => {
                    frames += 1;
                    let total = self.counters.frames.fetch_add(1, Ordering::Relaxed) + 1;
                    if total == 1 {
                        #[cfg(feature = "logging")]
                        log::info!("First frame: {} bytes", frame.len());
                    }
                    StreamEvent::Frame(frame)
                }
            };
            // 接收端被丢弃时继续读取，只有取消标志能停止循环
            let _ = self.events.send(event);
        }
        frames
    }
}
