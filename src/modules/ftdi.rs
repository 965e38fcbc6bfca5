//! FTDI 桥接芯片配置：波特率分频计算和上电初始化序列。

use crate::modules::constants::{
    FTDI_BASE_CLOCK, FTDI_DATA_8N1, FTDI_DTR_ON, FTDI_FRAC_CODES, FTDI_FRAC_SHIFT,
    FTDI_LATENCY_MS, FTDI_PURGE_RX, FTDI_PURGE_TX, FTDI_RTS_ON, SIO_RESET, SIO_SET_BAUD_RATE,
    SIO_SET_DATA, SIO_SET_FLOW_CTRL, SIO_SET_LATENCY_TIMER, SIO_SET_MODEM_CTRL,
};
use crate::modules::error::CamError;
use crate::modules::usb::{Endpoints, UsbTransport};

/// 整数分频只有 14 位。
const MAX_INT_DIVISOR: u64 = 0x3FFF;

/// 编码后的波特率分频参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudDivisor {
    /// 控制传输 wValue（编码值低 16 位）。
    pub value: u16,
    /// 控制传输 wIndex（编码值高 16 位）。
    pub index: u16,
    /// 实际得到的波特率。
    pub actual_baud: u32,
}

impl BaudDivisor {
    /// 相对目标波特率的误差（百分比）。
    pub fn error_percent(&self, target: u32) -> f64 {
        (self.actual_baud as f64 - target as f64) / target as f64 * 100.0
    }
}

/// 计算目标波特率的分频参数。
///
/// 目标波特率不低于基准时钟时返回 0/0（最高速率，不分频）。
/// 速率误差只用于提示，不作为错误。
pub fn baud_divisor(baud: u32) -> Result<BaudDivisor, CamError> {
    if baud == 0 {
        return Err(CamError::UnsupportedBaud(baud));
    }
    if baud >= FTDI_BASE_CLOCK {
        return Ok(BaudDivisor {
            value: 0,
            index: 0,
            actual_baud: FTDI_BASE_CLOCK,
        });
    }

    let clock8 = FTDI_BASE_CLOCK as u64 * 8;
    let baud = baud as u64;
    // round(clock8 / baud)
    let divisor8 = (2 * clock8 + baud) / (2 * baud);
    let int_part = divisor8 / 8;
    let frac_part = (divisor8 % 8) as usize;
    if int_part > MAX_INT_DIVISOR {
        return Err(CamError::UnsupportedBaud(baud as u32));
    }

    let encoded = int_part as u32 | (FTDI_FRAC_CODES[frac_part] << FTDI_FRAC_SHIFT);
    let actual_baud = ((2 * clock8 + divisor8) / (2 * divisor8)) as u32;

    Ok(BaudDivisor {
        value: (encoded & 0xFFFF) as u16,
        index: ((encoded >> 16) & 0xFFFF) as u16,
        actual_baud,
    })
}

/// 执行一步控制传输，失败时标记步骤名。
fn step<T: UsbTransport + ?Sized>(
    transport: &T,
    name: &'static str,
    request: u8,
    value: u16,
    index: u16,
) -> Result<(), CamError> {
    transport
        .control_out(request, value, index)
        .map_err(|e| CamError::ControlFailed {
            step: name,
            reason: e.to_string(),
        })
}

/// 按 D2XX 顺序初始化桥接芯片，然后查找批量端点。
///
/// 任意一步失败都会中止。步骤顺序不可调整。
/// 缺少 OUT 端点只记录警告，之后的命令不会实际发送；缺少 IN 端点返回错误。
pub fn bring_up<T: UsbTransport + ?Sized>(transport: &T, baud: u32) -> Result<Endpoints, CamError> {
    let idx = 0;

    step(transport, "reset", SIO_RESET, 0, idx)?;
    #[cfg(feature = "logging")]
    log::info!("FTDI: reset OK");

    let divisor = baud_divisor(baud)?;
    #[cfg(feature = "logging")]
    log::info!(
        "Baud: target={} actual={} ({:.2}% err)",
        baud,
        divisor.actual_baud,
        divisor.error_percent(baud)
    );
    step(transport, "set baud rate", SIO_SET_BAUD_RATE, divisor.value, divisor.index)?;

    step(transport, "set data 8N1", SIO_SET_DATA, FTDI_DATA_8N1, idx)?;
    step(transport, "disable flow control", SIO_SET_FLOW_CTRL, 0, idx)?;

    step(transport, "purge rx", SIO_RESET, FTDI_PURGE_RX, idx)?;
    step(transport, "purge tx", SIO_RESET, FTDI_PURGE_TX, idx)?;
    #[cfg(feature = "logging")]
    log::info!("FTDI: purge RX+TX OK");

    step(transport, "latency timer", SIO_SET_LATENCY_TIMER, FTDI_LATENCY_MS, idx)?;
    #[cfg(feature = "logging")]
    log::info!("FTDI: latency={}ms", FTDI_LATENCY_MS);

    step(transport, "set dtr", SIO_SET_MODEM_CTRL, FTDI_DTR_ON, idx)?;
    step(transport, "set rts", SIO_SET_MODEM_CTRL, FTDI_RTS_ON, idx)?;
    #[cfg(feature = "logging")]
    log::info!("FTDI: DTR=1 RTS=1");

    let endpoints = transport.endpoints()?;
    #[cfg(feature = "logging")]
    log::info!(
        "Endpoints: IN={:?} OUT={:?} (pkt={:?})",
        endpoints.bulk_in,
        endpoints.bulk_out,
        endpoints.in_packet_size
    );

    if endpoints.bulk_in.is_none() {
        return Err(CamError::EndpointNotFound);
    }
    if endpoints.bulk_out.is_none() {
        #[cfg(feature = "logging")]
        log::warn!("No OUT endpoint, commands will not be sent");
    }

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        calls: Mutex<Vec<(u8, u16, u16)>>,
        fail_at: Option<usize>,
        endpoints: Endpoints,
    }

    impl Recorder {
        fn new(endpoints: Endpoints) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_at: None,
                endpoints,
            }
        }
    }

    impl UsbTransport for Recorder {
        fn control_out(&self, request: u8, value: u16, index: u16) -> Result<(), CamError> {
            let mut calls = self.calls.lock().unwrap();
            if self.fail_at == Some(calls.len()) {
                return Err(CamError::UsbError("stall".into()));
            }
            calls.push((request, value, index));
            Ok(())
        }

        fn endpoints(&self) -> Result<Endpoints, CamError> {
            Ok(self.endpoints)
        }

        fn write_bulk(&self, _endpoint: u8, data: &[u8]) -> Result<usize, CamError> {
            Ok(data.len())
        }

        fn read_bulk(&self, _endpoint: u8, _buf: &mut [u8]) -> Result<usize, CamError> {
            Ok(0)
        }

        fn close(&self) -> Result<(), CamError> {
            Ok(())
        }
    }

    fn both() -> Endpoints {
        Endpoints {
            bulk_in: Some(0x81),
            bulk_out: Some(0x02),
            in_packet_size: Some(64),
        }
    }

    #[test]
    fn divisor_for_921600() {
        let d = baud_divisor(921_600).unwrap();
        // 24_000_000 / 921_600 = 26.04 -> 26 = 3 + 2/8
        assert_eq!(d.value, 0x8003);
        assert_eq!(d.index, 0);
        assert_eq!(d.actual_baud, 923_077);
        assert!(d.error_percent(921_600).abs() < 0.2);
    }

    #[test]
    fn divisor_for_common_rates() {
        let d = baud_divisor(115_200).unwrap();
        // 208.33 -> 208 = 26 + 0/8
        assert_eq!(d.value, 26);
        assert_eq!(d.index, 0);

        let d = baud_divisor(9_600).unwrap();
        // 2500 = 312 + 4/8, fraction code 1
        assert_eq!(d.value, 312 | (1 << 14));
        assert_eq!(d.actual_baud, 9_600);
    }

    #[test]
    fn divisor_error_stays_bounded() {
        for baud in [300u32, 1200, 9600, 19_200, 57_600, 115_200, 230_400, 460_800, 921_600, 2_000_000] {
            let d = baud_divisor(baud).unwrap();
            // 1/16 step on the smallest divisor (1.5) bounds the error below 5%
            assert!(d.error_percent(baud).abs() < 5.0, "baud {} err {}", baud, d.error_percent(baud));
        }
    }

    #[test]
    fn divisor_at_or_above_clock_is_zero() {
        for baud in [3_000_000u32, 6_000_000] {
            let d = baud_divisor(baud).unwrap();
            assert_eq!((d.value, d.index), (0, 0));
        }
    }

    #[test]
    fn divisor_rejects_zero_and_too_slow() {
        assert!(matches!(baud_divisor(0), Err(CamError::UnsupportedBaud(0))));
        assert!(matches!(baud_divisor(100), Err(CamError::UnsupportedBaud(100))));
    }

    #[test]
    fn bring_up_issues_sequence_in_order() {
        let t = Recorder::new(both());
        let eps = bring_up(&t, 921_600).unwrap();
        assert_eq!(eps.bulk_in, Some(0x81));

        let calls = t.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (SIO_RESET, 0, 0),
                (SIO_SET_BAUD_RATE, 0x8003, 0),
                (SIO_SET_DATA, 0x0008, 0),
                (SIO_SET_FLOW_CTRL, 0, 0),
                (SIO_RESET, 1, 0),
                (SIO_RESET, 2, 0),
                (SIO_SET_LATENCY_TIMER, 1, 0),
                (SIO_SET_MODEM_CTRL, 0x0101, 0),
                (SIO_SET_MODEM_CTRL, 0x0202, 0),
            ]
        );
    }

    #[test]
    fn bring_up_aborts_on_first_failure() {
        let mut t = Recorder::new(both());
        t.fail_at = Some(4);
        let err = bring_up(&t, 921_600).unwrap_err();
        assert!(matches!(err, CamError::ControlFailed { step: "purge rx", .. }));
        assert_eq!(t.calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn bring_up_tolerates_missing_out_endpoint() {
        let t = Recorder::new(Endpoints {
            bulk_out: None,
            ..both()
        });
        let eps = bring_up(&t, 921_600).unwrap();
        assert_eq!(eps.bulk_out, None);
    }

    #[test]
    fn bring_up_requires_in_endpoint() {
        let t = Recorder::new(Endpoints {
            bulk_in: None,
            ..both()
        });
        assert!(matches!(bring_up(&t, 921_600), Err(CamError::EndpointNotFound)));
    }
}
