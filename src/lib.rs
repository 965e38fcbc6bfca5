//! AIS01 数字读表摄像头 USB 通信库。
//!
//! 摄像头通过 FTDI FT230X USB 转串口芯片连接。本库负责：
//!
//! - 桥接芯片上电初始化（波特率分频、8N1、延时定时器、DTR/RTS）
//! - 把带 2 字节包头的入站字节流切分为 JPEG 帧和 AI 识别结果
//! - 编码 C0 5A 传感器命令和 80 字节 ROI 配置
//! - 管理连接、读取线程、ROI 重新配置和断开
//!
//! # 示例
//!
//! ```rust,no_run
//! use digit_cam::{Session, SessionConfig, StreamEvent};
//!
//! let mut session: Session = Session::new(SessionConfig::default());
//! let events = session.open()?;
//! for event in events.iter().take(10) {
//!     if let StreamEvent::Frame(frame) = event {
//!         println!("{} bytes, result={:?}", frame.len(), frame.result);
//!     }
//! }
//! session.disconnect();
//! # Ok::<(), digit_cam::CamError>(())
//! ```

pub mod modules;

pub use modules::accumulator::{strip, ByteAccumulator};
pub use modules::command::{hex, Command};
pub use modules::config::SessionConfig;
pub use modules::error::CamError;
pub use modules::extractor::{find_marker, Extracted, FrameExtractor};
pub use modules::ftdi::{baud_divisor, bring_up, BaudDivisor};
pub use modules::roi::{build_roi_payload, RoiConfig, RoiPayload, RoiPoint, RoiRect};
pub use modules::session::Session;
pub use modules::types::{AiResult, DeviceInfo, Frame, SessionState, StreamEvent, StreamStats};
pub use modules::usb::{
    is_camera_present, open_device, scan_devices, Endpoints, RusbTransport, UsbTransport,
};
