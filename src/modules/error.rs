//! 数字读表摄像头库的错误类型定义。

use thiserror::Error;

use crate::modules::types::SessionState;

/// 与摄像头通信时可能发生的错误。
#[derive(Debug, Error)]
pub enum CamError {
    #[error("未找到设备 (VID={0:04x}, PID={1:04x})")]
    DeviceNotFound(u16, u16),

    #[error("USB 错误: {0}")]
    UsbError(String),

    #[error("桥接芯片配置失败 ({step}): {reason}")]
    ControlFailed { step: &'static str, reason: String },

    #[error("发送数据失败: {0}")]
    SendFailed(String),

    #[error("接收数据失败: {0}")]
    ReceiveFailed(String),

    #[error("图片错误: {0}")]
    ImageError(String),

    #[error("未连接到设备")]
    NotConnected,

    #[error("未找到接口")]
    InterfaceNotFound,

    #[error("未找到批量 IN 端点")]
    EndpointNotFound,

    #[error("不支持的波特率: {0}")]
    UnsupportedBaud(u32),

    #[error("当前会话状态不允许该操作: {0:?}")]
    InvalidState(SessionState),

    #[error("未知命令: {0}")]
    UnknownCommand(String),
}

impl CamError {
    /// 连接失败时展示给用户的提示。
    pub fn user_message(&self) -> String {
        match self {
            CamError::DeviceNotFound(..) => "No FTDI device selected.".to_string(),
            other => format!("Error: {}", other),
        }
    }

    /// 是否为选择设备阶段的错误（不应重试）。
    pub fn is_selection_error(&self) -> bool {
        matches!(self, CamError::DeviceNotFound(..))
    }
}

impl From<rusb::Error> for CamError {
    fn from(e: rusb::Error) -> Self {
        CamError::UsbError(e.to_string())
    }
}
