//! 数字读表摄像头库的公共类型定义。

use image::DynamicImage;

use crate::modules::constants::AI_DECIMAL_SCALE;
use crate::modules::error::CamError;

/// 设备端推理结果。
///
/// 每次解析到新的结果帧头时整体替换，不做部分更新。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AiResult {
    /// 整数部分。
    pub integer: u32,
    /// 小数部分（单位 1e-6）。
    pub decimal: u32,
    /// 置信度（当前设备固定上报 0）。
    pub confidence: u16,
    /// 标志位。
    pub flags: u8,
}

impl AiResult {
    /// 从整数和小数部分创建（置信度和标志位为 0）。
    pub fn new(integer: u32, decimal: u32) -> Self {
        Self {
            integer,
            decimal,
            confidence: 0,
            flags: 0,
        }
    }

    /// 转换为读数。
    pub fn reading(&self) -> f64 {
        self.integer as f64 + self.decimal as f64 / AI_DECIMAL_SCALE
    }
}

/// 一帧完整的 JPEG 图片及提取时的 AI 结果。
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 从 FF D8 到 FF D9（含）的 JPEG 字节。
    pub jpeg: Vec<u8>,
    /// 提取时的最新 AI 结果（可能来自更早的帧）。
    pub result: Option<AiResult>,
}

impl Frame {
    /// JPEG 字节数。
    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    /// 解码为图片（供渲染端使用）。
    pub fn decode(&self) -> Result<DynamicImage, CamError> {
        image::load_from_memory_with_format(&self.jpeg, image::ImageFormat::Jpeg)
            .map_err(|e| CamError::ImageError(e.to_string()))
    }
}

/// 读取循环发出的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// 解析到新的 AI 结果。
    Result(AiResult),
    /// 提取到完整的 JPEG 帧。
    Frame(Frame),
    /// 周期性吞吐统计。
    Throughput {
        /// 本周期的帧率。
        fps: f64,
        /// 累计帧数。
        frames: u64,
        /// 累计有效载荷字节数。
        bytes: u64,
    },
}

/// 会话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configuring,
    Streaming,
    Reconfiguring,
}

/// 读取循环的累计统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    /// 已提取的帧数。
    pub frames: u64,
    /// 去掉包头后的有效载荷字节数。
    pub bytes: u64,
    /// 临时读取错误次数。
    pub read_errors: u64,
}

/// 设备信息。
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// 厂商 ID。
    pub vid: u16,
    /// 产品 ID。
    pub pid: u16,
    /// 设备信息字符串。
    pub info: String,
}
