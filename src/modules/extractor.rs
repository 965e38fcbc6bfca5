//! JPEG 帧和 AI 结果提取。
//!
//! 在累加器中查找 `FF D8` 起始标记，并在起始标记之前查找
//! `C0 5A 63 A4` 结果帧头；找到 `FF D9` 结束标记后切出完整帧。
//!
//! 提取器不会返回错误：数据不完整时只是等待更多字节，
//! 一直没有起始标记时缓冲区只保留最近的上限字节数；
//! 起始标记之后超过单帧上限仍无结束标记时，丢弃该帧并同样只保留尾部。

use crate::modules::accumulator::ByteAccumulator;
#[cfg(feature = "logging")]
use crate::modules::constants::AI_LOG_FRAME_LIMIT;
use crate::modules::constants::{
    AI_HEADER, AI_RESULT_DATA_SIZE, AI_RESULT_OFFSET, FRAME_BUFFER_MAX, FRAME_MAX_BYTES, JPEG_EOI,
    JPEG_SOI,
};
use crate::modules::types::{AiResult, Frame};

/// 从 `start` 开始查找字节序列，返回起始下标。
pub fn find_marker(data: &[u8], start: usize, marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || start >= data.len() {
        return None;
    }
    data[start..]
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|p| p + start)
}

/// 在 `data[..end]` 中从后向前查找字节序列。
fn rfind_marker(data: &[u8], end: usize, marker: &[u8]) -> Option<usize> {
    let end = end.min(data.len());
    data[..end].windows(marker.len()).rposition(|w| w == marker)
}

/// 小端读取 u32。
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let b: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(b))
}

/// 单次提取的输出。
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// 在起始标记之前解析到新的结果帧头。
    Result(AiResult),
    /// 完整的 JPEG 帧。
    Frame(Frame),
}

/// 帧提取器，持有累加器和最近一次 AI 结果。
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    acc: ByteAccumulator,
    last_result: Option<AiResult>,
    /// 当前帧中结束标记的续查位置（缓冲区前缀变化时重置）。
    eoi_from: usize,
    /// 未闭合帧的最大字节数。
    max_frame: usize,
    results_seen: u64,
}

impl FrameExtractor {
    pub fn new(bound: usize) -> Self {
        Self {
            acc: ByteAccumulator::new(bound),
            last_result: None,
            eoi_from: JPEG_SOI.len(),
            max_frame: FRAME_MAX_BYTES.max(bound),
            results_seen: 0,
        }
    }

    /// 设置未闭合帧的最大字节数（不小于缓冲上限）。
    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame.max(self.acc.bound());
        self
    }

    /// 追加一次原始 USB 读取，返回有效载荷字节数。
    pub fn push_packet(&mut self, raw: &[u8], packet_size: usize) -> usize {
        self.acc.push_packet(raw, packet_size)
    }

    /// 追加已去掉包头的有效载荷。
    pub fn push(&mut self, payload: &[u8]) {
        self.acc.extend(payload);
    }

    pub fn last_result(&self) -> Option<AiResult> {
        self.last_result
    }

    pub fn buffered(&self) -> &[u8] {
        self.acc.as_slice()
    }

    /// 丢弃缓存数据和 AI 结果。
    pub fn reset(&mut self) {
        self.acc.clear();
        self.last_result = None;
        self.eoi_from = JPEG_SOI.len();
    }

    fn discard_front(&mut self, n: usize) {
        if n > 0 {
            self.acc.discard_front(n);
            self.eoi_from = JPEG_SOI.len();
        }
    }

    /// 在 `[0, soi)` 中查找离起始标记最近的结果帧头。
    ///
    /// 结果字段必须完整落在起始标记之前，否则忽略该帧头。
    fn scan_result(&self, soi: usize) -> Option<AiResult> {
        let data = self.acc.as_slice();
        let p = rfind_marker(data, soi, &AI_HEADER)?;
        let off = p + AI_RESULT_OFFSET;
        if off + AI_RESULT_DATA_SIZE > soi {
            return None;
        }
        let fields = &data[..soi];
        let integer = read_u32_le(fields, off)?;
        let decimal = read_u32_le(fields, off + AI_RESULT_DATA_SIZE / 2)?;
        Some(AiResult::new(integer, decimal))
    }

    fn record_result(&mut self, result: AiResult) {
        self.last_result = Some(result);
        self.results_seen += 1;

        #[cfg(feature = "logging")]
        {
            if self.results_seen <= AI_LOG_FRAME_LIMIT {
                log::info!(
                    "AI[{}]: int={} dec={} reading={:.6}",
                    self.results_seen,
                    result.integer,
                    result.decimal,
                    result.reading()
                );
            } else {
                log::debug!("AI: reading={:.6}", result.reading());
            }
        }
    }

    /// 推进一步：返回新的 AI 结果或完整帧，数据不足时返回 `None`。
    pub fn poll(&mut self) -> Option<Extracted> {
        loop {
            let soi = match find_marker(self.acc.as_slice(), 0, &JPEG_SOI) {
                Some(soi) => soi,
                None => {
                    // 保留尾部：标记是逐步到达的
                    if self.acc.trim_to_bound() {
                        self.eoi_from = JPEG_SOI.len();
                    }
                    return None;
                }
            };

            if soi > 0 {
                let found = self.scan_result(soi);
                self.discard_front(soi);
                if let Some(result) = found {
                    self.record_result(result);
                    return Some(Extracted::Result(result));
                }
            }

            let data = self.acc.as_slice();
            if let Some(eoi) = find_marker(data, self.eoi_from, &JPEG_EOI) {
                let jpeg = self.acc.take_front(eoi + JPEG_EOI.len());
                self.eoi_from = JPEG_SOI.len();
                return Some(Extracted::Frame(Frame {
                    jpeg,
                    result: self.last_result,
                }));
            }

            if data.len() <= self.max_frame {
                self.eoi_from = data.len().saturating_sub(1).max(JPEG_SOI.len());
                return None;
            }

            // 帧过长：丢弃到只剩尾部，再从尾部重新查找起始标记
            #[cfg(feature = "logging")]
            log::warn!(
                "Open frame exceeds {} bytes without end marker, dropping",
                self.max_frame
            );
            let excess = data.len().saturating_sub(self.acc.bound());
            self.discard_front(excess);
        }
    }

    /// 提取当前缓冲区中所有完整帧。
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(item) = self.poll() {
            if let Extracted::Frame(frame) = item {
                frames.push(frame);
            }
        }
        frames
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(FRAME_BUFFER_MAX)
    }
}
