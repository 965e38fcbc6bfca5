//! 入站字节累加器：去掉每个 USB 包的状态前缀并缓存有效载荷。

use crate::modules::constants::{FTDI_DEFAULT_PACKET_SIZE, FTDI_HEADER_SIZE};

/// 去掉一次读取中每个 `packet_size` 字节块开头的 2 字节状态。
///
/// 一次读取可能包含多个设备包，每个包（包括最后一个较短的包）都有状态前缀。
/// 长度不超过 2 的读取没有有效载荷。`packet_size` 为 0 时使用默认值 64。
pub fn strip(raw: &[u8], packet_size: usize) -> Vec<u8> {
    if raw.len() <= FTDI_HEADER_SIZE {
        return Vec::new();
    }
    let packet_size = if packet_size == 0 {
        FTDI_DEFAULT_PACKET_SIZE
    } else {
        packet_size
    };

    let mut payload = Vec::with_capacity(raw.len());
    for chunk in raw.chunks(packet_size) {
        if chunk.len() > FTDI_HEADER_SIZE {
            payload.extend_from_slice(&chunk[FTDI_HEADER_SIZE..]);
        }
    }
    payload
}

/// 尚未消费的入站有效载荷。
///
/// 只由读取循环持有；只允许追加和删除前缀。
#[derive(Debug, Clone)]
pub struct ByteAccumulator {
    buf: Vec<u8>,
    bound: usize,
}

impl ByteAccumulator {
    /// 创建累加器，`bound` 为未找到帧起始标记时保留的字节数。
    pub fn new(bound: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bound * 2),
            bound,
        }
    }

    /// 追加一次原始 USB 读取（自动去掉包头），返回追加的有效载荷字节数。
    pub fn push_packet(&mut self, raw: &[u8], packet_size: usize) -> usize {
        let payload = strip(raw, packet_size);
        self.buf.extend_from_slice(&payload);
        payload.len()
    }

    /// 直接追加已去掉包头的有效载荷。
    pub fn extend(&mut self, payload: &[u8]) {
        self.buf.extend_from_slice(payload);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// 删除并返回前 `n` 个字节。
    pub fn take_front(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.buf.len());
        self.buf.drain(..n).collect()
    }

    /// 丢弃前 `n` 个字节。
    pub fn discard_front(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
    }

    /// 超过上限时只保留最近的 `bound` 个字节，返回是否发生了裁剪。
    pub fn trim_to_bound(&mut self) -> bool {
        if self.buf.len() <= self.bound {
            return false;
        }
        let excess = self.buf.len() - self.bound;
        self.buf.drain(..excess);
        true
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_len(len: usize, p: usize) -> usize {
        len - 2 * len.div_ceil(p)
    }

    #[test]
    fn short_reads_have_no_payload() {
        for p in [8usize, 64, 512] {
            assert!(strip(&[], p).is_empty());
            assert!(strip(&[0x31], p).is_empty());
            assert!(strip(&[0x31, 0x60], p).is_empty());
        }
    }

    #[test]
    fn strips_header_from_every_packet() {
        let raw = [0x31, 0x60, 1, 2, 3, 4, 0x31, 0x60, 5, 6, 7, 8, 0x31, 0x60, 9];
        assert_eq!(strip(&raw, 6), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn output_length_matches_packet_count() {
        for p in [4usize, 16, 64, 512] {
            for len in 3..600usize {
                // final chunk must still hold more than its header
                if len % p == 1 {
                    continue;
                }
                let raw: Vec<u8> = (0..len).map(|i| i as u8).collect();
                assert_eq!(strip(&raw, p).len(), expected_len(len, p), "len {} p {}", len, p);
            }
        }
    }

    #[test]
    fn one_byte_tail_packet_contributes_nothing() {
        let raw = [0x31, 0x60, 1, 2, 0x31];
        assert_eq!(strip(&raw, 4), vec![1, 2]);
    }

    #[test]
    fn zero_packet_size_uses_default() {
        let raw: Vec<u8> = (0..128u8).collect();
        assert_eq!(strip(&raw, 0), strip(&raw, 64));
        assert_eq!(strip(&raw, 0).len(), 124);
    }

    #[test]
    fn trim_keeps_latest_bytes() {
        let mut acc = ByteAccumulator::new(4);
        acc.extend(&[1, 2, 3, 4, 5, 6]);
        assert!(acc.trim_to_bound());
        assert_eq!(acc.as_slice(), &[3, 4, 5, 6]);
        assert!(!acc.trim_to_bound());
    }

    #[test]
    fn take_front_removes_prefix() {
        let mut acc = ByteAccumulator::new(16);
        assert_eq!(acc.push_packet(&[0, 0, 9, 8, 7], 64), 3);
        assert_eq!(acc.take_front(2), vec![9, 8]);
        assert_eq!(acc.as_slice(), &[7]);
        acc.discard_front(10);
        assert!(acc.is_empty());
    }
}
