//! 会话配置。

use std::time::Duration;

use crate::modules::constants::{
    FPS_INTERVAL_MS, FRAME_BUFFER_MAX, FRAME_MAX_BYTES, FTDI_BAUD, FTDI_DEFAULT_PACKET_SIZE,
    INIT_DELAY_MS, READ_BACKOFF_MS, READ_TIMEOUT_MS, ROI_RECOVERY_DELAY_MS, ROI_SETUP_DELAY_MS,
    TIMEOUT_MS, USB_PID, USB_TRANSFER_SIZE, USB_VID,
};

/// 会话参数，默认值与设备实测一致。
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub vid: u16,
    pub pid: u16,
    /// 目标波特率。
    pub baud: u32,
    /// 单次批量读取的字节数。
    pub transfer_size: usize,
    /// 设备未报告包大小时使用的值。
    pub default_packet_size: usize,
    /// 未找到起始标记时累加器保留的字节数。
    pub buffer_bound: usize,
    /// 未闭合帧的最大字节数。
    pub max_frame_size: usize,
    /// 控制/批量写入超时。
    pub control_timeout: Duration,
    /// 批量读取超时。
    pub read_timeout: Duration,
    /// START 与 SEND 之间的等待。
    pub init_delay: Duration,
    /// 进入 ROI 模式后、发送载荷前的等待。
    pub roi_setup_delay: Duration,
    /// ROI 写入后重新初始化会话前的等待。
    pub roi_recovery_delay: Duration,
    /// 读取出错后的退避。
    pub read_backoff: Duration,
    /// 吞吐统计间隔。
    pub throughput_interval: Duration,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            vid: USB_VID,
            pid: USB_PID,
            baud: FTDI_BAUD,
            transfer_size: USB_TRANSFER_SIZE,
            default_packet_size: FTDI_DEFAULT_PACKET_SIZE,
            buffer_bound: FRAME_BUFFER_MAX,
            max_frame_size: FRAME_MAX_BYTES,
            control_timeout: Duration::from_millis(TIMEOUT_MS),
            read_timeout: Duration::from_millis(READ_TIMEOUT_MS),
            init_delay: Duration::from_millis(INIT_DELAY_MS),
            roi_setup_delay: Duration::from_millis(ROI_SETUP_DELAY_MS),
            roi_recovery_delay: Duration::from_millis(ROI_RECOVERY_DELAY_MS),
            read_backoff: Duration::from_millis(READ_BACKOFF_MS),
            throughput_interval: Duration::from_millis(FPS_INTERVAL_MS),
        }
    }

    pub fn with_device(mut self, vid: u16, pid: u16) -> Self {
        self.vid = vid;
        self.pid = pid;
        self
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_buffer_bound(mut self, bound: usize) -> Self {
        self.buffer_bound = bound;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_read_backoff(mut self, backoff: Duration) -> Self {
        self.read_backoff = backoff;
        self
    }

    pub fn with_throughput_interval(mut self, interval: Duration) -> Self {
        self.throughput_interval = interval;
        self
    }

    /// 设置全部协议等待时间（测试中常设为 0）。
    pub fn with_delays(mut self, init: Duration, roi_setup: Duration, roi_recovery: Duration) -> Self {
        self.init_delay = init;
        self.roi_setup_delay = roi_setup;
        self.roi_recovery_delay = roi_recovery;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_device_constants() {
        let config = SessionConfig::default();
        assert_eq!((config.vid, config.pid), (USB_VID, USB_PID));
        assert_eq!(config.baud, 921_600);
        assert_eq!(config.buffer_bound, 4096);
        assert_eq!(config.max_frame_size, FRAME_MAX_BYTES);
        assert_eq!(config.read_timeout, Duration::from_millis(1000));
        assert_eq!(config.roi_setup_delay, Duration::from_millis(1000));
    }

    #[test]
    fn setters_chain() {
        let config = SessionConfig::new()
            .with_device(0x1234, 0xABCD)
            .with_baud(115_200)
            .with_buffer_bound(1024)
            .with_max_frame_size(8192)
            .with_read_timeout(Duration::from_millis(50));
        assert_eq!((config.vid, config.pid), (0x1234, 0xABCD));
        assert_eq!(config.baud, 115_200);
        assert_eq!(config.buffer_bound, 1024);
        assert_eq!(config.max_frame_size, 8192);
        assert_eq!(config.read_timeout, Duration::from_millis(50));
    }
}
