//! 数字读表摄像头库的常量定义。
//!
//! 包括 FTDI FT230X 桥接芯片参数、C0 5A 传感器命令、ROI 载荷布局、
//! AI 结果帧头和 JPEG 标记。

/// FTDI FT230X 的 USB 厂商 ID。
pub const USB_VID: u16 = 0x0403;

/// FTDI FT230X 的 USB 产品 ID。
pub const USB_PID: u16 = 0x6015;

/// 控制传输超时时间（毫秒）。
pub const TIMEOUT_MS: u64 = 100;

/// 批量读取超时时间（毫秒）。超时视为空读取。
pub const READ_TIMEOUT_MS: u64 = 1000;

// FTDI SIO 厂商请求
pub const SIO_RESET: u8 = 0x00;
pub const SIO_SET_MODEM_CTRL: u8 = 0x01;
pub const SIO_SET_FLOW_CTRL: u8 = 0x02;
pub const SIO_SET_BAUD_RATE: u8 = 0x03;
pub const SIO_SET_DATA: u8 = 0x04;
pub const SIO_SET_LATENCY_TIMER: u8 = 0x09;

/// 桥接芯片基准时钟（Hz）。
pub const FTDI_BASE_CLOCK: u32 = 3_000_000;

/// 目标波特率。
pub const FTDI_BAUD: u32 = 921_600;

/// 分频器小数部分（1/8 步进）到 3 位编码的映射表。
pub const FTDI_FRAC_CODES: [u32; 8] = [0, 3, 2, 4, 1, 5, 6, 7];

/// 小数编码在分频值中的位偏移。
pub const FTDI_FRAC_SHIFT: u32 = 14;

/// 8 数据位、无校验、1 停止位。
pub const FTDI_DATA_8N1: u16 = 0x0008;
pub const FTDI_LATENCY_MS: u16 = 1;
pub const FTDI_DTR_ON: u16 = 0x0101;
pub const FTDI_RTS_ON: u16 = 0x0202;
pub const FTDI_PURGE_RX: u16 = 1;
pub const FTDI_PURGE_TX: u16 = 2;

/// 每个 USB 包前的状态字节数。
pub const FTDI_HEADER_SIZE: usize = 2;

/// 设备未报告时使用的包大小。
pub const FTDI_DEFAULT_PACKET_SIZE: usize = 64;

/// 单次批量读取请求的字节数。
pub const USB_TRANSFER_SIZE: usize = 4096;

/// 所有命令的同步前缀。
pub const FRAME_SYNC: [u8; 2] = [0xC0, 0x5A];

// 命令组
pub const CMD_GROUP_IMAGE: u8 = 0x00;
pub const CMD_GROUP_SYSTEM: u8 = 0x03;
pub const CMD_GROUP_REGISTER: u8 = 0x04;

pub const CMD_ID_REG_READ: u8 = 0x09;
pub const CMD_ID_REG_WRITE: u8 = 0x0A;

/// 命令长度（字节）。
pub const COMMAND_SIZE: usize = 7;

/// JPEG 起始/结束标记。
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// AI 结果帧头。
pub const AI_HEADER: [u8; 4] = [0xC0, 0x5A, 0x63, 0xA4];

/// 帧头起点到整数字段的偏移（帧头 4 字节 + 3 个保留字节）。
pub const AI_RESULT_OFFSET: usize = 7;

/// 整数 + 小数，两个 u32。
pub const AI_RESULT_DATA_SIZE: usize = 8;

/// 小数部分的定点刻度。
pub const AI_DECIMAL_SCALE: f64 = 1_000_000.0;

/// 前几个 AI 结果以 info 级别记录，之后降为 debug。
pub const AI_LOG_FRAME_LIMIT: u64 = 5;

/// 未找到 JPEG 起始标记时累加器保留的字节数。
pub const FRAME_BUFFER_MAX: usize = 4096;

/// 单帧 JPEG 的最大字节数，超过仍无结束标记时丢弃该帧。
pub const FRAME_MAX_BYTES: usize = 256 * 1024;

/// 帧率统计间隔（毫秒）。
pub const FPS_INTERVAL_MS: u64 = 1000;

/// 初始化命令 START 与 SEND 之间的间隔（毫秒）。
pub const INIT_DELAY_MS: u64 = 200;

/// 读取出错后的退避时间（毫秒）。
pub const READ_BACKOFF_MS: u64 = 100;

/// 标定坐标空间（左上角为原点）。
pub const CAL_W: u16 = 320;
pub const CAL_H: u16 = 240;

/// ROI 数据帧头。
pub const ROI_DATA_HDR: [u8; 4] = [0xC0, 0x5A, 0x03, 0x03];
pub const ROI_SETUP_DELAY_MS: u64 = 1000;
pub const ROI_RECOVERY_DELAY_MS: u64 = 200;
pub const ROI_PAYLOAD_SIZE: usize = 80;
pub const ROI_NUM_POINTS: usize = 8;
pub const ROI_POINTS_OFFSET: usize = 0;
pub const ROI_NUM_DIGITS_OFFSET: usize = 32;
pub const ROI_NUM_DIALS_OFFSET: usize = 34;
pub const ROI_RESERVED_OFFSET: usize = 36;
pub const ROI_RESERVED_SIZE: usize = 8;
pub const ROI_DIAL_REFS_OFFSET: usize = 44;
pub const ROI_DIAL_REFS_SIZE: usize = 32;
pub const ROI_BOUNDARY_X_OFFSET: usize = 76;
pub const ROI_BOUNDARY_Y_OFFSET: usize = 78;

/// 数字位数范围。
pub const ROI_MIN_DIGITS: u8 = 4;
pub const ROI_MAX_DIGITS: u8 = 8;

/// 默认数字边界（宽 x 高）。
pub const ROI_DEFAULT_BOUNDARY: u16 = 70;
