//! 数字读表摄像头库的模块声明。

// 常量
pub mod constants;

// 错误类型
pub mod error;

// 公共类型
pub mod types;

// 会话配置
pub mod config;

// USB 底层操作
pub mod usb;

// FTDI 桥接芯片配置
pub mod ftdi;

// 入站字节累加
pub mod accumulator;

// 帧提取
pub mod extractor;

// 命令编码
pub mod command;

// ROI 载荷
pub mod roi;

// 会话状态机
pub mod session;
