//! C0 5A 传感器命令编码。
//!
//! 所有命令都是 7 字节：`[C0 5A] [组] [命令] [参数1] [参数2] [尾字节]`。
//! 传输层不加长度前缀或校验。

use std::fmt;
use std::str::FromStr;

use crate::modules::constants::{
    CMD_GROUP_IMAGE, CMD_GROUP_REGISTER, CMD_GROUP_SYSTEM, CMD_ID_REG_READ, CMD_ID_REG_WRITE,
    COMMAND_SIZE, FRAME_SYNC, ROI_PAYLOAD_SIZE,
};
use crate::modules::error::CamError;

/// 传感器命令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// 初始化会话（必须最先发送）。
    Start,
    /// 通用触发。
    Send,
    /// 打开 RAW + JPEG 输出。
    EnableRaw,
    /// 仅 JPEG 输出。
    DisableRaw,
    /// 输出 640x480 全图。
    ShowFullImage,
    /// 输出 ROI 裁剪图。
    ShowRoi,
    /// 进入 ROI 标定模式（随后发送 80 字节载荷）。
    SetRoiMode,
    /// 读寄存器。
    ReadRegister(u16),
    /// 写寄存器。
    WriteRegister { addr: u16, value: u8 },
}

impl Command {
    /// 编码为线上字节。
    pub fn encode(&self) -> [u8; COMMAND_SIZE] {
        let [s0, s1] = FRAME_SYNC;
        match *self {
            Command::Start => [s0, s1, CMD_GROUP_SYSTEM, 0x04, 0x00, 0x00, 0x00],
            Command::SetRoiMode => [s0, s1, CMD_GROUP_SYSTEM, 0x05, 0x00, 0x00, ROI_PAYLOAD_SIZE as u8],
            Command::Send => image_cmd(0x01),
            Command::EnableRaw => image_cmd(0x02),
            Command::DisableRaw => image_cmd(0x03),
            Command::ShowFullImage => image_cmd(0x04),
            Command::ShowRoi => image_cmd(0x05),
            Command::ReadRegister(addr) => {
                let [hi, lo] = addr.to_be_bytes();
                [s0, s1, CMD_GROUP_REGISTER, CMD_ID_REG_READ, hi, lo, 0x00]
            }
            Command::WriteRegister { addr, value } => {
                let [hi, lo] = addr.to_be_bytes();
                [s0, s1, CMD_GROUP_REGISTER, CMD_ID_REG_WRITE, hi, lo, value]
            }
        }
    }

    /// 命令名（用于日志）。
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "START",
            Command::Send => "SEND",
            Command::EnableRaw => "ENABLE_RAW",
            Command::DisableRaw => "DISABLE_RAW",
            Command::ShowFullImage => "SHOW_FULL_IMAGE",
            Command::ShowRoi => "SHOW_ROI",
            Command::SetRoiMode => "SET_MODE",
            Command::ReadRegister(_) => "READ_REG",
            Command::WriteRegister { .. } => "WRITE_REG",
        }
    }
}

fn image_cmd(trailer: u8) -> [u8; COMMAND_SIZE] {
    [FRAME_SYNC[0], FRAME_SYNC[1], CMD_GROUP_IMAGE, 0x00, 0x00, 0x00, trailer]
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ReadRegister(addr) => write!(f, "READ_REG 0x{:04x}", addr),
            Command::WriteRegister { addr, value } => {
                write!(f, "WRITE_REG 0x{:04x}=0x{:02x}", addr, value)
            }
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Command {
    type Err = CamError;

    /// 解析固定命令名，例如 `"SHOW_ROI"`。寄存器命令需带参数，不在此解析。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "START" => Ok(Command::Start),
            "SEND" => Ok(Command::Send),
            "ENABLE_RAW" => Ok(Command::EnableRaw),
            "DISABLE_RAW" => Ok(Command::DisableRaw),
            "SHOW_FULL_IMAGE" => Ok(Command::ShowFullImage),
            "SHOW_ROI" => Ok(Command::ShowRoi),
            "SET_MODE" => Ok(Command::SetRoiMode),
            _ => Err(CamError::UnknownCommand(s.to_string())),
        }
    }
}

/// 以空格分隔的小写十六进制。
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_commands_are_bit_exact() {
        assert_eq!(Command::Start.encode(), [0xC0, 0x5A, 0x03, 0x04, 0x00, 0x00, 0x00]);
        assert_eq!(Command::Send.encode(), [0xC0, 0x5A, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(Command::EnableRaw.encode(), [0xC0, 0x5A, 0x00, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(Command::DisableRaw.encode(), [0xC0, 0x5A, 0x00, 0x00, 0x00, 0x00, 0x03]);
        assert_eq!(Command::ShowFullImage.encode(), [0xC0, 0x5A, 0x00, 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(Command::ShowRoi.encode(), [0xC0, 0x5A, 0x00, 0x00, 0x00, 0x00, 0x05]);
        assert_eq!(Command::SetRoiMode.encode(), [0xC0, 0x5A, 0x03, 0x05, 0x00, 0x00, 0x50]);
    }

    #[test]
    fn register_commands_carry_big_endian_address() {
        assert_eq!(
            Command::ReadRegister(0x1234).encode(),
            [0xC0, 0x5A, 0x04, 0x09, 0x12, 0x34, 0x00]
        );
        assert_eq!(
            Command::WriteRegister { addr: 0x0042, value: 0x7F }.encode(),
            [0xC0, 0x5A, 0x04, 0x0A, 0x00, 0x42, 0x7F]
        );
    }

    #[test]
    fn parses_names() {
        assert_eq!("SHOW_ROI".parse::<Command>().unwrap(), Command::ShowRoi);
        assert_eq!(" show_full_image ".parse::<Command>().unwrap(), Command::ShowFullImage);
        assert!(matches!("FOO".parse::<Command>(), Err(CamError::UnknownCommand(_))));
    }

    #[test]
    fn display_and_hex() {
        assert_eq!(Command::ReadRegister(0x0A).to_string(), "READ_REG 0x000a");
        assert_eq!(hex(&Command::ShowRoi.encode()), "c0 5a 00 00 00 00 05");
    }
}
