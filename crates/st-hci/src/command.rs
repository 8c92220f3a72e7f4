//! 命令帧构建

use crate::constants::{COMMAND_HEADER_LEN, HCI_COMMAND_PKT, HCI_VS_UPDATE_UART_BAUDRATE};

/// 波特率切换命令
///
/// 帧格式：`[0x01, opcode_lo, opcode_hi, plen = 4, baud (u32 LE)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedChangeCommand {
    pub opcode: u16,
    pub baud_rate: u32,
}

impl SpeedChangeCommand {
    /// 参数长度（固定宽度的波特率）
    pub const PARAM_LEN: u8 = 4;

    /// 打包后的总长度
    pub const WIRE_LEN: usize = COMMAND_HEADER_LEN + Self::PARAM_LEN as usize;

    /// 使用厂商 opcode 创建命令
    pub fn new(baud_rate: u32) -> Self {
        Self {
            opcode: HCI_VS_UPDATE_UART_BAUDRATE,
            baud_rate,
        }
    }

    /// 打包为串口发送字节
    pub fn pack(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0] = HCI_COMMAND_PKT;
        buf[1..3].copy_from_slice(&self.opcode.to_le_bytes());
        buf[3] = Self::PARAM_LEN;
        buf[4..8].copy_from_slice(&self.baud_rate.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_change_pack_3686400() {
        let cmd = SpeedChangeCommand::new(3_686_400);
        // 3686400 = 0x00384000
        assert_eq!(
            cmd.pack(),
            [0x01, 0x36, 0xFF, 0x04, 0x00, 0x40, 0x38, 0x00]
        );
    }

    #[test]
    fn test_speed_change_pack_9600() {
        let packed = SpeedChangeCommand::new(9600).pack();
        assert_eq!(packed[0], HCI_COMMAND_PKT);
        assert_eq!(packed[3], 4);
        assert_eq!(&packed[4..], &[0x80, 0x25, 0x00, 0x00]);
    }
}
