//! 事件帧解析
//!
//! 读取器返回的原始字节在这里被解释为 [`HciEvent`]，并按 Command Complete
//! 的规则校验。

use crate::ProtocolError;
use crate::constants::{
    EVENT_HEADER_LEN, EVT_CMD_COMPLETE, EVT_CMD_COMPLETE_MIN_PLEN, HCI_ACLDATA_PKT,
    HCI_COMMAND_PKT, HCI_EVENT_PKT, HCI_SCODATA_PKT,
};
use num_enum::TryFromPrimitive;

/// UART 包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketKind {
    Command = HCI_COMMAND_PKT,
    AclData = HCI_ACLDATA_PKT,
    ScoData = HCI_SCODATA_PKT,
    Event = HCI_EVENT_PKT,
}

/// 已读取的 HCI 事件帧
///
/// `param_len` 是控制器声明的长度；`payload` 是实际拷贝到的字节，
/// 当声明长度超过缓冲区容量时二者不相等。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciEvent {
    pub packet_kind: u8,
    pub event_code: u8,
    pub param_len: u8,
    pub payload: Vec<u8>,
}

/// 校验通过的 Command Complete 内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandComplete {
    /// 控制器允许的未完成命令数
    pub num_packets: u8,
    pub opcode: u16,
    pub status: u8,
}

impl HciEvent {
    /// 从读取器输出中解析事件
    ///
    /// # 错误
    /// - `ProtocolError::Truncated`: 字节数不足事件头长度
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < EVENT_HEADER_LEN {
            return Err(ProtocolError::Truncated {
                phase: crate::FramePhase::Header,
                count: frame.len(),
            });
        }

        Ok(Self {
            packet_kind: frame[0],
            event_code: frame[1],
            param_len: frame[2],
            payload: frame[EVENT_HEADER_LEN..].to_vec(),
        })
    }

    /// 包类型（未知前缀返回 None）
    pub fn kind(&self) -> Option<PacketKind> {
        PacketKind::try_from(self.packet_kind).ok()
    }

    /// 按 Command Complete 规则校验，并确认回显的 opcode 与请求一致
    ///
    /// 校验顺序：包类型 → 事件码 → 参数长度 → opcode → 状态码。
    /// 即使状态码为 0，opcode 不匹配也视为失败。
    pub fn expect_command_complete(&self, opcode: u16) -> Result<CommandComplete, ProtocolError> {
        if self.kind() != Some(PacketKind::Event) {
            return Err(ProtocolError::NotAnEvent(self.packet_kind));
        }

        if self.event_code != EVT_CMD_COMPLETE {
            return Err(ProtocolError::UnexpectedEvent(self.event_code));
        }

        // 声明长度和实际拷贝长度都要满足最小值
        if self.param_len < EVT_CMD_COMPLETE_MIN_PLEN
            || self.payload.len() < EVT_CMD_COMPLETE_MIN_PLEN as usize
        {
            return Err(ProtocolError::ShortParameters(self.param_len));
        }

        let echoed = u16::from_le_bytes([self.payload[1], self.payload[2]]);
        if echoed != opcode {
            return Err(ProtocolError::OpcodeMismatch {
                expected: opcode,
                actual: echoed,
            });
        }

        let status = self.payload[3];
        if status != 0 {
            return Err(ProtocolError::CommandFailed { opcode, status });
        }

        Ok(CommandComplete {
            num_packets: self.payload[0],
            opcode: echoed,
            status,
        })
    }
}
