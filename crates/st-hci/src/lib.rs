//! # ST HCI
//!
//! 共享传输（Shared Transport）控制器的 HCI 命令/事件协议（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 包类型、事件码、厂商 opcode
//! - `command`: 命令帧构建（波特率切换命令）
//! - `event`: 事件帧解析与 Command Complete 校验
//! - `reader`: 字节流帧读取器（同步 + 有界重试）
//! - `negotiate`: 波特率协商流程
//!
//! ## 字节序
//!
//! HCI 协议使用小端字节序（opcode 与参数均为 little-endian）。

pub mod command;
pub mod constants;
pub mod event;
pub mod negotiate;
pub mod reader;

pub use command::SpeedChangeCommand;
pub use constants::*;
pub use event::{CommandComplete, HciEvent, PacketKind};
pub use negotiate::negotiate_speed;
pub use reader::{FramePhase, FrameReader};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 同步阶段重试耗尽，未找到事件前缀
    #[error("No HCI event prefix found after {misses} attempts")]
    SyncLost { misses: u32 },

    /// 帧内读取失败（头部或参数阶段，不重试）
    #[error("Read failed in {phase} phase: {source}")]
    Read {
        phase: FramePhase,
        #[source]
        source: std::io::Error,
    },

    /// 帧内读到 EOF
    #[error("Stream ended in {phase} phase after {count} bytes")]
    Truncated { phase: FramePhase, count: usize },

    /// 调用方缓冲区容量不足以容纳事件头
    #[error("Buffer capacity {capacity} is smaller than the {required}-byte event header")]
    BufferTooSmall { capacity: usize, required: usize },

    /// 命令写入失败
    #[error("Failed to write HCI command: {0}")]
    Write(#[source] std::io::Error),

    #[error("Not an event packet: 0x{0:02X}")]
    NotAnEvent(u8),

    #[error("Not a command-complete event: 0x{0:02X}")]
    UnexpectedEvent(u8),

    #[error("Command complete parameter length {0} is below 4")]
    ShortParameters(u8),

    #[error("Opcode mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    OpcodeMismatch { expected: u16, actual: u16 },

    #[error("Controller rejected command 0x{opcode:04X} with status 0x{status:02X}")]
    CommandFailed { opcode: u16, status: u8 },
}

impl ProtocolError {
    /// 是否为同步阶段的失败（链路未就绪），而非帧内传输故障
    pub fn is_sync_failure(&self) -> bool {
        matches!(self, ProtocolError::SyncLost { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::OpcodeMismatch {
            expected: 0xFF36,
            actual: 0x1001,
        };
        assert_eq!(
            err.to_string(),
            "Opcode mismatch: expected 0xFF36, got 0x1001"
        );

        let err = ProtocolError::CommandFailed {
            opcode: 0xFF36,
            status: 0x12,
        };
        assert!(err.to_string().contains("status 0x12"));

        let err = ProtocolError::Truncated {
            phase: FramePhase::Header,
            count: 2,
        };
        assert_eq!(err.to_string(), "Stream ended in header phase after 2 bytes");
    }

    #[test]
    fn test_sync_failure_classification() {
        assert!(ProtocolError::SyncLost { misses: 5 }.is_sync_failure());
        assert!(!ProtocolError::NotAnEvent(0x01).is_sync_failure());
    }
}
