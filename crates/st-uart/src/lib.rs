//! # ST UART
//!
//! 共享传输 UART 的会话管理与串口属性配置。
//!
//! ## 分层
//!
//! ```text
//! UartSession<D, Stage>   (session.rs，类型状态保证配置顺序)
//!     ↓ UartDevice trait
//! TtyDevice               (tty.rs，Linux termios/termios2/TIOCSETD)
//! MockUart                (mock.rs，脚本化响应，用于测试)
//! ```

use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod baud;
pub mod session;

#[cfg(target_os = "linux")]
pub mod tty;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use baud::{BaudSelection, CUSTOM_BAUD_RATES, DEFAULT_BAUD_RATE};
pub use session::{AttachedSession, CustomSpeed, DefaultSpeed, Opened, UartSession};

#[cfg(target_os = "linux")]
pub use tty::{TtyDevice, TtyOpener};

/// 共享传输线路规程编号（内核中的 N_TI_WL）
pub const N_SHARED: i32 = 22;

/// 硬件流控配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    #[default]
    None,
    /// RTS/CTS
    Hardware,
}

impl FlowControl {
    pub fn is_enabled(self) -> bool {
        self == FlowControl::Hardware
    }
}

impl From<bool> for FlowControl {
    fn from(enabled: bool) -> Self {
        if enabled {
            FlowControl::Hardware
        } else {
            FlowControl::None
        }
    }
}

/// 串口配置步骤（用于错误报告）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtyOp {
    Flush,
    GetAttributes,
    SetAttributes,
    SetSpeed,
    SetNonBlocking,
    GetExtendedAttributes,
    SetExtendedAttributes,
}

impl fmt::Display for TtyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TtyOp::Flush => "tcflush",
            TtyOp::GetAttributes => "tcgetattr",
            TtyOp::SetAttributes => "tcsetattr",
            TtyOp::SetSpeed => "cfsetspeed",
            TtyOp::SetNonBlocking => "fcntl(O_NONBLOCK)",
            TtyOp::GetExtendedAttributes => "ioctl(TCGETS2)",
            TtyOp::SetExtendedAttributes => "ioctl(TCSETS2)",
        };
        f.write_str(name)
    }
}

/// 串口设备错误
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("{op} failed: {source}")]
    Attribute { op: TtyOp, source: io::Error },

    #[error("Line discipline {ldisc} rejected: {source}")]
    LineDiscipline { ldisc: i32, source: io::Error },
}

impl DeviceError {
    pub fn attribute(op: TtyOp, source: impl Into<io::Error>) -> Self {
        DeviceError::Attribute {
            op,
            source: source.into(),
        }
    }
}

/// 已打开的串口设备
///
/// 读写用于 HCI 协商；其余方法对应各个配置步骤。
/// 设备被 drop 时关闭底层句柄。
pub trait UartDevice: Read + Write {
    /// 刷新缓冲、raw 模式、CLOCAL|CRTSCTS、115200
    fn set_default_attributes(&mut self) -> Result<(), DeviceError>;

    /// 设置流控并通过扩展属性应用任意波特率
    fn set_custom_attributes(
        &mut self,
        baud_rate: u32,
        flow: FlowControl,
    ) -> Result<(), DeviceError>;

    /// 切换线路规程
    fn set_line_discipline(&mut self, ldisc: i32) -> Result<(), DeviceError>;
}

/// 设备打开器（把"如何打开设备"与会话逻辑解耦，便于注入 Mock）
pub trait UartOpener {
    type Device: UartDevice;

    fn open(&self, path: &Path) -> Result<Self::Device, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_control_from_flag() {
        assert_eq!(FlowControl::from(true), FlowControl::Hardware);
        assert_eq!(FlowControl::from(false), FlowControl::None);
        assert!(FlowControl::Hardware.is_enabled());
        assert!(!FlowControl::default().is_enabled());
    }

    #[test]
    fn test_device_error_display() {
        let err = DeviceError::Open {
            path: PathBuf::from("/dev/ttyO1"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("Failed to open /dev/ttyO1"));

        let err = DeviceError::attribute(
            TtyOp::SetExtendedAttributes,
            io::Error::from(io::ErrorKind::InvalidInput),
        );
        assert!(err.to_string().starts_with("ioctl(TCSETS2) failed"));
    }
}
