//! 驱动层错误类型定义

use st_hci::ProtocolError;
use st_uart::DeviceError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 安装/卸载线路规程过程中的错误
///
/// 只会中止当前这一次状态转换，守护进程继续等待下一个控制信号。
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("UART device error: {0}")]
    Device(#[from] DeviceError),

    #[error("HCI protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// 内核模块加载/卸载错误
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Failed to insert module {module}: {source}")]
    Load { module: String, source: io::Error },

    #[error("Failed to remove module {module} after {attempts} attempt(s): {source}")]
    Unload {
        module: String,
        attempts: u32,
        source: io::Error,
    },

    /// 卸载汇总：所有模块都尝试过，至少一个失败
    #[error("Failed to remove modules: {}", .failed.join(", "))]
    UnloadIncomplete { failed: Vec<String> },
}

/// 向内核注册 PID 失败
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Failed to open registration entry {} (missing platform device?): {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to write PID to {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// 守护进程错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
