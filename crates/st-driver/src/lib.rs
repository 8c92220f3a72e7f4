//! 共享传输初始化管理器核心
//!
//! 本 crate 提供守护进程的全部逻辑，包括：
//! - 内核模块加载与逆序卸载（忙时重试）
//! - 通过 sysfs 注册项向内核驱动上报 PID
//! - 线路规程安装/卸载状态机
//! - 信号到控制循环的事件通道
//!
//! # 使用场景
//!
//! `uim` 二进制负责解析参数和信号接线，本 crate 不依赖任何进程级全局状态，
//! 可以配合 `st_uart::mock` 与自定义 [`ModuleBackend`] 在测试中完整驱动。

pub mod config;
pub mod control;
mod daemon;
mod error;
pub mod modules;
pub mod registration;
pub mod transport;

pub use config::{DaemonConfig, TransportSettings};
pub use control::{ControlEvent, ControlEvents, ControlHandle, control_channel};
pub use daemon::Daemon;
pub use error::{DriverError, ModuleError, RegistrationError, TransportError};
#[cfg(target_os = "linux")]
pub use modules::KernelModules;
pub use modules::{LOAD_ORDER, ModuleBackend, ModuleManager, UnloadPolicy, UnloadReport};
pub use transport::{LineDisciplineState, Transport};
