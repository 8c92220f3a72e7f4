//! 守护进程配置

use crate::modules::UnloadPolicy;
use st_hci::FrameReader;
use st_uart::{BaudSelection, FlowControl, N_SHARED};
use std::path::PathBuf;

/// 启动时构建一次，之后只读
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// UART 设备路径
    pub device: PathBuf,
    /// 请求的波特率分类
    pub baud: BaudSelection,
    /// 切换到自定义速率后的硬件流控
    pub flow: FlowControl,
    /// 写入 PID 的注册项
    pub registration_path: PathBuf,
    /// `<name>.ko` 所在目录
    pub module_dir: PathBuf,
    pub unload: UnloadPolicy,
    pub frame_reader: FrameReader,
    /// 挂载的线路规程编号
    pub line_discipline: i32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttyS0"),
            baud: BaudSelection::Default,
            flow: FlowControl::None,
            registration_path: PathBuf::new(),
            module_dir: PathBuf::from("/"),
            unload: UnloadPolicy::default(),
            frame_reader: FrameReader::default(),
            line_discipline: N_SHARED,
        }
    }
}

impl DaemonConfig {
    /// 安装传输时使用的参数
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            device: self.device.clone(),
            baud: self.baud,
            flow: self.flow,
            frame_reader: self.frame_reader,
            line_discipline: self.line_discipline,
        }
    }
}

/// 传输安装参数
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub device: PathBuf,
    pub baud: BaudSelection,
    pub flow: FlowControl,
    pub frame_reader: FrameReader,
    pub line_discipline: i32,
}
