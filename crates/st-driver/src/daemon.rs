//! 守护进程编排
//!
//! 生命周期：加载模块 → 注册 PID → 控制循环（切换/终止）→ 关闭会话 → 卸载模块。
//! `Daemon` 独占传输状态机与模块管理器，没有进程级全局状态。

use crate::config::DaemonConfig;
use crate::control::{ControlEvent, ControlEvents};
use crate::error::DriverError;
use crate::modules::{ModuleBackend, ModuleManager};
use crate::registration;
use crate::transport::{LineDisciplineState, Transport};
use st_uart::{BaudSelection, UartOpener};
use std::ops::ControlFlow;
use tracing::{error, info, warn};

/// 用户态初始化管理器
pub struct Daemon<O: UartOpener, B: ModuleBackend> {
    transport: Transport<O>,
    modules: ModuleManager<B>,
}

impl<O: UartOpener, B: ModuleBackend> Daemon<O, B> {
    /// 加载模块并向内核注册
    ///
    /// 注册失败时先卸载已加载的模块再返回错误。
    pub fn start(config: DaemonConfig, opener: O, backend: B) -> Result<Self, DriverError> {
        log_banner(&config);

        let modules = ModuleManager::new(backend, config.module_dir.clone(), config.unload);
        modules.load_all()?;

        if let Err(e) = registration::register_self(&config.registration_path) {
            error!("{}", e);
            let report = modules.unload_all();
            if !report.is_success() {
                error!(
                    "Error removing modules: {}",
                    report.failed_modules().join(", ")
                );
            }
            return Err(e.into());
        }

        Ok(Self {
            transport: Transport::new(opener, config.transport_settings()),
            modules,
        })
    }

    pub fn state(&self) -> LineDisciplineState {
        self.transport.state()
    }

    /// 处理单个控制事件
    ///
    /// 转换失败只记录日志，守护进程继续运行。
    pub fn handle(&mut self, event: ControlEvent) -> ControlFlow<()> {
        match event {
            ControlEvent::Toggle => {
                match self.transport.toggle() {
                    Ok(state) => info!("Line discipline state: {:?}", state),
                    Err(e) => error!(
                        "Toggle failed, state remains {:?}: {}",
                        self.transport.state(),
                        e
                    ),
                }
                ControlFlow::Continue(())
            },
            ControlEvent::Terminate => {
                info!("Termination requested");
                ControlFlow::Break(())
            },
        }
    }

    /// 控制循环，直到收到终止请求
    pub fn run(&mut self, events: &ControlEvents) {
        info!("Waiting for control signals");
        while let ControlFlow::Continue(()) = self.handle(events.next_event()) {}
    }

    /// 关闭会话并逆序卸载模块
    ///
    /// 所有模块都会尝试卸载；任一失败时返回汇总错误。
    pub fn shutdown(mut self) -> Result<(), DriverError> {
        if self.transport.state() == LineDisciplineState::Installed {
            warn!("Line discipline still installed at shutdown, closing session");
            self.transport.uninstall();
        }

        self.modules.unload_all().into_result()?;
        info!("All modules removed");
        Ok(())
    }
}

fn log_banner(config: &DaemonConfig) {
    info!(
        "Shared transport init manager starting (pid {})",
        std::process::id()
    );
    info!(
        "Device: {}, baud: {}, flow control: {}, registration: {}",
        config.device.display(),
        config.baud,
        if config.flow.is_enabled() { "on" } else { "off" },
        config.registration_path.display()
    );
    match config.baud {
        BaudSelection::Custom(baud_rate) => {
            info!("Custom speed {} bps will be negotiated on install", baud_rate)
        },
        BaudSelection::Default => info!("Using default speed, no negotiation"),
        BaudSelection::Unsupported(baud_rate) => {
            warn!("Invalid baud rate {}, custom speed disabled", baud_rate)
        },
    }
}
