//! 线路规程状态机
//!
//! 两个状态：`Uninstalled`（初始）和 `Installed`。切换信号根据当前状态
//! 决定执行安装还是卸载；安装过程中任何一步失败都会关闭已打开的会话，
//! 状态保持 `Uninstalled`，错误只上报不重试。

use crate::config::TransportSettings;
use crate::error::TransportError;
use st_uart::{AttachedSession, BaudSelection, UartOpener, UartSession};
use tracing::{debug, error, info, warn};

/// 线路规程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDisciplineState {
    Uninstalled,
    Installed,
}

/// 共享传输
///
/// 仅在 `Installed` 状态持有设备会话。
pub struct Transport<O: UartOpener> {
    opener: O,
    settings: TransportSettings,
    session: Option<AttachedSession<O::Device>>,
}

impl<O: UartOpener> Transport<O> {
    pub fn new(opener: O, settings: TransportSettings) -> Self {
        Self {
            opener,
            settings,
            session: None,
        }
    }

    pub fn state(&self) -> LineDisciplineState {
        if self.session.is_some() {
            LineDisciplineState::Installed
        } else {
            LineDisciplineState::Uninstalled
        }
    }

    /// 当前挂载的会话
    pub fn session(&self) -> Option<&AttachedSession<O::Device>> {
        self.session.as_ref()
    }

    /// 处理一次切换请求，返回转换后的状态
    ///
    /// 安装失败时返回错误，状态仍为 `Uninstalled`。
    pub fn toggle(&mut self) -> Result<LineDisciplineState, TransportError> {
        match self.state() {
            LineDisciplineState::Uninstalled => self.install()?,
            LineDisciplineState::Installed => self.uninstall(),
        }
        Ok(self.state())
    }

    /// 执行安装序列
    ///
    /// 已安装时不做任何事。
    pub fn install(&mut self) -> Result<(), TransportError> {
        if self.session.is_some() {
            warn!("Line discipline already installed, ignoring install request");
            return Ok(());
        }

        info!("Installing line discipline on {}", self.settings.device.display());
        match self.bring_up() {
            Ok(session) => {
                info!(
                    "Line discipline {} installed on {} at {} bps",
                    session.line_discipline(),
                    session.path().display(),
                    session.baud_rate()
                );
                self.session = Some(session);
                Ok(())
            },
            Err(e) => {
                error!("Install aborted: {}", e);
                Err(e)
            },
        }
    }

    /// 关闭会话（内核随之卸下线路规程）
    pub fn uninstall(&mut self) {
        match self.session.take() {
            Some(session) => {
                let path = session.path().to_path_buf();
                session.close();
                info!("Line discipline uninstalled from {}", path.display());
            },
            None => debug!("Line discipline not installed, nothing to uninstall"),
        }
    }

    fn bring_up(&self) -> Result<AttachedSession<O::Device>, TransportError> {
        let settings = &self.settings;

        let mut session =
            UartSession::open_default(&self.opener, &settings.device)?.set_default_attributes()?;

        let attached = match settings.baud {
            BaudSelection::Custom(baud_rate) => {
                if let Err(e) = session.negotiate_speed(baud_rate, &settings.frame_reader) {
                    session.close();
                    return Err(e.into());
                }

                session
                    .set_custom_attributes(baud_rate, settings.flow)?
                    .switch_line_discipline(settings.line_discipline)?
            },
            BaudSelection::Default => session.switch_line_discipline(settings.line_discipline)?,
            BaudSelection::Unsupported(baud_rate) => {
                warn!(
                    "Baud rate {} is not supported, staying at {} bps",
                    baud_rate,
                    session.baud_rate()
                );
                session.switch_line_discipline(settings.line_discipline)?
            },
        };

        Ok(attached)
    }
}
