//! UART 会话 - 类型状态
//!
//! 使用零大小类型标记配置阶段，在编译期保证安装顺序：
//!
//! ```text
//! Opened ──set_default_attributes──▶ DefaultSpeed ──set_custom_attributes──▶ CustomSpeed
//!                                         │  negotiate_speed (仅此阶段可用)        │
//!                                         └──────────switch_line_discipline───────┴──▶ AttachedSession
//! ```
//!
//! 每个可能失败的转换都按值消费会话；失败时会话随之 drop，
//! 设备句柄在返回错误之前已经关闭。

use crate::baud::DEFAULT_BAUD_RATE;
use crate::{DeviceError, FlowControl, UartDevice, UartOpener};
use st_hci::{CommandComplete, FrameReader, ProtocolError};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ==================== 阶段类型（零大小类型）====================

/// 设备已打开，尚未配置
pub struct Opened;

/// 已配置为默认速率（115200）
pub struct DefaultSpeed;

/// 已在主机侧切换到自定义速率
pub struct CustomSpeed;

mod sealed {
    pub trait Configured {}
    impl Configured for super::DefaultSpeed {}
    impl Configured for super::CustomSpeed {}
}

/// 一次安装过程中的串口会话
pub struct UartSession<D, Stage = Opened> {
    device: D,
    path: PathBuf,
    baud_rate: u32,
    _stage: PhantomData<Stage>,
}

impl<D, Stage> UartSession<D, Stage> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 主机侧当前速率
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// 关闭会话（drop 设备句柄）
    pub fn close(self) {
        debug!("Closing {}", self.path.display());
    }

    fn advance<Next>(self, baud_rate: u32) -> UartSession<D, Next> {
        UartSession {
            device: self.device,
            path: self.path,
            baud_rate,
            _stage: PhantomData,
        }
    }
}

impl<D: UartDevice> UartSession<D, Opened> {
    /// 以读写方式打开设备
    pub fn open_default<O>(opener: &O, path: &Path) -> Result<Self, DeviceError>
    where
        O: UartOpener<Device = D>,
    {
        let device = opener.open(path)?;
        debug!("Opened {}", path.display());

        Ok(Self {
            device,
            path: path.to_path_buf(),
            baud_rate: 0,
            _stage: PhantomData,
        })
    }

    /// 应用默认属性（raw、流控、115200）
    pub fn set_default_attributes(mut self) -> Result<UartSession<D, DefaultSpeed>, DeviceError> {
        self.device.set_default_attributes()?;
        debug!(
            "{} configured at default {} bps",
            self.path.display(),
            DEFAULT_BAUD_RATE
        );
        Ok(self.advance(DEFAULT_BAUD_RATE))
    }
}

impl<D: UartDevice> UartSession<D, DefaultSpeed> {
    /// 在默认速率下与控制器协商新速率
    ///
    /// 失败时不关闭会话，由调用方决定。
    pub fn negotiate_speed(
        &mut self,
        baud_rate: u32,
        reader: &FrameReader,
    ) -> Result<CommandComplete, ProtocolError> {
        st_hci::negotiate_speed(&mut self.device, baud_rate, reader)
    }

    /// 控制器确认后，在主机侧切换到自定义速率
    pub fn set_custom_attributes(
        mut self,
        baud_rate: u32,
        flow: FlowControl,
    ) -> Result<UartSession<D, CustomSpeed>, DeviceError> {
        self.device.set_custom_attributes(baud_rate, flow)?;
        info!(
            "{} switched to {} bps, flow control {}",
            self.path.display(),
            baud_rate,
            if flow.is_enabled() { "on" } else { "off" }
        );
        Ok(self.advance(baud_rate))
    }
}

impl<D: UartDevice, Stage: sealed::Configured> UartSession<D, Stage> {
    /// 挂载线路规程，会话进入已安装形态
    pub fn switch_line_discipline(mut self, ldisc: i32) -> Result<AttachedSession<D>, DeviceError> {
        self.device.set_line_discipline(ldisc)?;

        Ok(AttachedSession {
            device: self.device,
            path: self.path,
            baud_rate: self.baud_rate,
            ldisc,
        })
    }
}

/// 已挂载线路规程的会话
///
/// 持有设备句柄直到卸载；此后设备数据流由内核线路规程接管。
pub struct AttachedSession<D> {
    device: D,
    path: PathBuf,
    baud_rate: u32,
    ldisc: i32,
}

impl<D> AttachedSession<D> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn line_discipline(&self) -> i32 {
        self.ldisc
    }

    /// 关闭设备句柄
    pub fn close(self) {
        debug!("Closing {}", self.path.display());
        drop(self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::N_SHARED;
    use crate::mock::{MockCall, MockFailure, MockOpener};
    use std::time::Duration;

    fn reader() -> FrameReader {
        FrameReader::new(4, Duration::ZERO)
    }

    #[test]
    fn test_full_custom_sequence() {
        let opener = MockOpener::accepting();
        let path = Path::new("/dev/ttyMock");

        let mut session = UartSession::open_default(&opener, path)
            .unwrap()
            .set_default_attributes()
            .unwrap();
        assert_eq!(session.baud_rate(), DEFAULT_BAUD_RATE);

        session.negotiate_speed(3_686_400, &reader()).unwrap();
        let session = session
            .set_custom_attributes(3_686_400, FlowControl::Hardware)
            .unwrap();
        let attached = session.switch_line_discipline(N_SHARED).unwrap();

        assert_eq!(attached.baud_rate(), 3_686_400);
        assert_eq!(attached.line_discipline(), N_SHARED);
        assert_eq!(opener.open_handles(), 1);

        attached.close();
        assert_eq!(opener.open_handles(), 0);
        assert_eq!(
            opener.calls(),
            vec![
                MockCall::Open(path.to_path_buf()),
                MockCall::DefaultAttributes,
                MockCall::CustomAttributes {
                    baud_rate: 3_686_400,
                    flow: FlowControl::Hardware
                },
                MockCall::LineDiscipline(N_SHARED),
                MockCall::Close,
            ]
        );
    }

    #[test]
    fn test_failed_default_attributes_closes_handle() {
        let opener = MockOpener::accepting().failing(MockFailure::DefaultAttributes);
        let session = UartSession::open_default(&opener, Path::new("/dev/ttyMock")).unwrap();
        assert_eq!(opener.open_handles(), 1);

        assert!(session.set_default_attributes().is_err());
        assert_eq!(opener.open_handles(), 0);
    }

    #[test]
    fn test_failed_line_discipline_closes_handle() {
        let opener = MockOpener::accepting().failing(MockFailure::LineDiscipline);
        let session = UartSession::open_default(&opener, Path::new("/dev/ttyMock"))
            .unwrap()
            .set_default_attributes()
            .unwrap();

        let err = session.switch_line_discipline(N_SHARED).err().unwrap();
        assert!(matches!(err, DeviceError::LineDiscipline { ldisc: 22, .. }));
        assert_eq!(opener.open_handles(), 0);
    }

    #[test]
    fn test_open_failure() {
        let opener = MockOpener::accepting().failing(MockFailure::Open);
        assert!(matches!(
            UartSession::open_default(&opener, Path::new("/dev/ttyMissing")),
            Err(DeviceError::Open { .. })
        ));
        assert_eq!(opener.open_handles(), 0);
    }
}
