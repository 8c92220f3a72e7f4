//! Mock 串口
//!
//! 用于测试的脚本化 UART：记录每个配置步骤、捕获写出的字节、
//! 按预置响应返回读取数据，并统计仍处于打开状态的句柄数。

use crate::{DeviceError, FlowControl, TtyOp, UartDevice, UartOpener};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 控制器对 0xFF36 的成功响应
pub const SPEED_CHANGE_COMPLETE: [u8; 7] = [0x04, 0x0E, 0x04, 0x01, 0x36, 0xFF, 0x00];

/// 记录的设备操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open(PathBuf),
    DefaultAttributes,
    CustomAttributes { baud_rate: u32, flow: FlowControl },
    LineDiscipline(i32),
    Close,
}

/// 注入的失败点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Open,
    DefaultAttributes,
    CustomAttributes,
    LineDiscipline,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    written: Vec<u8>,
    open_handles: usize,
    opens: usize,
    failure: Option<MockFailure>,
}

/// Mock 打开器
///
/// `Clone` 共享内部记录和失败点：一个副本交给被测对象，另一个留在测试中检查。
#[derive(Debug, Clone)]
pub struct MockOpener {
    state: Arc<Mutex<MockState>>,
    response: Vec<u8>,
}

impl MockOpener {
    /// 不返回任何数据的设备（协商时同步失败）
    pub fn silent() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            response: Vec::new(),
        }
    }

    /// 每次打开都会对波特率切换命令回复成功
    pub fn accepting() -> Self {
        Self::silent().with_response(&SPEED_CHANGE_COMPLETE)
    }

    /// 设置每次打开后可读取的字节
    pub fn with_response(mut self, bytes: &[u8]) -> Self {
        self.response = bytes.to_vec();
        self
    }

    pub fn failing(self, failure: MockFailure) -> Self {
        self.set_failure(Some(failure));
        self
    }

    /// 修改后续打开的失败点，对所有副本生效（已打开的设备不受影响）
    pub fn set_failure(&self, failure: Option<MockFailure>) {
        self.state.lock().unwrap().failure = failure;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// 所有设备写出的字节
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().written.clone()
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().open_handles
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// 清空调用与写入记录（句柄计数保留）
    pub fn clear_history(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.clear();
        state.written.clear();
    }
}

impl UartOpener for MockOpener {
    type Device = MockUart;

    fn open(&self, path: &Path) -> Result<MockUart, DeviceError> {
        let mut state = self.state.lock().unwrap();
        if state.failure == Some(MockFailure::Open) {
            return Err(DeviceError::Open {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }

        state.calls.push(MockCall::Open(path.to_path_buf()));
        state.open_handles += 1;
        state.opens += 1;

        Ok(MockUart {
            state: Arc::clone(&self.state),
            rx: self.response.iter().copied().collect(),
            failure: state.failure,
        })
    }
}

/// Mock 设备（drop 时记录 Close 并减少句柄计数）
#[derive(Debug)]
pub struct MockUart {
    state: Arc<Mutex<MockState>>,
    rx: VecDeque<u8>,
    failure: Option<MockFailure>,
}

impl MockUart {
    fn injected(&self, point: MockFailure) -> bool {
        self.failure == Some(point)
    }
}

impl UartDevice for MockUart {
    fn set_default_attributes(&mut self) -> Result<(), DeviceError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(MockCall::DefaultAttributes);
        if self.injected(MockFailure::DefaultAttributes) {
            return Err(DeviceError::attribute(
                TtyOp::GetAttributes,
                io::Error::from(io::ErrorKind::Unsupported),
            ));
        }
        Ok(())
    }

    fn set_custom_attributes(
        &mut self,
        baud_rate: u32,
        flow: FlowControl,
    ) -> Result<(), DeviceError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(MockCall::CustomAttributes { baud_rate, flow });
        if self.injected(MockFailure::CustomAttributes) {
            return Err(DeviceError::attribute(
                TtyOp::SetExtendedAttributes,
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        }
        Ok(())
    }

    fn set_line_discipline(&mut self, ldisc: i32) -> Result<(), DeviceError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(MockCall::LineDiscipline(ldisc));
        if self.injected(MockFailure::LineDiscipline) {
            return Err(DeviceError::LineDiscipline {
                ldisc,
                source: io::Error::from(io::ErrorKind::InvalidInput),
            });
        }
        Ok(())
    }
}

impl Read for MockUart {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.rx.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockUart {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().unwrap().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockUart {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.push(MockCall::Close);
            state.open_handles = state.open_handles.saturating_sub(1);
        }
    }
}
