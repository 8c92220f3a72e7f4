//! Linux tty 设备实现
//!
//! - 基础属性通过 termios（nix）设置
//! - 任意波特率通过 termios2（`TCGETS2`/`TCSETS2` + `BOTHER`）设置，
//!   标准 `Bxxx` 常量无法表达 3686400 这类速率
//! - 线路规程通过 `TIOCSETD` 切换
//!
//! ## 权限要求
//! 打开 UART 和切换线路规程通常需要 root 或 `dialout` 组权限。

use crate::{DeviceError, FlowControl, TtyOp, UartDevice, UartOpener};
use nix::sys::termios::{self, BaudRate, ControlFlags, FlushArg, SetArg, Termios};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tracing::trace;

/// 打开真实 tty 设备
#[derive(Debug, Clone, Copy, Default)]
pub struct TtyOpener;

impl UartOpener for TtyOpener {
    type Device = TtyDevice;

    fn open(&self, path: &Path) -> Result<TtyDevice, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(TtyDevice {
            file,
            termios: None,
        })
    }
}

/// 已打开的 tty（drop 时关闭文件描述符）
#[derive(Debug)]
pub struct TtyDevice {
    file: File,
    /// 最近一次提交的基础属性
    termios: Option<Termios>,
}

impl TtyDevice {
    fn flush_io(&self) -> Result<(), DeviceError> {
        termios::tcflush(&self.file, FlushArg::TCIOFLUSH)
            .map_err(|e| DeviceError::attribute(TtyOp::Flush, e))
    }

    fn commit(&self, tio: &Termios) -> Result<(), DeviceError> {
        termios::tcsetattr(&self.file, SetArg::TCSANOW, tio)
            .map_err(|e| DeviceError::attribute(TtyOp::SetAttributes, e))
    }

    fn current_attributes(&mut self) -> Result<Termios, DeviceError> {
        match self.termios.take() {
            Some(tio) => Ok(tio),
            None => termios::tcgetattr(&self.file)
                .map_err(|e| DeviceError::attribute(TtyOp::GetAttributes, e)),
        }
    }

    /// 同步阶段依赖非阻塞读才能按间隔重试
    fn set_nonblocking(&self) -> Result<(), DeviceError> {
        let fd = self.file.as_raw_fd();

        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(DeviceError::attribute(
                TtyOp::SetNonBlocking,
                io::Error::last_os_error(),
            ));
        }

        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(DeviceError::attribute(
                TtyOp::SetNonBlocking,
                io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    /// termios2 路径：清除 CBAUD，设置 BOTHER，写入精确速率
    fn set_exact_speed(&self, baud_rate: u32) -> Result<(), DeviceError> {
        let fd = self.file.as_raw_fd();
        let mut tio2: libc::termios2 = unsafe { std::mem::zeroed() };

        let result = unsafe { libc::ioctl(fd, libc::TCGETS2, &mut tio2 as *mut libc::termios2) };
        if result < 0 {
            return Err(DeviceError::attribute(
                TtyOp::GetExtendedAttributes,
                io::Error::last_os_error(),
            ));
        }

        tio2.c_cflag &= !libc::CBAUD;
        tio2.c_cflag |= libc::BOTHER;
        tio2.c_ospeed = baud_rate;
        tio2.c_ispeed = baud_rate;

        let result = unsafe { libc::ioctl(fd, libc::TCSETS2, &tio2 as *const libc::termios2) };
        if result < 0 {
            return Err(DeviceError::attribute(
                TtyOp::SetExtendedAttributes,
                io::Error::last_os_error(),
            ));
        }

        trace!("termios2 speed set to {} (BOTHER)", baud_rate);
        Ok(())
    }
}

impl UartDevice for TtyDevice {
    fn set_default_attributes(&mut self) -> Result<(), DeviceError> {
        self.flush_io()?;

        let mut tio = termios::tcgetattr(&self.file)
            .map_err(|e| DeviceError::attribute(TtyOp::GetAttributes, e))?;

        termios::cfmakeraw(&mut tio);
        tio.control_flags
            .insert(ControlFlags::CLOCAL | ControlFlags::CRTSCTS);
        self.commit(&tio)?;

        termios::cfsetospeed(&mut tio, BaudRate::B115200)
            .map_err(|e| DeviceError::attribute(TtyOp::SetSpeed, e))?;
        termios::cfsetispeed(&mut tio, BaudRate::B115200)
            .map_err(|e| DeviceError::attribute(TtyOp::SetSpeed, e))?;
        self.commit(&tio)?;

        self.flush_io()?;
        self.set_nonblocking()?;

        self.termios = Some(tio);
        Ok(())
    }

    fn set_custom_attributes(
        &mut self,
        baud_rate: u32,
        flow: FlowControl,
    ) -> Result<(), DeviceError> {
        self.flush_io()?;

        let mut tio = self.current_attributes()?;
        match flow {
            FlowControl::Hardware => tio.control_flags.insert(ControlFlags::CRTSCTS),
            FlowControl::None => tio.control_flags.remove(ControlFlags::CRTSCTS),
        }
        self.commit(&tio)?;
        self.termios = Some(tio);

        self.flush_io()?;
        self.set_exact_speed(baud_rate)
    }

    fn set_line_discipline(&mut self, ldisc: i32) -> Result<(), DeviceError> {
        let value: libc::c_int = ldisc;
        let result = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                libc::TIOCSETD,
                &value as *const libc::c_int,
            )
        };

        if result < 0 {
            return Err(DeviceError::LineDiscipline {
                ldisc,
                source: io::Error::last_os_error(),
            });
        }

        trace!("Line discipline {} installed", ldisc);
        Ok(())
    }
}

impl Read for TtyDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for TtyDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
