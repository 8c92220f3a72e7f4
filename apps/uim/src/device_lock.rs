//! UART 设备锁
//!
//! 每个 UART 一把 `flock` 排他锁，锁文件名由设备的规范路径推导，
//! 所以经符号链接指向同一设备的两个 uim 也会冲突；不同设备互不影响。
//! 锁随文件描述符关闭释放，进程崩溃时由内核回收。

use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("{} is already managed by another uim instance (lock file {})", .device.display(), .path.display())]
    Busy {
        device: PathBuf,
        path: PathBuf,
        /// 锁文件中记录的持有者 PID（读不到时为 None）
        holder: Option<u32>,
    },

    #[error("Failed to lock {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// 设备锁文件路径：`<lock_dir>/uim.<路径各段以 - 连接>.lock`
///
/// `/dev/ttyO1` → `<lock_dir>/uim.dev-ttyO1.lock`
pub fn lock_path_for(lock_dir: &Path, device: &Path) -> PathBuf {
    let name = device
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("-");
    lock_dir.join(format!("uim.{}.lock", name))
}

/// 持有期间独占一个 UART
#[derive(Debug)]
pub struct DeviceLock {
    _file: File,
    device: PathBuf,
    path: PathBuf,
}

impl DeviceLock {
    /// 非阻塞地锁定 `device`
    ///
    /// 设备路径先做规范化（失败时按原样使用）。成功后锁文件内容为
    /// `<pid> <device>`。
    pub fn acquire(lock_dir: &Path, device: &Path) -> Result<Self, LockError> {
        let device = fs::canonicalize(device).unwrap_or_else(|_| device.to_path_buf());
        let path = lock_path_for(lock_dir, &device);
        let io_err = |source: io::Error| LockError::Io {
            path: path.clone(),
            source,
        };

        // 拿到锁之前不能截断，否则会抹掉持有者的 PID
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(io_err)?;

        if !file.try_lock_exclusive().map_err(io_err)? {
            let holder = read_holder(&mut file);
            return Err(LockError::Busy {
                device,
                path,
                holder,
            });
        }

        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        writeln!(file, "{} {}", std::process::id(), device.display()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        Ok(Self {
            _file: file,
            device,
            path,
        })
    }

    /// 规范化后的设备路径
    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.split_whitespace().next()?.parse().ok()
}
