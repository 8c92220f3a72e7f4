//! 内核协调通道
//!
//! 共享传输驱动通过平台设备的一个 sysfs 属性得知守护进程 PID，
//! 之后用 SIGUSR2 请求安装/卸载线路规程。

use crate::error::RegistrationError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// 写入指定 PID（十进制）
///
/// 注册项由驱动创建，这里只打开不创建。
pub fn register_pid(path: &Path, pid: u32) -> Result<(), RegistrationError> {
    let mut entry = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| RegistrationError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    write!(entry, "{}", pid).map_err(|source| RegistrationError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Registered PID {} at {}", pid, path.display());
    Ok(())
}

/// 写入当前进程 PID
pub fn register_self(path: &Path) -> Result<(), RegistrationError> {
    register_pid(path, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_register_writes_decimal_pid() {
        let entry = tempfile::NamedTempFile::new().unwrap();
        register_pid(entry.path(), 4242).unwrap();
        assert_eq!(fs::read_to_string(entry.path()).unwrap(), "4242");
    }

    #[test]
    fn test_register_self() {
        let entry = tempfile::NamedTempFile::new().unwrap();
        register_self(entry.path()).unwrap();
        assert_eq!(
            fs::read_to_string(entry.path()).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn test_missing_entry_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid");

        match register_pid(&path, 1) {
            Err(RegistrationError::Open { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Open error, got {:?}", other),
        }
        assert!(!path.exists());
    }
}
