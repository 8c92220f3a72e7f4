//! 内核模块生命周期管理
//!
//! 启动时按依赖顺序加载共享传输核心和两个协议驱动，退出时逆序卸载。
//!
//! - **加载**：任一模块失败立即终止（启动失败，不重试）
//! - **卸载**：内核报告"暂时忙"（EAGAIN）时间隔重试；某个模块最终失败
//!   不影响其余模块的卸载，结果按逻辑与汇总

use crate::error::ModuleError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 共享传输核心
pub const TRANSPORT_CORE: &str = "st_drv";
/// 蓝牙协议驱动
pub const BT_DRIVER: &str = "bt_drv";
/// FM 协议驱动
pub const FM_DRIVER: &str = "fm_drv";

/// 加载顺序（卸载时逆序）
pub const LOAD_ORDER: [&str; 3] = [TRANSPORT_CORE, BT_DRIVER, FM_DRIVER];

/// 模块加载/卸载原语
pub trait ModuleBackend {
    /// 从镜像文件插入模块
    fn insert(&self, image: &Path, params: &str) -> io::Result<()>;

    /// 按名称移除模块；模块忙时返回 `ErrorKind::WouldBlock`
    fn remove(&self, name: &str) -> io::Result<()>;
}

/// Linux `init_module` / `delete_module` 系统调用
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelModules;

#[cfg(target_os = "linux")]
impl ModuleBackend for KernelModules {
    fn insert(&self, image: &Path, params: &str) -> io::Result<()> {
        let bytes = std::fs::read(image)?;
        let params = std::ffi::CString::new(params)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let ret = unsafe {
            libc::syscall(
                libc::SYS_init_module,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len() as libc::c_ulong,
                params.as_ptr(),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        let name = std::ffi::CString::new(name)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let ret = unsafe {
            libc::syscall(
                libc::SYS_delete_module,
                name.as_ptr(),
                libc::O_NONBLOCK | libc::O_EXCL,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// 卸载重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnloadPolicy {
    /// 每个模块最多尝试次数
    pub max_attempts: u32,
    /// 模块忙时的等待间隔
    pub busy_backoff: Duration,
}

impl Default for UnloadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            busy_backoff: Duration::from_secs(1),
        }
    }
}

/// 单个模块的卸载结果
#[derive(Debug)]
pub struct UnloadOutcome {
    pub module: &'static str,
    pub result: Result<u32, ModuleError>,
}

/// 卸载汇总
#[derive(Debug, Default)]
pub struct UnloadReport {
    pub outcomes: Vec<UnloadOutcome>,
}

impl UnloadReport {
    /// 所有模块都卸载成功
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failed_modules(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.module.to_string())
            .collect()
    }

    pub fn into_result(self) -> Result<(), ModuleError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ModuleError::UnloadIncomplete {
                failed: self.failed_modules(),
            })
        }
    }
}

/// 模块管理器
#[derive(Debug)]
pub struct ModuleManager<B> {
    backend: B,
    module_dir: PathBuf,
    policy: UnloadPolicy,
}

impl<B: ModuleBackend> ModuleManager<B> {
    /// 创建管理器
    ///
    /// # 参数
    /// - `module_dir`: `<name>.ko` 镜像所在目录
    pub fn new(backend: B, module_dir: impl Into<PathBuf>, policy: UnloadPolicy) -> Self {
        Self {
            backend,
            module_dir: module_dir.into(),
            policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 模块镜像路径
    pub fn image_path(&self, module: &str) -> PathBuf {
        self.module_dir.join(format!("{}.ko", module))
    }

    /// 按顺序加载全部模块，首个失败即返回
    pub fn load_all(&self) -> Result<(), ModuleError> {
        for module in LOAD_ORDER {
            let image = self.image_path(module);
            debug!("Inserting {} from {}", module, image.display());

            self.backend
                .insert(&image, "")
                .map_err(|source| ModuleError::Load {
                    module: module.to_string(),
                    source,
                })?;
            info!("Inserted {} module", module);
        }
        Ok(())
    }

    /// 逆序卸载全部模块，每个模块都会尝试
    pub fn unload_all(&self) -> UnloadReport {
        let mut report = UnloadReport::default();

        for module in LOAD_ORDER.iter().rev().copied() {
            let result = self.unload(module);
            match &result {
                Ok(_) => info!("Removed {} module", module),
                Err(e) => error!("{}", e),
            }
            report.outcomes.push(UnloadOutcome { module, result });
        }

        report
    }

    /// 卸载单个模块，返回实际尝试次数
    pub fn unload(&self, module: &str) -> Result<u32, ModuleError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.backend.remove(module) {
                Ok(()) => return Ok(attempt),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock && attempt < max_attempts => {
                    warn!(
                        "Module {} busy (attempt {}/{}), retrying in {:?}",
                        module, attempt, max_attempts, self.policy.busy_backoff
                    );
                    std::thread::sleep(self.policy.busy_backoff);
                },
                Err(source) => {
                    return Err(ModuleError::Unload {
                        module: module.to_string(),
                        attempts: attempt,
                        source,
                    });
                },
            }
        }
    }
}
