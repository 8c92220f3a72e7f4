//! 共享传输用户态初始化管理器（uim）
//!
//! 启动时加载 `st_drv`/`bt_drv`/`fm_drv`，把自身 PID 写入内核注册项，
//! 然后等待内核驱动发来的 SIGUSR2 安装或卸载线路规程；SIGINT 退出并卸载模块。
//!
//! ```text
//! uim /dev/ttyO1 3686400 1 /sys/devices/platform/kim/install
//! ```

#[cfg(target_os = "linux")]
mod device_lock;
#[cfg(target_os = "linux")]
mod signals;

use clap::Parser;
use st_driver::{DaemonConfig, UnloadPolicy};
use st_uart::{BaudSelection, FlowControl};
use std::path::PathBuf;

/// 共享传输用户态初始化管理器
#[derive(Parser, Debug)]
#[command(name = "uim")]
#[command(
    about = "Shared transport user-space init manager - installs the N_SHARED line discipline on request",
    long_about = None
)]
struct Args {
    /// UART 设备路径（例如 /dev/ttyO1）
    device: PathBuf,

    /// 请求的波特率（bps），115200 表示保持默认速率
    baud_rate: u32,

    /// 硬件流控：0 关闭，1 开启
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    flow_control: u8,

    /// 内核注册项路径（写入 PID）
    registration: PathBuf,

    /// 模块镜像目录（`<name>.ko`）
    #[arg(long, default_value = "/")]
    module_dir: PathBuf,

    /// 设备锁目录（每个 UART 一个锁文件）
    #[arg(long, default_value = "/run")]
    lock_dir: PathBuf,

    /// 不锁定设备
    #[arg(long)]
    no_lock: bool,

    /// 每个模块的最大卸载尝试次数
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    unload_attempts: u32,
}

impl Args {
    fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig {
            device: self.device.clone(),
            baud: BaudSelection::from_requested(self.baud_rate),
            flow: FlowControl::from(self.flow_control == 1),
            registration_path: self.registration.clone(),
            module_dir: self.module_dir.clone(),
            unload: UnloadPolicy {
                max_attempts: self.unload_attempts,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(target_os = "linux")]
fn main() {
    use device_lock::{DeviceLock, LockError};
    use st_driver::{Daemon, KernelModules, control_channel};
    use st_uart::TtyOpener;
    use std::process;
    use tracing::{error, info};

    // 1. 屏蔽 SIGUSR2（必须早于任何线程创建）
    let toggle_set = match signals::block_toggle_signal() {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Failed to block toggle signal: {}", e);
            process::exit(1);
        },
    };

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("uim=info,st_driver=info,st_uart=info,st_hci=info")
            }),
        )
        .init();

    // 2. 设备锁（早于加载模块，第二个实例不会动到内核状态）
    let _lock = if args.no_lock {
        None
    } else {
        match DeviceLock::acquire(&args.lock_dir, &args.device) {
            Ok(lock) => {
                info!(
                    "Locked {} via {}",
                    lock.device().display(),
                    lock.path().display()
                );
                Some(lock)
            },
            Err(e) => {
                if let LockError::Busy {
                    holder: Some(pid), ..
                } = &e
                {
                    error!("Device lock held by pid {}", pid);
                }
                error!("{}", e);
                process::exit(1);
            },
        }
    };

    // 3. 信号接线
    let (handle, events) = control_channel();
    if let Err(e) = signals::install_terminate_handler(handle.clone()) {
        error!("Failed to set interrupt handler: {}", e);
        process::exit(1);
    }
    if let Err(e) = signals::spawn_toggle_forwarder(toggle_set, handle) {
        error!("Failed to spawn toggle forwarder: {}", e);
        process::exit(1);
    }

    // 4. 加载模块并注册
    let mut daemon = match Daemon::start(args.daemon_config(), TtyOpener, KernelModules) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("Startup failed: {}", e);
            process::exit(1);
        },
    };

    // 5. 控制循环（阻塞直到 SIGINT）
    daemon.run(&events);

    // 6. 卸载模块
    if let Err(e) = daemon.shutdown() {
        error!("Shutdown incomplete: {}", e);
        process::exit(1);
    }
    info!("Exiting");
}

#[cfg(not(target_os = "linux"))]
fn main() {
    let _ = Args::parse();
    eprintln!("uim requires Linux (tty line disciplines and kernel modules)");
    std::process::exit(1);
}
