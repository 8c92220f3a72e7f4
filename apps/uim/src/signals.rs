//! 信号接线
//!
//! 信号上下文中不执行任何转换逻辑：
//! - SIGUSR2 在进程启动时屏蔽（必须早于任何线程创建，子线程继承屏蔽字），
//!   由专用线程 `sigwait` 取出后投递切换请求
//! - SIGINT 通过 `ctrlc` 的处理线程投递终止请求

use nix::sys::signal::{SigSet, Signal};
use st_driver::ControlHandle;
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// 内核驱动请求安装/卸载线路规程的信号
pub const TOGGLE_SIGNAL: Signal = Signal::SIGUSR2;

/// 在当前线程屏蔽切换信号
///
/// 在 `main` 开头调用，之后创建的线程都继承该屏蔽字，
/// 信号只能被 [`spawn_toggle_forwarder`] 的 `sigwait` 取走。
pub fn block_toggle_signal() -> nix::Result<SigSet> {
    let mut set = SigSet::empty();
    set.add(TOGGLE_SIGNAL);
    set.thread_block()?;
    Ok(set)
}

/// 启动切换信号转发线程
pub fn spawn_toggle_forwarder(set: SigSet, handle: ControlHandle) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("uim-toggle".into())
        .spawn(move || {
            loop {
                match set.wait() {
                    Ok(signal) => {
                        if handle.is_terminating() {
                            break;
                        }
                        debug!("Received {:?}", signal);
                        handle.request_toggle();
                    },
                    Err(e) => {
                        error!("sigwait failed: {}", e);
                        break;
                    },
                }
            }
            debug!("Toggle forwarder exiting");
        })
}

/// 注册 SIGINT 处理（投递终止请求）
pub fn install_terminate_handler(handle: ControlHandle) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down");
        handle.request_terminate();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::pthread::pthread_kill;
    use st_driver::{ControlEvent, control_channel};
    use std::os::unix::thread::JoinHandleExt;

    #[test]
    fn test_toggle_signal_forwarded_to_channel() {
        // 只屏蔽当前测试线程，转发线程继承
        let set = block_toggle_signal().unwrap();
        let (handle, events) = control_channel();

        let forwarder = spawn_toggle_forwarder(set, handle.clone()).unwrap();
        let thread = forwarder.as_pthread_t();

        pthread_kill(thread, TOGGLE_SIGNAL).unwrap();
        assert_eq!(events.next_event(), ControlEvent::Toggle);

        // 终止后再唤醒一次，转发线程退出
        handle.request_terminate();
        pthread_kill(thread, TOGGLE_SIGNAL).unwrap();
        forwarder.join().unwrap();

        set.thread_unblock().unwrap();
    }
}
