//! 控制事件通道
//!
//! 信号处理线程只负责投递 [`ControlEvent`]，所有状态转换都在主线程的
//! 控制循环中执行。
//!
//! - 队列深度为 1：已有切换请求待处理时，新的切换请求被合并（丢弃）
//! - 转换执行期间到达的切换请求进入队列，转换结束后处理
//! - 终止请求同时设置原子标志，每次等待前检查，不会丢失

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// 控制事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// 安装/卸载线路规程
    Toggle,
    /// 退出守护进程
    Terminate,
}

/// 创建控制通道
pub fn control_channel() -> (ControlHandle, ControlEvents) {
    let (tx, rx) = bounded(1);
    let terminate = Arc::new(AtomicBool::new(false));

    (
        ControlHandle {
            tx,
            terminate: Arc::clone(&terminate),
        },
        ControlEvents { rx, terminate },
    )
}

/// 投递端（可克隆，交给各信号线程）
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<ControlEvent>,
    terminate: Arc<AtomicBool>,
}

impl ControlHandle {
    /// 请求切换
    ///
    /// 返回 `false` 表示请求被合并或控制循环已退出。
    pub fn request_toggle(&self) -> bool {
        match self.tx.try_send(ControlEvent::Toggle) {
            Ok(()) => {
                trace!("Toggle request queued");
                true
            },
            Err(TrySendError::Full(_)) => {
                debug!("Toggle request coalesced with pending event");
                false
            },
            Err(TrySendError::Disconnected(_)) => {
                debug!("Control loop gone, toggle request dropped");
                false
            },
        }
    }

    /// 请求终止
    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
        // 队列已满时控制循环取出事件后会检查标志
        let _ = self.tx.try_send(ControlEvent::Terminate);
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }
}

/// 接收端（控制循环独占）
#[derive(Debug)]
pub struct ControlEvents {
    rx: Receiver<ControlEvent>,
    terminate: Arc<AtomicBool>,
}

impl ControlEvents {
    /// 阻塞等待下一个事件
    ///
    /// 终止标志优先于队列中的切换请求；所有投递端都已 drop 时视为终止。
    pub fn next_event(&self) -> ControlEvent {
        if self.is_terminating() {
            return ControlEvent::Terminate;
        }

        match self.rx.recv() {
            Ok(_) if self.is_terminating() => ControlEvent::Terminate,
            Ok(event) => event,
            Err(_) => ControlEvent::Terminate,
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }
}
