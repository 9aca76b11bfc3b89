//! 周期轮询器
//!
//! 以固定间隔调用回调，可挂起/恢复而不销毁底层计时任务。
//! 计时任务在第一次 `resume` 时才创建；释放时总是先回到 Resumed 再取消。

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Suspended,
    Resumed,
}

pub struct PeriodicPoller {
    interval: Duration,
    handler: Arc<Mutex<Option<Handler>>>,
    state: PollerState,
    tx_state: watch::Sender<PollerState>,
    task: Option<JoinHandle<()>>,
}

impl PeriodicPoller {
    pub fn new(interval: Duration) -> Self {
        let (tx_state, _rx) = watch::channel(PollerState::Suspended);
        Self {
            interval: interval.max(Duration::from_millis(1)),
            handler: Arc::new(Mutex::new(None)),
            state: PollerState::Suspended,
            tx_state,
            task: None,
        }
    }

    /// 创建并立即开始轮询
    pub fn start(interval: Duration, on_tick: impl Fn() + Send + Sync + 'static) -> Self {
        let mut poller = Self::new(interval);
        poller.set_handler(on_tick);
        poller.resume();
        poller
    }

    pub fn set_handler(&mut self, on_tick: impl Fn() + Send + Sync + 'static) {
        *self.handler.lock() = Some(Arc::new(on_tick));
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// 没有 tokio runtime 时保持挂起，之后可以再次 resume
    pub fn resume(&mut self) {
        if self.state == PollerState::Resumed {
            return;
        }
        if self.task.is_none() {
            let Ok(rt) = tokio::runtime::Handle::try_current() else {
                tracing::error!("当前线程没有 tokio runtime，轮询器无法启动");
                return;
            };
            tracing::trace!(interval_ms = self.interval.as_millis() as u64, "spawn poller task");
            self.task = Some(rt.spawn(run_ticker(
                self.interval,
                Arc::clone(&self.handler),
                self.tx_state.subscribe(),
            )));
        }
        self.state = PollerState::Resumed;
        self.tx_state.send_replace(PollerState::Resumed);
    }

    pub fn suspend(&mut self) {
        if self.state == PollerState::Suspended {
            return;
        }
        self.state = PollerState::Suspended;
        self.tx_state.send_replace(PollerState::Suspended);
    }
}

impl Drop for PeriodicPoller {
    fn drop(&mut self) {
        self.handler.lock().take();
        // 计时任务只允许从 Resumed 状态取消
        self.state = PollerState::Resumed;
        self.tx_state.send_replace(PollerState::Resumed);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_ticker(
    interval: Duration,
    handler: Arc<Mutex<Option<Handler>>>,
    mut rx_state: watch::Receiver<PollerState>,
) {
    loop {
        while *rx_state.borrow_and_update() != PollerState::Resumed {
            if rx_state.changed().await.is_err() {
                return;
            }
        }

        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *rx_state.borrow() != PollerState::Resumed {
                        break;
                    }
                    // 回调可能释放轮询器本身，不能持锁调用
                    let current = handler.lock().clone();
                    if let Some(on_tick) = current {
                        on_tick();
                    }
                }
                changed = rx_state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *rx_state.borrow_and_update() == PollerState::Suspended {
                        break;
                    }
                }
            }
        }
    }
}
