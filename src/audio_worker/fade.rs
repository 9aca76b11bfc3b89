use rodio::Sink;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

const RAMP_STEP: Duration = Duration::from_millis(20);

/// 线性音量曲线，按时间求值
#[derive(Debug, Clone, Copy)]
pub(crate) struct RampCurve {
    from: f32,
    to: f32,
    start: Instant,
    duration: Duration,
}

impl RampCurve {
    pub(crate) fn new(from: f32, to: f32, duration: Duration) -> Self {
        Self {
            from,
            to,
            start: Instant::now(),
            duration,
        }
    }

    pub(crate) fn target(&self) -> f32 {
        self.to
    }

    /// 返回 (音量, 是否已结束)
    pub(crate) fn sample(&self, now: Instant) -> (f32, bool) {
        if self.duration.is_zero() {
            return (self.to, true);
        }
        let elapsed = now.saturating_duration_since(self.start);
        let t = (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        (self.from + (self.to - self.from) * t, t >= 1.0)
    }
}

/// 在后台任务里把 sink 音量按曲线推进；drop 即取消
pub(super) struct VolumeRamp {
    task: Option<JoinHandle<()>>,
}

impl VolumeRamp {
    pub(super) fn start(sink: Arc<Sink>, target: f32, duration: Duration) -> Self {
        let curve = RampCurve::new(sink.volume(), target, duration);
        if duration.is_zero() {
            sink.set_volume(target);
            return Self { task: None };
        }
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("没有 tokio runtime，音量渐变直接跳到目标值");
            sink.set_volume(target);
            return Self { task: None };
        };
        let task = rt.spawn(async move {
            let mut tick = time::interval(RAMP_STEP);
            loop {
                tick.tick().await;
                let (volume, done) = curve.sample(Instant::now());
                sink.set_volume(volume);
                if done {
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    pub(super) fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for VolumeRamp {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
