//! 无输出设备的后端
//!
//! 播放位置由 tokio 时钟推算，音量渐变按时间惰性求值。
//! 用于 `--no-audio` 以及需要确定性时序的测试（配合暂停的 tokio 时钟）。

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::engine::{CrossfadeConfig, CrossfadeLooper};
use super::factory::{PlayerFactory, resolve_source};
use super::fade::RampCurve;
use super::player::probe_duration;
use super::track::{SoundPlayable, TrackPlayer, ensure_crossfadable};
use crate::domain::Sound;
use crate::error::LoopError;

#[derive(Debug)]
struct ClockState {
    started_at: Option<Instant>,
    volume: f32,
    ramp: Option<RampCurve>,
    prepared: bool,
    plays: u32,
}

/// 只有时钟的播放实例；clone 共享同一状态，便于观察
#[derive(Debug, Clone)]
pub struct ClockTrack {
    duration: Duration,
    state: Arc<Mutex<ClockState>>,
}

impl ClockTrack {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: Arc::new(Mutex::new(ClockState {
                started_at: None,
                volume: 1.0,
                ramp: None,
                prepared: false,
                plays: 0,
            })),
        }
    }

    /// 已开始的播放轮数
    pub fn play_count(&self) -> u32 {
        self.state.lock().plays
    }

    pub fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }

    /// 当前渐变的目标音量
    pub fn ramp_target(&self) -> Option<f32> {
        self.state.lock().ramp.map(|r| r.target())
    }

    fn elapsed(state: &ClockState) -> Option<Duration> {
        state.started_at.map(|at| Instant::now().saturating_duration_since(at))
    }
}

impl TrackPlayer for ClockTrack {
    fn prepare(&mut self) {
        self.state.lock().prepared = true;
    }

    fn set_volume(&mut self, volume: f32) {
        let mut state = self.state.lock();
        state.ramp = None;
        state.volume = volume;
    }

    fn fade_volume(&mut self, target: f32, over: Duration) {
        let from = self.volume();
        let mut state = self.state.lock();
        state.ramp = Some(RampCurve::new(from, target, over));
        state.volume = target;
    }

    fn play(&mut self) {
        let playing = self.is_playing();
        let mut state = self.state.lock();
        if !playing {
            state.started_at = Some(Instant::now());
            state.plays += 1;
        }
        state.prepared = false;
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.started_at = None;
        state.ramp = None;
    }

    fn volume(&self) -> f32 {
        let state = self.state.lock();
        match state.ramp {
            Some(ramp) => ramp.sample(Instant::now()).0,
            None => state.volume,
        }
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn position(&self) -> Duration {
        let state = self.state.lock();
        Self::elapsed(&state)
            .map(|e| e.min(self.duration))
            .unwrap_or(Duration::ZERO)
    }

    fn is_playing(&self) -> bool {
        let state = self.state.lock();
        Self::elapsed(&state).is_some_and(|e| e < self.duration)
    }
}

/// 无输出的降级循环播放器
#[derive(Debug)]
pub struct ClockLoop {
    title: String,
    playing: bool,
    volume: f32,
}

impl ClockLoop {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            playing: false,
            volume: 0.0,
        }
    }
}

impl SoundPlayable for ClockLoop {
    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn play_now(&mut self) {
        tracing::debug!(title = %self.title, "null fallback loop started");
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }
}

/// 构建时钟播放器；时长来自文件头或固定值
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFactory {
    config: CrossfadeConfig,
    duration_override: Option<Duration>,
}

impl NullFactory {
    pub fn new(config: CrossfadeConfig) -> Self {
        Self {
            config,
            duration_override: None,
        }
    }

    /// 所有音源都视为固定时长，不读取文件
    pub fn with_fixed_duration(config: CrossfadeConfig, duration: Duration) -> Self {
        Self {
            config,
            duration_override: Some(duration),
        }
    }
}

impl PlayerFactory for NullFactory {
    fn crossfade(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        let duration = match self.duration_override {
            Some(d) => {
                if sound.source().is_none() {
                    return Err(LoopError::SourceMissing {
                        title: sound.title.clone(),
                    });
                }
                d
            }
            None => {
                let path = resolve_source(sound)?;
                probe_duration(path).map_err(|e| LoopError::construction(&sound.title, e))?
            }
        };
        ensure_crossfadable(duration, self.config.fade)?;
        let looper = CrossfadeLooper::new(
            ClockTrack::new(duration),
            ClockTrack::new(duration),
            self.config,
        )?;
        Ok(Box::new(looper))
    }

    fn fallback(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        Ok(Box::new(ClockLoop::new(&sound.title)))
    }
}
