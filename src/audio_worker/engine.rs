use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::poller::PeriodicPoller;
use super::track::{SoundPlayable, TrackPlayer, ensure_crossfadable};
use crate::error::LoopError;

pub const DEFAULT_FADE: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossfadeConfig {
    pub fade: Duration,
    pub poll_interval: Duration,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            fade: DEFAULT_FADE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// 两个交替的播放实例
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Prev,
    Next,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::Prev => Slot::Next,
            Slot::Next => Slot::Prev,
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::Prev => 0,
            Slot::Next => 1,
        }
    }
}

struct LoopState<P> {
    slots: [P; 2],
    active: Slot,
    armed: bool,
    fade: Duration,
    volume: f32,
    poller: PeriodicPoller,
}

impl<P: TrackPlayer> LoopState<P> {
    fn slot(&self, slot: Slot) -> &P {
        &self.slots[slot.index()]
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut P {
        &mut self.slots[slot.index()]
    }

    fn start_slot(&mut self, slot: Slot) {
        let fade = self.fade;
        let volume = self.volume;
        let player = self.slot_mut(slot);
        player.prepare();
        player.set_volume(0.0);
        player.play();
        player.fade_volume(volume, fade);
    }

    /// 监视 `slot` 的剩余时间；之前的监视随之失效
    fn arm(&mut self, slot: Slot) {
        self.active = slot;
        self.armed = true;
        self.poller.resume();
    }

    fn disarm(&mut self) {
        self.armed = false;
        self.poller.suspend();
    }

    fn check_handoff(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        let watched = self.active;
        let (duration, position) = {
            let player = self.slot(watched);
            (player.duration(), player.position())
        };
        // 已经越过结尾（漏掉了 tick），不重复触发
        if position >= duration {
            return false;
        }
        if duration - position >= self.fade {
            return false;
        }

        self.disarm();
        let fade = self.fade;
        self.slot_mut(watched).fade_volume(0.0, fade);

        let next = watched.other();
        tracing::debug!(
            from = ?watched,
            to = ?next,
            position_ms = position.as_millis() as u64,
            duration_ms = duration.as_millis() as u64,
            "crossfade handoff"
        );
        self.start_slot(next);
        self.arm(next);
        true
    }
}

fn on_tick<P: TrackPlayer>(shared: &Weak<Mutex<LoopState<P>>>) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    shared.lock().check_handoff();
}

/// 用两个播放实例交替交叉淡入淡出，实现无缝循环
pub struct CrossfadeLooper<P: TrackPlayer> {
    shared: Arc<Mutex<LoopState<P>>>,
    duration: Duration,
}

impl<P: TrackPlayer> CrossfadeLooper<P> {
    pub fn new(prev: P, next: P, config: CrossfadeConfig) -> Result<Self, LoopError> {
        let duration = prev.duration();
        ensure_crossfadable(duration, config.fade)?;

        let shared = Arc::new(Mutex::new(LoopState {
            slots: [prev, next],
            active: Slot::Prev,
            armed: false,
            fade: config.fade,
            volume: 1.0,
            poller: PeriodicPoller::new(config.poll_interval),
        }));
        let weak = Arc::downgrade(&shared);
        shared.lock().poller.set_handler(move || on_tick(&weak));

        Ok(Self { shared, duration })
    }

    pub fn play_now(&self) {
        let mut state = self.shared.lock();
        state.disarm();
        state.start_slot(Slot::Prev);
        state.arm(Slot::Prev);
        tracing::debug!(
            duration_ms = self.duration.as_millis() as u64,
            fade_ms = state.fade.as_millis() as u64,
            "crossfade loop started"
        );
    }

    /// 停止监视并停止两个实例，不论当前哪个在播放
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        state.disarm();
        state.slots[0].stop();
        state.slots[1].stop();
    }

    /// 一次监视 tick；返回是否发生了切换
    pub fn check_handoff(&self) -> bool {
        self.shared.lock().check_handoff()
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        let mut state = self.shared.lock();
        state.volume = volume;

        let active = state.active;
        let fade = state.fade;
        if state.slot(active).is_playing() {
            state.slot_mut(active).set_volume(volume);
        }
        let outgoing = state.slot_mut(active.other());
        if outgoing.is_playing() {
            // 淡出中的实例从新音量继续淡出到结尾
            let remaining = outgoing
                .duration()
                .saturating_sub(outgoing.position())
                .min(fade);
            outgoing.set_volume(volume);
            outgoing.fade_volume(0.0, remaining);
        }
    }

    pub fn volume(&self) -> f32 {
        self.shared.lock().volume
    }

    pub fn is_playing(&self) -> bool {
        let state = self.shared.lock();
        state.slots.iter().any(|p| p.is_playing())
    }

    pub fn active_slot(&self) -> Slot {
        self.shared.lock().active
    }

    pub fn is_armed(&self) -> bool {
        self.shared.lock().armed
    }

    pub fn fade_duration(&self) -> Duration {
        self.shared.lock().fade
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl<P: TrackPlayer> SoundPlayable for CrossfadeLooper<P> {
    fn volume(&self) -> f32 {
        CrossfadeLooper::volume(self)
    }

    fn set_volume(&mut self, volume: f32) {
        CrossfadeLooper::set_volume(self, volume);
    }

    fn is_playing(&self) -> bool {
        CrossfadeLooper::is_playing(self)
    }

    fn play_now(&mut self) {
        CrossfadeLooper::play_now(self);
    }

    fn stop(&mut self) {
        CrossfadeLooper::stop(self);
    }
}
