mod engine;
mod factory;
mod fade;
mod messages;
mod null_engine;
mod player;
mod poller;
mod track;
mod worker;

pub use engine::{CrossfadeConfig, CrossfadeLooper, DEFAULT_FADE, DEFAULT_POLL_INTERVAL, Slot};
pub use factory::{AudioOutput, PlayerFactory, RodioFactory};
pub use messages::{PlaybackSnapshot, SoundCommand, SoundEvent};
pub use null_engine::{ClockLoop, ClockTrack, NullFactory};
pub use player::{LoopingSink, SinkTrack, probe_duration};
pub use poller::{PeriodicPoller, PollerState};
pub use track::{SoundPlayable, TrackPlayer, ensure_crossfadable};
pub use worker::SoundPlayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBackend {
    /// 系统默认输出设备
    Real,
    /// 不打开输出设备，只按时钟模拟播放
    Null,
}
