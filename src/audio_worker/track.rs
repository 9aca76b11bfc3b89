//! 播放实例的抽象
//!
//! `TrackPlayer` 是交叉淡入淡出引擎驱动的单个播放实例（一个 slot）；
//! `SoundPlayable` 是播放门面持有的输出，可能是交替循环的引擎，
//! 也可能是降级的单实例无限循环播放器。

use std::time::Duration;

use crate::error::LoopError;

/// 单个音源播放实例
pub trait TrackPlayer: Send + 'static {
    /// 预备播放，可重复调用
    fn prepare(&mut self);

    /// 立即设置音量，并取消进行中的渐变
    fn set_volume(&mut self, volume: f32);

    /// 在 `over` 时间内把音量线性渐变到 `target`，立即返回
    fn fade_volume(&mut self, target: f32, over: Duration);

    fn play(&mut self);

    fn stop(&mut self);

    fn volume(&self) -> f32;

    fn duration(&self) -> Duration;

    fn position(&self) -> Duration;

    fn is_playing(&self) -> bool;
}

/// 播放门面可持有的输出
pub trait SoundPlayable: Send {
    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32);

    fn is_playing(&self) -> bool;

    fn play_now(&mut self);

    fn stop(&mut self);
}

/// 交替循环要求音源比淡入淡出时间长
pub fn ensure_crossfadable(duration: Duration, fade: Duration) -> Result<(), LoopError> {
    if duration <= fade {
        return Err(LoopError::DurationTooShort { duration, fade });
    }
    Ok(())
}
