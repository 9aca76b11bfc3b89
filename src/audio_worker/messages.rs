use std::sync::Arc;

use crate::domain::Sound;

#[derive(Debug)]
pub enum SoundCommand {
    /// 重新播放当前 Sound
    Play,
    PlaySound(Arc<Sound>),
    /// 切换当前 Sound；正在播放时立即切到新 Sound
    ChangeSound(Arc<Sound>),
    Stop,
    SetVolume(f32),
    /// 外部中断开始（例如其他程序占用音频）
    InterruptionBegan,
    InterruptionEnded {
        resume_permitted: bool,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum SoundEvent {
    CurrentSoundChanged(Arc<Sound>),
    PlaybackStateChanged(bool),
}

#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub sound: Arc<Sound>,
    pub is_playing: bool,
    pub volume: f32,
}
