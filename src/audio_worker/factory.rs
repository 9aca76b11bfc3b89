use rodio::{OutputStream, OutputStreamBuilder};
use rodio::mixer::Mixer;
use std::path::Path;
use std::sync::Arc;

use super::AudioBackend;
use super::engine::{CrossfadeConfig, CrossfadeLooper};
use super::null_engine::NullFactory;
use super::player::{LoopingSink, SinkTrack};
use super::track::SoundPlayable;
use crate::domain::Sound;
use crate::error::{AudioError, LoopError};

/// 为某个 Sound 构建播放输出
///
/// 在阻塞线程里调用（会解码文件）。
pub trait PlayerFactory: Send + Sync + 'static {
    /// 交替循环的交叉淡入淡出播放器
    fn crossfade(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError>;

    /// 无淡入淡出的无限循环播放器，交叉淡入淡出不可用时的替代
    fn fallback(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError>;
}

pub(crate) fn resolve_source(sound: &Sound) -> Result<&Path, LoopError> {
    match sound.source() {
        Some(path) if path.exists() => Ok(path),
        _ => Err(LoopError::SourceMissing {
            title: sound.title.clone(),
        }),
    }
}

pub struct RodioFactory {
    mixer: Mixer,
    config: CrossfadeConfig,
}

impl RodioFactory {
    pub fn new(mixer: Mixer, config: CrossfadeConfig) -> Self {
        Self { mixer, config }
    }
}

impl PlayerFactory for RodioFactory {
    fn crossfade(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        let path = resolve_source(sound)?;
        let prev = SinkTrack::open(&self.mixer, path, &sound.title, self.config.fade)?;
        let next = SinkTrack::open(&self.mixer, path, &sound.title, self.config.fade)?;
        Ok(Box::new(CrossfadeLooper::new(prev, next, self.config)?))
    }

    fn fallback(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        let player = match resolve_source(sound) {
            Ok(path) => LoopingSink::open(&self.mixer, path, &sound.title)
                .map_err(|e| LoopError::construction(&sound.title, e))?,
            Err(_) => LoopingSink::silent(&self.mixer, &sound.title),
        };
        Ok(Box::new(player))
    }
}

/// 音频输出；持有输出流直到 drop
pub struct AudioOutput {
    factory: Arc<dyn PlayerFactory>,
    _stream: Option<OutputStream>,
}

impl AudioOutput {
    /// 打开输出设备。没有可用设备时返回错误，调用方应当终止启动
    pub fn open(backend: AudioBackend, config: CrossfadeConfig) -> Result<Self, AudioError> {
        match backend {
            AudioBackend::Real => {
                let stream = OutputStreamBuilder::open_default_stream()
                    .map_err(|e| AudioError::OutputStream(e.to_string()))?;
                let mixer = stream.mixer().clone();
                tracing::info!(
                    fade_ms = config.fade.as_millis() as u64,
                    poll_ms = config.poll_interval.as_millis() as u64,
                    "音频输出已打开"
                );
                Ok(Self {
                    factory: Arc::new(RodioFactory::new(mixer, config)),
                    _stream: Some(stream),
                })
            }
            AudioBackend::Null => {
                tracing::info!("使用无声后端");
                Ok(Self {
                    factory: Arc::new(NullFactory::new(config)),
                    _stream: None,
                })
            }
        }
    }

    pub fn factory(&self) -> Arc<dyn PlayerFactory> {
        Arc::clone(&self.factory)
    }
}
