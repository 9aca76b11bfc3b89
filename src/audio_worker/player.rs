use parking_lot::Mutex;
use rodio::mixer::Mixer;
use rodio::source::{Buffered, Zero};
use rodio::{Decoder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::fade::VolumeRamp;
use super::track::{SoundPlayable, TrackPlayer, ensure_crossfadable};
use crate::error::{AudioError, LoopError};

type FileDecoder = Decoder<BufReader<File>>;

/// `TryFrom<File>` 会带上文件长度，没有 Xing/Info 头的 MP3 才能估算时长
fn open_decoder(path: &Path) -> Result<FileDecoder, AudioError> {
    let file = File::open(path).map_err(|source| AudioError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    Decoder::try_from(file).map_err(|source| AudioError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn decoder_duration(decoder: &FileDecoder, path: &Path) -> Result<Duration, AudioError> {
    decoder
        .total_duration()
        .ok_or_else(|| AudioError::UnknownDuration(path.to_path_buf()))
}

/// 解码文件头读取总时长，不需要输出设备
pub fn probe_duration(path: &Path) -> Result<Duration, AudioError> {
    decoder_duration(&open_decoder(path)?, path)
}

/// 交叉淡入淡出用的一个播放实例
///
/// 每一轮播放都新建一个 `Sink`，所以位置总是从 0 开始。
/// 下一轮用的解码器在阻塞线程里提前打开，切换时不做文件 IO。
pub struct SinkTrack {
    mixer: Mixer,
    path: PathBuf,
    title: String,
    duration: Duration,
    staged: Arc<Mutex<Option<FileDecoder>>>,
    sink: Option<Arc<Sink>>,
    ramp: Option<VolumeRamp>,
    volume: f32,
}

impl SinkTrack {
    pub fn open(mixer: &Mixer, path: &Path, title: &str, fade: Duration) -> Result<Self, LoopError> {
        let decoder = open_decoder(path).map_err(|e| LoopError::construction(title, e))?;
        let duration =
            decoder_duration(&decoder, path).map_err(|e| LoopError::construction(title, e))?;
        ensure_crossfadable(duration, fade)?;
        Ok(Self {
            mixer: mixer.clone(),
            path: path.to_path_buf(),
            title: title.to_owned(),
            duration,
            staged: Arc::new(Mutex::new(Some(decoder))),
            sink: None,
            ramp: None,
            volume: 1.0,
        })
    }

    fn has_pending_audio(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| !s.empty())
    }

    fn take_decoder(&self) -> Result<FileDecoder, AudioError> {
        if let Some(decoder) = self.staged.lock().take() {
            return Ok(decoder);
        }
        tracing::debug!(title = %self.title, "解码器尚未预备好，同步打开");
        open_decoder(&self.path)
    }

    /// 为下一轮播放预先打开解码器
    fn stage_next(&self) {
        if self.staged.lock().is_some() {
            return;
        }
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let staged = Arc::clone(&self.staged);
        let path = self.path.clone();
        let title = self.title.clone();
        rt.spawn_blocking(move || match open_decoder(&path) {
            Ok(decoder) => {
                let mut slot = staged.lock();
                if slot.is_none() {
                    *slot = Some(decoder);
                }
            }
            Err(e) => tracing::warn!(title = %title, err = %e, "预先打开解码器失败"),
        });
    }
}

impl TrackPlayer for SinkTrack {
    fn prepare(&mut self) {
        if self.has_pending_audio() {
            return;
        }
        let decoder = match self.take_decoder() {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(title = %self.title, err = %e, "预备播放失败");
                return;
            }
        };
        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(decoder);
        self.ramp = None;
        self.sink = Some(Arc::new(sink));
    }

    fn set_volume(&mut self, volume: f32) {
        self.ramp = None;
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn fade_volume(&mut self, target: f32, over: Duration) {
        self.volume = target;
        self.ramp = self
            .sink
            .as_ref()
            .map(|sink| VolumeRamp::start(Arc::clone(sink), target, over));
    }

    fn play(&mut self) {
        self.prepare();
        if let Some(sink) = &self.sink {
            sink.play();
        }
        self.stage_next();
    }

    fn stop(&mut self) {
        self.ramp = None;
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn volume(&self) -> f32 {
        match &self.sink {
            Some(sink) if self.ramp.as_ref().is_some_and(|r| r.is_running()) => sink.volume(),
            _ => self.volume,
        }
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map(|s| s.get_pos())
            .unwrap_or(Duration::ZERO)
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|s| !s.empty() && !s.is_paused())
    }
}

enum LoopSource {
    File(Buffered<FileDecoder>),
    Silence,
}

/// 降级播放器：单个实例无限循环，没有交叉淡入淡出
///
/// 没有音源时循环静音，保持“正在播放”的状态。
pub struct LoopingSink {
    mixer: Mixer,
    title: String,
    source: LoopSource,
    sink: Option<Sink>,
    volume: f32,
}

impl LoopingSink {
    pub fn open(mixer: &Mixer, path: &Path, title: &str) -> Result<Self, AudioError> {
        let decoder = open_decoder(path)?;
        Ok(Self {
            mixer: mixer.clone(),
            title: title.to_owned(),
            source: LoopSource::File(decoder.buffered()),
            sink: None,
            volume: 0.0,
        })
    }

    pub fn silent(mixer: &Mixer, title: &str) -> Self {
        Self {
            mixer: mixer.clone(),
            title: title.to_owned(),
            source: LoopSource::Silence,
            sink: None,
            volume: 0.0,
        }
    }
}

impl SoundPlayable for LoopingSink {
    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|s| !s.empty() && !s.is_paused())
    }

    fn play_now(&mut self) {
        self.stop();
        let sink = Sink::connect_new(&self.mixer);
        sink.set_volume(self.volume);
        match &self.source {
            LoopSource::File(source) => sink.append(source.clone().repeat_infinite()),
            LoopSource::Silence => sink.append(Zero::new(2, 44_100)),
        }
        sink.play();
        tracing::debug!(title = %self.title, "fallback loop started");
        self.sink = Some(sink);
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
