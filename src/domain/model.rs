use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// 一个可循环播放的环境音
///
/// `title` 是相等性判断用的稳定标识；`playing` 由播放门面切换，
/// 供 UI 等观察者读取。
pub struct Sound {
    pub id: String,
    pub title: String,
    pub source: Option<PathBuf>,
    playing: AtomicBool,
}

impl Sound {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: Option<PathBuf>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source,
            playing: AtomicBool::new(false),
        }
    }

    /// 以文件名作为 id 与 title
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(title.clone(), title, Some(path))
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub fn same_sound(&self, other: &Sound) -> bool {
        self.title == other.title
    }
}

impl fmt::Debug for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sound")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("source", &self.source)
            .field("playing", &self.is_playing())
            .finish()
    }
}

/// 为某个 Sound 提供目标音量（0.0..=1.0）
pub trait VolumeProvider: Send + Sync {
    fn volume_for(&self, sound: &Sound) -> f32;
}

/// 所有 Sound 使用同一音量
#[derive(Debug, Clone, Copy)]
pub struct FixedVolume(pub f32);

impl VolumeProvider for FixedVolume {
    fn volume_for(&self, _sound: &Sound) -> f32 {
        self.0.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_uses_file_stem() {
        let sound = Sound::from_path("/sounds/white-noise.mp3");
        assert_eq!(sound.title, "white-noise");
        assert_eq!(sound.id, "white-noise");
        assert_eq!(sound.source(), Some(Path::new("/sounds/white-noise.mp3")));
        assert!(!sound.is_playing());
    }

    #[test]
    fn test_same_sound_compares_titles() {
        let a = Sound::new("1", "Rain", None);
        let b = Sound::new("2", "Rain", Some(PathBuf::from("rain.ogg")));
        let c = Sound::new("1", "Forest", None);
        assert!(a.same_sound(&b));
        assert!(!a.same_sound(&c));
    }

    #[test]
    fn test_fixed_volume_clamps() {
        let sound = Sound::new("1", "Rain", None);
        assert_eq!(FixedVolume(1.7).volume_for(&sound), 1.0);
        assert_eq!(FixedVolume(-0.2).volume_for(&sound), 0.0);
        assert_eq!(FixedVolume(0.4).volume_for(&sound), 0.4);
    }
}
