use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio_worker::{CrossfadeConfig, DEFAULT_FADE};
use crate::domain::{Sound, VolumeProvider};
use crate::error::SettingsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    // 循环播放设置
    #[serde(default = "default_fade_secs")]
    pub fade_secs: f64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // 音量设置（按 Sound title）
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    #[serde(default)]
    pub volumes: BTreeMap<String, f32>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            fade_secs: default_fade_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            default_volume: default_volume(),
            volumes: BTreeMap::new(),
        }
    }
}

// 默认值函数（用于 serde default）
fn default_fade_secs() -> f64 { 5.0 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_volume() -> f32 { 1.0 }

impl AppSettings {
    /// 非法的 fade（负数、NaN、0）回落到默认值
    pub fn crossfade_config(&self) -> CrossfadeConfig {
        let fade = Duration::try_from_secs_f64(self.fade_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_FADE);
        CrossfadeConfig {
            fade,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn set_volume(&mut self, title: &str, volume: f32) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SettingsError::InvalidValue(format!("volume={volume}")));
        }
        self.volumes.insert(title.to_owned(), volume);
        Ok(())
    }
}

impl VolumeProvider for AppSettings {
    fn volume_for(&self, sound: &Sound) -> f32 {
        self.volumes
            .get(&sound.title)
            .copied()
            .unwrap_or(self.default_volume)
            .clamp(0.0, 1.0)
    }
}

pub fn load_settings(data_dir: &Path) -> AppSettings {
    let p = settings_path(data_dir);
    let Ok(bytes) = fs::read(&p) else {
        return AppSettings::default();
    };
    match serde_json::from_slice(&bytes) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %p.display(), err = %e, "设置文件损坏，使用默认设置");
            AppSettings::default()
        }
    }
}

pub fn save_settings(data_dir: &Path, s: &AppSettings) -> Result<(), SettingsError> {
    let io_err = |source| SettingsError::Save { source };
    fs::create_dir_all(data_dir).map_err(io_err)?;
    let p = settings_path(data_dir);
    let tmp = p.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(s).map_err(|source| SettingsError::Serialize { source })?;
    fs::write(&tmp, bytes).map_err(io_err)?;
    if let Err(e) = fs::rename(&tmp, &p) {
        let _ = fs::remove_file(&p);
        fs::rename(&tmp, &p).map_err(|_| io_err(e))?;
    }
    Ok(())
}

fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}
