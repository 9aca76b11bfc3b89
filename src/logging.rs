use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// 解码与输出相关的 crate，info 级别下日志过多
const AUDIO_TARGETS: &[&str] = &[
    "symphonia",
    "symphonia_core",
    "symphonia_bundle_mp3",
    "symphonia_format_riff",
    "rodio",
    "cpal",
];

const DEFAULT_FILTER: &str = "info";
const DEFAULT_AUDIO_LEVEL: &str = "warn";

pub struct LogGuard(#[allow(dead_code)] Option<WorkerGuard>);

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
    pub filter: Option<String>,
    /// 音频后端 crate 的日志级别（默认 warn）
    pub audio_level: Option<String>,
}

/// 用户过滤规则 + 音频后端 crate 的级别；用户显式写过的 target 不覆盖
fn filter_directives(user: Option<&str>, audio_level: Option<&str>) -> String {
    let base = user
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    let audio_level = audio_level
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_AUDIO_LEVEL);

    let mentioned = |target: &str| {
        base.split(',')
            .filter_map(|d| d.split(['=', '[']).next())
            .any(|t| t.trim() == target)
    };

    let mut directives = vec![base.to_owned()];
    directives.extend(
        AUDIO_TARGETS
            .iter()
            .filter(|t| !mentioned(t))
            .map(|t| format!("{t}={audio_level}")),
    );
    directives.join(",")
}

pub fn init(data_dir: &Path, cfg: LogConfig) -> LogGuard {
    let log_dir = cfg.dir.unwrap_or_else(|| data_dir.join("logs"));

    let log_dir = match fs::create_dir_all(&log_dir) {
        Ok(()) => log_dir,
        Err(_) => std::env::temp_dir().join("loop-audio-player-logs"),
    };
    let _ = fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, "loop-audio-player.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let directives = filter_directives(cfg.filter.as_deref(), cfg.audio_level.as_deref());
    let filter = EnvFilter::new(&directives);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer);

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    let _ = subscriber.try_init();
    tracing::info!(log_dir = %log_dir.display(), filter = %directives, "tracing 已初始化");

    LogGuard(Some(guard))
}
