use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "loop-audio-player",
    version,
    about = "无缝循环播放环境音（两个实例交替交叉淡入淡出）"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 覆盖数据目录（默认走系统 data_local_dir）
    #[arg(long, env = "LOOP_PLAYER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// 覆盖日志目录（默认 `{data_dir}/logs`）
    #[arg(long, env = "LOOP_PLAYER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// 覆盖日志过滤（等价于设置 RUST_LOG）
    #[arg(long, env = "RUST_LOG")]
    pub log_filter: Option<String>,

    /// 解码/输出相关 crate（symphonia、rodio、cpal）的日志级别，默认 warn
    #[arg(long, env = "LOOP_PLAYER_AUDIO_LOG")]
    pub audio_log_level: Option<String>,

    /// 不打开音频设备，只按时钟模拟播放
    #[arg(long, env = "LOOP_PLAYER_NO_AUDIO")]
    pub no_audio: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 循环播放一个音频文件，Ctrl-C 停止
    Play {
        file: PathBuf,

        /// 显示名（默认取文件名），同时是音量设置的 key
        #[arg(long)]
        title: Option<String>,

        /// 交叉淡入淡出时长（秒），覆盖设置文件
        #[arg(long)]
        fade_secs: Option<f64>,

        /// 本次播放音量 0.0..=1.0，覆盖设置文件
        #[arg(long)]
        volume: Option<f32>,

        /// 播放指定秒数后自动停止
        #[arg(long)]
        stop_after_secs: Option<u64>,
    },

    /// 检查文件能否交叉淡入淡出循环
    Probe {
        file: PathBuf,

        #[arg(long)]
        fade_secs: Option<f64>,
    },

    /// 保存某个音效的默认音量
    SetVolume { title: String, volume: f32 },
}
