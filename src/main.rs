use clap::Parser;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use loop_audio_player::audio_worker::{
    AudioBackend, AudioOutput, SoundEvent, SoundPlayer, ensure_crossfadable, probe_duration,
};
use loop_audio_player::cli::{Cli, Command};
use loop_audio_player::domain::{FixedVolume, Sound, VolumeProvider};
use loop_audio_player::error::{AppError, AudioError};
use loop_audio_player::logging;
use loop_audio_player::settings::{AppSettings, load_settings, save_settings};

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "loop-audio-player", "loop-audio-player")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("loop-audio-player"))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    let _log_guard = logging::init(
        &data_dir,
        logging::LogConfig {
            dir: cli.log_dir.clone(),
            filter: cli.log_filter.clone(),
            audio_level: cli.audio_log_level.clone(),
        },
    );
    tracing::info!(data_dir = %data_dir.display(), "loop-audio-player 启动");

    let mut settings = load_settings(&data_dir);
    let backend = if cli.no_audio {
        AudioBackend::Null
    } else {
        AudioBackend::Real
    };

    match cli.command {
        Command::Play {
            file,
            title,
            fade_secs,
            volume,
            stop_after_secs,
        } => {
            if let Some(v) = fade_secs {
                settings.fade_secs = v;
            }
            let sound = match title {
                Some(title) => Sound::new(title.clone(), title, Some(file)),
                None => Sound::from_path(file),
            };
            let volumes: Arc<dyn VolumeProvider> = match volume {
                Some(v) => Arc::new(FixedVolume(v)),
                None => Arc::new(settings.clone()),
            };
            run_play(backend, &settings, Arc::new(sound), volumes, stop_after_secs).await
        }
        Command::Probe { file, fade_secs } => {
            if let Some(v) = fade_secs {
                settings.fade_secs = v;
            }
            probe(&file, &settings)
        }
        Command::SetVolume { title, volume } => {
            settings.set_volume(&title, volume)?;
            save_settings(&data_dir, &settings)?;
            println!("{title}: volume={volume}");
            Ok(())
        }
    }
}

async fn run_play(
    backend: AudioBackend,
    settings: &AppSettings,
    sound: Arc<Sound>,
    volumes: Arc<dyn VolumeProvider>,
    stop_after_secs: Option<u64>,
) -> Result<(), AppError> {
    // 没有可用的输出设备是唯一允许终止启动的错误
    let output = AudioOutput::open(backend, settings.crossfade_config())?;
    let player = SoundPlayer::spawn(Arc::clone(&sound), output.factory(), volumes);

    let mut rx_evt = player.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx_evt.recv().await {
                Ok(SoundEvent::CurrentSoundChanged(sound)) => println!("sound: {}", sound.title),
                Ok(SoundEvent::PlaybackStateChanged(playing)) => {
                    println!("{}", if playing { "playing" } else { "stopped" })
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    player.play().await;
    wait_for_exit(&player, stop_after_secs).await;

    player.stop().await;
    player.shutdown().await;
    let _ = printer.await;
    drop(output);
    Ok(())
}

async fn wait_for_exit(player: &SoundPlayer, stop_after_secs: Option<u64>) {
    let timeout = async {
        match stop_after_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timeout);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        // SIGUSR1/SIGUSR2 模拟宿主的中断开始/结束
        let (Ok(mut began), Ok(mut ended)) = (
            signal(SignalKind::user_defined1()),
            signal(SignalKind::user_defined2()),
        ) else {
            tracing::warn!("无法注册中断信号");
            wait_ctrl_c_or(&mut timeout).await;
            return;
        };
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = &mut timeout => break,
                _ = began.recv() => player.interruption_began().await,
                _ = ended.recv() => player.interruption_ended(true).await,
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = player;
        wait_ctrl_c_or(&mut timeout).await;
    }
}

async fn wait_ctrl_c_or(timeout: &mut std::pin::Pin<&mut impl std::future::Future<Output = ()>>) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = timeout.as_mut() => {}
    }
}

fn probe(file: &Path, settings: &AppSettings) -> Result<(), AppError> {
    let config = settings.crossfade_config();
    let duration = match probe_duration(file) {
        Ok(d) => d,
        Err(AudioError::UnknownDuration(_)) => {
            println!("{}: 无法获取时长; 将使用普通循环播放", file.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    match ensure_crossfadable(duration, config.fade) {
        Ok(()) => println!(
            "{}: {:.2}s, crossfade {:.2}s ok",
            file.display(),
            duration.as_secs_f64(),
            config.fade.as_secs_f64()
        ),
        Err(e) => println!("{}: {e}; 将使用普通循环播放", file.display()),
    }
    Ok(())
}
