use std::sync::Arc;
use tokio::select;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::factory::PlayerFactory;
use super::messages::{PlaybackSnapshot, SoundCommand, SoundEvent};
use super::track::SoundPlayable;
use crate::domain::{Sound, VolumeProvider};
use crate::error::LoopError;

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 64;

/// 阻塞线程里构建完成的播放器，带着发起时的 generation
struct Loaded {
    generation: u64,
    sound: Arc<Sound>,
    result: Result<Box<dyn SoundPlayable>, LoopError>,
}

fn build_player(factory: &dyn PlayerFactory, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
    match factory.crossfade(sound) {
        Ok(player) => Ok(player),
        Err(e) if e.is_recoverable() => {
            tracing::warn!(title = %sound.title, err = %e, "无法交叉淡入淡出，改用普通循环播放");
            factory.fallback(sound)
        }
        Err(e) => Err(e),
    }
}

struct SoundWorker {
    rx_cmd: mpsc::Receiver<SoundCommand>,
    tx_loaded: mpsc::UnboundedSender<Loaded>,
    rx_loaded: mpsc::UnboundedReceiver<Loaded>,
    tx_evt: broadcast::Sender<SoundEvent>,
    tx_snapshot: watch::Sender<PlaybackSnapshot>,
    factory: Arc<dyn PlayerFactory>,
    volumes: Arc<dyn VolumeProvider>,
    sound: Arc<Sound>,
    player: Option<Box<dyn SoundPlayable>>,
    generation: u64,
    resume_after_interruption: bool,
}

impl SoundWorker {
    async fn run(mut self) {
        loop {
            select! {
                biased;
                Some(loaded) = self.rx_loaded.recv() => {
                    self.handle_loaded(loaded);
                }
                maybe_cmd = self.rx_cmd.recv() => {
                    match maybe_cmd {
                        None | Some(SoundCommand::Shutdown) => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
            }
            self.refresh_snapshot();
        }

        self.generation = self.generation.wrapping_add(1);
        if let Some(mut player) = self.player.take() {
            player.stop();
        }
        self.sound.set_playing(false);
        tracing::info!("SoundWorker 已退出");
    }

    fn handle_command(&mut self, cmd: SoundCommand) {
        match cmd {
            SoundCommand::Play => {
                let sound = Arc::clone(&self.sound);
                self.play_sound(sound);
            }
            SoundCommand::PlaySound(sound) => self.play_sound(sound),
            SoundCommand::ChangeSound(sound) => {
                let was_playing = self.is_playing() || self.sound.is_playing();
                self.set_current(sound);
                if was_playing {
                    let sound = Arc::clone(&self.sound);
                    self.play_sound(sound);
                }
            }
            SoundCommand::Stop => {
                // 用户主动停止后，中断结束也不再恢复
                self.resume_after_interruption = false;
                self.stop();
            }
            SoundCommand::SetVolume(v) => {
                if let Some(player) = self.player.as_mut() {
                    player.set_volume(v);
                }
            }
            SoundCommand::InterruptionBegan => {
                // 重复的中断开始不能覆盖第一次记下的播放状态
                let playing = self.sound.is_playing();
                self.resume_after_interruption |= playing;
                tracing::info!(
                    title = %self.sound.title,
                    resume = self.resume_after_interruption,
                    "音频被外部中断"
                );
                if playing {
                    self.stop();
                }
            }
            SoundCommand::InterruptionEnded { resume_permitted } => {
                let resume = resume_permitted && self.resume_after_interruption;
                self.resume_after_interruption = false;
                tracing::info!(resume_permitted, resume, "外部中断结束");
                if resume {
                    let sound = Arc::clone(&self.sound);
                    self.play_sound(sound);
                }
            }
            SoundCommand::Shutdown => {}
        }
    }

    fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_playing())
    }

    fn set_current(&mut self, sound: Arc<Sound>) {
        let old = std::mem::replace(&mut self.sound, sound);
        if old.same_sound(&self.sound) {
            return;
        }
        old.set_playing(false);
        tracing::info!(from = %old.title, to = %self.sound.title, "当前音效已切换");
        let _ = self
            .tx_evt
            .send(SoundEvent::CurrentSoundChanged(Arc::clone(&self.sound)));
    }

    fn play_sound(&mut self, sound: Arc<Sound>) {
        if let Some(mut old) = self.player.take() {
            old.stop();
        }
        self.sound.set_playing(false);
        self.set_current(sound);
        let sound = Arc::clone(&self.sound);
        sound.set_playing(true);

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        tracing::info!(title = %sound.title, generation, "开始播放请求");

        let factory = Arc::clone(&self.factory);
        let tx_loaded = self.tx_loaded.clone();
        tokio::task::spawn_blocking(move || {
            let result = build_player(factory.as_ref(), &sound);
            let _ = tx_loaded.send(Loaded {
                generation,
                sound,
                result,
            });
        });
    }

    fn handle_loaded(&mut self, loaded: Loaded) {
        let Loaded {
            generation,
            sound,
            result,
        } = loaded;

        if generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                title = %sound.title,
                "丢弃过期的播放器"
            );
            if let Ok(mut player) = result {
                player.stop();
            }
            return;
        }

        match result {
            Ok(mut player) => {
                player.set_volume(self.volumes.volume_for(&sound));
                player.play_now();
                self.player = Some(player);
                tracing::info!(title = %sound.title, generation, "开始播放");
            }
            Err(e) => {
                tracing::error!(title = %sound.title, err = %e, "创建播放器失败");
                sound.set_playing(false);
            }
        }
        self.publish_state();
    }

    fn stop(&mut self) {
        // 让仍在构建中的播放器失效
        self.generation = self.generation.wrapping_add(1);
        if let Some(mut player) = self.player.take() {
            player.stop();
        }
        self.sound.set_playing(false);
        tracing::info!(title = %self.sound.title, "停止播放");
        self.publish_state();
    }

    fn publish_state(&self) {
        let _ = self
            .tx_evt
            .send(SoundEvent::PlaybackStateChanged(self.is_playing()));
    }

    fn refresh_snapshot(&self) {
        self.tx_snapshot.send_replace(PlaybackSnapshot {
            sound: Arc::clone(&self.sound),
            is_playing: self.is_playing(),
            volume: self.player.as_ref().map(|p| p.volume()).unwrap_or(0.0),
        });
    }
}

/// 播放门面
///
/// 所有状态变更都在同一个 worker 任务上串行处理；
/// 调用方只负责发送命令，不会被解码或渐变阻塞。
pub struct SoundPlayer {
    tx_cmd: mpsc::Sender<SoundCommand>,
    tx_evt: broadcast::Sender<SoundEvent>,
    rx_snapshot: watch::Receiver<PlaybackSnapshot>,
    task: JoinHandle<()>,
}

impl SoundPlayer {
    pub fn spawn(
        sound: Arc<Sound>,
        factory: Arc<dyn PlayerFactory>,
        volumes: Arc<dyn VolumeProvider>,
    ) -> Self {
        let (tx_cmd, rx_cmd) = mpsc::channel(COMMAND_CAPACITY);
        let (tx_loaded, rx_loaded) = mpsc::unbounded_channel();
        let (tx_evt, _) = broadcast::channel(EVENT_CAPACITY);
        let (tx_snapshot, rx_snapshot) = watch::channel(PlaybackSnapshot {
            sound: Arc::clone(&sound),
            is_playing: false,
            volume: 0.0,
        });

        tracing::info!(title = %sound.title, "SoundWorker 已启动");
        let worker = SoundWorker {
            rx_cmd,
            tx_loaded,
            rx_loaded,
            tx_evt: tx_evt.clone(),
            tx_snapshot,
            factory,
            volumes,
            sound,
            player: None,
            generation: 0,
            resume_after_interruption: false,
        };
        let task = tokio::spawn(worker.run());

        Self {
            tx_cmd,
            tx_evt,
            rx_snapshot,
            task,
        }
    }

    async fn send(&self, cmd: SoundCommand) {
        if let Err(e) = self.tx_cmd.send(cmd).await {
            tracing::warn!(cmd = ?e.0, "SoundWorker 已退出，命令被丢弃");
        }
    }

    pub async fn play(&self) {
        self.send(SoundCommand::Play).await;
    }

    pub async fn play_sound(&self, sound: Arc<Sound>) {
        self.send(SoundCommand::PlaySound(sound)).await;
    }

    pub async fn change_sound(&self, sound: Arc<Sound>) {
        self.send(SoundCommand::ChangeSound(sound)).await;
    }

    pub async fn stop(&self) {
        self.send(SoundCommand::Stop).await;
    }

    pub async fn set_volume(&self, volume: f32) {
        self.send(SoundCommand::SetVolume(volume)).await;
    }

    pub async fn interruption_began(&self) {
        self.send(SoundCommand::InterruptionBegan).await;
    }

    pub async fn interruption_ended(&self, resume_permitted: bool) {
        self.send(SoundCommand::InterruptionEnded { resume_permitted })
            .await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SoundEvent> {
        self.tx_evt.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.rx_snapshot.borrow().clone()
    }

    /// 等待下一次状态快照更新
    pub async fn changed(&mut self) -> Option<PlaybackSnapshot> {
        self.rx_snapshot.changed().await.ok()?;
        Some(self.rx_snapshot.borrow_and_update().clone())
    }

    pub fn is_playing(&self) -> bool {
        self.rx_snapshot.borrow().is_playing
    }

    pub fn current_sound(&self) -> Arc<Sound> {
        Arc::clone(&self.rx_snapshot.borrow().sound)
    }

    /// 停止播放并等待 worker 退出
    pub async fn shutdown(self) {
        self.send(SoundCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(err = %e, "SoundWorker 异常退出");
        }
    }
}
