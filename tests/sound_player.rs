use loop_audio_player::audio_worker::{
    CrossfadeConfig, NullFactory, PlaybackSnapshot, PlayerFactory, SoundEvent, SoundPlayable,
    SoundPlayer,
};
use loop_audio_player::domain::{FixedVolume, Sound};
use loop_audio_player::error::LoopError;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

fn sound(title: &str) -> Arc<Sound> {
    Arc::new(Sound::new(
        title.to_lowercase(),
        title,
        Some(PathBuf::from(format!("{}.ogg", title.to_lowercase()))),
    ))
}

fn null_player(initial: Arc<Sound>, duration: Duration) -> SoundPlayer {
    let factory = NullFactory::with_fixed_duration(CrossfadeConfig::default(), duration);
    SoundPlayer::spawn(initial, Arc::new(factory), Arc::new(FixedVolume(0.7)))
}

async fn next_state(rx: &mut broadcast::Receiver<SoundEvent>) -> bool {
    loop {
        if let SoundEvent::PlaybackStateChanged(playing) = rx.recv().await.expect("event") {
            return playing;
        }
    }
}

async fn wait_snapshot(
    player: &mut SoundPlayer,
    pred: impl Fn(&PlaybackSnapshot) -> bool,
) -> PlaybackSnapshot {
    loop {
        let snapshot = player.changed().await.expect("worker alive");
        if pred(&snapshot) {
            return snapshot;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn play_starts_crossfade_loop() {
    let rain = sound("Rain");
    let mut player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.play().await;
    assert!(next_state(&mut rx).await);
    assert!(rain.is_playing());

    let snapshot = wait_snapshot(&mut player, |s| s.is_playing).await;
    assert_eq!(snapshot.sound.title, "Rain");
    assert!((snapshot.volume - 0.7).abs() < f32::EPSILON);

    player.stop().await;
    assert!(!next_state(&mut rx).await);
    assert!(!rain.is_playing());
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn change_sound_while_playing_switches_playback() {
    let rain = sound("Rain");
    let forest = sound("Forest");
    let player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.play().await;
    assert!(next_state(&mut rx).await);

    player.change_sound(Arc::clone(&forest)).await;
    let mut changed = 0;
    loop {
        match rx.recv().await.expect("event") {
            SoundEvent::CurrentSoundChanged(s) => {
                assert_eq!(s.title, "Forest");
                changed += 1;
            }
            SoundEvent::PlaybackStateChanged(playing) => {
                assert!(playing);
                break;
            }
        }
    }
    assert_eq!(changed, 1);
    assert!(!rain.is_playing());
    assert!(forest.is_playing());
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn change_sound_while_stopped_only_swaps_reference() {
    let rain = sound("Rain");
    let forest = sound("Forest");
    let mut player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.change_sound(Arc::clone(&forest)).await;
    match rx.recv().await.expect("event") {
        SoundEvent::CurrentSoundChanged(s) => assert_eq!(s.title, "Forest"),
        other => panic!("unexpected event: {other:?}"),
    }
    let snapshot = wait_snapshot(&mut player, |s| s.sound.title == "Forest").await;
    assert!(!snapshot.is_playing);
    assert!(!forest.is_playing());

    // 同名 Sound 不重复通知
    player.change_sound(sound("Forest")).await;
    player.stop().await;
    match rx.recv().await.expect("event") {
        SoundEvent::PlaybackStateChanged(playing) => assert!(!playing),
        other => panic!("unexpected event: {other:?}"),
    }
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn short_or_missing_sources_fall_back_to_plain_loop() {
    let short = sound("Bell");
    let player = null_player(Arc::clone(&short), Duration::from_secs(2));
    let mut rx = player.subscribe();
    player.play().await;
    assert!(next_state(&mut rx).await);
    assert!(short.is_playing());
    player.shutdown().await;

    let mute = Arc::new(Sound::new("mute", "Mute", None));
    let player = null_player(Arc::clone(&mute), Duration::from_secs(30));
    let mut rx = player.subscribe();
    player.play().await;
    assert!(next_state(&mut rx).await);
    assert!(mute.is_playing());
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interruption_resumes_only_when_permitted() {
    let rain = sound("Rain");
    let player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.play().await;
    assert!(next_state(&mut rx).await);

    player.interruption_began().await;
    assert!(!next_state(&mut rx).await);
    player.interruption_ended(true).await;
    assert!(next_state(&mut rx).await);
    assert!(rain.is_playing());

    player.interruption_began().await;
    assert!(!next_state(&mut rx).await);
    player.interruption_ended(false).await;
    player.stop().await;
    assert!(!next_state(&mut rx).await);
    assert!(!rain.is_playing());
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_interruption_still_resumes() {
    let rain = sound("Rain");
    let player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.play().await;
    assert!(next_state(&mut rx).await);

    player.interruption_began().await;
    assert!(!next_state(&mut rx).await);
    player.interruption_began().await;
    player.interruption_ended(true).await;
    assert!(next_state(&mut rx).await);
    assert!(rain.is_playing());
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_interruption_cancels_resume() {
    let rain = sound("Rain");
    let player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.play().await;
    assert!(next_state(&mut rx).await);
    player.interruption_began().await;
    assert!(!next_state(&mut rx).await);

    player.stop().await;
    assert!(!next_state(&mut rx).await);
    player.interruption_ended(true).await;
    player.stop().await;
    assert!(!next_state(&mut rx).await);
    assert!(!rain.is_playing());
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn set_volume_reaches_playing_loop() {
    let rain = sound("Rain");
    let mut player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.play().await;
    assert!(next_state(&mut rx).await);

    player.set_volume(0.3).await;
    let snapshot = wait_snapshot(&mut player, |s| (s.volume - 0.3).abs() < f32::EPSILON).await;
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.sound.title, "Rain");

    player.set_volume(4.0).await;
    let snapshot = wait_snapshot(&mut player, |s| s.volume > 0.3).await;
    assert_eq!(snapshot.volume, 1.0);
    player.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interruption_while_stopped_does_not_start_playback() {
    let rain = sound("Rain");
    let player = null_player(Arc::clone(&rain), Duration::from_secs(30));
    let mut rx = player.subscribe();

    player.interruption_began().await;
    player.interruption_ended(true).await;
    player.stop().await;
    assert!(!next_state(&mut rx).await);
    assert!(!rain.is_playing());
    player.shutdown().await;
}

struct BrokenFactory;

impl PlayerFactory for BrokenFactory {
    fn crossfade(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        Err(LoopError::SourceConstructionFailed {
            title: sound.title.clone(),
            reason: "unsupported codec".to_owned(),
        })
    }

    fn fallback(&self, _sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        panic!("construction failures must not fall back");
    }
}

#[tokio::test]
async fn construction_failure_abandons_playback() {
    let rain = sound("Rain");
    let player = SoundPlayer::spawn(
        Arc::clone(&rain),
        Arc::new(BrokenFactory),
        Arc::new(FixedVolume(1.0)),
    );
    let mut rx = player.subscribe();

    player.play().await;
    assert!(!next_state(&mut rx).await);
    assert!(!rain.is_playing());
    assert!(!player.is_playing());
    player.shutdown().await;
}

#[derive(Default)]
struct ProbeLog {
    played: AtomicU32,
    stopped: AtomicBool,
}

struct ProbePlayer {
    log: Arc<ProbeLog>,
    playing: bool,
    volume: f32,
}

impl SoundPlayable for ProbePlayer {
    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn play_now(&mut self) {
        self.playing = true;
        self.log.played.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.playing = false;
        self.log.stopped.store(true, Ordering::SeqCst);
    }
}

/// "Slow" 的构建比其他 Sound 慢
#[derive(Default)]
struct SlowFactory {
    logs: Mutex<Vec<(String, Arc<ProbeLog>)>>,
}

impl SlowFactory {
    fn log_for(&self, title: &str) -> Option<Arc<ProbeLog>> {
        self.logs
            .lock()
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, log)| Arc::clone(log))
    }
}

impl PlayerFactory for SlowFactory {
    fn crossfade(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        if sound.title == "Slow" {
            std::thread::sleep(Duration::from_millis(200));
        }
        let log = Arc::new(ProbeLog::default());
        self.logs
            .lock()
            .push((sound.title.clone(), Arc::clone(&log)));
        Ok(Box::new(ProbePlayer {
            log,
            playing: false,
            volume: 0.0,
        }))
    }

    fn fallback(&self, sound: &Sound) -> Result<Box<dyn SoundPlayable>, LoopError> {
        self.crossfade(sound)
    }
}

#[tokio::test]
async fn superseded_load_is_discarded() {
    let slow = sound("Slow");
    let fast = sound("Fast");
    let factory = Arc::new(SlowFactory::default());
    let player = SoundPlayer::spawn(
        Arc::clone(&slow),
        Arc::clone(&factory) as Arc<dyn PlayerFactory>,
        Arc::new(FixedVolume(1.0)),
    );
    let mut rx = player.subscribe();

    player.play().await;
    player.play_sound(Arc::clone(&fast)).await;
    assert!(next_state(&mut rx).await);

    let slow_log = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match factory.log_for("Slow") {
                Some(log) if log.stopped.load(Ordering::SeqCst) => return log,
                _ => {}
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stale player stopped");

    assert_eq!(slow_log.played.load(Ordering::SeqCst), 0);
    let fast_log = factory.log_for("Fast").expect("fast built");
    assert_eq!(fast_log.played.load(Ordering::SeqCst), 1);
    assert!(player.is_playing());
    assert_eq!(player.current_sound().title, "Fast");
    assert!(!slow.is_playing());
    assert!(fast.is_playing());
    player.shutdown().await;
}
