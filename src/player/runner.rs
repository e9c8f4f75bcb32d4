//! `VisemeSyncPlayer`: keeps mouth shapes in step with playing audio.
//!
//! [`VisemeSyncPlayer::play`] subscribes to the audio handle, spawns one
//! session task and (for owned sources) starts playback.  The task waits for
//! `Play`, then runs a frame loop until the audio pauses, ends or goes away.
//!
//! # Session flow
//!
//! ```text
//! play()
//!   ├─ cancel + await previous task, silence its rig
//!   ├─ audio already ended?  → silence, return Ok
//!   ├─ spawn drive(events)
//!   └─ Owned source → audio.play()
//!         └─ Err → cancel + await task, silence, PlaybackBlocked
//!
//! drive(events)                                     ← tokio task
//!   └─ Play ─▶ frame loop (fresh PlaybackSession)
//!                ├─ tick   → advance cursor, apply viseme
//!                │           paused/ended → silence, back to idle
//!                ├─ Play   → restart with a fresh session
//!                └─ Ended  → silence, back to idle
//! ```
//!
//! `abort()` only requests cancellation: a frame already past its cursor
//! step still writes its viseme.  The task therefore silences its rig when
//! its future is dropped, after any such write, and every teardown path
//! that can wait for the task does so before its own silence write.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::{AudioError, AudioEvent, AudioPlaybackHandle};
use crate::config::LipSyncConfig;
use crate::morph::{apply_shared, SharedMorphSink};
use crate::viseme::{Timeline, VisemeMap};

use super::session::PlaybackSession;

// ---------------------------------------------------------------------------
// PlayerError
// ---------------------------------------------------------------------------

/// Errors surfaced by [`VisemeSyncPlayer::play`].
///
/// Everything that can go wrong once playback is running (missing weights,
/// unmapped ids, a vanished audio source) is absorbed by the player.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The audio source refused to start.
    #[error("audio playback blocked: {0}")]
    PlaybackBlocked(#[source] AudioError),
}

// ---------------------------------------------------------------------------
// AudioSource / AvatarRig
// ---------------------------------------------------------------------------

/// Who starts the audio.
#[derive(Clone)]
pub enum AudioSource {
    /// The player calls `play()` on the handle.
    Owned(Arc<dyn AudioPlaybackHandle>),
    /// The caller starts playback; the player only listens.
    External(Arc<dyn AudioPlaybackHandle>),
}

impl AudioSource {
    pub fn handle(&self) -> &Arc<dyn AudioPlaybackHandle> {
        match self {
            AudioSource::Owned(handle) | AudioSource::External(handle) => handle,
        }
    }
}

/// The avatar mesh's morph weights together with its viseme channel map.
#[derive(Clone)]
pub struct AvatarRig {
    pub sink: SharedMorphSink,
    pub map: Arc<VisemeMap>,
}

impl AvatarRig {
    pub fn new(sink: SharedMorphSink, map: Arc<VisemeMap>) -> Self {
        Self { sink, map }
    }

    /// Show `viseme_id` on the mesh.
    pub fn apply(&self, viseme_id: u32) {
        apply_shared(&self.sink, &self.map, viseme_id);
    }
}

// ---------------------------------------------------------------------------
// VisemeSyncPlayer
// ---------------------------------------------------------------------------

struct ActiveSession {
    id: u64,
    rig: AvatarRig,
    task: JoinHandle<()>,
}

/// Drives an avatar's mouth from a viseme timeline while audio plays.
///
/// At most one session runs per player; starting a new one cancels the
/// previous one first.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use avatar_lipsync::audio::TimedAudio;
/// use avatar_lipsync::config::LipSyncConfig;
/// use avatar_lipsync::morph::MorphWeights;
/// use avatar_lipsync::player::{AudioSource, AvatarRig, VisemeSyncPlayer};
/// use avatar_lipsync::viseme::{Timeline, VisemeEvent, VisemeMap};
///
/// # async fn example() {
/// let (sink, _weights) = MorphWeights::new(8).shared();
/// let map: VisemeMap = [(0, 5), (10, 2)].into_iter().collect();
/// let rig = AvatarRig::new(sink, Arc::new(map));
///
/// let timeline = Timeline::new(vec![VisemeEvent::new(0.0, 0), VisemeEvent::new(120.0, 10)]).unwrap();
/// let audio = Arc::new(TimedAudio::new(Duration::from_millis(400)));
///
/// let player = VisemeSyncPlayer::new(LipSyncConfig::default());
/// player
///     .play(AudioSource::Owned(audio), Arc::new(timeline), &rig)
///     .await
///     .unwrap();
/// # }
/// ```
pub struct VisemeSyncPlayer {
    config: LipSyncConfig,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
    frame_loops: Arc<AtomicUsize>,
}

impl VisemeSyncPlayer {
    pub fn new(config: LipSyncConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
            frame_loops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start lip-sync for `timeline` against `source`, writing to `rig`.
    ///
    /// Resolves once the playback request has settled, not when playback
    /// finishes.  The frame loop keeps running on its own task.
    ///
    /// # Errors
    ///
    /// [`PlayerError::PlaybackBlocked`] when an owned source refuses to
    /// start.  The session is cancelled and the mouth silenced before the
    /// error is returned.
    pub async fn play(
        &self,
        source: AudioSource,
        timeline: Arc<Timeline>,
        rig: &AvatarRig,
    ) -> Result<(), PlayerError> {
        self.cancel_active().await;

        let audio = Arc::clone(source.handle());
        let silence = self.config.silence_viseme_id;

        if audio.is_ended() {
            log::debug!("lipsync: audio already ended, nothing to animate");
            rig.apply(silence);
            return Ok(());
        }

        let session_id = if timeline.is_empty() {
            log::debug!("lipsync: empty timeline, audio plays without animation");
            None
        } else {
            let events = audio.subscribe();
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let ctx = SessionContext {
                audio: Arc::clone(&audio),
                timeline,
                rig: rig.clone(),
                frame_interval: self.config.frame_interval(),
                silence,
                frame_loops: Arc::clone(&self.frame_loops),
            };
            let task = tokio::spawn(drive(ctx, events));
            *self.lock_active() = Some(ActiveSession {
                id,
                rig: rig.clone(),
                task,
            });
            log::debug!("lipsync: session {id} waiting for playback");
            Some(id)
        };

        if let AudioSource::Owned(_) = source {
            if let Err(e) = audio.play().await {
                log::warn!("lipsync: {e}; mouth stays silent");
                if let Some(id) = session_id {
                    self.cancel_session(id).await;
                }
                return Err(PlayerError::PlaybackBlocked(e));
            }
        }

        Ok(())
    }

    /// Cancel the running session, if any, and silence its mouth.
    ///
    /// Resolves once the session task is gone; no frame write can land
    /// after the silence.
    pub async fn stop(&self) {
        let active = self.lock_active().take();
        if let Some(session) = active {
            let id = session.id;
            self.finish(session).await;
            log::debug!("lipsync: session {id} stopped");
        }
    }

    /// Number of frame loops currently running: `0` or `1`.
    pub fn active_frame_loops(&self) -> usize {
        self.frame_loops.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Abort the previous session and wait until its task is gone, so two
    /// sessions never write the same sink.
    async fn cancel_active(&self) {
        let previous = self.lock_active().take();
        if let Some(session) = previous {
            let id = session.id;
            self.finish(session).await;
            log::debug!("lipsync: session {id} replaced");
        }
    }

    /// Cancel session `id` unless a newer one has taken its slot.
    async fn cancel_session(&self, id: u64) {
        let session = {
            let mut active = self.lock_active();
            if active.as_ref().is_some_and(|s| s.id == id) {
                active.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            self.finish(session).await;
        }
    }

    /// Abort `session`, wait for its task, then silence its rig.
    async fn finish(&self, session: ActiveSession) {
        session.task.abort();
        if let Err(e) = session.task.await {
            if e.is_panic() {
                log::warn!("lipsync: session {} panicked", session.id);
            }
        }
        session.rig.apply(self.config.silence_viseme_id);
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for VisemeSyncPlayer {
    // No way to wait for the task here.  The immediate write covers an idle
    // task; the task's own `SilenceOnExit` covers a frame in flight.
    fn drop(&mut self) {
        if let Some(session) = self.lock_active().take() {
            session.task.abort();
            session.rig.apply(self.config.silence_viseme_id);
            log::debug!("lipsync: session {} dropped", session.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

struct SessionContext {
    audio: Arc<dyn AudioPlaybackHandle>,
    timeline: Arc<Timeline>,
    rig: AvatarRig,
    frame_interval: Duration,
    silence: u32,
    frame_loops: Arc<AtomicUsize>,
}

impl SessionContext {
    fn silence(&self) {
        self.rig.apply(self.silence);
    }

    fn is_playing(&self) -> bool {
        !self.audio.is_paused() && !self.audio.is_ended()
    }
}

enum LoopExit {
    /// Audio paused or ended; wait for the next `Play`.
    Stopped,
    /// The audio handle dropped its event channel.
    SourceGone,
}

/// Silences the rig when the session task's future is dropped, whether it
/// returned or was aborted.
struct SilenceOnExit {
    rig: AvatarRig,
    silence: u32,
}

impl Drop for SilenceOnExit {
    fn drop(&mut self) {
        self.rig.apply(self.silence);
    }
}

/// Counts running frame loops; decrements even when the task is aborted.
struct FrameLoopGuard(Arc<AtomicUsize>);

impl FrameLoopGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for FrameLoopGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn drive(ctx: SessionContext, mut events: broadcast::Receiver<AudioEvent>) {
    let _silence = SilenceOnExit {
        rig: ctx.rig.clone(),
        silence: ctx.silence,
    };

    // An external source may already be playing when we subscribe.
    let mut start_now = ctx.is_playing();

    loop {
        if start_now {
            start_now = false;
            if let LoopExit::SourceGone = run_frames(&ctx, &mut events).await {
                break;
            }
            continue;
        }

        match events.recv().await {
            Ok(AudioEvent::Play) => start_now = true,
            Ok(AudioEvent::Ended) => ctx.silence(),
            Err(RecvError::Lagged(skipped)) => {
                log::debug!("lipsync: missed {skipped} audio events while idle");
                start_now = ctx.is_playing();
            }
            Err(RecvError::Closed) => break,
        }
    }

    log::debug!("lipsync: audio source closed, session finished");
}

async fn run_frames(ctx: &SessionContext, events: &mut broadcast::Receiver<AudioEvent>) -> LoopExit {
    let _running = FrameLoopGuard::enter(&ctx.frame_loops);

    'session: loop {
        let mut session = PlaybackSession::new();
        let mut ticker = tokio::time::interval(ctx.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shown: Option<usize> = None;

        log::debug!("lipsync: frame loop started ({} visemes)", ctx.timeline.len());

        loop {
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Ok(AudioEvent::Play) => continue 'session,
                    Ok(AudioEvent::Ended) => {
                        ctx.silence();
                        log::debug!("lipsync: audio ended at cursor {}", session.cursor());
                        return LoopExit::Stopped;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("lipsync: missed {skipped} audio events");
                    }
                    Err(RecvError::Closed) => {
                        ctx.silence();
                        return LoopExit::SourceGone;
                    }
                },

                now = ticker.tick() => {
                    if let Some(event) = session.frame(&ctx.timeline, now) {
                        if shown != Some(session.cursor()) {
                            log::trace!(
                                "lipsync: viseme {} at {} ms",
                                event.viseme_id,
                                event.offset_ms
                            );
                            shown = Some(session.cursor());
                        }
                        ctx.rig.apply(event.viseme_id);
                    }

                    if !ctx.is_playing() {
                        ctx.silence();
                        log::debug!("lipsync: audio stopped at cursor {}", session.cursor());
                        return LoopExit::Stopped;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TimedAudio;
    use crate::morph::MorphWeights;
    use crate::viseme::VisemeEvent;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::time::sleep;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn timeline(events: &[(f64, u32)]) -> Arc<Timeline> {
        Arc::new(
            Timeline::new(
                events
                    .iter()
                    .map(|&(offset, id)| VisemeEvent::new(offset, id))
                    .collect(),
            )
            .unwrap(),
        )
    }

    /// Rig over 8 channels with silence on 5, id 3 on 1 and id 10 on 2.
    fn rig() -> (AvatarRig, Arc<Mutex<MorphWeights>>) {
        let (sink, weights) = MorphWeights::new(8).shared();
        let map: VisemeMap = [(0, 5), (3, 1), (10, 2)].into_iter().collect();
        (AvatarRig::new(sink, Arc::new(map)), weights)
    }

    fn active(weights: &Arc<Mutex<MorphWeights>>) -> Option<usize> {
        weights.lock().unwrap().active_channel()
    }

    fn channel(weights: &Arc<Mutex<MorphWeights>>, index: usize) -> f32 {
        weights.lock().unwrap().weights().unwrap()[index]
    }

    fn player() -> VisemeSyncPlayer {
        VisemeSyncPlayer::new(LipSyncConfig::default())
    }

    /// Audio double whose state and events are driven by the test.
    struct ScriptedAudio {
        events: broadcast::Sender<AudioEvent>,
        paused: AtomicBool,
        ended: AtomicBool,
        reject: bool,
    }

    impl ScriptedAudio {
        fn new() -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                events,
                paused: AtomicBool::new(true),
                ended: AtomicBool::new(false),
                reject: false,
            }
        }

        /// Fires `Play`, then settles the request as blocked 40 ms later.
        fn rejecting() -> Self {
            Self {
                reject: true,
                ..Self::new()
            }
        }

        fn start(&self) {
            self.paused.store(false, Ordering::SeqCst);
        }

        fn burst(&self, event: AudioEvent, count: usize) {
            for _ in 0..count {
                let _ = self.events.send(event);
            }
        }

        /// Reach the end without emitting `Ended`.
        fn finish_silently(&self) {
            self.paused.store(true, Ordering::SeqCst);
            self.ended.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AudioPlaybackHandle for ScriptedAudio {
        async fn play(&self) -> Result<(), AudioError> {
            self.start();
            let _ = self.events.send(AudioEvent::Play);
            if self.reject {
                sleep(ms(40)).await;
                self.paused.store(true, Ordering::SeqCst);
                return Err(AudioError::Blocked("no user gesture".into()));
            }
            Ok(())
        }

        fn is_paused(&self) -> bool {
            self.paused.load(Ordering::SeqCst)
        }

        fn is_ended(&self) -> bool {
            self.ended.load(Ordering::SeqCst)
        }

        fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
            self.events.subscribe()
        }
    }

    fn fast_config() -> LipSyncConfig {
        LipSyncConfig {
            frame_interval_ms: 1,
            ..LipSyncConfig::default()
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn weights_follow_timeline_and_silence_on_end() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(430)));
        let player = player();

        player
            .play(
                AudioSource::Owned(audio.clone()),
                timeline(&[(0.0, 0), (120.0, 10), (400.0, 0)]),
                &rig,
            )
            .await
            .unwrap();

        sleep(ms(50)).await;
        assert_eq!(channel(&weights, 5), 1.0);
        assert_eq!(active(&weights), Some(5));

        sleep(ms(100)).await;
        assert_eq!(channel(&weights, 2), 1.0);
        assert_eq!(channel(&weights, 5), 0.0);

        sleep(ms(300)).await;
        assert!(audio.is_ended());
        assert_eq!(channel(&weights, 5), 1.0);
        assert_eq!(channel(&weights, 2), 0.0);
        assert_eq!(player.active_frame_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_forces_silence_over_last_shape() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(200)));
        let player = player();

        player
            .play(AudioSource::Owned(audio), timeline(&[(0.0, 10)]), &rig)
            .await
            .unwrap();

        sleep(ms(100)).await;
        assert_eq!(active(&weights), Some(2));

        sleep(ms(150)).await;
        assert_eq!(active(&weights), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_without_mapping_clears_all_weights() {
        let (sink, weights) = MorphWeights::new(4).shared();
        let rig = AvatarRig::new(sink, Arc::new([(10, 2)].into_iter().collect()));
        let audio = Arc::new(TimedAudio::new(ms(100)));
        let player = player();

        player
            .play(AudioSource::Owned(audio), timeline(&[(0.0, 10)]), &rig)
            .await
            .unwrap();

        sleep(ms(50)).await;
        assert_eq!(active(&weights), Some(2));

        sleep(ms(100)).await;
        assert_eq!(weights.lock().unwrap().weights(), Some(&[0.0; 4][..]));
    }

    #[tokio::test(start_paused = true)]
    async fn second_play_replaces_first_session() {
        let (rig_a, weights_a) = rig();
        let (rig_b, weights_b) = rig();
        let audio_a = Arc::new(TimedAudio::new(ms(1_000)));
        let audio_b = Arc::new(TimedAudio::new(ms(1_000)));
        let player = player();

        player
            .play(
                AudioSource::Owned(audio_a),
                timeline(&[(0.0, 3), (20.0, 10)]),
                &rig_a,
            )
            .await
            .unwrap();
        sleep(ms(50)).await;
        assert_eq!(active(&weights_a), Some(2));
        assert_eq!(player.active_frame_loops(), 1);

        player
            .play(AudioSource::Owned(audio_b), timeline(&[(0.0, 3)]), &rig_b)
            .await
            .unwrap();
        // The replaced rig is silenced and never written again.
        assert_eq!(active(&weights_a), Some(5));

        sleep(ms(40)).await;
        assert_eq!(player.active_frame_loops(), 1);
        assert_eq!(active(&weights_a), Some(5));
        assert_eq!(active(&weights_b), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn already_ended_audio_takes_ended_path() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(50)));
        audio.play().await.unwrap();
        sleep(ms(100)).await;
        assert!(audio.is_ended());

        rig.apply(10);
        let player = player();
        player
            .play(
                AudioSource::External(audio),
                timeline(&[(0.0, 3), (10.0, 10)]),
                &rig,
            )
            .await
            .unwrap();

        assert_eq!(active(&weights), Some(5));
        sleep(ms(50)).await;
        assert_eq!(active(&weights), Some(5));
        assert_eq!(player.active_frame_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_playback_is_reported_and_leaves_nothing_running() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::blocked(ms(500)));
        let player = player();

        let err = player
            .play(
                AudioSource::Owned(audio),
                timeline(&[(0.0, 10), (100.0, 3)]),
                &rig,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::PlaybackBlocked(AudioError::Blocked(_))));

        sleep(ms(1_000)).await;
        assert_eq!(player.active_frame_loops(), 0);
        assert_eq!(active(&weights), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn external_source_waits_for_caller_to_start() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(500)));
        let player = player();

        player
            .play(
                AudioSource::External(audio.clone()),
                timeline(&[(0.0, 3), (100.0, 10)]),
                &rig,
            )
            .await
            .unwrap();

        sleep(ms(50)).await;
        assert!(audio.is_paused());
        assert_eq!(active(&weights), None);
        assert_eq!(player.active_frame_loops(), 0);

        audio.play().await.unwrap();
        sleep(ms(50)).await;
        assert_eq!(active(&weights), Some(1));
        assert_eq!(player.active_frame_loops(), 1);

        sleep(ms(100)).await;
        assert_eq!(active(&weights), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_loop_and_resume_starts_fresh_session() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(1_000)));
        let player = player();

        player
            .play(
                AudioSource::Owned(audio.clone()),
                timeline(&[(0.0, 3), (120.0, 10)]),
                &rig,
            )
            .await
            .unwrap();

        sleep(ms(150)).await;
        assert_eq!(active(&weights), Some(2));

        audio.pause();
        sleep(ms(30)).await;
        assert_eq!(active(&weights), Some(5));
        assert_eq!(player.active_frame_loops(), 0);

        audio.play().await.unwrap();
        sleep(ms(30)).await;
        assert_eq!(active(&weights), Some(1));
        assert_eq!(player.active_frame_loops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_timeline_plays_audio_without_animation() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(200)));
        let player = player();

        player
            .play(AudioSource::Owned(audio.clone()), timeline(&[]), &rig)
            .await
            .unwrap();

        sleep(ms(50)).await;
        assert!(!audio.is_paused());
        assert_eq!(active(&weights), None);
        assert_eq!(player.active_frame_loops(), 0);

        sleep(ms(300)).await;
        assert!(audio.is_ended());
        assert_eq!(active(&weights), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_silences() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(1_000)));
        let player = player();

        player
            .play(AudioSource::Owned(audio), timeline(&[(0.0, 10)]), &rig)
            .await
            .unwrap();
        sleep(ms(50)).await;
        assert_eq!(active(&weights), Some(2));

        player.stop().await;
        assert_eq!(active(&weights), Some(5));

        sleep(ms(50)).await;
        assert_eq!(player.active_frame_loops(), 0);
        assert_eq!(active(&weights), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_player_silences_mouth() {
        let (rig, weights) = rig();
        let audio = Arc::new(TimedAudio::new(ms(1_000)));
        let player = player();

        player
            .play(AudioSource::Owned(audio), timeline(&[(0.0, 10)]), &rig)
            .await
            .unwrap();
        sleep(ms(50)).await;

        drop(player);
        assert_eq!(active(&weights), Some(5));
        sleep(ms(50)).await;
        assert_eq!(active(&weights), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_sink_plays_without_error() {
        let (sink, _weights) = MorphWeights::detached().shared();
        let rig = AvatarRig::new(sink, Arc::new([(0, 5)].into_iter().collect()));
        let audio = Arc::new(TimedAudio::new(ms(100)));
        let player = player();

        player
            .play(AudioSource::Owned(audio.clone()), timeline(&[(0.0, 0)]), &rig)
            .await
            .unwrap();
        sleep(ms(200)).await;
        assert!(audio.is_ended());
        assert_eq!(player.active_frame_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn play_event_before_rejection_leaves_mouth_silent() {
        let (rig, weights) = rig();
        let audio = Arc::new(ScriptedAudio::rejecting());
        let player = player();

        let err = player
            .play(
                AudioSource::Owned(audio),
                timeline(&[(0.0, 10), (20.0, 3)]),
                &rig,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::PlaybackBlocked(AudioError::Blocked(_))));
        assert_eq!(player.active_frame_loops(), 0);
        assert_eq!(active(&weights), Some(5));

        sleep(ms(1_000)).await;
        assert_eq!(player.active_frame_loops(), 0);
        assert_eq!(active(&weights), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn lagged_event_bursts_fall_back_to_playback_state() {
        let (rig, weights) = rig();
        let audio = Arc::new(ScriptedAudio::new());
        let player = player();

        player
            .play(
                AudioSource::External(audio.clone()),
                timeline(&[(0.0, 3), (50.0, 10)]),
                &rig,
            )
            .await
            .unwrap();

        // Idle: the burst overflows the channel before the task reads it.
        audio.start();
        audio.burst(AudioEvent::Play, 40);
        sleep(ms(30)).await;
        assert_eq!(player.active_frame_loops(), 1);
        assert_eq!(active(&weights), Some(1));

        // Running: another overflow, and the clip ends without `Ended`.
        audio.burst(AudioEvent::Play, 40);
        audio.finish_silently();
        sleep(ms(30)).await;
        assert_eq!(player.active_frame_loops(), 0);
        assert_eq!(active(&weights), Some(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_silences_after_frame_in_flight() {
        for round in 0..50 {
            let (rig, weights) = rig();
            let audio = Arc::new(TimedAudio::new(ms(60_000)));
            let player = Arc::new(VisemeSyncPlayer::new(fast_config()));

            player
                .play(AudioSource::Owned(audio), timeline(&[(0.0, 10)]), &rig)
                .await
                .unwrap();
            sleep(ms(5)).await;

            // Park the frame task on the sink lock while stop is requested.
            let held = weights.lock().unwrap();
            let stopper = tokio::spawn({
                let player = Arc::clone(&player);
                async move { player.stop().await }
            });
            std::thread::sleep(ms(3));
            drop(held);
            stopper.await.unwrap();

            assert_eq!(active(&weights), Some(5), "round {round}");
            assert_eq!(player.active_frame_loops(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_player_silences_after_frame_in_flight() {
        for round in 0..20 {
            let (rig, weights) = rig();
            let audio = Arc::new(TimedAudio::new(ms(60_000)));
            let player = VisemeSyncPlayer::new(fast_config());

            player
                .play(AudioSource::Owned(audio), timeline(&[(0.0, 10)]), &rig)
                .await
                .unwrap();
            sleep(ms(5)).await;

            let held = weights.lock().unwrap();
            let dropper = std::thread::spawn(move || drop(player));
            std::thread::sleep(ms(3));
            drop(held);
            dropper.join().unwrap();

            sleep(ms(20)).await;
            assert_eq!(active(&weights), Some(5), "round {round}");
        }
    }
}
