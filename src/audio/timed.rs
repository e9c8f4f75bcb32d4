//! `TimedAudio`: a playback handle driven purely by the tokio clock.
//!
//! It models a clip of known duration: `play()` starts (or resumes) a timer
//! for the remaining time, `pause()` banks the position, and the timer
//! firing marks the clip ended.  No samples are produced; the demo binary
//! pairs it with a synthesized clip's duration, and tests run it under a
//! paused tokio clock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::handle::{AudioError, AudioEvent, AudioPlaybackHandle};

const EVENT_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

/// Where a [`TimedAudio`] clip currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// Never started.
    #[default]
    Idle,
    Playing,
    Paused,
    Ended,
}

// ---------------------------------------------------------------------------
// TimedAudio
// ---------------------------------------------------------------------------

struct Clock {
    status: PlaybackStatus,
    /// Position accumulated before the current run.
    played: Duration,
    /// Start of the current run, while playing.
    resumed_at: Option<Instant>,
    end_timer: Option<JoinHandle<()>>,
}

/// A clip of fixed duration that plays against the tokio clock.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use avatar_lipsync::audio::{AudioEvent, AudioPlaybackHandle, TimedAudio};
///
/// # async fn example() {
/// let audio = TimedAudio::new(Duration::from_millis(1_200));
/// let mut events = audio.subscribe();
/// audio.play().await.unwrap();
/// assert_eq!(events.recv().await.unwrap(), AudioEvent::Play);
/// assert_eq!(events.recv().await.unwrap(), AudioEvent::Ended);
/// # }
/// ```
pub struct TimedAudio {
    duration: Duration,
    blocked: bool,
    events: broadcast::Sender<AudioEvent>,
    clock: Arc<Mutex<Clock>>,
}

impl TimedAudio {
    pub fn new(duration: Duration) -> Self {
        Self::with_policy(duration, false)
    }

    /// A clip whose `play()` always fails, as under a strict autoplay policy.
    pub fn blocked(duration: Duration) -> Self {
        Self::with_policy(duration, true)
    }

    fn with_policy(duration: Duration, blocked: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            duration,
            blocked,
            events,
            clock: Arc::new(Mutex::new(Clock {
                status: PlaybackStatus::Idle,
                played: Duration::ZERO,
                resumed_at: None,
                end_timer: None,
            })),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.clock).status
    }

    /// Current playback position.
    pub fn position(&self) -> Duration {
        let clock = lock(&self.clock);
        let running = clock
            .resumed_at
            .map_or(Duration::ZERO, |at| Instant::now().saturating_duration_since(at));
        (clock.played + running).min(self.duration)
    }

    /// Pause playback, keeping the position.  No-op unless playing.
    pub fn pause(&self) {
        let mut clock = lock(&self.clock);
        if clock.status != PlaybackStatus::Playing {
            return;
        }
        if let Some(at) = clock.resumed_at.take() {
            clock.played += Instant::now().saturating_duration_since(at);
        }
        if let Some(timer) = clock.end_timer.take() {
            timer.abort();
        }
        clock.status = PlaybackStatus::Paused;
        log::debug!("timed audio: paused at {:?}", clock.played);
    }
}

impl Drop for TimedAudio {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.clock).end_timer.take() {
            timer.abort();
        }
    }
}

#[async_trait]
impl AudioPlaybackHandle for TimedAudio {
    async fn play(&self) -> Result<(), AudioError> {
        if self.blocked {
            return Err(AudioError::Blocked(
                "autoplay policy requires a user gesture".into(),
            ));
        }

        let mut clock = lock(&self.clock);
        match clock.status {
            PlaybackStatus::Playing => return Ok(()),
            PlaybackStatus::Ended => clock.played = Duration::ZERO,
            PlaybackStatus::Idle | PlaybackStatus::Paused => {}
        }

        let remaining = self.duration.saturating_sub(clock.played);
        clock.status = PlaybackStatus::Playing;
        clock.resumed_at = Some(Instant::now());
        let _ = self.events.send(AudioEvent::Play);

        let shared = Arc::clone(&self.clock);
        let events = self.events.clone();
        let duration = self.duration;
        clock.end_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            {
                let mut clock = lock(&shared);
                if clock.status != PlaybackStatus::Playing {
                    return;
                }
                clock.status = PlaybackStatus::Ended;
                clock.played = duration;
                clock.resumed_at = None;
                clock.end_timer = None;
            }
            let _ = events.send(AudioEvent::Ended);
        }));

        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.status() != PlaybackStatus::Playing
    }

    fn is_ended(&self) -> bool {
        self.status() == PlaybackStatus::Ended
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.events.subscribe()
    }
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
