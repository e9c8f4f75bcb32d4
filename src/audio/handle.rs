//! The `AudioPlaybackHandle` trait: the player's view of an audio source.
//!
//! The player never owns the audio clock.  It asks the handle whether it is
//! paused or ended, listens for `Play` / `Ended` events, and (optionally)
//! asks it to start.  Anything that can answer those questions can drive
//! lip-sync: a browser audio element behind a bridge, a native output
//! stream, or [`TimedAudio`](super::TimedAudio).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// AudioEvent
// ---------------------------------------------------------------------------

/// Playback notifications emitted by an [`AudioPlaybackHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    /// Playback started or resumed.
    Play,
    /// Playback reached the end of the clip.
    Ended,
}

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Why an audio source refused to start.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    /// The host refused to start playback (autoplay policy, missing user
    /// gesture).
    #[error("playback blocked: {0}")]
    Blocked(String),
}

// ---------------------------------------------------------------------------
// AudioPlaybackHandle trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a pausable audio source.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn AudioPlaybackHandle>` by the playback task.
///
/// # Contract
///
/// - `play()` emits [`AudioEvent::Play`] to subscribers once playback has
///   actually started; playing an already-playing source is a no-op.
/// - `is_paused()` is `true` whenever the source is not producing sound,
///   including before the first `play()` and after the end.
/// - [`AudioEvent::Ended`] is emitted exactly when `is_ended()` flips to
///   `true`.
#[async_trait]
pub trait AudioPlaybackHandle: Send + Sync {
    /// Request playback.  Resolves once the request has settled.
    async fn play(&self) -> Result<(), AudioError>;

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool;

    /// Register for [`AudioEvent`]s.  Dropping the receiver unregisters.
    fn subscribe(&self) -> broadcast::Receiver<AudioEvent>;
}

// Compile-time assertion: Box<dyn AudioPlaybackHandle> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioPlaybackHandle>) {}
};
