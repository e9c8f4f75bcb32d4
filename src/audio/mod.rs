//! Audio sources as seen by the lip-sync player.
//!
//! [`AudioPlaybackHandle`] is the seam: the player only needs play/paused/
//! ended state plus `Play` / `Ended` notifications.  [`TimedAudio`] is a
//! clock-driven implementation for clips of known duration.

pub mod handle;
pub mod timed;

pub use handle::{AudioError, AudioEvent, AudioPlaybackHandle};
pub use timed::{PlaybackStatus, TimedAudio};
