//! Viseme-driven lip-sync playback.
//!
//! This module keeps an avatar's mouth in step with playing audio.  The
//! audio handle is the only clock: the player anchors each session on its
//! first frame after `Play`, advances a cursor through the timeline on
//! every frame tick, and silences the mouth the moment the audio pauses,
//! ends or cannot start.
//!
//! # Architecture
//!
//! ```text
//! AudioPlaybackHandle ──Play / Ended (broadcast)──▶ session task
//!                                                      │
//!                              tokio interval (~60 Hz) ─┤
//!                                                      ▼
//!                               PlaybackSession::frame(timeline, now)
//!                                                      │
//!                                                      ▼
//!                       AvatarRig::apply(viseme) → MorphTargetSink weights
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use avatar_lipsync::audio::TimedAudio;
//! use avatar_lipsync::config::AppConfig;
//! use avatar_lipsync::morph::MorphWeights;
//! use avatar_lipsync::player::{AudioSource, AvatarRig, VisemeSyncPlayer};
//! use avatar_lipsync::viseme::{Timeline, VisemeMap};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let (sink, _weights) = MorphWeights::new(15).shared();
//!     let rig = AvatarRig::new(sink, Arc::new(VisemeMap::default()));
//!
//!     let player = VisemeSyncPlayer::new(config.lipsync.clone());
//!     let audio = Arc::new(TimedAudio::new(Duration::from_secs(2)));
//!     player
//!         .play(AudioSource::Owned(audio), Arc::new(Timeline::default()), &rig)
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod runner;
pub mod session;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{AudioSource, AvatarRig, PlayerError, VisemeSyncPlayer};
pub use session::PlaybackSession;
