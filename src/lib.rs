//! Lip-sync core for a speaking tutor avatar.
//!
//! The backend synthesizes speech together with a viseme timeline; this
//! crate plays that timeline against the audio clock and writes mouth
//! shapes into the avatar's morph-target weights.
//!
//! - [`player`]: `VisemeSyncPlayer`, the frame-driven synchronization loop.
//! - [`audio`]: the `AudioPlaybackHandle` seam and `TimedAudio`.
//! - [`morph`]: the `MorphTargetSink` seam and mouth-shape application.
//! - [`viseme`]: timelines and the viseme → channel map.
//! - [`backend`]: HTTP client for `/synthesize` and `/greeting`.
//! - [`config`]: TOML settings.

pub mod audio;
pub mod backend;
pub mod config;
pub mod morph;
pub mod player;
pub mod viseme;
