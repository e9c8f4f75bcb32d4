//! Viseme data: per-utterance timelines and the mesh channel map.

pub mod map;
pub mod timeline;

pub use map::{VisemeMap, VISEME_NAMES};
pub use timeline::{Timeline, TimelineError, VisemeEvent};
