//! Viseme timelines as delivered by the synthesis backend.
//!
//! A [`Timeline`] is an ordered list of [`VisemeEvent`]s, one per mouth-shape
//! change.  The backend produces it once per utterance; the player only ever
//! reads it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// VisemeEvent
// ---------------------------------------------------------------------------

/// A single mouth-shape change.
///
/// Field names follow the backend's JSON (`offset`, `viseme_id`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisemeEvent {
    /// Milliseconds since playback start at which this shape becomes active.
    #[serde(rename = "offset")]
    pub offset_ms: f64,
    /// Opaque viseme identifier; `0` is silence by convention.
    pub viseme_id: u32,
}

impl VisemeEvent {
    pub fn new(offset_ms: f64, viseme_id: u32) -> Self {
        Self {
            offset_ms,
            viseme_id,
        }
    }
}

// ---------------------------------------------------------------------------
// TimelineError
// ---------------------------------------------------------------------------

/// Reasons a list of events cannot be used as a timeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// An offset is NaN, infinite or negative.
    #[error("event {index} has an invalid offset ({offset_ms} ms)")]
    InvalidOffset { index: usize, offset_ms: f64 },

    /// An event starts before its predecessor.
    #[error("event {index} at {offset_ms} ms precedes the previous event at {previous_ms} ms")]
    OutOfOrder {
        index: usize,
        offset_ms: f64,
        previous_ms: f64,
    },
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Validated, immutable sequence of viseme events, non-decreasing in offset.
///
/// An empty timeline is valid: playing it simply never touches the mesh.
///
/// ```
/// use avatar_lipsync::viseme::{Timeline, VisemeEvent};
///
/// let timeline = Timeline::new(vec![
///     VisemeEvent::new(0.0, 0),
///     VisemeEvent::new(120.0, 10),
/// ])
/// .unwrap();
/// assert_eq!(timeline.len(), 2);
/// assert!(Timeline::new(vec![VisemeEvent::new(50.0, 1), VisemeEvent::new(10.0, 2)]).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<VisemeEvent>,
}

impl Timeline {
    /// Validate `events` and wrap them.
    pub fn new(events: Vec<VisemeEvent>) -> Result<Self, TimelineError> {
        let mut previous_ms = 0.0_f64;
        for (index, event) in events.iter().enumerate() {
            if !event.offset_ms.is_finite() || event.offset_ms < 0.0 {
                return Err(TimelineError::InvalidOffset {
                    index,
                    offset_ms: event.offset_ms,
                });
            }
            if index > 0 && event.offset_ms < previous_ms {
                return Err(TimelineError::OutOfOrder {
                    index,
                    offset_ms: event.offset_ms,
                    previous_ms,
                });
            }
            previous_ms = event.offset_ms;
        }
        Ok(Self { events })
    }

    pub fn events(&self) -> &[VisemeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offset of the last event, or `0.0` for an empty timeline.
    pub fn last_offset_ms(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.offset_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
