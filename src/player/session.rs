//! Per-play-event session state: the time anchor and the timeline cursor.
//!
//! A [`PlaybackSession`] is created for every `Play` event and owned by the
//! frame loop that runs it.  It is deliberately free of I/O so the cursor
//! rules can be exercised with plain numbers.

use tokio::time::Instant;

use crate::viseme::{Timeline, VisemeEvent};

/// Cursor and clock anchor for one run of synchronized playback.
///
/// The anchor is taken from the first rendered frame rather than from the
/// moment playback was requested, so buffering latency between `play()` and
/// the first frame does not shift the whole timeline.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    start: Option<Instant>,
    cursor: usize,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the active event.  Never decreases within a session.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Milliseconds since the first frame.  The first call sets the anchor
    /// and returns `0.0`.
    pub fn elapsed_ms(&mut self, now: Instant) -> f64 {
        let start = *self.start.get_or_insert(now);
        now.saturating_duration_since(start).as_nanos() as f64 / 1_000_000.0
    }

    /// Move the cursor forward past every event whose offset has been
    /// reached and return the active event.
    ///
    /// An offset equal to `elapsed_ms` counts as reached, so of several
    /// events sharing one offset only the last is ever active.  An
    /// `elapsed_ms` earlier than a previous call leaves the cursor where it
    /// is.  Returns `None` only for an empty timeline.
    pub fn advance<'t>(&mut self, timeline: &'t Timeline, elapsed_ms: f64) -> Option<&'t VisemeEvent> {
        let events = timeline.events();
        while self.cursor + 1 < events.len() && elapsed_ms >= events[self.cursor + 1].offset_ms {
            self.cursor += 1;
        }
        events.get(self.cursor)
    }

    /// One frame: anchor if needed, then advance to `now`.
    pub fn frame<'t>(&mut self, timeline: &'t Timeline, now: Instant) -> Option<&'t VisemeEvent> {
        let elapsed = self.elapsed_ms(now);
        self.advance(timeline, elapsed)
    }
}
