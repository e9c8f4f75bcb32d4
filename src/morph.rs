//! Morph-target sinks: the mesh side of lip-sync.
//!
//! A [`MorphTargetSink`] exposes the blend-shape weight array of an avatar
//! mesh.  [`apply_viseme`] is the only writer: it zeroes every weight and
//! fully activates the one channel mapped from the viseme id.  Missing
//! weights, unmapped ids and out-of-range channels all degrade to no-ops.

use std::sync::{Arc, Mutex};

use crate::viseme::VisemeMap;

// ---------------------------------------------------------------------------
// MorphTargetSink trait
// ---------------------------------------------------------------------------

/// Mutable access to a mesh's morph-target weights.
pub trait MorphTargetSink {
    /// The weight array, or `None` when the mesh has no morph targets.
    fn weights_mut(&mut self) -> Option<&mut [f32]>;
}

/// A sink shared between the playback task and the renderer.
pub type SharedMorphSink = Arc<Mutex<dyn MorphTargetSink + Send>>;

// ---------------------------------------------------------------------------
// MorphWeights
// ---------------------------------------------------------------------------

/// In-memory weight array, e.g. mirrored into the renderer each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphWeights {
    weights: Option<Vec<f32>>,
}

impl MorphWeights {
    /// `channels` weights, all zero.
    pub fn new(channels: usize) -> Self {
        Self {
            weights: Some(vec![0.0; channels]),
        }
    }

    /// A sink for a mesh without morph targets.
    pub fn detached() -> Self {
        Self { weights: None }
    }

    pub fn weights(&self) -> Option<&[f32]> {
        self.weights.as_deref()
    }

    /// Index of the first fully-activated channel.
    pub fn active_channel(&self) -> Option<usize> {
        self.weights()?.iter().position(|&w| w >= 1.0)
    }

    /// Wrap into a [`SharedMorphSink`] while keeping a typed handle for
    /// reading the weights back.
    pub fn shared(self) -> (SharedMorphSink, Arc<Mutex<MorphWeights>>) {
        let typed = Arc::new(Mutex::new(self));
        let sink: SharedMorphSink = typed.clone();
        (sink, typed)
    }
}

impl MorphTargetSink for MorphWeights {
    fn weights_mut(&mut self) -> Option<&mut [f32]> {
        self.weights.as_deref_mut()
    }
}

impl MorphTargetSink for Vec<f32> {
    fn weights_mut(&mut self) -> Option<&mut [f32]> {
        Some(self.as_mut_slice())
    }
}

// ---------------------------------------------------------------------------
// Mouth-shape application
// ---------------------------------------------------------------------------

/// Reset every weight to 0, then set the channel mapped from `viseme_id`
/// to 1.0.
///
/// ```
/// use avatar_lipsync::morph::{apply_viseme, MorphWeights};
/// use avatar_lipsync::viseme::VisemeMap;
///
/// let map: VisemeMap = [(0, 5), (10, 2)].into_iter().collect();
/// let mut weights = MorphWeights::new(8);
/// apply_viseme(&mut weights, &map, 10);
/// assert_eq!(weights.active_channel(), Some(2));
/// ```
pub fn apply_viseme(sink: &mut dyn MorphTargetSink, map: &VisemeMap, viseme_id: u32) {
    let Some(weights) = sink.weights_mut() else {
        return;
    };

    weights.iter_mut().for_each(|w| *w = 0.0);
    let len = weights.len();

    match map.channel(viseme_id) {
        Some(channel) => match weights.get_mut(channel) {
            Some(w) => *w = 1.0,
            None => log::trace!("viseme {viseme_id}: channel {channel} outside {len} weights"),
        },
        None => log::trace!("viseme {viseme_id}: no morph channel"),
    }
}

/// Lock `sink` and apply `viseme_id`, recovering from a poisoned lock.
///
/// Used on every frame and on every teardown path, so it never panics.
pub(crate) fn apply_shared(sink: &SharedMorphSink, map: &VisemeMap, viseme_id: u32) {
    let mut guard = match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("morph sink lock poisoned; recovering");
            poisoned.into_inner()
        }
    };
    apply_viseme(&mut *guard, map, viseme_id);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
