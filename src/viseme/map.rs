//! Viseme id → morph channel lookup.
//!
//! Avatar meshes expose their blend shapes as a name → index dictionary.
//! [`VisemeMap::from_morph_dictionary`] resolves the fixed viseme names
//! against that dictionary once, when the mesh loads.

use std::collections::HashMap;

/// Blend-shape name suffix for each viseme id, indexed by id.
pub const VISEME_NAMES: [&str; 15] = [
    "sil", "PP", "FF", "TH", "DD", "kk", "CH", "SS", "nn", "RR", "aa", "E", "ih", "oh", "ou",
];

/// Read-only mapping from viseme id to morph channel index.
///
/// Ids without an entry are no-ops when applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisemeMap {
    channels: HashMap<u32, usize>,
}

impl VisemeMap {
    /// Resolve [`VISEME_NAMES`] (each prefixed with `prefix`) against a
    /// mesh's morph-target dictionary.
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use avatar_lipsync::viseme::VisemeMap;
    ///
    /// let dict = HashMap::from([
    ///     ("viseme_sil".to_string(), 7),
    ///     ("viseme_aa".to_string(), 2),
    ///     ("eyeBlinkLeft".to_string(), 0),
    /// ]);
    /// let map = VisemeMap::from_morph_dictionary(&dict, "viseme_");
    /// assert_eq!(map.channel(0), Some(7));
    /// assert_eq!(map.channel(10), Some(2));
    /// assert_eq!(map.channel(1), None);
    /// ```
    pub fn from_morph_dictionary(dictionary: &HashMap<String, usize>, prefix: &str) -> Self {
        let channels: HashMap<u32, usize> = VISEME_NAMES
            .iter()
            .enumerate()
            .filter_map(|(id, name)| {
                dictionary
                    .get(&format!("{prefix}{name}"))
                    .map(|&channel| (id as u32, channel))
            })
            .collect();

        if channels.len() < VISEME_NAMES.len() {
            log::debug!(
                "viseme map: {} of {} visemes found on mesh",
                channels.len(),
                VISEME_NAMES.len()
            );
        }

        Self { channels }
    }

    /// Channel index for `viseme_id`, if the mesh has one.
    pub fn channel(&self, viseme_id: u32) -> Option<usize> {
        self.channels.get(&viseme_id).copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl FromIterator<(u32, usize)> for VisemeMap {
    fn from_iter<I: IntoIterator<Item = (u32, usize)>>(iter: I) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}
