//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Connection settings for the synthesis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the tutor backend (e.g. `http://localhost:5000`).
    ///
    /// Relative `audio_url` values in synthesis responses are resolved
    /// against it.
    pub base_url: String,
    /// Maximum seconds to wait for a synthesis response.  Synthesis runs an
    /// LLM and a TTS pass back to back, so this is generous.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LipSyncConfig
// ---------------------------------------------------------------------------

/// Settings for the viseme playback loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncConfig {
    /// Period of the per-frame tick in milliseconds (16 ≈ 60 Hz).
    pub frame_interval_ms: u64,
    /// Viseme id forced onto the mesh whenever playback stops.
    pub silence_viseme_id: u32,
    /// Prefix of the mesh's viseme blend shapes, e.g. `viseme_` for
    /// `viseme_sil`, `viseme_PP`, ...
    pub blend_shape_prefix: String,
}

impl LipSyncConfig {
    /// Frame period as a [`Duration`], clamped to at least 1 ms.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            silence_viseme_id: 0,
            blend_shape_prefix: "viseme_".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use avatar_lipsync::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Synthesis backend connection.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Viseme playback settings.
    #[serde(default)]
    pub lipsync: LipSyncConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
