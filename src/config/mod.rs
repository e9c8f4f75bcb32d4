//! Configuration module for the avatar lip-sync player.
//!
//! Provides `AppConfig` (top-level settings), the backend and lip-sync
//! sub-configs, `AppPaths` for the platform config directory, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, BackendConfig, LipSyncConfig};
