//! # pvue-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PvueSettings::default()`]
//! 2. **User file**: `~/.pvue/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PVUE_*` overrides (highest priority)
//!
//! Command-line flags are applied by the binary on top of the loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
