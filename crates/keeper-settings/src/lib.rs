//! # keeper-settings
//!
//! Configuration for the keeper engine, loaded in three layers (lowest to
//! highest priority):
//!
//! 1. **Compiled defaults** from [`KeeperSettings::default()`]
//! 2. **Settings file** at `~/.keeper/settings.json`, deep-merged over the defaults
//! 3. **Environment** `KEEPER_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
