//! # puppet-settings
//!
//! Configuration for the cluster orchestrator, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`PuppetSettings::default()`]
//! 2. **Settings file**: `./puppet.json` or `$PUPPET_SETTINGS` (deep-merged)
//! 3. **Environment variables**: `PUPPET_*` overrides (highest priority)
//!
//! The scenario is a configuration value, not an interactive choice: one
//! session runs exactly one scenario.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
