//! Import preferences and persistent settings.
//!
//! This module provides settings management with XDG Base Directory
//! compliance.

pub mod settings;

pub use settings::{
    HashStrategy, ImportSettings, SettingsError, SettingsManager, get_config_path,
    get_default_destination,
};
