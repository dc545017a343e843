//! Import preferences with XDG Base Directory compliance.
//!
//! This module stores the defaults the command-line front end uses to build
//! a scanner: where media is imported to, which files count as media and how
//! files are hashed.

use std::{
    env::var,
    fs::{create_dir_all, read_to_string, write},
    io::Error as StdError,
    path::PathBuf,
};

use {
    parking_lot::{RwLock, RwLockReadGuard},
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

use crate::importer::{media_types::default_extensions, scanner::SCAN_BATCH_SIZE};

/// Error type for settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read or write settings file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to serialize or deserialize settings.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// Invalid settings value.
    #[error("Invalid settings value: {reason}")]
    InvalidValue { reason: String },
}

/// How files are fingerprinted for duplicate detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStrategy {
    /// BLAKE3 digest of the file contents.
    #[default]
    Content,
    /// Size and modification time; cheap but approximate.
    Metadata,
}

/// Serializable import settings with default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Directory media is imported into, if configured.
    pub destination_directory: Option<PathBuf>,
    /// File extensions, without dots, treated as importable media.
    pub supported_extensions: Vec<String>,
    /// Files classified concurrently per batch in directory scans.
    pub scan_batch_size: usize,
    /// Whether hidden files and directories are scanned.
    pub include_hidden: bool,
    /// Fingerprint used for duplicate detection.
    pub hash_strategy: HashStrategy,
    /// Skip files that fail to classify instead of failing the scan.
    pub isolate_file_errors: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            destination_directory: None,
            supported_extensions: default_extensions(),
            scan_batch_size: SCAN_BATCH_SIZE,
            include_hidden: false,
            hash_strategy: HashStrategy::Content,
            isolate_file_errors: false,
        }
    }
}

impl ImportSettings {
    /// Configured destination, or `$HOME/Pictures` when none is set.
    #[must_use]
    pub fn destination(&self) -> PathBuf {
        self.destination_directory
            .clone()
            .unwrap_or_else(get_default_destination)
    }

    /// Checks values serde cannot rule out.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` for a zero batch size or an
    /// empty extension list.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.scan_batch_size == 0 {
            return Err(SettingsError::InvalidValue {
                reason: "scan_batch_size must be at least 1".to_string(),
            });
        }
        if self.supported_extensions.is_empty() {
            return Err(SettingsError::InvalidValue {
                reason: "supported_extensions must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Handles loading, saving, and validation of import settings.
#[derive(Debug)]
pub struct SettingsManager {
    /// Thread-safe settings storage.
    settings: RwLock<ImportSettings>,
    /// Path to the configuration file on disk.
    config_path: PathBuf,
}

impl Clone for SettingsManager {
    fn clone(&self) -> Self {
        Self {
            settings: RwLock::new(self.settings.read().clone()),
            config_path: self.config_path.clone(),
        }
    }
}

impl SettingsManager {
    /// Creates a new settings manager with default config path.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk.
    pub fn new() -> Result<Self, SettingsError> {
        Self::with_config_path(get_config_path())
    }

    /// Creates a new settings manager with a custom config path.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Custom path for the settings file
    ///
    /// # Returns
    ///
    /// A `Result` containing the `SettingsManager` or a `SettingsError`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the file exists but cannot be read, parsed
    /// or validated.
    pub fn with_config_path(config_path: PathBuf) -> Result<Self, SettingsError> {
        let settings = if config_path.exists() {
            debug!("Loading settings from existing file: {:?}", config_path);
            let contents = read_to_string(&config_path)?;
            let settings: ImportSettings = from_str(&contents)?;
            settings.validate()?;
            settings
        } else {
            debug!("No settings file at {:?}, using defaults", config_path);
            ImportSettings::default()
        };

        Ok(SettingsManager {
            settings: RwLock::new(settings),
            config_path,
        })
    }

    /// Gets the current settings.
    pub fn get_settings(&self) -> RwLockReadGuard<'_, ImportSettings> {
        self.settings.read()
    }

    /// Gets the configuration file path.
    pub fn get_config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Validates and applies new settings, then saves them to disk.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are invalid or cannot be saved.
    pub fn update_settings(&self, new_settings: ImportSettings) -> Result<(), SettingsError> {
        new_settings.validate()?;
        let mut settings_write = self.settings.write();
        *settings_write = new_settings;
        drop(settings_write);
        self.save_settings()
    }

    fn save_settings(&self) -> Result<(), SettingsError> {
        debug!("Saving settings to file: {:?}", self.config_path);
        if let Some(parent) = self.config_path.parent() {
            create_dir_all(parent)?;
        }
        let contents = to_string_pretty(&*self.settings.read())?;
        write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Location of the settings file under the XDG config home.
#[must_use]
pub fn get_config_path() -> PathBuf {
    let mut config_dir = get_xdg_config_home();
    config_dir.push("mediaimport");
    config_dir.push("settings.json");
    config_dir
}

/// Default import destination, `$HOME/Pictures`.
#[must_use]
pub fn get_default_destination() -> PathBuf {
    match var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join("Pictures"),
        _ => PathBuf::from("Pictures"),
    }
}

/// Gets the XDG config home directory following XDG Base Directory specification.
///
/// Uses `XDG_CONFIG_HOME` environment variable if set, otherwise defaults to $HOME/.config
fn get_xdg_config_home() -> PathBuf {
    if let Ok(config_home) = var("XDG_CONFIG_HOME")
        && !config_home.is_empty()
    {
        return PathBuf::from(config_home);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".config");
        return path;
    }

    PathBuf::from(".")
}
