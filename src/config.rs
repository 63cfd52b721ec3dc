//! Configuration system using TOML files.
//!
//! Settings are stored in the OS-standard config directory:
//! - Windows: %APPDATA%\plex-music-search\config.toml
//! - macOS: ~/Library/Application Support/plex-music-search/config.toml
//! - Linux: ~/.config/plex-music-search/config.toml
//!
//! The file is human-readable and editable; every section and field is
//! optional. The search engine only ever sees an immutable snapshot handed
//! out by [`SettingsStore`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::credentials::{Credentials, MASK, sanitize_credentials};
use crate::search::approach::validate_approaches;
use crate::search::plex::DEFAULT_HUB_LIMIT;
use crate::search::scoring::compile_filters;
use crate::search::{
    MatchFilterConfig, ScoringConfig, SearchApproachConfig, SearchError, TextProcessingConfig,
    default_approaches, default_match_filters,
};

/// Default per-call catalog timeout
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Plex server connection
    pub plex: PlexSettings,

    /// slskd download service
    pub slskd: SlskdSettings,

    /// Search engine tuning
    pub search: SearchSettings,
}

/// Plex server connection
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexSettings {
    /// Server URI, e.g. `http://192.168.1.10:32400`
    pub uri: String,

    /// `X-Plex-Token`
    pub token: String,
}

impl PlexSettings {
    pub fn is_configured(&self) -> bool {
        !self.uri.trim().is_empty() && !self.token.trim().is_empty()
    }
}

impl fmt::Debug for PlexSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlexSettings")
            .field("uri", &self.uri)
            .field("token", &if self.token.is_empty() { "" } else { MASK })
            .finish()
    }
}

/// slskd download service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlskdSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Seconds to wait for a search to complete
    pub search_timeout: u64,

    /// Download attempts per track
    pub retry_limit: u32,
}

impl Default for SlskdSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            username: None,
            password: None,
            search_timeout: 15,
            retry_limit: 5,
        }
    }
}

impl SlskdSettings {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for SlskdSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = sanitize_credentials(&self.credentials());
        f.debug_struct("SlskdSettings")
            .field("base_url", &masked.base_url)
            .field("api_key", &masked.api_key)
            .field("username", &masked.username)
            .field("password", &masked.password)
            .field("search_timeout", &self.search_timeout)
            .field("retry_limit", &self.retry_limit)
            .finish()
    }
}

/// Search engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Timeout for each catalog call
    pub search_timeout_secs: u64,

    /// Results requested per hub search
    pub max_results: u32,

    /// Approaches, tried in order
    pub approaches: Vec<SearchApproachConfig>,

    /// Match filter tiers, strictest first
    pub match_filters: Vec<MatchFilterConfig>,

    pub text_processing: TextProcessingConfig,

    pub scoring: ScoringConfig,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            max_results: DEFAULT_HUB_LIMIT,
            approaches: default_approaches(),
            match_filters: default_match_filters(),
            text_processing: TextProcessingConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl SearchSettings {
    /// Check approach ids, filter expressions, the match threshold and field weights
    pub fn validate(&self) -> Result<(), SearchError> {
        validate_approaches(&self.approaches).map_err(SearchError::Config)?;
        compile_filters(&self.match_filters)?;

        let threshold = self.scoring.match_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SearchError::Config(format!(
                "match_threshold must be between 0 and 1, got {}",
                threshold
            )));
        }

        self.scoring.weights.validate().map_err(SearchError::Config)?;
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plex-music-search"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load settings from the default location
///
/// Returns defaults if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return usable settings.
pub fn load() -> Settings {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!("Could not determine config directory, using defaults");
            Settings::default()
        }
    }
}

/// Load settings from `path`, falling back to defaults
pub fn load_from(path: &Path) -> Settings {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Settings::default();
    }

    let settings: Settings = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}, using defaults", path, e);
                return Settings::default();
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}, using defaults", path, e);
            return Settings::default();
        }
    };

    if let Err(e) = settings.search.validate() {
        tracing::warn!("Invalid search settings in {:?}: {}, using default search settings", path, e);
        return Settings {
            search: SearchSettings::default(),
            ..settings
        };
    }

    tracing::info!("Loaded config from {:?}", path);
    settings
}

/// Save settings to the default location
pub fn save(settings: &Settings) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(settings, &path)
}

/// Save settings to `path`
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(settings).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Settings Store
// ============================================================================

/// Process-wide settings holder.
///
/// Readers get an `Arc` snapshot that never changes under them; writers
/// persist first and then swap the snapshot.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    /// A store backed by `path` (or nothing, for in-memory use)
    pub fn new(path: Option<PathBuf>, settings: Settings) -> Self {
        Self {
            path,
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Load from `path`, or the default location when `None`
    pub fn open(path: Option<PathBuf>) -> Self {
        let path = path.or_else(config_path);
        let settings = path.as_deref().map(load_from).unwrap_or_default();
        Self::new(path, settings)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current settings
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.read().clone()
    }

    /// Validate, persist and publish new settings
    pub fn replace(&self, settings: Settings) -> Result<Arc<Settings>, ConfigError> {
        settings
            .search
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if let Some(path) = &self.path {
            save_to(&settings, path)?;
        }

        let settings = Arc::new(settings);
        *self.current.write() = settings.clone();
        Ok(settings)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================
