//! Credentials check and config file management.

use std::path::{Path, PathBuf};

use crate::config::{self, Settings, SettingsStore};
use crate::credentials::{
    Credentials, sanitize_credentials, validate_credentials, validate_credentials_json,
};
use crate::error::{Error, ResultExt};

use super::ConfigAction;

/// Credentials to check and whether they are usable
fn resolve_credentials(
    settings: &Settings,
    base_url: Option<&str>,
    api_key: Option<&str>,
    json: Option<&Path>,
) -> anyhow::Result<(Credentials, bool)> {
    if let Some(path) = json {
        if !path.exists() {
            return Err(Error::not_found(path).into());
        }
        let text = std::fs::read_to_string(path).with_context(format!("reading {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text).map_err(Error::from)?;
        let valid = validate_credentials_json(&value);
        let credentials = serde_json::from_value(value).unwrap_or_default();
        return Ok((credentials, valid));
    }

    let mut credentials = settings.slskd.credentials();
    if let Some(url) = base_url {
        credentials.base_url = Some(url.to_string());
    }
    if let Some(key) = api_key {
        credentials.api_key = Some(key.to_string());
    }
    let valid = validate_credentials(&credentials);
    Ok((credentials, valid))
}

/// Check slskd credentials from flags, a JSON file or the config file
pub fn cmd_credentials(
    config: Option<PathBuf>,
    base_url: Option<&str>,
    api_key: Option<&str>,
    json: Option<&Path>,
) -> anyhow::Result<()> {
    let settings = SettingsStore::open(config).snapshot();
    let (credentials, valid) = resolve_credentials(&settings, base_url, api_key, json)?;

    let shown = sanitize_credentials(&credentials);
    println!("Base URL: {}", shown.base_url.as_deref().unwrap_or("(not set)"));
    println!("API key:  {}", shown.api_key.as_deref().unwrap_or("(not set)"));
    if let Some(username) = &shown.username {
        println!("Username: {}", username);
    }

    if !valid {
        println!("✗ Credentials are not usable");
        anyhow::bail!("invalid credentials");
    }
    println!("✓ Credentials look valid");
    Ok(())
}

/// Parse `path` strictly, without falling back to defaults
fn check_config_file(path: &Path) -> anyhow::Result<Settings> {
    if !path.exists() {
        return Err(Error::not_found(path).into());
    }
    let text = std::fs::read_to_string(path).with_context(format!("reading {}", path.display()))?;
    let settings: Settings = toml::from_str(&text)
        .map_err(|e| Error::invalid(format!("{}: {}", path.display(), e)))?;
    settings.search.validate()?;
    Ok(settings)
}

/// Show, locate, create or check the config file
pub fn cmd_config(config: Option<PathBuf>, action: ConfigAction) -> anyhow::Result<()> {
    let path = config.or_else(config::config_path);

    match action {
        ConfigAction::Path => match &path {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("Could not determine config directory"),
        },
        ConfigAction::Show => {
            let settings = SettingsStore::open(path).snapshot();
            println!("{:#?}", settings);
        }
        ConfigAction::Init => {
            let path = path.ok_or(config::ConfigError::NoConfigDir)?;
            if path.exists() {
                println!("Config file already exists: {}", path.display());
            } else {
                config::save_to(&Settings::default(), &path)?;
                println!("✓ Wrote default settings to {}", path.display());
            }
        }
        ConfigAction::Validate => {
            let path = path.ok_or(config::ConfigError::NoConfigDir)?;
            let settings = check_config_file(&path)?;
            println!("✓ {} is valid", path.display());
            if !settings.plex.is_configured() {
                println!("  (no Plex connection configured)");
            }
            println!("  {} search approaches", settings.search.approaches.len());
            println!("  {} match filters", settings.search.match_filters.len());
        }
    }
    Ok(())
}
