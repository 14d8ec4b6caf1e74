//! Process-wide state: resolved configuration, internal domains and the
//! database handle.
//!
//! Configuration is read once at startup from `~/.transcript-gate/config.json`
//! and the environment. Nothing below this layer reads either; the internal
//! domain set is passed explicitly to the classifier.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::db::{DbError, TranscriptDb};
use crate::error::{GateError, Result};
use crate::normalize::InternalDomains;
use crate::types::Config;

pub const ENV_ALLOWED_EMAIL_DOMAINS: &str = "ALLOWED_EMAIL_DOMAINS";
pub const ENV_DATABASE_PATH: &str = "TRANSCRIPT_GATE_DB";

pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
    Ok(home.join(".transcript-gate").join("config.json"))
}

/// Read the config file at `path`. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| GateError::Config(format!("Failed to read config: {}", e)))?;
    serde_json::from_str(&content)
        .map_err(|e| GateError::Config(format!("Failed to parse config: {}", e)))
}

/// Non-empty environment values win over the file.
pub fn apply_overrides(
    mut config: Config,
    allowed_email_domains: Option<String>,
    database_path: Option<String>,
) -> Config {
    if let Some(domains) = allowed_email_domains.filter(|v| !v.trim().is_empty()) {
        config.allowed_email_domains = Some(domains);
    }
    if let Some(path) = database_path.filter(|v| !v.trim().is_empty()) {
        config.database_path = Some(path);
    }
    config
}

/// Config file plus environment overrides.
pub fn load_config() -> Result<Config> {
    let config = load_config_from(&config_path()?)?;
    Ok(apply_overrides(
        config,
        std::env::var(ENV_ALLOWED_EMAIL_DOMAINS).ok(),
        std::env::var(ENV_DATABASE_PATH).ok(),
    ))
}

pub struct AppState {
    pub config: Config,
    pub internal_domains: InternalDomains,
    pub db: Mutex<TranscriptDb>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let db = match config.database_path.as_deref() {
            Some(path) => TranscriptDb::open_at(PathBuf::from(path))?,
            None => TranscriptDb::open()?,
        };
        Ok(Self::with_db(config, db))
    }

    pub fn with_db(config: Config, db: TranscriptDb) -> Self {
        let internal_domains = InternalDomains::from_config(config.allowed_email_domains.as_deref());
        log::info!(
            "Internal domains: {}",
            internal_domains.iter().collect::<Vec<_>>().join(", ")
        );
        Self {
            config,
            internal_domains,
            db: Mutex::new(db),
        }
    }

    pub fn load() -> Result<Self> {
        Self::new(load_config()?)
    }
}
