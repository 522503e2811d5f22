//! Runtime configuration.
//!
//! # Responsibility
//! - Load `AppConfig` from an optional JSON file.
//! - Apply `HOMEBOOK_*` environment overrides on top.
//!
//! # Invariants
//! - Every field has a usable default; an absent file is not an error.
//! - Blank override values are ignored.

use crate::engine::command::DEFAULT_COMPLETION_PERCENT;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "HOMEBOOK_DB_PATH";
pub const ENV_LOG_DIR: &str = "HOMEBOOK_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "HOMEBOOK_LOG_LEVEL";
pub const ENV_COMPLETION_PERCENT: &str = "HOMEBOOK_COMPLETION_PERCENT";
pub const ENV_PASSWORD_SHA256: &str = "HOMEBOOK_PASSWORD_SHA256";

const DB_FILE_NAME: &str = "homebook.sqlite3";
const LOG_DIR_NAME: &str = "homebook-logs";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidValue {
        key: &'static str,
        value: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidValue { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Must be absolute when logging is enabled.
    pub log_dir: PathBuf,
    pub log_level: String,
    pub default_completion_percent: u32,
    /// Lowercase hex SHA-256 of the shared password. While unset, every
    /// gated command is refused.
    pub password_sha256: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DB_FILE_NAME),
            log_dir: std::env::temp_dir().join(LOG_DIR_NAME),
            log_level: crate::logging::default_log_level().to_string(),
            default_completion_percent: DEFAULT_COMPLETION_PERCENT,
            password_sha256: None,
        }
    }
}

impl AppConfig {
    /// Reads `path` when given and present, then applies process env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from `lookup`, keyed by the `HOMEBOOK_*` names.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(raw) = value(ENV_DB_PATH) {
            self.db_path = PathBuf::from(raw);
        }
        if let Some(raw) = value(ENV_LOG_DIR) {
            self.log_dir = PathBuf::from(raw);
        }
        if let Some(raw) = value(ENV_LOG_LEVEL) {
            self.log_level = raw;
        }
        if let Some(raw) = value(ENV_COMPLETION_PERCENT) {
            self.default_completion_percent =
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_COMPLETION_PERCENT,
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = value(ENV_PASSWORD_SHA256) {
            self.password_sha256 = Some(raw);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, ENV_COMPLETION_PERCENT, ENV_DB_PATH, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homebook.json");
        std::fs::write(&path, r#"{ "default_completion_percent": 40 }"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.default_completion_percent, 40);
        assert_eq!(config.password_sha256, None);
        assert_eq!(config.log_level, AppConfig::default().log_level);
    }

    #[test]
    fn overrides_replace_file_values_and_skip_blanks() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup(&[
                (ENV_DB_PATH, "/data/books.sqlite3"),
                (ENV_LOG_LEVEL, "   "),
                (ENV_COMPLETION_PERCENT, "65"),
            ]))
            .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/data/books.sqlite3"));
        assert_eq!(config.log_level, AppConfig::default().log_level);
        assert_eq!(config.default_completion_percent, 65);
    }

    #[test]
    fn non_numeric_completion_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_COMPLETION_PERCENT, "most")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
