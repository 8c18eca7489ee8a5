//! Environment-driven configuration.
//!
//! Variables are read once at start (after loading `.env` if present).
//! Parsing goes through a lookup function so it can be tested without
//! touching the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};

pub const BIND_ENV: &str = "HEALTH_HORIZON_BIND";
pub const DB_PATH_ENV: &str = "HEALTH_HORIZON_DB_PATH";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const MODEL_DIR_ENV: &str = "HEALTH_HORIZON_MODEL_DIR";
pub const REQUIRE_MODEL_ENV: &str = "HEALTH_HORIZON_REQUIRE_MODEL";
pub const REQUIRE_MANIFEST_ENV: &str = "HEALTH_HORIZON_REQUIRE_MANIFEST";
pub const LOG_MODE_ENV: &str = "HEALTH_HORIZON_LOG_MODE";
pub const LOG_FILE_ENV: &str = "HEALTH_HORIZON_LOG_FILE";
pub const SESSION_TTL_ENV: &str = "HEALTH_HORIZON_SESSION_TTL_SECS";
pub const MAX_SESSIONS_ENV: &str = "HEALTH_HORIZON_MAX_SESSIONS";

const DEFAULT_BIND: &str = "127.0.0.1:8050";
const DEFAULT_DB_PATH: &str = "health_horizon.db";
const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_LOG_FILE: &str = "data/health_horizon.log";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid listen address {value:?}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("{var}: expected a boolean, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var}: expected a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var}: expected stdout, file or auto, got {value:?}")]
    InvalidLogMode { var: &'static str, value: String },

    #[error("{var}: unsupported database URL {value:?} (only sqlite: is supported)")]
    UnsupportedDatabaseUrl { var: &'static str, value: String },
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Stdout,
    File,
    /// File when stdout is a terminal, stdout otherwise
    Auto,
}

impl LogMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdout" => Some(Self::Stdout),
            "file" => Some(Self::File),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Resolve `Auto` against whether stdout is interactive.
    #[must_use]
    pub fn use_file(self, interactive: bool) -> bool {
        match self {
            Self::Stdout => false,
            Self::File => true,
            Self::Auto => interactive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
    /// Refuse to start when model artifacts fail to load
    pub require_model: bool,
    /// Refuse artifacts that are not bound by a manifest
    pub require_manifest: bool,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
    /// Idle time after which a session is dropped
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` for values that cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    /// Returns `ConfigError` for values that cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get(BIND_ENV).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddress {
                var: BIND_ENV,
                value: bind_raw.clone(),
            })?;

        let db_path = match (get(DB_PATH_ENV), get(DATABASE_URL_ENV)) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(url)) => sqlite_path_from_url(&url)?,
            (None, None) => PathBuf::from(DEFAULT_DB_PATH),
        };

        let log_mode = match get(LOG_MODE_ENV) {
            Some(value) => LogMode::parse(&value).ok_or(ConfigError::InvalidLogMode {
                var: LOG_MODE_ENV,
                value,
            })?,
            None => LogMode::Auto,
        };

        Ok(Self {
            bind,
            db_path,
            model_dir: PathBuf::from(
                get(MODEL_DIR_ENV).unwrap_or_else(|| DEFAULT_MODEL_DIR.to_string()),
            ),
            require_model: parse_bool(REQUIRE_MODEL_ENV, get(REQUIRE_MODEL_ENV))?,
            require_manifest: parse_bool(REQUIRE_MANIFEST_ENV, get(REQUIRE_MANIFEST_ENV))?,
            log_mode,
            log_file: PathBuf::from(
                get(LOG_FILE_ENV).unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            ),
            session_ttl: parse_positive(SESSION_TTL_ENV, get(SESSION_TTL_ENV))?
                .map_or(DEFAULT_SESSION_TTL, Duration::from_secs),
            max_sessions: parse_positive(MAX_SESSIONS_ENV, get(MAX_SESSIONS_ENV))?
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(DEFAULT_MAX_SESSIONS),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8050)),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            require_model: false,
            require_manifest: false,
            log_mode: LogMode::Auto,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            session_ttl: DEFAULT_SESSION_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

fn parse_bool(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value }),
    }
}

fn parse_positive(var: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { var, value }),
    }
}

/// `sqlite:path`, `sqlite://path` or `sqlite:///abs/path`.
fn sqlite_path_from_url(url: &str) -> Result<PathBuf, ConfigError> {
    let rest = url
        .strip_prefix("sqlite:")
        .ok_or_else(|| ConfigError::UnsupportedDatabaseUrl {
            var: DATABASE_URL_ENV,
            value: url.to_string(),
        })?;
    let path = rest.strip_prefix("//").unwrap_or(rest);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::UnsupportedDatabaseUrl {
            var: DATABASE_URL_ENV,
            value: url.to_string(),
        });
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).expect("Should parse");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.bind.port(), 8050);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            (BIND_ENV, "0.0.0.0:9000"),
            (DB_PATH_ENV, "/var/lib/hh/history.db"),
            (MODEL_DIR_ENV, "/opt/models"),
            (REQUIRE_MODEL_ENV, "TRUE"),
            (REQUIRE_MANIFEST_ENV, "yes"),
            (LOG_MODE_ENV, "file"),
            (LOG_FILE_ENV, "/tmp/hh.log"),
            (SESSION_TTL_ENV, "90"),
            (MAX_SESSIONS_ENV, "500"),
        ])
        .expect("Should parse");

        assert_eq!(cfg.bind.port(), 9000);
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/hh/history.db"));
        assert_eq!(cfg.model_dir, PathBuf::from("/opt/models"));
        assert!(cfg.require_model);
        assert!(cfg.require_manifest);
        assert_eq!(cfg.log_mode, LogMode::File);
        assert_eq!(cfg.log_file, PathBuf::from("/tmp/hh.log"));
        assert_eq!(cfg.session_ttl, Duration::from_secs(90));
        assert_eq!(cfg.max_sessions, 500);
    }

    #[test]
    fn test_database_url() {
        let cfg = config(&[(DATABASE_URL_ENV, "sqlite://data/app.db?mode=rwc")])
            .expect("Should parse");
        assert_eq!(cfg.db_path, PathBuf::from("data/app.db"));

        let cfg = config(&[(DATABASE_URL_ENV, "sqlite:history.db")]).expect("Should parse");
        assert_eq!(cfg.db_path, PathBuf::from("history.db"));

        let cfg = config(&[(DB_PATH_ENV, "explicit.db"), (DATABASE_URL_ENV, "sqlite:other.db")])
            .expect("Should parse");
        assert_eq!(cfg.db_path, PathBuf::from("explicit.db"));

        assert!(matches!(
            config(&[(DATABASE_URL_ENV, "postgres://localhost/hh")]),
            Err(ConfigError::UnsupportedDatabaseUrl { .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[(BIND_ENV, "localhost")]),
            Err(ConfigError::InvalidAddress { .. })
        ));
        assert!(matches!(
            config(&[(REQUIRE_MODEL_ENV, "maybe")]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            config(&[(SESSION_TTL_ENV, "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            config(&[(MAX_SESSIONS_ENV, "lots")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            config(&[(LOG_MODE_ENV, "syslog")]),
            Err(ConfigError::InvalidLogMode { .. })
        ));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let cfg = config(&[(BIND_ENV, "  "), (REQUIRE_MODEL_ENV, "")]).expect("Should parse");
        assert_eq!(cfg.bind, AppConfig::default().bind);
        assert!(!cfg.require_model);
    }

    #[test]
    fn test_log_mode_resolution() {
        assert!(LogMode::Auto.use_file(true));
        assert!(!LogMode::Auto.use_file(false));
        assert!(LogMode::File.use_file(false));
        assert!(!LogMode::Stdout.use_file(true));
    }
}
