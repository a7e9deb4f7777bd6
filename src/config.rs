//! Runtime configuration from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `DELIRISK_MODEL_DIR` | `models` | directory holding the model artifacts |
//! | `DELIRISK_REQUIRE_MANIFEST` | `false` | refuse artifacts without `manifest.json` |
//! | `DELIRISK_EXPORT_URL` | unset | HTTP collector endpoint |
//! | `DELIRISK_EXPORT_TIMEOUT_SECS` | unset | per-request deadline for the collector |
//! | `DELIRISK_DB_PATH` | unset | SQLite export target |
//! | `DELIRISK_LOG_MODE` | `auto` | `auto`, `file` or `stdout` |
//! | `DELIRISK_LOG_FILE` | `delirisk.log` | log file used in file mode |

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const MODEL_DIR_ENV: &str = "DELIRISK_MODEL_DIR";
const REQUIRE_MANIFEST_ENV: &str = "DELIRISK_REQUIRE_MANIFEST";
const EXPORT_URL_ENV: &str = "DELIRISK_EXPORT_URL";
const EXPORT_TIMEOUT_ENV: &str = "DELIRISK_EXPORT_TIMEOUT_SECS";
const DB_PATH_ENV: &str = "DELIRISK_DB_PATH";
const LOG_MODE_ENV: &str = "DELIRISK_LOG_MODE";
const LOG_FILE_ENV: &str = "DELIRISK_LOG_FILE";

/// Error type for configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// File when attached to a terminal, stdout otherwise.
    Auto,
    File,
    Stdout,
}

/// Where scoring records are exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    Http {
        url: String,
        timeout: Option<Duration>,
    },
    Sqlite {
        path: PathBuf,
    },
    /// Score without exporting.
    Disabled,
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model_dir: PathBuf,
    pub require_manifest: bool,
    pub export: ExportTarget,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Read settings from an explicit variable map.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let model_dir = get(MODEL_DIR_ENV).map_or_else(|| PathBuf::from("models"), PathBuf::from);
        let require_manifest = get(REQUIRE_MANIFEST_ENV).is_some_and(|v| parse_bool(&v));

        let timeout = match get(EXPORT_TIMEOUT_ENV) {
            None => None,
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: EXPORT_TIMEOUT_ENV,
                        expected: "a positive number of seconds",
                        value: v,
                    })
                }
            },
        };

        let export = match (get(EXPORT_URL_ENV), get(DB_PATH_ENV)) {
            (Some(url), _) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::Invalid {
                        name: EXPORT_URL_ENV,
                        expected: "an http:// or https:// URL",
                        value: url,
                    });
                }
                ExportTarget::Http { url, timeout }
            }
            (None, Some(path)) => ExportTarget::Sqlite {
                path: PathBuf::from(path),
            },
            (None, None) => ExportTarget::Disabled,
        };

        let log_mode = match get(LOG_MODE_ENV).as_deref() {
            None | Some("auto") => LogMode::Auto,
            Some("file") => LogMode::File,
            Some("stdout") => LogMode::Stdout,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_MODE_ENV,
                    expected: "one of auto, file, stdout",
                    value: other.to_string(),
                })
            }
        };
        let log_file =
            get(LOG_FILE_ENV).map_or_else(|| PathBuf::from("delirisk.log"), PathBuf::from);

        Ok(Self {
            model_dir,
            require_manifest,
            export,
            log_mode,
            log_file,
        })
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v, "1" | "true" | "TRUE" | "yes" | "YES")
}
