use crate::error::FsError;
use crate::fs::memory::{lexical_root, CaseSensitivity};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CURRENT_DIR: &str = "/";
const DEFAULT_TEMP_DIR: &str = "/tmp";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_IMPLICIT_DIRECTORIES: bool = false;
const DEFAULT_TRACK_ACCESS_TIME: bool = true;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to read manifest {path}: {source}")]
    ManifestRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse manifest {origin}: {error}")]
    ManifestParse { origin: String, error: String },

    #[error("Failed to seed {path}: {source}")]
    Seed {
        path: String,
        #[source]
        source: FsError,
    },
}

/// Construction-time settings for the in-memory file system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    pub case_sensitivity: CaseSensitivity,
    pub current_dir: String,
    pub temp_dir: String,
    /// Create missing ancestor directories on write instead of failing
    pub implicit_directories: bool,
    pub track_access_time: bool,
    pub log_level: String,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            case_sensitivity: CaseSensitivity::Insensitive,
            current_dir: DEFAULT_CURRENT_DIR.to_string(),
            temp_dir: DEFAULT_TEMP_DIR.to_string(),
            implicit_directories: DEFAULT_IMPLICIT_DIRECTORIES,
            track_access_time: DEFAULT_TRACK_ACCESS_TIME,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl EmulatorConfig {
    /// Defaults overridden by `FSDOUBLE_*` environment variables.
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let case_sensitivity = env::var("FSDOUBLE_CASE_SENSITIVE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .map(|sensitive| {
                if sensitive {
                    CaseSensitivity::Sensitive
                } else {
                    CaseSensitivity::Insensitive
                }
            })
            .unwrap_or_default();

        let current_dir =
            env::var("FSDOUBLE_CURRENT_DIR").unwrap_or_else(|_| DEFAULT_CURRENT_DIR.to_string());

        let temp_dir =
            env::var("FSDOUBLE_TEMP_DIR").unwrap_or_else(|_| DEFAULT_TEMP_DIR.to_string());

        let implicit_directories = env::var("FSDOUBLE_IMPLICIT_DIRS")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(DEFAULT_IMPLICIT_DIRECTORIES);

        let track_access_time = env::var("FSDOUBLE_TRACK_ACCESS_TIME")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(DEFAULT_TRACK_ACCESS_TIME);

        let log_level = env::var("FSDOUBLE_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            case_sensitivity,
            current_dir,
            temp_dir,
            implicit_directories,
            track_access_time,
            log_level,
        }
    }

    pub fn case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitivity = if sensitive {
            CaseSensitivity::Sensitive
        } else {
            CaseSensitivity::Insensitive
        };
        self
    }

    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.current_dir = dir.into();
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<String>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn implicit_directories(mut self, implicit: bool) -> Self {
        self.implicit_directories = implicit;
        self
    }

    pub fn track_access_time(mut self, track: bool) -> Self {
        self.track_access_time = track;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if lexical_root(Path::new(&self.current_dir)).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Current directory must be absolute: {}",
                self.current_dir
            )));
        }
        if lexical_root(Path::new(&self.temp_dir)).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Temp directory must be absolute: {}",
                self.temp_dir
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }
}

impl fmt::Display for EmulatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Emulator Configuration:")?;
        writeln!(f, "  Case Sensitivity: {:?}", self.case_sensitivity)?;
        writeln!(f, "  Current Dir: {}", self.current_dir)?;
        writeln!(f, "  Temp Dir: {}", self.temp_dir)?;
        writeln!(f, "  Implicit Directories: {}", self.implicit_directories)?;
        writeln!(f, "  Track Access Time: {}", self.track_access_time)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
