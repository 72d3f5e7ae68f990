//! Launcher configuration.
//!
//! The launcher reads a single TOML file. Its location is resolved in order:
//!
//! 1. `--config <path>` on the command line
//! 2. the `SIGNED_LAUNCHER_CONFIG` environment variable
//! 3. `launcher.toml` in the working directory
//!
//! ```toml
//! release_url = "https://api.github.com/repos/acme/tool/releases/latest"
//! public_key_url = "https://keys.acme.example/tool.pub"
//! default_executable = "tool-win.exe"
//! install_dir = "."
//!
//! [platforms]
//! win = "tool-win.exe"
//! linux = "tool-linux"
//! macos = "tool-macos"
//! ```
//!
//! The public key URL is configured here on purpose and never taken from the
//! release: the key must come from a channel the release publisher does not
//! control.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "SIGNED_LAUNCHER_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "launcher.toml";

/// Problems with the configuration or the executable selection.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    NotFound {
        path: PathBuf,
    },

    #[error("failed to read configuration from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration from {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        field: String,
        reason: String,
    },

    #[error("Unknown platform '{platform}' (known: {known})")]
    UnknownPlatform {
        platform: String,
        known: String,
    },
}

/// Which executable to update and launch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// The configured `default_executable`.
    #[default]
    Default,
    /// An explicit file name (`exe=<name>`).
    Executable(String),
    /// A configured platform (`os=<platform>`).
    Platform(String),
}

fn default_install_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_user_agent() -> String {
    format!("signed-launcher/{}", env!("CARGO_PKG_VERSION"))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

const fn default_max_log_files() -> usize {
    10
}

const fn default_max_log_size() -> u64 {
    1024 * 1024
}

/// Contents of `launcher.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    /// Release-listing endpoint, e.g. GitHub's `releases/latest`.
    pub release_url: String,

    /// Where the trusted minisign public key is published.
    pub public_key_url: String,

    /// Executable used when no override is given.
    pub default_executable: String,

    /// Platform id to executable file name, for `os=<platform>`.
    #[serde(default)]
    pub platforms: BTreeMap<String, String>,

    /// Directory holding the executable and its signature. Relative paths are
    /// resolved against the configuration file's directory.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout. No timeout when unset.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Directory for rotated log files, resolved like `install_dir`.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Number of log files kept, the live one included.
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,

    /// Size in bytes past which the log is rotated at start-up.
    #[serde(default = "default_max_log_size")]
    pub max_log_size: u64,
}

impl LauncherConfig {
    /// Resolve the configuration path from the flag, the environment, then
    /// the working directory.
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load and validate the configuration at `path`.
    ///
    /// Relative `install_dir` and `log_dir` are anchored at the file's
    /// directory so the launcher behaves the same from any working directory.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse {
                source, ..
            } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.install_dir = anchor(base, &config.install_dir);
            config.log_dir = anchor(base, &config.log_dir);
        }

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate TOML content without touching the filesystem.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check URLs and file names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("release_url", &self.release_url)?;
        check_url("public_key_url", &self.public_key_url)?;
        check_file_name("default_executable", &self.default_executable)?;

        for (platform, executable) in &self.platforms {
            check_file_name(&format!("platforms.{platform}"), executable)?;
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.max_log_files == 0 {
            return Err(invalid("max_log_files", "must be at least 1"));
        }
        Ok(())
    }

    /// File name of the executable chosen by `selection`.
    pub fn executable_for(&self, selection: &Selection) -> Result<String, ConfigError> {
        match selection {
            Selection::Default => Ok(self.default_executable.clone()),
            Selection::Executable(name) => {
                check_file_name("exe", name)?;
                Ok(name.clone())
            }
            Selection::Platform(platform) => {
                self.platforms.get(platform).cloned().ok_or_else(|| ConfigError::UnknownPlatform {
                    platform: platform.clone(),
                    known: if self.platforms.is_empty() {
                        "none".to_string()
                    } else {
                        self.platforms.keys().cloned().collect::<Vec<_>>().join(", ")
                    },
                })
            }
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(invalid(field, "must be an http(s) URL"));
    }
    Ok(())
}

/// A bare file name: no separators, no `.`/`..`.
fn check_file_name(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(invalid(field, "must be a plain file name"));
    }
    Ok(())
}
