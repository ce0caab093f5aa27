//! Local CLI configuration.
//!
//! Stored as pretty JSON at `$HOME/.oiler/.config.json` unless `--config`
//! points elsewhere. A missing file is not an error: the defaults apply
//! until the first `oiler config set`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

const CONFIG_DIR: &str = ".oiler";
const CONFIG_FILE: &str = ".config.json";
const STORE_DIR: &str = "store";
const DEFAULT_NAMESPACE: &str = "default";

/// Errors from loading, editing, or saving the local configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot determine home directory (HOME / USERPROFILE not set)")]
    NoHome,

    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown config key '{key}' (expected kube-config-path, namespace, or store-dir)")]
    UnknownKey { key: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Persisted CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub kube_config_path: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

impl LocalConfig {
    /// Defaults relative to `home`.
    #[must_use]
    pub fn with_home(home: &Path) -> Self {
        Self {
            kube_config_path: home.join(".kube").join("config").display().to_string(),
            namespace: default_namespace(),
            store_dir: None,
        }
    }

    /// `$HOME/.oiler/.config.json`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHome`] if no home directory is set.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, falling back to defaults if the file is absent.
    ///
    /// An empty `kube_config_path` in the file is filled with the default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] for an
    /// unreadable or malformed file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let home = home_dir()?;
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::with_home(&home));
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if config.kube_config_path.is_empty() {
            config.kube_config_path = Self::with_home(&home).kube_config_path;
        }
        Ok(config)
    }

    /// Write to `path`, creating the parent directory if needed.
    ///
    /// The file is written next to its destination and renamed into
    /// place, so a reader never sees a half-written config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Write`] if any filesystem step fails.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        let tmp = path.with_extension(format!("json.tmp-{}", std::process::id()));
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Apply a `config set` assignment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] for any key other than
    /// `kube-config-path`, `namespace`, or `store-dir`, and
    /// [`ConfigError::InvalidValue`] for an unusable namespace.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "kube-config-path" => self.kube_config_path = value.to_owned(),
            "namespace" => {
                validate_namespace(value)?;
                self.namespace = value.to_owned();
            }
            "store-dir" => {
                self.store_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            other => {
                return Err(ConfigError::UnknownKey {
                    key: other.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Resolve the store directory for the current namespace.
    ///
    /// `override_dir` (from `--store-dir`) wins over the configured
    /// `store_dir`, which wins over `$HOME/.oiler/store`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHome`] if the default is needed and no home
    /// directory is set.
    pub fn store_root(&self, override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let base = match override_dir.or(self.store_dir.as_deref()) {
            Some(dir) => dir.to_path_buf(),
            None => home_dir()?.join(CONFIG_DIR).join(STORE_DIR),
        };
        Ok(base.join(&self.namespace))
    }
}

fn validate_namespace(value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: "namespace".to_owned(),
        reason: reason.to_owned(),
    };
    if value.is_empty() {
        return Err(invalid("namespace cannot be empty"));
    }
    if value.starts_with('.') || value.contains(['/', '\\']) {
        return Err(invalid("namespace cannot contain path separators or start with '.'"));
    }
    Ok(())
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| ConfigError::NoHome)
}
