//! OriginSync configuration
//!
//! The YAML file has three sections (`sync`, `metadata`, `logging`); every
//! field is optional and falls back to its default. [`Config::validate`]
//! reports all problems at once, and [`ConfigBuilder`] assembles a config
//! in code (mostly for tests and embedders).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const APP_DIR: &str = "originsync";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub metadata: MetadataConfig,
    pub logging: LoggingConfig,
}

/// `sync:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Initial value of the sync-enabled flag
    pub enabled: bool,
    /// Title of the remote directory holding one directory per origin
    pub sync_root_title: String,
    /// Delete an origin's remote directory when it is unregistered
    pub cleanup_remote_on_unregister: bool,
    /// Scheme every registered origin must use (`ext` → `ext://<id>`)
    pub origin_scheme: String,
}

/// `metadata:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub database_path: PathBuf,
}

/// `logging:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// JSON lines instead of the human-readable format
    pub json: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_root_title: "Synced Origins".into(),
            cleanup_remote_on_unregister: true,
            origin_scheme: "ext".into(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("~/.local/share"));
        Self {
            database_path: base.join(APP_DIR).join("metadata.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Reads and parses the YAML file at `path`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Like [`load`](Self::load), but any read or parse failure yields the defaults
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// `$XDG_CONFIG_HOME/originsync/config.yaml` (or the platform equivalent)
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("~/.config"));
        base.join(APP_DIR).join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// One invalid field, addressed by its dotted path (`sync.origin_scheme`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn is_scheme(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl Config {
    /// Checks every section; an empty result means the config is usable
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.sync.check(&mut errors);
        if self.metadata.database_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "metadata.database_path",
                "must not be empty",
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!("expected one of {LOG_LEVELS:?}, got '{}'", self.logging.level),
            ));
        }
        errors
    }
}

impl SyncConfig {
    fn check(&self, errors: &mut Vec<ValidationError>) {
        let title = self.sync_root_title.trim();
        if title.is_empty() {
            errors.push(ValidationError::new("sync.sync_root_title", "must not be empty"));
        } else if title.contains('/') {
            errors.push(ValidationError::new(
                "sync.sync_root_title",
                "must not contain '/'",
            ));
        }
        if !is_scheme(&self.origin_scheme) {
            errors.push(ValidationError::new(
                "sync.origin_scheme",
                format!("'{}' is not a URL scheme", self.origin_scheme),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds a [`Config`] on top of the defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_enabled(mut self, enabled: bool) -> Self {
        self.config.sync.enabled = enabled;
        self
    }

    pub fn sync_root_title(mut self, title: impl Into<String>) -> Self {
        self.config.sync.sync_root_title = title.into();
        self
    }

    pub fn cleanup_remote_on_unregister(mut self, cleanup: bool) -> Self {
        self.config.sync.cleanup_remote_on_unregister = cleanup;
        self
    }

    pub fn origin_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.sync.origin_scheme = scheme.into();
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.metadata.database_path = path.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn log_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    /// [`build`](Self::build) followed by [`Config::validate`]
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.config;
        match config.validate() {
            errors if errors.is_empty() => Ok(config),
            errors => Err(errors),
        }
    }
}
