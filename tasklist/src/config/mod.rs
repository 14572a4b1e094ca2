//! Configuration system for the `Tasklist` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasklist/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.
//!
//! The backend is chosen from the `[cloud]` section: all six keys present
//! selects the cloud backend, anything less falls back to local mode.

use std::path::{Path, PathBuf};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    cloud: CloudConfig,
    logging: LoggingFileConfig,
    display: DisplayFileConfig,
}

/// `[logging]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LoggingFileConfig {
    level: Option<String>,
    file: Option<PathBuf>,
}

/// `[display]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct DisplayFileConfig {
    due_date_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Hosted-service keys. Doubles as the `[cloud]` section of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
}

/// A complete set of hosted-service keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSettings {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

/// Which backend the process runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    /// In-process list, no sign-in.
    Local,
    /// Owner-scoped hosted collection with sign-in.
    Cloud(CloudSettings),
}

/// Treats blank values the same as absent ones.
fn present(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

impl CloudConfig {
    fn fields(&self) -> [(&'static str, Option<&String>); 6] {
        [
            ("api_key", self.api_key.as_ref()),
            ("auth_domain", self.auth_domain.as_ref()),
            ("project_id", self.project_id.as_ref()),
            ("storage_bucket", self.storage_bucket.as_ref()),
            ("messaging_sender_id", self.messaging_sender_id.as_ref()),
            ("app_id", self.app_id.as_ref()),
        ]
    }

    /// Names of keys that are absent or blank.
    #[must_use]
    pub fn missing_keys(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| present(*value).is_none())
            .map(|(name, _)| name)
            .collect()
    }

    /// Returns the settings if every key is present.
    #[must_use]
    pub fn to_settings(&self) -> Option<CloudSettings> {
        Some(CloudSettings {
            api_key: present(self.api_key.as_ref())?,
            auth_domain: present(self.auth_domain.as_ref())?,
            project_id: present(self.project_id.as_ref())?,
            storage_bucket: present(self.storage_bucket.as_ref())?,
            messaging_sender_id: present(self.messaging_sender_id.as_ref())?,
            app_id: present(self.app_id.as_ref())?,
        })
    }

    /// Layers `self` over `fallback`, key by key.
    fn or(&self, fallback: &Self) -> Self {
        Self {
            api_key: self.api_key.clone().or_else(|| fallback.api_key.clone()),
            auth_domain: self
                .auth_domain
                .clone()
                .or_else(|| fallback.auth_domain.clone()),
            project_id: self
                .project_id
                .clone()
                .or_else(|| fallback.project_id.clone()),
            storage_bucket: self
                .storage_bucket
                .clone()
                .or_else(|| fallback.storage_bucket.clone()),
            messaging_sender_id: self
                .messaging_sender_id
                .clone()
                .or_else(|| fallback.messaging_sender_id.clone()),
            app_id: self.app_id.clone().or_else(|| fallback.app_id.clone()),
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hosted-service keys, possibly incomplete.
    pub cloud: CloudConfig,
    /// Run locally even if cloud keys are present.
    pub force_local: bool,
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log file path; `None` means `$TMPDIR/tasklist.log`.
    pub log_file: Option<PathBuf>,
    /// Due date display format (chrono format string).
    pub due_date_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cloud: CloudConfig::default(),
            force_local: false,
            log_level: "info".to_string(),
            log_file: None,
            due_date_format: "%Y/%m/%d".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path
    /// (`~/.config/tasklist/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let cli_cloud = CloudConfig {
            api_key: cli.api_key.clone(),
            auth_domain: cli.auth_domain.clone(),
            project_id: cli.project_id.clone(),
            storage_bucket: cli.storage_bucket.clone(),
            messaging_sender_id: cli.messaging_sender_id.clone(),
            app_id: cli.app_id.clone(),
        };

        Self {
            cloud: cli_cloud.or(&file.cloud),
            force_local: cli.local,
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.logging.level.clone())
                .unwrap_or(defaults.log_level),
            log_file: cli
                .log_file
                .clone()
                .or_else(|| file.logging.file.clone()),
            due_date_format: file
                .display
                .due_date_format
                .clone()
                .unwrap_or(defaults.due_date_format),
        }
    }

    /// Picks the backend for this process.
    ///
    /// Incomplete cloud keys are logged and fall back to local mode.
    #[must_use]
    pub fn backend(&self) -> BackendSelection {
        if self.force_local {
            tracing::info!("local mode forced");
            return BackendSelection::Local;
        }
        if let Some(settings) = self.cloud.to_settings() {
            return BackendSelection::Cloud(settings);
        }
        let missing = self.cloud.missing_keys();
        if missing.len() < 6 {
            tracing::warn!(?missing, "cloud configuration incomplete, using local mode");
        } else {
            tracing::info!("no cloud configuration, using local mode");
        }
        BackendSelection::Local
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task list with local and cloud-synchronized storage")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/tasklist/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ignore cloud keys and keep tasks in memory.
    #[arg(long)]
    pub local: bool,

    /// Hosted service API key.
    #[arg(long, env = "TASKLIST_API_KEY")]
    pub api_key: Option<String>,

    /// Hosted service auth domain.
    #[arg(long, env = "TASKLIST_AUTH_DOMAIN")]
    pub auth_domain: Option<String>,

    /// Hosted service project id.
    #[arg(long, env = "TASKLIST_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Hosted service storage bucket.
    #[arg(long, env = "TASKLIST_STORAGE_BUCKET")]
    pub storage_bucket: Option<String>,

    /// Hosted service messaging sender id.
    #[arg(long, env = "TASKLIST_MESSAGING_SENDER_ID")]
    pub messaging_sender_id: Option<String>,

    /// Hosted service app id.
    #[arg(long, env = "TASKLIST_APP_ID")]
    pub app_id: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "TASKLIST_LOG")]
    pub log_level: Option<String>,

    /// Path to log file (default: `$TMPDIR/tasklist.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("tasklist").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
