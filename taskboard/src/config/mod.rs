//! Configuration system for the `Taskboard` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::commands::Command;

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HINT_CAPACITY: usize = 64;

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

    /// A configured URL is not valid.
    #[error("invalid {field} url `{value}`: {source}")]
    InvalidUrl {
        /// Which setting held the URL.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },

    /// Could not determine a directory for the session file.
    #[error("could not determine data directory (no HOME or XDG_DATA_HOME)")]
    NoDataDir,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    notify: NotifyFileConfig,
    session: SessionFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

/// `[notify]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NotifyFileConfig {
    url: Option<String>,
    channel_capacity: Option<usize>,
    connect_timeout_secs: Option<u64>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// REST API settings (used by `HttpTaskStore`).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; endpoint paths are appended to it.
    pub base_url: Url,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

/// Hint channel settings (used by `NotifyClient`).
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// WebSocket URL of the hint hub.
    pub url: Url,
    /// Capacity of the inbound and outbound hint queues.
    pub channel_capacity: usize,
    /// Timeout for the WebSocket handshake.
    pub connect_timeout: Duration,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API settings.
    pub api: ApiConfig,
    /// Hint channel settings; `None` disables the channel.
    pub notify: Option<NotifyConfig>,
    /// Where the session (token and user) is persisted.
    pub session_path: PathBuf,
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, a URL is invalid, or no session location can be found.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let default_session = match dirs::data_dir() {
            Some(dir) => dir.join("taskboard").join("session.json"),
            None if cli.session.is_some() || file.session.path.is_some() => PathBuf::new(),
            None => return Err(ConfigError::NoDataDir),
        };
        Self::resolve(cli, &file, default_session)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separated from `load()` so it can be
    /// unit tested without CLI parsing or a home directory.
    fn resolve(
        cli: &CliArgs,
        file: &ConfigFile,
        default_session: PathBuf,
    ) -> Result<Self, ConfigError> {
        let raw_api_url = cli
            .api_url
            .as_deref()
            .or(file.api.base_url.as_deref())
            .unwrap_or(DEFAULT_API_URL);
        let api = ApiConfig {
            base_url: parse_url("api", raw_api_url)?,
            request_timeout: file
                .api
                .request_timeout_secs
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            connect_timeout: file
                .api
                .connect_timeout_secs
                .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs),
        };

        let notify = match cli.notify_url.as_ref().or(file.notify.url.as_ref()) {
            Some(raw) => Some(NotifyConfig {
                url: parse_url("notify", raw)?,
                channel_capacity: file
                    .notify
                    .channel_capacity
                    .unwrap_or(DEFAULT_HINT_CAPACITY),
                connect_timeout: file
                    .notify
                    .connect_timeout_secs
                    .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs),
            }),
            None => None,
        };

        let session_path = cli
            .session
            .clone()
            .or_else(|| file.session.path.clone())
            .unwrap_or(default_session);

        Ok(Self {
            api,
            notify,
            session_path,
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Collaborative task board client")]
pub struct CliArgs {
    /// Base URL of the REST API.
    #[arg(long, env = "TASKBOARD_API_URL", global = true)]
    pub api_url: Option<String>,

    /// WebSocket URL of the real-time hint hub.
    #[arg(long, env = "TASKBOARD_NOTIFY_URL", global = true)]
    pub notify_url: Option<String>,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the session file.
    #[arg(long, env = "TASKBOARD_SESSION", global = true)]
    pub session: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_LOG", global = true)]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskboard.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// What to do. Shows the board when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: raw.to_string(),
        source,
    })
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskboard").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
