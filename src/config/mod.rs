//! Configuration management for octofeed.
//!
//! Configuration is read from `~/.config/octofeed/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schedule: ScheduleConfig,
    pub http: HttpConfig,
    pub proxy: ProxyConfig,
    pub endpoints: Endpoints,
    pub compose: ComposeConfig,
    pub transport: TransportConfig,
    pub storage: StorageConfig,
}

/// Polling cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause between the end of one cycle and the start of the next
    pub delay_secs: u64,
    /// Deadline for a whole cycle
    pub timeout_secs: u64,
    /// Run a cycle immediately on start instead of sleeping first
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            delay_secs: 10,
            timeout_secs: 5 * 60,
            run_on_start: true,
        }
    }
}

impl ScheduleConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Maximum number of feeds fetched at once
    pub max_concurrency: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("octofeed/", env!("CARGO_PKG_VERSION")).to_string(),
            max_concurrency: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    Socks5,
    Http,
}

/// Outbound proxy. Disabled while `host` is blank or `port` is 0.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn url(&self) -> Option<String> {
        if self.host.trim().is_empty() || self.port == 0 {
            return None;
        }
        let scheme = match self.kind {
            ProxyKind::Socks5 => "socks5",
            ProxyKind::Http => "http",
        };
        Some(format!("{}://{}:{}", scheme, self.host.trim(), self.port))
    }
}

/// Where feeds, API resources and preview images live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub feed_root: String,
    pub api_root: String,
    pub preview_root: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            feed_root: "https://github.com".to_string(),
            api_root: "https://api.github.com/repos".to_string(),
            preview_root: "https://opengraph.githubassets.com/31593820a09d4aa76a2b7f30a7efd993982cb622b3607ab21a852c5397bcdde0".to_string(),
        }
    }
}

impl Endpoints {
    pub fn feed_url(&self, source_id: &str) -> String {
        format!("{}/{}.atom", self.feed_root.trim_end_matches('/'), source_id)
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_root.trim_end_matches('/'), path)
    }

    pub fn preview_url(&self, owner: &str, repo: &str) -> String {
        format!(
            "{}/{}/{}",
            self.preview_root.trim_end_matches('/'),
            owner,
            repo
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Rendered length (in characters) above which a message is sent as a
    /// forwarded bundle instead of a flat message
    pub forward_threshold: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            forward_threshold: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdout,
    Webhook,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `<data dir>/octofeed/octofeed.db`
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating it when missing.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path: config_path.to_path_buf(),
            reason,
        })?;

        Ok(config)
    }

    /// Rejects values that parse but would stall every cycle.
    pub fn validate(&self) -> Result<(), String> {
        if self.schedule.timeout_secs == 0 {
            return Err("schedule.timeout_secs must be positive".into());
        }
        if self.http.timeout_secs == 0 {
            return Err("http.timeout_secs must be positive".into());
        }
        if self.http.max_concurrency == 0 {
            return Err("http.max_concurrency must be positive".into());
        }
        Ok(())
    }

    /// Get the default config file path: `~/.config/octofeed/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("octofeed").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# octofeed configuration

[schedule]
# Seconds to wait between two polling cycles
delay_secs = 10

# A cycle still running after this many seconds is aborted
timeout_secs = 300

# Poll once right away instead of waiting for the first delay
run_on_start = true

[http]
timeout_secs = 30
max_concurrency = 10

[proxy]
# "socks5" or "http". Leave host empty to connect directly.
kind = "socks5"
host = ""
port = 0

[endpoints]
feed_root = "https://github.com"
api_root = "https://api.github.com/repos"
preview_root = "https://opengraph.githubassets.com/31593820a09d4aa76a2b7f30a7efd993982cb622b3607ab21a852c5397bcdde0"

[compose]
# Messages longer than this are sent as a collapsed forward
forward_threshold = 500

[transport]
# "stdout" prints messages, "webhook" posts them to webhook_url
kind = "stdout"
# webhook_url = "http://127.0.0.1:8080/octofeed"

[storage]
# database_path = "/var/lib/octofeed/octofeed.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}
