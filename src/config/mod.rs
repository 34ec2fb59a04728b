//! Configuration management.
//!
//! Settings are read from an optional TOML file and then overridden by
//! environment variables prefixed with `MEDFETCH__`, using `__` between
//! nested keys:
//!
//! ```bash
//! export MEDFETCH__BATCH__MAX_CONCURRENCY=4
//! export MEDFETCH__PUBMED__FETCH_URL="http://127.0.0.1:5000/proxy"
//! ```

mod file_config;

pub use file_config::{save_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::BatchConfig;
use crate::models::DEFAULT_MAX_RESULTS;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "MEDFETCH";

/// File name looked up in the working and user config directories
pub const CONFIG_FILE_NAME: &str = "medfetch.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// PubMed endpoints and query settings
    #[serde(default)]
    pub pubmed: PubMedConfig,

    /// Batch fetch tuning
    #[serde(default)]
    pub batch: BatchConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// PubMed E-utilities configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubMedConfig {
    /// ESearch endpoint
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// EFetch endpoint, or a proxy with the same query contract
    #[serde(default = "default_fetch_url")]
    pub fetch_url: String,

    /// NCBI API key (optional, raises the upstream rate limit)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum identifiers per search
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            fetch_url: default_fetch_url(),
            api_key: None,
            max_results: default_max_results(),
        }
    }
}

fn default_search_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi".to_string()
}

fn default_fetch_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi".to_string()
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `"json"` for structured output, anything else for human-readable lines
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Whether JSON log lines were requested
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

/// Load configuration from an optional file plus `MEDFETCH__*` environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    if config.pubmed.api_key.is_none() {
        config.pubmed.api_key = std::env::var("NCBI_API_KEY").ok().filter(|k| !k.is_empty());
    }
    Ok(config)
}

/// Find a config file in the working directory or the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    let user = default_config_path()?;
    user.is_file().then_some(user)
}

/// `<config dir>/medfetch/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("medfetch").join("config.toml"))
}
