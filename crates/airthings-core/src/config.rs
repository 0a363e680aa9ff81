//! Configuration system for the Airthings exporter
//!
//! Provides:
//! - Config file discovery (CLI flag, env var, standard paths)
//! - TOML parsing with serde
//! - Environment variable overrides
//! - Validation of API, collection and web settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing required setting: {0}")]
    MissingRequired(&'static str),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default token endpoint of the Airthings accounts API
pub const DEFAULT_TOKEN_URL: &str = "https://accounts-api.airthings.com/v1/token";

/// Default base URL of the Airthings consumer API
pub const DEFAULT_API_BASE_URL: &str = "https://ext-api.airthings.com/v1";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_AUTH_SCHEMES: [&str; 2] = ["raw", "bearer"];
const VALID_FAILURE_POLICIES: [&str; 2] = ["best_effort", "fail_fast"];

/// Complete exporter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Process-level settings
    pub exporter: ExporterSettings,

    /// Upstream API settings
    pub api: ApiSettings,

    /// Exposition server settings
    pub web: WebSettings,
}

/// Process-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterSettings {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Upstream API and collection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// OAuth2 client ID from the Airthings dashboard
    pub client_id: String,

    /// OAuth2 client secret from the Airthings dashboard
    pub client_secret: String,

    /// Token endpoint for the client-credentials exchange
    pub token_url: String,

    /// Base URL for device and sample endpoints
    pub api_base_url: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Seconds subtracted from `expires_in` when caching a token
    pub token_safety_margin_secs: u64,

    /// Authorization header format: raw, bearer
    pub auth_scheme: String,

    /// Follow the device listing offset across pages
    pub follow_pagination: bool,

    /// Devices requested per listing page
    pub page_size: usize,

    /// Upper bound on listing pages per scrape
    pub max_pages: usize,

    /// Concurrent latest-sample requests per scrape
    pub fetch_concurrency: usize,

    /// What to do when one device fails: best_effort, fail_fast
    pub sample_failure_policy: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: 10_000,
            token_safety_margin_secs: 10,
            auth_scheme: "raw".to_string(),
            follow_pagination: true,
            page_size: 50,
            max_pages: 20,
            fetch_concurrency: 4,
            sample_failure_policy: "best_effort".to_string(),
        }
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("token_safety_margin_secs", &self.token_safety_margin_secs)
            .field("auth_scheme", &self.auth_scheme)
            .field("follow_pagination", &self.follow_pagination)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("sample_failure_policy", &self.sample_failure_policy)
            .finish()
    }
}

/// Exposition server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    /// Host to bind
    pub host: String,

    /// Port to bind
    pub port: u16,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl WebSettings {
    /// `host:port` listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply a `host:port` or bare `:port` listen address
    pub fn set_listen_addr(&mut self, addr: &str) -> ConfigResult<()> {
        let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
            ConfigError::ValidationError(format!("Invalid listen address: {}", addr))
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            ConfigError::ValidationError(format!("Invalid port in listen address: {}", addr))
        })?;

        if !host.is_empty() {
            self.host = host.trim_matches(|c| c == '[' || c == ']').to_string();
        }
        self.port = port;
        Ok(())
    }
}

impl ExporterConfig {
    /// Fail unless both halves of the client credentials are present
    pub fn require_credentials(&self) -> ConfigResult<()> {
        if self.api.client_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("client_id"));
        }
        if self.api.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("client_secret"));
        }
        Ok(())
    }

    /// Copy with the client secret masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api.client_secret = redact(&self.api.client_secret).to_string();
        copy
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Path to config file (if specified via CLI)
    cli_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { cli_path: None }
    }

    /// Set the config path from CLI argument
    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. CLI --config flag
    /// 2. AIRTHINGS_CONFIG environment variable
    /// 3. ~/.config/airthings-exporter/config.toml
    /// 4. /etc/airthings-exporter/config.toml
    /// 5. Default values
    ///
    /// Environment overrides are applied on top of whichever source won.
    pub fn load(&self) -> ConfigResult<ExporterConfig> {
        let config_path = self.find_config_file();

        let mut config = if let Some(path) = config_path {
            info!("Loading configuration from: {}", path.display());
            self.load_from_file(&path)?
        } else {
            debug!("No config file found, using defaults");
            ExporterConfig::default()
        };

        self.apply_env_overrides(&mut config);
        self.validate(&config)?;

        Ok(config)
    }

    /// Find the config file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("CLI config path does not exist: {}", path.display());
        }

        if let Ok(env_path) = std::env::var("AIRTHINGS_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("AIRTHINGS_CONFIG path does not exist: {}", env_path);
        }

        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Some(path);
            }
        }

        #[cfg(unix)]
        {
            let path = PathBuf::from("/etc/airthings-exporter/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Load configuration from a TOML file
    fn load_from_file(&self, path: &Path) -> ConfigResult<ExporterConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: ExporterConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut ExporterConfig) {
        if let Ok(val) = std::env::var("AIRTHINGS_LOG_LEVEL") {
            config.exporter.log_level = val;
        }

        if let Ok(val) = std::env::var("AIRTHINGS_CLIENT_ID") {
            config.api.client_id = val;
        }
        if let Ok(val) = std::env::var("AIRTHINGS_CLIENT_SECRET") {
            config.api.client_secret = val;
        }
        if let Ok(val) = std::env::var("AIRTHINGS_TOKEN_URL") {
            config.api.token_url = val;
        }
        if let Ok(val) = std::env::var("AIRTHINGS_API_BASE_URL") {
            config.api.api_base_url = val;
        }

        if let Ok(val) = std::env::var("AIRTHINGS_WEB_HOST") {
            config.web.host = val;
        }
        if let Ok(val) = std::env::var("AIRTHINGS_WEB_PORT") {
            if let Ok(port) = val.parse() {
                config.web.port = port;
            }
        }
    }

    /// Validate configuration
    ///
    /// Missing credentials are not a validation error here; the binary
    /// decides when they are required via [`ExporterConfig::require_credentials`].
    pub fn validate(&self, config: &ExporterConfig) -> ConfigResult<()> {
        if !VALID_LOG_LEVELS.contains(&config.exporter.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                config.exporter.log_level, VALID_LOG_LEVELS
            )));
        }

        if !VALID_AUTH_SCHEMES.contains(&config.api.auth_scheme.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid auth scheme: {}. Must be one of: {:?}",
                config.api.auth_scheme, VALID_AUTH_SCHEMES
            )));
        }

        if !VALID_FAILURE_POLICIES
            .contains(&config.api.sample_failure_policy.to_lowercase().as_str())
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid sample failure policy: {}. Must be one of: {:?}",
                config.api.sample_failure_policy, VALID_FAILURE_POLICIES
            )));
        }

        if config.api.page_size == 0 || config.api.max_pages == 0 {
            return Err(ConfigError::ValidationError(
                "page_size and max_pages must be at least 1".to_string(),
            ));
        }

        if config.api.fetch_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "fetch_concurrency must be at least 1".to_string(),
            ));
        }

        if config.api.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms cannot be 0".to_string(),
            ));
        }

        if config.web.port == 0 {
            return Err(ConfigError::ValidationError(
                "Web port cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the default config file path for the current platform
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("airthings-exporter").join("config.toml"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper module for platform-specific directories
mod dirs {
    use std::path::PathBuf;

    /// Get the user's config directory
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }

        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
