//! Runtime configuration for the Airthings API client
//!
//! Built from the file-level [`ApiSettings`] in airthings-core, with
//! string settings parsed into typed values.

use crate::error::{CloudError, CloudResult};
use crate::types::Credentials;
use airthings_core::config::{ApiSettings, DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URL};
use std::str::FromStr;
use std::time::Duration;

/// Format of the `Authorization` header on API requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Authorization: <token>`, what the Airthings consumer API expects
    #[default]
    Raw,
    /// `Authorization: Bearer <token>`
    Bearer,
}

impl AuthScheme {
    /// Header value for a token
    pub fn header_value(self, token: &str) -> String {
        match self {
            AuthScheme::Raw => token.to_string(),
            AuthScheme::Bearer => format!("Bearer {}", token),
        }
    }
}

impl FromStr for AuthScheme {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(AuthScheme::Raw),
            "bearer" => Ok(AuthScheme::Bearer),
            other => Err(CloudError::Config(format!("unknown auth scheme: {}", other))),
        }
    }
}

/// What a scrape does when one device's sample cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFailurePolicy {
    /// Skip the device, keep going, report the failure
    #[default]
    BestEffort,
    /// Stop fetching at the first failed device
    FailFast,
}

impl FromStr for SampleFailurePolicy {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(SampleFailurePolicy::BestEffort),
            "fail_fast" | "fail-fast" => Ok(SampleFailurePolicy::FailFast),
            other => Err(CloudError::Config(format!(
                "unknown sample failure policy: {}",
                other
            ))),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// OAuth2 client credentials
    pub credentials: Credentials,

    /// Token endpoint
    pub token_url: String,

    /// Base URL for device endpoints
    pub api_base_url: String,

    /// Timeout applied to every request
    pub request_timeout: Duration,

    /// Subtracted from the token lifetime before caching
    pub token_safety_margin: Duration,

    /// Authorization header format
    pub auth_scheme: AuthScheme,

    /// Follow the listing offset across pages
    pub follow_pagination: bool,

    /// Devices per listing page
    pub page_size: usize,

    /// Upper bound on listing pages per scrape
    pub max_pages: usize,

    /// Concurrent latest-sample requests
    pub fetch_concurrency: usize,

    /// Per-device failure handling
    pub sample_failure_policy: SampleFailurePolicy,
}

impl CloudConfig {
    /// Config with default endpoints and collection settings
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(client_id, client_secret),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            token_safety_margin: Duration::from_secs(10),
            auth_scheme: AuthScheme::Raw,
            follow_pagination: true,
            page_size: 50,
            max_pages: 20,
            fetch_concurrency: 4,
            sample_failure_policy: SampleFailurePolicy::BestEffort,
        }
    }

    /// Convert from the file-level settings
    pub fn from_settings(settings: &ApiSettings) -> CloudResult<Self> {
        if settings.fetch_concurrency == 0 || settings.page_size == 0 || settings.max_pages == 0 {
            return Err(CloudError::Config(
                "page_size, max_pages and fetch_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            credentials: Credentials::new(&settings.client_id, &settings.client_secret),
            token_url: settings.token_url.clone(),
            api_base_url: settings.api_base_url.clone(),
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            token_safety_margin: Duration::from_secs(settings.token_safety_margin_secs),
            auth_scheme: settings.auth_scheme.parse()?,
            follow_pagination: settings.follow_pagination,
            page_size: settings.page_size,
            max_pages: settings.max_pages,
            fetch_concurrency: settings.fetch_concurrency,
            sample_failure_policy: settings.sample_failure_policy.parse()?,
        })
    }

    /// Point both endpoints at another host (mock servers, proxies)
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.api_base_url = api_base_url.into();
        self
    }
}
