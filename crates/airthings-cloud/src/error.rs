//! Error types for airthings-cloud crate

pub use airthings_core::ScrapeStage;
use thiserror::Error;

/// Errors that can occur talking to the Airthings API
#[derive(Debug, Error)]
pub enum CloudError {
    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Client-credentials exchange failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Device listing failed
    #[error("Device listing failed: {0}")]
    List(String),

    /// Latest-sample fetch or decode failed for one device
    #[error("Sample fetch failed for device {serial}: {message}")]
    Sample { serial: String, message: String },

    /// Non-success status from the API
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,
}

impl CloudError {
    /// Map a transport error, separating out timeouts
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CloudError::Timeout
        } else {
            CloudError::Network(err)
        }
    }

    /// Stage this error is attributed to, if any
    pub fn stage(&self) -> Option<ScrapeStage> {
        match self {
            CloudError::Auth(_) => Some(ScrapeStage::Auth),
            CloudError::List(_) => Some(ScrapeStage::List),
            CloudError::Sample { .. } => Some(ScrapeStage::Sample),
            _ => None,
        }
    }

    /// Attribute this error to the token exchange
    pub fn into_auth(self) -> Self {
        match self {
            CloudError::Auth(_) => self,
            other => CloudError::Auth(other.to_string()),
        }
    }

    /// Attribute this error to the device listing
    pub fn into_list(self) -> Self {
        match self {
            CloudError::List(_) => self,
            other => CloudError::List(other.to_string()),
        }
    }

    /// Attribute this error to one device's sample fetch
    pub fn into_sample(self, serial: &str) -> Self {
        match self {
            CloudError::Sample { .. } => self,
            other => CloudError::Sample {
                serial: serial.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Create a server error from status and message
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        CloudError::Server {
            status,
            message: message.into(),
        }
    }
}

/// Result type for Airthings API operations
pub type CloudResult<T> = Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_attribution() {
        let err = CloudError::server(503, "Service Unavailable").into_auth();
        assert_eq!(err.stage(), Some(ScrapeStage::Auth));
        assert!(err.to_string().contains("503"));

        let err = CloudError::Timeout.into_list();
        assert_eq!(err.stage(), Some(ScrapeStage::List));
        assert_eq!(err.to_string(), "Device listing failed: Operation timed out");

        let err = CloudError::server(404, "Not Found").into_sample("2930000001");
        assert_eq!(err.stage(), Some(ScrapeStage::Sample));
        assert!(err.to_string().contains("2930000001"));

        assert_eq!(CloudError::Timeout.stage(), None);
    }

    #[test]
    fn test_attribution_is_not_nested() {
        let err = CloudError::Auth("bad credentials".to_string()).into_auth();
        assert_eq!(err.to_string(), "Authentication failed: bad credentials");
    }

    #[test]
    fn test_unattributed_errors_have_no_stage() {
        assert_eq!(CloudError::Config("x".to_string()).stage(), None);
        assert_eq!(CloudError::server(500, "boom").stage(), None);
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(ScrapeStage::Auth.as_str(), "auth");
        assert_eq!(ScrapeStage::List.as_str(), "list");
        assert_eq!(ScrapeStage::Sample.as_str(), "sample");
    }
}
