//! Shared types for Airthings API communication

use airthings_core::Gauge;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth2 client credentials, fixed for the life of the process
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Secret half; only the token exchange should read this
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: String,

    /// Lifetime in seconds
    pub expires_in: i64,
}

/// Cached bearer token
///
/// Valid strictly before `expires_at`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Raw token, for the Authorization header
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Device as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Serial number
    pub id: String,

    #[serde(default)]
    pub device_type: String,

    #[serde(default)]
    pub sensors: Vec<String>,
}

/// One page of the device listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,

    #[serde(default)]
    pub offset: Option<u64>,
}

/// Listing page parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: u64,
}

/// Latest readings for one device
///
/// Fields a device model does not measure are absent from the payload
/// and decode as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub battery: Option<i64>,

    pub co2: Option<f64>,

    pub humidity: Option<f64>,

    pub pm1: Option<f64>,

    pub pm25: Option<f64>,

    pub pressure: Option<f64>,

    #[serde(alias = "radonShortTermAverage")]
    pub radon_short_term_avg: Option<f64>,

    #[serde(rename = "temp")]
    pub temperature: Option<f64>,

    /// Unix seconds of the reading
    #[serde(rename = "time")]
    pub sample_timestamp: Option<i64>,

    pub voc: Option<f64>,

    pub relay_device_type: Option<String>,
}

impl Sample {
    /// Present readings mapped to gauges, in schema order
    pub fn readings(&self) -> Vec<(Gauge, f64)> {
        let fields = [
            (Gauge::Battery, self.battery.map(|b| b as f64)),
            (Gauge::Co2, self.co2),
            (Gauge::Humidity, self.humidity),
            (Gauge::Pm1, self.pm1),
            (Gauge::Pm25, self.pm25),
            (Gauge::Pressure, self.pressure),
            (Gauge::Radon, self.radon_short_term_avg),
            (Gauge::Temperature, self.temperature),
            (Gauge::Voc, self.voc),
        ];

        fields
            .into_iter()
            .filter_map(|(gauge, value)| value.map(|v| (gauge, v)))
            .collect()
    }
}

/// Latest-samples endpoint envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleResponse {
    pub data: Sample,
}
