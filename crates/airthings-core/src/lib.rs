//! Airthings Core - configuration and exposition schema
//!
//! This crate holds the pieces of the exporter that do not talk to the
//! network:
//!
//! - **Config**: TOML schema, discovery, environment overrides and validation
//! - **Metrics**: the fixed nine-gauge device schema, the [`MeasurementSink`]
//!   seam used by the collection pipeline, Prometheus text rendering and
//!   exporter self-metrics

pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use config::{ApiSettings, ConfigError, ConfigLoader, ConfigResult, ExporterConfig, WebSettings};
pub use metrics::{
    ExporterStats, Gauge, Measurement, MeasurementSink, ScrapeBuffer, ScrapeOutcome, ScrapeStage,
    SharedStats,
};

/// Exporter version
pub const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");
