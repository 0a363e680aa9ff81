//! Airthings Cloud - consumer API client and collection pipeline
//!
//! ## Features
//!
//! - **Token cache** - client-credentials exchange with expiry and
//!   single-flight renewal
//! - **Device listing** - paginated listing with de-duplication
//! - **Collection** - per-device latest samples mapped onto the nine
//!   device gauges, with best-effort or fail-fast handling of failures
//!
//! ## Quick Start
//!
//! ```no_run
//! use airthings_cloud::{CloudClient, CloudConfig, CollectionPipeline};
//! use airthings_core::ScrapeBuffer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CloudConfig::new("client-id", "client-secret");
//!     let client = Arc::new(CloudClient::new(config)?);
//!     let pipeline = CollectionPipeline::new(client);
//!
//!     let mut buffer = ScrapeBuffer::new();
//!     let report = pipeline.collect(&mut buffer).await;
//!     println!("{:?}: {} measurements", report.outcome, buffer.len());
//!     print!("{}", buffer.to_prometheus());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod token;
pub mod types;

// Re-exports for convenience
pub use client::{CloudClient, HttpClient};
pub use collector::{CollectionPipeline, SampleFailure, ScrapeReport};
pub use config::{AuthScheme, CloudConfig, SampleFailurePolicy};
pub use error::{CloudError, CloudResult, ScrapeStage};
pub use token::{Clock, SystemClock, TokenCache, TokenExchange};
pub use types::{AccessTokenResponse, Credentials, Device, PageRequest, Sample, Token};
