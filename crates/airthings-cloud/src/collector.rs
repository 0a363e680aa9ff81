//! Collection pipeline
//!
//! One scrape: obtain a valid token, list devices, fetch each device's
//! latest sample and emit its readings into a [`MeasurementSink`].

use crate::client::CloudClient;
use crate::config::SampleFailurePolicy;
use crate::error::{CloudError, ScrapeStage};
use crate::types::{Device, Sample, Token};
use airthings_core::{ExporterStats, MeasurementSink, ScrapeOutcome};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A device whose sample could not be collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFailure {
    pub device_serial: String,
    pub error: String,
}

/// Summary of one scrape
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub outcome: ScrapeOutcome,
    pub devices_listed: usize,
    pub devices_collected: usize,
    pub sample_failures: Vec<SampleFailure>,
    pub measurements_emitted: usize,
    pub duration: Duration,
}

impl ScrapeReport {
    fn failed(outcome: ScrapeOutcome, started: Instant) -> Self {
        Self {
            outcome,
            devices_listed: 0,
            devices_collected: 0,
            sample_failures: Vec::new(),
            measurements_emitted: 0,
            duration: started.elapsed(),
        }
    }

    /// Feed this report into the exporter self-metrics
    pub fn record_into(&self, stats: &ExporterStats) {
        stats.record_scrape(
            self.outcome,
            self.devices_listed,
            self.sample_failures.len(),
            self.duration,
        );
    }
}

/// Runs scrapes against the Airthings API
pub struct CollectionPipeline {
    client: Arc<CloudClient>,
}

impl CollectionPipeline {
    pub fn new(client: Arc<CloudClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CloudClient {
        &self.client
    }

    /// Run one scrape, emitting readings into `sink`
    ///
    /// Nothing is emitted when the token or the device listing cannot be
    /// obtained. Per-device failures are handled according to the
    /// configured [`SampleFailurePolicy`].
    pub async fn collect(&self, sink: &mut dyn MeasurementSink) -> ScrapeReport {
        let started = Instant::now();

        let token = match self.client.ensure_valid_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(stage = e.stage().map(ScrapeStage::as_str), "Skipping scrape: {}", e);
                return ScrapeReport::failed(ScrapeOutcome::AuthFailed, started);
            }
        };

        let devices = match self.client.list_all_devices(&token).await {
            Ok(devices) => devices,
            Err(e) => {
                error!(stage = e.stage().map(ScrapeStage::as_str), "Skipping scrape: {}", e);
                return ScrapeReport::failed(ScrapeOutcome::ListFailed, started);
            }
        };
        debug!("Found: {} devices", devices.len());

        let policy = self.client.config().sample_failure_policy;
        let mut report = ScrapeReport {
            outcome: ScrapeOutcome::Complete,
            devices_listed: devices.len(),
            devices_collected: 0,
            sample_failures: Vec::new(),
            measurements_emitted: 0,
            duration: Duration::ZERO,
        };

        match policy {
            SampleFailurePolicy::BestEffort => {
                let concurrency = self.client.config().fetch_concurrency.max(1);
                let fetches: Vec<_> = devices
                    .iter()
                    .map(|device| self.fetch(&token, device))
                    .collect();
                let mut samples = stream::iter(fetches).buffered(concurrency);

                while let Some((device, result)) = samples.next().await {
                    Self::handle(device, result, sink, &mut report);
                }
                if !report.sample_failures.is_empty() {
                    report.outcome = ScrapeOutcome::Partial;
                }
            }
            SampleFailurePolicy::FailFast => {
                for device in &devices {
                    let (device, result) = self.fetch(&token, device).await;
                    if !Self::handle(device, result, sink, &mut report) {
                        report.outcome = ScrapeOutcome::Aborted;
                        break;
                    }
                }
            }
        }

        report.duration = started.elapsed();
        info!(
            outcome = ?report.outcome,
            devices = report.devices_listed,
            collected = report.devices_collected,
            failures = report.sample_failures.len(),
            measurements = report.measurements_emitted,
            duration_ms = report.duration.as_millis() as u64,
            "Scrape finished"
        );

        report
    }

    async fn fetch<'a>(
        &self,
        token: &Token,
        device: &'a Device,
    ) -> (&'a Device, Result<Sample, CloudError>) {
        (device, self.client.latest_sample(token, device).await)
    }

    /// Emit one device's readings; false if the device failed
    fn handle(
        device: &Device,
        result: Result<Sample, CloudError>,
        sink: &mut dyn MeasurementSink,
        report: &mut ScrapeReport,
    ) -> bool {
        match result {
            Ok(sample) => {
                debug!(
                    device = %device.id,
                    device_type = %device.device_type,
                    relay = ?sample.relay_device_type,
                    time = ?sample.sample_timestamp,
                    "Collected sample"
                );
                for (gauge, value) in sample.readings() {
                    sink.emit(gauge, value, &device.id);
                    report.measurements_emitted += 1;
                }
                report.devices_collected += 1;
                true
            }
            Err(e) => {
                warn!(device = %device.id, stage = e.stage().map(ScrapeStage::as_str), "{}", e);
                report.sample_failures.push(SampleFailure {
                    device_serial: device.id.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
