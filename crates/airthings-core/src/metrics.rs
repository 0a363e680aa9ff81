//! Gauge schema, measurement sink and Prometheus text rendering
//!
//! The nine device gauges are a fixed schema consumed by existing dashboards;
//! names and help strings must not change.

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Label attached to every device gauge
pub const DEVICE_LABEL: &str = "device_serial";

/// One of the nine per-device gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gauge {
    Battery,
    Co2,
    Humidity,
    Pm1,
    Pm25,
    Pressure,
    Radon,
    Temperature,
    Voc,
}

impl Gauge {
    /// All gauges in exposition order
    pub const ALL: [Gauge; 9] = [
        Gauge::Battery,
        Gauge::Co2,
        Gauge::Humidity,
        Gauge::Pm1,
        Gauge::Pm25,
        Gauge::Pressure,
        Gauge::Radon,
        Gauge::Temperature,
        Gauge::Voc,
    ];

    /// Metric name
    pub fn name(self) -> &'static str {
        match self {
            Gauge::Battery => "airthings_device_battery_percent",
            Gauge::Co2 => "airthings_device_co2_ppm",
            // Misspelling kept: existing dashboards query this name.
            Gauge::Humidity => "airthings_device_humidity_perecent",
            Gauge::Pm1 => "airthings_device_pm1_ug_per_m3",
            Gauge::Pm25 => "airthings_device_pm25_ug_per_m3",
            Gauge::Pressure => "airthings_device_pressure",
            Gauge::Radon => "airthings_device_radon",
            Gauge::Temperature => "airthings_device_temperature_celsius",
            Gauge::Voc => "airthings_device_voc_ppb",
        }
    }

    /// Help text
    pub fn help(self) -> &'static str {
        match self {
            Gauge::Battery => "Current device battery level (0-100)",
            Gauge::Co2 => "Current CO2 level in PPM",
            Gauge::Humidity => "Current humidity level in percent",
            Gauge::Pm1 => "Current PM1 particulate level in micrograms per cubic meter",
            Gauge::Pm25 => "Current PM2.5 particulate level in micrograms per cubic meter",
            Gauge::Pressure => "Current air pressure in hPa / millibars",
            Gauge::Radon => "24h radon average, in pCi/L",
            Gauge::Temperature => "Current termperature in degrees C",
            Gauge::Voc => "Current VOC level in parts per billion",
        }
    }
}

/// A single gauge reading for one device
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub gauge: Gauge,
    pub value: f64,
    pub device_serial: String,
}

/// Receiver for measurements produced by a scrape
pub trait MeasurementSink: Send {
    /// Accept one gauge value tagged with its device serial
    fn emit(&mut self, gauge: Gauge, value: f64, device_serial: &str);
}

impl MeasurementSink for Vec<Measurement> {
    fn emit(&mut self, gauge: Gauge, value: f64, device_serial: &str) {
        self.push(Measurement {
            gauge,
            value,
            device_serial: device_serial.to_string(),
        });
    }
}

/// Collects the measurements of one scrape for rendering
#[derive(Debug, Default)]
pub struct ScrapeBuffer {
    measurements: Vec<Measurement>,
}

impl ScrapeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measurements in emission order
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Render in Prometheus text exposition format (0.0.4)
    ///
    /// Gauges with no samples are omitted entirely.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        for gauge in Gauge::ALL {
            let mut samples = self.measurements.iter().filter(|m| m.gauge == gauge).peekable();
            if samples.peek().is_none() {
                continue;
            }

            let _ = writeln!(output, "# HELP {} {}", gauge.name(), gauge.help());
            let _ = writeln!(output, "# TYPE {} gauge", gauge.name());
            for m in samples {
                let _ = writeln!(
                    output,
                    "{}{{{}=\"{}\"}} {}",
                    gauge.name(),
                    DEVICE_LABEL,
                    escape_label_value(&m.device_serial),
                    format_value(m.value)
                );
            }
            output.push('\n');
        }

        output
    }
}

impl MeasurementSink for ScrapeBuffer {
    fn emit(&mut self, gauge: Gauge, value: f64, device_serial: &str) {
        self.measurements.emit(gauge, value, device_serial);
    }
}

/// Pipeline stage a scrape error belongs to, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStage {
    Auth,
    List,
    Sample,
}

impl ScrapeStage {
    pub const ALL: [ScrapeStage; 3] = [ScrapeStage::Auth, ScrapeStage::List, ScrapeStage::Sample];

    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeStage::Auth => "auth",
            ScrapeStage::List => "list",
            ScrapeStage::Sample => "sample",
        }
    }
}

/// How a scrape ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeOutcome {
    /// Every listed device was collected
    Complete,
    /// Some devices failed and were skipped
    Partial,
    /// Stopped at the first failed device
    Aborted,
    /// Token exchange failed, nothing emitted
    AuthFailed,
    /// Device listing failed, nothing emitted
    ListFailed,
}

impl ScrapeOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, ScrapeOutcome::Complete)
    }
}

/// Exporter self-metrics, shared between scrapes
#[derive(Debug)]
pub struct ExporterStats {
    start_time: Instant,
    scrapes: AtomicU64,
    auth_errors: AtomicU64,
    list_errors: AtomicU64,
    sample_errors: AtomicU64,
    last: RwLock<Option<LastScrape>>,
}

#[derive(Debug, Clone, Copy)]
struct LastScrape {
    outcome: ScrapeOutcome,
    devices_listed: usize,
    duration: Duration,
}

/// Shared handle to exporter stats
pub type SharedStats = Arc<ExporterStats>;

impl Default for ExporterStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            scrapes: AtomicU64::new(0),
            auth_errors: AtomicU64::new(0),
            list_errors: AtomicU64::new(0),
            sample_errors: AtomicU64::new(0),
            last: RwLock::new(None),
        }
    }

    /// Record the result of one scrape
    pub fn record_scrape(
        &self,
        outcome: ScrapeOutcome,
        devices_listed: usize,
        sample_failures: usize,
        duration: Duration,
    ) {
        self.scrapes.fetch_add(1, Ordering::Relaxed);
        match outcome {
            ScrapeOutcome::AuthFailed => {
                self.auth_errors.fetch_add(1, Ordering::Relaxed);
            }
            ScrapeOutcome::ListFailed => {
                self.list_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        self.sample_errors
            .fetch_add(sample_failures as u64, Ordering::Relaxed);

        *self.last.write() = Some(LastScrape {
            outcome,
            devices_listed,
            duration,
        });
    }

    pub fn scrapes_total(&self) -> u64 {
        self.scrapes.load(Ordering::Relaxed)
    }

    /// Error count for one pipeline stage
    pub fn errors_total(&self, stage: ScrapeStage) -> u64 {
        let counter = match stage {
            ScrapeStage::Auth => &self.auth_errors,
            ScrapeStage::List => &self.list_errors,
            ScrapeStage::Sample => &self.sample_errors,
        };
        counter.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export self-metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP airthings_exporter_uptime_seconds Time since exporter started\n");
        output.push_str("# TYPE airthings_exporter_uptime_seconds gauge\n");
        let _ = writeln!(
            output,
            "airthings_exporter_uptime_seconds {}\n",
            self.uptime_seconds()
        );

        output.push_str(
            "# HELP airthings_exporter_scrapes_total Total scrapes of the Airthings API\n",
        );
        output.push_str("# TYPE airthings_exporter_scrapes_total counter\n");
        let _ = writeln!(
            output,
            "airthings_exporter_scrapes_total {}\n",
            self.scrapes_total()
        );

        output.push_str(
            "# HELP airthings_exporter_scrape_errors_total Scrape errors by pipeline stage\n",
        );
        output.push_str("# TYPE airthings_exporter_scrape_errors_total counter\n");
        for stage in ScrapeStage::ALL {
            let _ = writeln!(
                output,
                "airthings_exporter_scrape_errors_total{{stage=\"{}\"}} {}",
                stage.as_str(),
                self.errors_total(stage)
            );
        }
        output.push('\n');

        if let Some(last) = *self.last.read() {
            output.push_str(
                "# HELP airthings_exporter_devices_listed Devices returned by the last listing\n",
            );
            output.push_str("# TYPE airthings_exporter_devices_listed gauge\n");
            let _ = writeln!(
                output,
                "airthings_exporter_devices_listed {}\n",
                last.devices_listed
            );

            output.push_str(
                "# HELP airthings_exporter_last_scrape_duration_seconds Duration of the last scrape\n",
            );
            output.push_str("# TYPE airthings_exporter_last_scrape_duration_seconds gauge\n");
            let _ = writeln!(
                output,
                "airthings_exporter_last_scrape_duration_seconds {}\n",
                format_value(last.duration.as_secs_f64())
            );

            output.push_str(
                "# HELP airthings_exporter_last_scrape_success Whether the last scrape collected every device\n",
            );
            output.push_str("# TYPE airthings_exporter_last_scrape_success gauge\n");
            let _ = writeln!(
                output,
                "airthings_exporter_last_scrape_success {}\n",
                u8::from(last.outcome.is_success())
            );
        }

        output
    }

    /// Export self-metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let last = *self.last.read();

        serde_json::json!({
            "uptime_seconds": self.uptime_seconds(),
            "scrapes_total": self.scrapes_total(),
            "errors": {
                "auth": self.errors_total(ScrapeStage::Auth),
                "list": self.errors_total(ScrapeStage::List),
                "sample": self.errors_total(ScrapeStage::Sample),
            },
            "last_scrape": last.map(|l| serde_json::json!({
                "outcome": l.outcome,
                "devices_listed": l.devices_listed,
                "duration_ms": l.duration.as_millis() as u64,
            })),
        })
    }
}

/// Escape a label value per the text exposition format
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Format a sample value the way Prometheus parses it
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_names_are_fixed() {
        let names: Vec<&str> = Gauge::ALL.iter().map(|g| g.name()).collect();
        assert_eq!(
            names,
            vec![
                "airthings_device_battery_percent",
                "airthings_device_co2_ppm",
                "airthings_device_humidity_perecent",
                "airthings_device_pm1_ug_per_m3",
                "airthings_device_pm25_ug_per_m3",
                "airthings_device_pressure",
                "airthings_device_radon",
                "airthings_device_temperature_celsius",
                "airthings_device_voc_ppb",
            ]
        );
    }

    #[test]
    fn test_render_groups_by_gauge() {
        let mut buffer = ScrapeBuffer::new();
        buffer.emit(Gauge::Battery, 85.0, "2930000001");
        buffer.emit(Gauge::Co2, 612.0, "2930000001");
        buffer.emit(Gauge::Battery, 40.0, "2930000002");

        let text = buffer.to_prometheus();
        assert!(text.contains(
            "# HELP airthings_device_battery_percent Current device battery level (0-100)\n"
        ));
        assert!(text.contains("# TYPE airthings_device_battery_percent gauge\n"));
        assert!(text.contains(
            "airthings_device_battery_percent{device_serial=\"2930000001\"} 85\n"
        ));
        assert!(text.contains(
            "airthings_device_battery_percent{device_serial=\"2930000002\"} 40\n"
        ));
        assert!(text.contains("airthings_device_co2_ppm{device_serial=\"2930000001\"} 612\n"));
        // Only one HELP line per gauge
        assert_eq!(text.matches("# HELP airthings_device_battery_percent").count(), 1);
        // Gauges without samples are omitted
        assert!(!text.contains("airthings_device_voc_ppb"));
    }

    #[test]
    fn test_render_fractional_values_verbatim() {
        let mut buffer = ScrapeBuffer::new();
        buffer.emit(Gauge::Humidity, 41.5, "abc");
        buffer.emit(Gauge::Radon, 0.27, "abc");
        let text = buffer.to_prometheus();
        assert!(text.contains("airthings_device_humidity_perecent{device_serial=\"abc\"} 41.5\n"));
        assert!(text.contains("airthings_device_radon{device_serial=\"abc\"} 0.27\n"));
    }

    #[test]
    fn test_label_escaping() {
        assert_eq!(escape_label_value(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_label_value("x\ny"), "x\\ny");
    }

    #[test]
    fn test_format_special_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(1013.2), "1013.2");
    }

    #[test]
    fn test_vec_sink() {
        let mut sink: Vec<Measurement> = Vec::new();
        sink.emit(Gauge::Voc, 120.0, "dev");
        assert_eq!(
            sink,
            vec![Measurement {
                gauge: Gauge::Voc,
                value: 120.0,
                device_serial: "dev".to_string()
            }]
        );
    }

    #[test]
    fn test_stats_counts_errors_by_stage() {
        let stats = ExporterStats::new();
        stats.record_scrape(ScrapeOutcome::AuthFailed, 0, 0, Duration::from_millis(5));
        stats.record_scrape(ScrapeOutcome::ListFailed, 0, 0, Duration::from_millis(5));
        stats.record_scrape(ScrapeOutcome::Partial, 3, 2, Duration::from_millis(250));

        assert_eq!(stats.scrapes_total(), 3);
        assert_eq!(stats.errors_total(ScrapeStage::Auth), 1);
        assert_eq!(stats.errors_total(ScrapeStage::List), 1);
        assert_eq!(stats.errors_total(ScrapeStage::Sample), 2);

        let text = stats.to_prometheus();
        assert!(text.contains("airthings_exporter_scrapes_total 3\n"));
        assert!(text.contains("airthings_exporter_scrape_errors_total{stage=\"sample\"} 2\n"));
        assert!(text.contains("airthings_exporter_scrape_errors_total{stage=\"auth\"} 1\n"));
        assert!(text.contains("airthings_exporter_devices_listed 3\n"));
        assert!(text.contains("airthings_exporter_last_scrape_duration_seconds 0.25\n"));
        assert!(text.contains("airthings_exporter_last_scrape_success 0\n"));
    }

    #[test]
    fn test_stats_before_first_scrape() {
        let stats = ExporterStats::new();
        let text = stats.to_prometheus();
        assert!(text.contains("airthings_exporter_scrapes_total 0\n"));
        assert!(!text.contains("airthings_exporter_last_scrape_success"));

        let json = stats.to_json();
        assert_eq!(json["scrapes_total"], 0);
        assert!(json["last_scrape"].is_null());
    }

    #[test]
    fn test_stats_json_after_success() {
        let stats = ExporterStats::new();
        stats.record_scrape(ScrapeOutcome::Complete, 2, 0, Duration::from_millis(40));
        let json = stats.to_json();
        assert_eq!(json["last_scrape"]["outcome"], "complete");
        assert_eq!(json["last_scrape"]["devices_listed"], 2);
        assert_eq!(json["last_scrape"]["duration_ms"], 40);
    }
}
