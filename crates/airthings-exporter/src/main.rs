//! Airthings Exporter - Prometheus metrics for Airthings air-quality sensors
//!
//! Authenticates against the Airthings consumer API with client
//! credentials and serves the latest device readings on `/metrics`.

use airthings_cloud::{CloudClient, CloudConfig, CollectionPipeline, Device};
use airthings_core::config::{ConfigLoader, ExporterConfig};
use airthings_core::ExporterStats;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "airthings-exporter")]
#[command(version)]
#[command(about = "Prometheus exporter for Airthings air-quality sensors", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log format (json, text)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "AIRTHINGS_CONFIG")]
    config: Option<PathBuf>,

    /// Airthings API client ID
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Airthings API client secret
    #[arg(long, global = true)]
    client_secret: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve Prometheus metrics (default)
    Serve {
        /// Listen address, "host:port" or ":port"
        #[arg(short, long)]
        listen: Option<String>,

        /// Start serving without authenticating and listing devices first
        #[arg(long)]
        skip_startup_check: bool,
    },

    /// List devices on the account and exit
    Devices {
        /// Also fetch each device's latest sample
        #[arg(long)]
        samples: bool,
    },

    /// Validate configuration and print it with secrets masked
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new()
        .with_cli_path(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;

    apply_cli_overrides(&mut config, cli.client_id, cli.client_secret);

    setup_logging(cli.verbose, &cli.format, &config.exporter.log_level)?;

    match cli.command.unwrap_or(Commands::Serve {
        listen: None,
        skip_startup_check: false,
    }) {
        Commands::Serve {
            listen,
            skip_startup_check,
        } => {
            if let Some(addr) = listen {
                config.web.set_listen_addr(&addr)?;
                ConfigLoader::new().validate(&config)?;
            }
            serve_command(config, skip_startup_check).await
        }
        Commands::Devices { samples } => devices_command(config, samples).await,
        Commands::Check => check_command(&config),
    }
}

/// Credential flags win over both the config file and the environment
fn apply_cli_overrides(
    config: &mut ExporterConfig,
    client_id: Option<String>,
    client_secret: Option<String>,
) {
    if let Some(id) = client_id {
        config.api.client_id = id;
    }
    if let Some(secret) = client_secret {
        config.api.client_secret = secret;
    }
}

/// Logging: -v flags take precedence, then RUST_LOG, then the config file
fn setup_logging(verbose: u8, format: &str, configured: &str) -> anyhow::Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.to_lowercase())),
        _ => EnvFilter::new(verbosity_level(verbose)),
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => tracing::subscriber::set_global_default(builder.json().finish())?,
        "text" => tracing::subscriber::set_global_default(builder.finish())?,
        other => anyhow::bail!("Unknown log format: {} (expected text or json)", other),
    }

    Ok(())
}

fn verbosity_level(verbose: u8) -> &'static str {
    match verbose {
        0 | 1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_client(config: &ExporterConfig) -> anyhow::Result<Arc<CloudClient>> {
    config.require_credentials()?;
    let cloud_config = CloudConfig::from_settings(&config.api)?;
    Ok(Arc::new(CloudClient::new(cloud_config)?))
}

/// Authenticate and list devices once so bad credentials fail at startup
async fn startup_check(client: &CloudClient) -> anyhow::Result<Vec<Device>> {
    let token = client
        .ensure_valid_token()
        .await
        .context("Could not authenticate with the Airthings API")?;
    let devices = client
        .list_all_devices(&token)
        .await
        .context("Could not list Airthings devices")?;
    Ok(devices)
}

async fn serve_command(config: ExporterConfig, skip_startup_check: bool) -> anyhow::Result<()> {
    let client = build_client(&config)?;

    if skip_startup_check {
        info!("Skipping startup check");
    } else {
        let devices = startup_check(&client).await?;
        info!("Found: {} devices", devices.len());
        for device in &devices {
            debug!(device = %device.id, device_type = %device.device_type, "Device");
        }
    }

    let pipeline = Arc::new(CollectionPipeline::new(client));
    let stats = Arc::new(ExporterStats::new());

    airthings_web::start_server(&config.web, pipeline, stats).await
}

async fn devices_command(config: ExporterConfig, samples: bool) -> anyhow::Result<()> {
    let client = build_client(&config)?;
    let devices = startup_check(&client).await?;

    if !samples {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    let token = client.ensure_valid_token().await?;
    let mut entries = Vec::with_capacity(devices.len());
    for device in &devices {
        let entry = match client.latest_sample(&token, device).await {
            Ok(sample) => serde_json::json!({"device": device, "sample": sample}),
            Err(e) => serde_json::json!({"device": device, "error": e.to_string()}),
        };
        entries.push(entry);
    }
    println!("{}", serde_json::to_string_pretty(&entries)?);

    Ok(())
}

fn check_command(config: &ExporterConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);

    config.require_credentials()?;
    println!("Configuration OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["airthings-exporter"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "airthings-exporter",
            "-vv",
            "serve",
            "--listen",
            ":9090",
            "--skip-startup-check",
            "--client-id",
            "abc",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.client_id.as_deref(), Some("abc"));
        match cli.command {
            Some(Commands::Serve {
                listen,
                skip_startup_check,
            }) => {
                assert_eq!(listen.as_deref(), Some(":9090"));
                assert!(skip_startup_check);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_cli_credentials_override_loaded_config() {
        let mut config = ExporterConfig::default();
        config.api.client_id = "from-env".to_string();
        config.api.client_secret = "from-file".to_string();

        let args = ["airthings-exporter", "--client-secret", "from-cli"];
        let cli = Cli::try_parse_from(args).unwrap();
        apply_cli_overrides(&mut config, cli.client_id, cli.client_secret);
        assert_eq!(config.api.client_id, "from-env");
        assert_eq!(config.api.client_secret, "from-cli");

        apply_cli_overrides(&mut config, Some("cli-id".to_string()), None);
        assert_eq!(config.api.client_id, "cli-id");
        assert_eq!(config.api.client_secret, "from-cli");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_level(1), "info");
        assert_eq!(verbosity_level(2), "debug");
        assert_eq!(verbosity_level(5), "trace");
    }

    #[test]
    fn test_build_client_requires_credentials() {
        let config = ExporterConfig::default();
        assert!(build_client(&config).is_err());
    }
}
