//! Pipewatch CLI
//!
//! Command-line interface for the Pipewatch telemetry monitor.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pipewatch::api::HttpServer;
use pipewatch::config::LoggingConfig;
use pipewatch::dashboard::{device_ids, DeviceSnapshot, SnapshotQuery};
use pipewatch::feed::FeedClient;
use pipewatch::models::StatusFilter;
use pipewatch::monitor::Monitor;
use pipewatch::Config;

/// Pipewatch - Threshold alerting for pipe telemetry
#[derive(Parser)]
#[command(name = "pipewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "PIPEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor and the HTTP API
    Serve {
        /// Bind address (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// HTTP API port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single pass and print the actionable alerts
    Check {
        /// Status filter (all, critical, warning)
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// List devices in the feed with their latest condition
    Devices,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    let result = match cli.command {
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Check { status, dry_run } => {
            run_check(config, status, dry_run, cli.format).await
        }
        Commands::Devices => run_devices(config, cli.format).await,
        Commands::Completions { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_serve(
    config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        host.unwrap_or(config.server.host.clone()),
        port.unwrap_or(config.server.port)
    );
    info!(feed = %config.feed.url, "Starting Pipewatch on {}", addr);

    let monitor = Arc::new(Monitor::from_config(&config).await?);
    let token = monitor.shutdown_token();

    let poller = {
        let monitor = monitor.clone();
        let interval = config.feed.poll_interval;
        tokio::spawn(async move { monitor.run(interval).await })
    };

    let server = HttpServer::new(monitor.clone(), config.dashboard.clone());
    let mut server_task = tokio::spawn(async move { server.serve(&addr, token).await });

    let early_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down...");
            None
        }
        joined = &mut server_task => Some(joined),
    };

    monitor.shutdown().await;

    let served = match early_exit {
        Some(joined) => joined,
        None => server_task.await,
    };
    served??;
    poller.await?;

    Ok(())
}

async fn run_check(
    mut config: Config,
    status: StatusFilter,
    dry_run: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    config.notification.dry_run |= dry_run;

    let monitor = Monitor::from_config(&config).await?;
    let pass = monitor.refresh().await?;
    let report = match pass.dispatch {
        Some(handle) => Some(handle.await?),
        None => None,
    };

    let alerts = status.apply(&pass.snapshot.alerts);

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "filter": status,
                "fetched_at": pass.snapshot.fetched_at,
                "alerts": alerts,
                "dispatch": report,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{} records, {} alerts ({status})",
                pass.snapshot.records.len(),
                alerts.len()
            );
            for alert in &alerts {
                println!(
                    "  {:<8} {:<24} {:>10.2} -> {:>10.2}  threshold {}  {}",
                    alert.severity,
                    alert.id,
                    alert.previous_value,
                    alert.current_value,
                    alert.threshold,
                    alert.timestamp
                );
            }
            if let Some(report) = report {
                println!(
                    "Notifications: {} sent, {} already sent, {} failed",
                    report.sent, report.skipped, report.failed
                );
            }
        }
    }

    monitor.shutdown().await;
    Ok(())
}

async fn run_devices(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let feed = FeedClient::new(&config.feed)?;
    let records = feed.fetch().await?;

    let snapshots: Vec<DeviceSnapshot> = device_ids(&records)
        .iter()
        .filter_map(|id| {
            DeviceSnapshot::build(&records, id, &SnapshotQuery::default(), &config.dashboard.kpi)
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshots)?),
        OutputFormat::Text => {
            for snapshot in &snapshots {
                println!(
                    "{:<16} {:<9} {}",
                    snapshot.device_id,
                    snapshot.predicted_condition,
                    snapshot.timestamp.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "pipewatch", &mut std::io::stdout());
}
