//! Airlink node runner
//!
//! Runs either the room node or the fan node against a real MQTT broker, using
//! simulated sensors and outputs on a host build.

use airlink::config::NodeConfig;
use airlink::hal::{LoggingActuator, SimulatedSensor};
use airlink::node::{FanNode, PublisherNode, DEFAULT_TICK};
use airlink::observability::{init_default_logging, metrics::metrics};
use airlink::session_span;
use airlink::transport::mqtt::MqttTransport;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info, warn, Instrument};

/// Indoor air quality room and fan nodes over MQTT
#[derive(Parser)]
#[command(name = "airlink")]
#[command(about = "Indoor air quality room and fan nodes over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the room node: sample, publish and drive the indicator
    Room,
    /// Run the fan node: subscribe and switch the fan
    Fan,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // -v raises the default level unless LOG_LEVEL is set explicitly
    if cli.verbose > 0 && std::env::var("LOG_LEVEL").is_err() {
        let level = if cli.verbose > 1 { "TRACE" } else { "DEBUG" };
        std::env::set_var("LOG_LEVEL", level);
    }
    init_default_logging();

    info!("Starting airlink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Room => run_room(config).await,
        Commands::Fan => run_fan(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<NodeConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(NodeConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            for path_str in ["airlink.toml", "config/airlink.toml"] {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(NodeConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create airlink.toml".into())
        }
    }
}

fn log_network(config: &NodeConfig) {
    if let Some(network) = &config.network {
        let has_password = config.get_network_password().is_some();
        info!(ssid = %network.ssid, has_password, "Expecting host network association");
    }
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => info!("Received SIGINT, shutting down gracefully..."),
        _ = sigterm => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

fn log_metrics() {
    match serde_json::to_string(&metrics().snapshot()) {
        Ok(snapshot) => info!(metrics = %snapshot, "Final metrics"),
        Err(e) => warn!("Failed to serialize metrics: {}", e),
    }
}

async fn run_room(config: NodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    log_network(&config);
    let transport = MqttTransport::new(config.mqtt.clone())?;
    let mut node = PublisherNode::new(
        &config,
        transport,
        SimulatedSensor::default(),
        LoggingActuator::new(),
    );

    node.start()?;

    let span = session_span!(node_id = %config.node.id, role = "room");
    let result = node
        .run(shutdown_signal(), DEFAULT_TICK)
        .instrument(span)
        .await;

    info!(stats = ?node.session().stats(), "Session statistics");
    log_metrics();
    Ok(result?)
}

async fn run_fan(config: NodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    log_network(&config);
    let transport = MqttTransport::new(config.mqtt.clone())?;
    let mut node = FanNode::new(&config, transport, LoggingActuator::new());

    node.start()?;

    let span = session_span!(node_id = %config.node.id, role = "fan");
    let result = node
        .run(shutdown_signal(), DEFAULT_TICK)
        .instrument(span)
        .await;

    info!(stats = ?node.session().stats(), "Session statistics");
    log_metrics();
    Ok(result?)
}

fn handle_config_command(config: &NodeConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
