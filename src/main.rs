//! Blinkband Monitor CLI
//!
//! Runs the server, a simulated sensor node, or a terminal dashboard.

use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use blinkband_monitor::{
    acquisition::{AcquisitionNode, HttpUplink, SimulatedSensor, SimulatedSensorConfig},
    client::MonitorClient,
    config::Config,
    core::DataSource,
    monitor::{PollConfig, PollLoop, TerminalRenderer},
    server::{self, ServerConfig},
    VERSION,
};

#[derive(Parser)]
#[command(name = "blinkband")]
#[command(version = VERSION)]
#[command(about = "Optical wristband glucose-trend monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Fixed seed for glucose noise
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a simulated sensor node that pushes to the server
    Node {
        /// Server base URL
        #[arg(long)]
        server_url: Option<String>,

        /// Simulate an uncovered sensor (warm-up never completes)
        #[arg(long)]
        no_finger: bool,
    },

    /// Poll the server and draw the trend in the terminal
    Watch {
        /// Server base URL
        #[arg(long)]
        server_url: Option<String>,

        /// Switch the active source before watching (manual or esp32)
        #[arg(long)]
        source: Option<DataSource>,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}), using defaults");
            Config::default()
        }
    };

    let result = match cli.command {
        Commands::Serve { host, port, seed } => cmd_serve(config, host, port, seed).await,
        Commands::Node {
            server_url,
            no_finger,
        } => cmd_node(config, server_url, no_finger).await,
        Commands::Watch { server_url, source } => cmd_watch(config, server_url, source).await,
        Commands::Config => {
            cmd_config(&config);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Resolve when Ctrl+C is pressed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn cmd_serve(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if seed.is_some() {
        config.glucose.noise_seed = seed;
    }

    println!("Blinkband Monitor v{VERSION}");
    println!();

    let (addr, shutdown_tx) = server::run(ServerConfig::from_config(&config)).await?;

    println!("Listening on http://{addr}");
    println!("  Buffer capacity: {}", config.buffer.capacity);
    println!("  Timezone: {}", config.glucose.timezone);
    println!();
    println!("Press Ctrl+C to stop");

    ctrl_c().await;
    println!();
    println!("Stopping server...");
    let _ = shutdown_tx.send(());
    // Let in-flight requests drain.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    Ok(())
}

async fn cmd_node(
    mut config: Config,
    server_url: Option<String>,
    no_finger: bool,
) -> anyhow::Result<()> {
    if let Some(url) = server_url {
        config.node.server_url = url;
    }

    let sensor = SimulatedSensor::new(SimulatedSensorConfig {
        finger_present: !no_finger,
        sample_period_secs: config.node.sample_interval.as_secs_f64(),
        ..SimulatedSensorConfig::default()
    });
    let uplink = HttpUplink::new(config.node.server_url.clone());

    println!("Blinkband node v{VERSION}");
    println!("  Device ID: {}", config.node.device_id);
    println!("  Server: {}", config.node.server_url);
    println!("  Push interval: {:?}", config.node.push_interval);
    println!();

    let mut node = AcquisitionNode::new(sensor, uplink, config.node);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    match node.run(shutdown_rx).await {
        Ok(summary) => {
            println!();
            println!(
                "Node stopped: {} ticks, {} pushes sent, {} failed, {} dropped",
                summary.ticks, summary.pushes_sent, summary.pushes_failed, summary.pushes_dropped
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_watch(
    mut config: Config,
    server_url: Option<String>,
    source: Option<DataSource>,
) -> anyhow::Result<()> {
    if let Some(url) = server_url {
        config.monitor.server_url = url;
    }

    let client = MonitorClient::new(config.monitor.server_url.clone());
    if let Some(source) = source {
        let response = client.set_source(source).await?;
        println!("{}", response.message);
    }

    println!("Watching {} (Ctrl+C to stop)", client.base_url());
    println!();

    let poll_config = PollConfig {
        interval: config.monitor.poll_interval,
        thresholds: config.monitor.thresholds(),
    };
    let mut poll = PollLoop::new(client, TerminalRenderer::new(), poll_config);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    poll.run(shutdown_rx).await;
    Ok(())
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}
