use anyhow::Result;
use clap::Parser;
use tapmon::{config::Config, daemon};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// Remote-write endpoint (overrides config)
    #[arg(long, env = "TAPMON_ENDPOINT")]
    endpoint: Option<String>,

    /// Port for the status server (overrides config and enables the server)
    #[arg(short, long, env = "TAPMON_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_env("TAPMON_LOGLEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tapmon v{}", env!("CARGO_PKG_VERSION"));

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(endpoint) = args.endpoint {
        config.remote_write.endpoint = endpoint;
    }
    if let Some(port) = args.port {
        config.server.port = port;
        config.server.enabled = true;
    }

    info!("Configuration loaded successfully");
    info!("Devices configured: {}", config.devices.len());

    if let Err(e) = daemon::run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
