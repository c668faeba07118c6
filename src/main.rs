use anyhow::{Context, Result};
use clap::Parser;
use sessionbot::config::{AgentConfig, GatewayKind};
use sessionbot::execution::SessionController;
use sessionbot::logging;
use sessionbot::venue::{BridgeGateway, PaperGateway, VenueGateway};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sessionbot")]
#[command(about = "Intraday MACD/RSI trading agent with end-of-session flattening")]
struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Trade against the simulated venue regardless of configuration
    #[arg(long)]
    paper: bool,

    /// Override the event log path from the configuration
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = AgentConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    logging::init(&config.logging, cli.log_file.as_deref())
        .context("failed to initialise logging")?;

    tracing::info!("🚀 SessionBot starting");
    tracing::info!(
        symbol = %config.trading.symbol,
        timeframe = %config.strategy.timeframe,
        volume = config.trading.volume,
        mode = ?config.trading.decision_mode,
        "Configuration loaded"
    );

    let gateway = if cli.paper {
        GatewayKind::Paper
    } else {
        config.venue.gateway
    };

    match gateway {
        GatewayKind::Bridge => {
            let timeout = config.venue.request_timeout_secs.map(Duration::from_secs);
            let gateway = BridgeGateway::new(config.venue.address.as_str(), timeout)?;
            run(gateway, &config).await
        }
        GatewayKind::Paper => {
            tracing::info!(seed = config.venue.paper_seed, "Using paper venue");
            let gateway = PaperGateway::new(config.venue.paper_seed, config.venue.paper_start_price);
            run(gateway, &config).await
        }
    }
}

async fn run<G: VenueGateway>(mut gateway: G, config: &AgentConfig) -> Result<()> {
    gateway
        .connect(&config.venue.credentials())
        .await
        .context("failed to connect to venue")?;

    tracing::info!(
        login = config.venue.login,
        server = %config.venue.server,
        "✅ Connected to venue"
    );

    let mut controller = SessionController::new(gateway, config);
    controller.run(shutdown_signal()).await;

    tracing::info!("👋 SessionBot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Received Ctrl+C, shutting down...");
}
