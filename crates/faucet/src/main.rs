//! Faucet service binary

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use testnet_faucet::coordinator::DisbursementSettings;
use testnet_faucet::logging::init_logging;
use testnet_faucet::{api, DisbursementCoordinator, EligibilityGate, FaucetConfig, JsonRpcLedger};
use tokio::signal;
use tracing::{debug, info};

/// Faucet service CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, env = "FAUCET_CONFIG")]
    config: Option<PathBuf>,

    /// Server address
    #[arg(long)]
    server_addr: Option<String>,

    /// RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Dispense amount (in ether)
    #[arg(long)]
    dispense_amount: Option<String>,

    /// Per-address cooldown (seconds)
    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = FaucetConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(addr) = args.server_addr {
        config.server_addr = addr;
    }

    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }

    if let Some(amount) = args.dispense_amount {
        config.dispense_amount = amount;
    }

    if let Some(cooldown) = args.cooldown_secs {
        config.cooldown_secs = cooldown;
    }

    if args.debug {
        config.logging.level = "debug".to_string();
    }

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("logging: {}", e))?;
    config.validate()?;

    info!("Starting testnet faucet v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  RPC URL: {}", config.rpc_url);
    info!("  Dispense amount: {} ETH", config.dispense_amount);
    info!("  Address cooldown: {}s", config.cooldown_secs);

    let ledger = JsonRpcLedger::new(config.rpc_url.clone(), &config.private_key, config.rpc_timeout())?;
    let gate = EligibilityGate::new(config.cooldown_duration());
    let settings = DisbursementSettings::from_config(&config)?;
    let coordinator = DisbursementCoordinator::new(Arc::new(ledger), gate.clone(), settings)?;

    if config.prune_interval_secs > 0 {
        let period = Duration::from_secs(config.prune_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = gate.prune();
                debug!("Pruned {} expired cooldown entries", removed);
            }
        });
    }

    let app = api::router(coordinator, config.cors_enabled);

    let addr: SocketAddr = config.server_addr.parse()?;
    info!("Faucet server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
