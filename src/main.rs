use anyhow::Result;
use clap::Parser;
use hypergrid::config::{load_config, load_exchange_config};
use hypergrid::engine::Engine;
use hypergrid::exchange::HyperliquidClient;
use hypergrid::status::{self, StatusCache};
use log::{error, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "Hyperliquid grid trading engine", long_about = None)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long)]
    config: String,

    /// Port for the read-only status endpoint; disabled when omitted.
    #[arg(long)]
    status_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,hypergrid=debug"),
    )
    .format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "[{} {} {}] {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    })
    .init();

    let args = Args::parse();

    info!("Loading config from: {}", args.config);
    let config = load_config(&args.config)?;

    let exchange_config = match load_exchange_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load exchange config: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Trading {} on {} as {}",
        config.grid.symbol,
        exchange_config.network(),
        exchange_config.wallet_address
    );

    let client = Arc::new(HyperliquidClient::new(&exchange_config)?);
    let status_cache = Arc::new(StatusCache::new());

    if let Some(port) = args.status_port {
        let cache = status_cache.clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(cache, port).await {
                error!("Status server failed: {}", e);
            }
        });
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let mut engine = Engine::new(config, client, status_cache);
    if let Err(e) = engine.run(shutdown).await {
        error!("Engine error: {}", e);
        std::process::exit(1);
    }

    info!("Engine stopped gracefully");
    Ok(())
}
