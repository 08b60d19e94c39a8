use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cointrail::config::{default_config_path, ResolvedConfig, Role};
use cointrail::exchange::{BinanceCredentials, ExchangeAccountRegistry};
use cointrail::pricing::{FiatValuator, PriceCache};
use cointrail::scheduler::{start_price_refresh, SnapshotScheduler, TaskError, TaskHandle};
use cointrail::storage::{JsonFileStorage, SnapshotStore, UserStore};

use cointrail_server::{router, AppState};

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "cointrail-server")]
#[command(about = "Balance snapshot scheduler and history query server")]
struct Cli {
    /// Path to cointrail config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Override the configured instance role (serve, schedule, both).
    #[arg(long, value_parser = parse_role)]
    role: Option<Role>,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = ResolvedConfig::load_or_default(&cli.config)?;
    let role = cli.role.unwrap_or(config.role);
    let port = cli.port.unwrap_or(config.server.port);

    let storage = Arc::new(JsonFileStorage::new(&config.data_dir));

    let mut handles: Vec<TaskHandle> = Vec::new();

    if role.schedules() {
        let users = storage
            .active_users()
            .await
            .context("Failed to load users")?;
        info!(users = users.len(), "starting scheduler");

        let registry = Arc::new(
            ExchangeAccountRegistry::initialize(
                config.exchange.base_url.as_deref(),
                BinanceCredentials::new(&config.exchange.api_key, &config.exchange.api_secret),
                &users,
            )
            .await?,
        );

        let (errors_tx, mut errors_rx) = mpsc::unbounded_channel::<TaskError>();
        tokio::spawn(async move {
            while let Some(err) = errors_rx.recv().await {
                warn!(task = %err.task, message = %err.message, "background task error");
            }
        });

        // Cold-start contract: the cache is primed before any balance tick runs.
        let cache = Arc::new(PriceCache::new());
        let price_handle = start_price_refresh(
            Arc::clone(&cache),
            registry.global(),
            config.scheduler.price_refresh_interval,
            Some(errors_tx.clone()),
        )
        .await?;
        handles.push(price_handle);

        let valuator = Arc::new(FiatValuator::new(cache));
        let scheduler = Arc::new(
            SnapshotScheduler::new(
                registry,
                valuator,
                Arc::clone(&storage) as Arc<dyn SnapshotStore>,
            )
            .with_poll_interval(config.scheduler.balance_poll_interval)
            .with_error_channel(errors_tx),
        );
        handles.extend(scheduler.start());
    }

    if role.serves() {
        let state = AppState::new(
            Arc::clone(&storage) as Arc<dyn SnapshotStore>,
            config.provider.clone(),
        );
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("Failed to bind port {port}"))?;
        info!(port, "history server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;
    } else {
        shutdown_signal().await;
    }

    info!("shutting down");
    for handle in handles {
        handle.cancel().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
