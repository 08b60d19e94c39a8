use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::exchange::ExchangeApi;
use crate::pricing::PriceCache;

use super::{spawn_repeating, TaskError, TaskHandle};

/// Performs the cold-start price refresh and starts the refresh timer.
///
/// The first refresh runs to completion before this returns, so no valuation
/// ever runs against an empty cache; its failure is a startup failure. Later
/// refresh failures are logged/forwarded and the stale table stays in use
/// until the next tick.
pub async fn start_price_refresh(
    cache: Arc<PriceCache>,
    exchange: Arc<dyn ExchangeApi>,
    period: Duration,
    errors: Option<mpsc::UnboundedSender<TaskError>>,
) -> Result<TaskHandle> {
    let pairs = cache
        .refresh_from(exchange.as_ref())
        .await
        .context("Initial price refresh failed")?;
    info!(pairs, "price cache primed");

    let handle = spawn_repeating("price-refresh", period, errors, move || {
        let cache = Arc::clone(&cache);
        let exchange = Arc::clone(&exchange);
        async move {
            cache.refresh_from(exchange.as_ref()).await?;
            Ok(())
        }
    });

    Ok(handle)
}
