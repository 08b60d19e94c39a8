use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use tracing::debug;

use crate::exchange::ExchangeApi;

/// Latest known price per traded pair.
///
/// Refreshes overwrite entries in place rather than clearing first, so after
/// the first successful refresh readers never observe an empty table. A pair
/// absent from the cache is indistinguishable from "not yet priced".
#[derive(Default)]
pub struct PriceCache {
    prices: RwLock<HashMap<String, f64>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached price for a pair symbol. Never blocks on I/O and never fetches.
    pub fn lookup(&self, pair: &str) -> Option<f64> {
        let prices = self.prices.read().expect("price cache lock poisoned");
        prices.get(pair).copied()
    }

    /// Merges a freshly fetched table into the cache, last write wins.
    pub fn apply(&self, updates: HashMap<String, f64>) -> usize {
        let count = updates.len();
        let mut prices = self.prices.write().expect("price cache lock poisoned");
        for (pair, price) in updates {
            prices.insert(pair, price);
        }
        count
    }

    /// Fetches the full price table from the given session and merges it in.
    ///
    /// On failure the previous contents are left untouched.
    pub async fn refresh_from(&self, exchange: &dyn ExchangeApi) -> Result<usize> {
        let table = exchange.all_prices().await?;
        let count = self.apply(table);
        debug!(pairs = count, "price cache refreshed");
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.prices.read().expect("price cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
