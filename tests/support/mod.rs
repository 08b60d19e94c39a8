use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use cointrail::exchange::{ExchangeAccountRegistry, ExchangeApi, RawBalance};

/// Exchange stub with settable prices and balances.
#[derive(Default)]
pub struct MockExchange {
    prices: Mutex<HashMap<String, f64>>,
    balances: Mutex<HashMap<String, RawBalance>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, pair: &str, price: f64) {
        self.prices.lock().await.insert(pair.to_string(), price);
    }

    pub async fn set_balance(&self, asset: &str, available: f64, on_order: f64) {
        self.balances
            .lock()
            .await
            .insert(asset.to_string(), RawBalance { available, on_order });
    }
}

#[async_trait::async_trait]
impl ExchangeApi for MockExchange {
    async fn all_prices(&self) -> Result<HashMap<String, f64>> {
        Ok(self.prices.lock().await.clone())
    }

    async fn account_balances(&self) -> Result<HashMap<String, RawBalance>> {
        Ok(self.balances.lock().await.clone())
    }
}

/// Registry with one mock session per user plus a global mock session for
/// price queries.
pub fn mock_registry(
    global: Arc<MockExchange>,
    users: Vec<(&str, Arc<MockExchange>)>,
) -> ExchangeAccountRegistry {
    let sessions: HashMap<String, Arc<dyn ExchangeApi>> = users
        .into_iter()
        .map(|(id, exchange)| (id.to_string(), exchange as Arc<dyn ExchangeApi>))
        .collect();
    ExchangeAccountRegistry::with_sessions(global, sessions)
}
