mod binance;
mod registry;

pub use binance::{BinanceClient, BinanceCredentials};
pub use registry::{ExchangeAccountRegistry, RegistryError};

use std::collections::HashMap;

use anyhow::Result;

/// A raw per-asset balance as reported by the exchange, validated at the
/// boundary (quantities parsed out of the wire payload; malformed entries
/// never reach this type).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBalance {
    pub available: f64,
    pub on_order: f64,
}

impl RawBalance {
    pub fn total(&self) -> f64 {
        self.available + self.on_order
    }
}

/// The two exchange operations the system consumes.
///
/// `all_prices` needs no credentials and is served by the global session;
/// `account_balances` requires a signed request on a per-user session.
#[async_trait::async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Full current price table: pair symbol (base+quote concatenation) to price.
    async fn all_prices(&self) -> Result<HashMap<String, f64>>;

    /// Current balances for the authenticated account, keyed by asset code.
    async fn account_balances(&self) -> Result<HashMap<String, RawBalance>>;
}
