use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::exchange::RawBalance;
use crate::models::AssetBalance;

use super::PriceCache;

/// Quote asset all fiat values are denominated in.
const FIAT_QUOTE: &str = "USDT";

/// Assets treated as pegged 1:1 to the fiat reference.
const DEFAULT_STABLECOINS: [&str; 2] = ["USDT", "BUSD"];

/// Quote assets probed for a direct pair, in order.
const DEFAULT_DIRECT_QUOTES: [&str; 2] = ["USDT", "BUSD"];

/// Intermediate assets tried when no direct fiat pair exists, in order.
const DEFAULT_BRIDGE_ASSETS: [&str; 2] = ["BTC", "ETH"];

/// A resolved fiat price and the value it implies for some quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub price: f64,
    pub value: f64,
}

/// Resolves fiat prices for asset codes over the shared [`PriceCache`].
///
/// Resolution order: stablecoin peg, direct pair against each configured
/// quote, a two-edge bridge through an intermediate asset, then zero. A zero
/// price is a documented fallback, not an error.
pub struct FiatValuator {
    cache: Arc<PriceCache>,
    stablecoins: Vec<String>,
    direct_quotes: Vec<String>,
    bridge_assets: Vec<String>,
}

impl FiatValuator {
    pub fn new(cache: Arc<PriceCache>) -> Self {
        Self {
            cache,
            stablecoins: DEFAULT_STABLECOINS.iter().map(|s| s.to_string()).collect(),
            direct_quotes: DEFAULT_DIRECT_QUOTES.iter().map(|s| s.to_string()).collect(),
            bridge_assets: DEFAULT_BRIDGE_ASSETS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_stablecoins(mut self, stablecoins: Vec<String>) -> Self {
        self.stablecoins = stablecoins;
        self
    }

    pub fn with_bridge_assets(mut self, bridge_assets: Vec<String>) -> Self {
        self.bridge_assets = bridge_assets;
        self
    }

    /// Fiat price for an asset code, zero when no conversion path exists.
    pub fn resolve_price(&self, code: &str) -> f64 {
        if self.stablecoins.iter().any(|s| s == code) {
            return 1.0;
        }

        for quote in &self.direct_quotes {
            if let Some(price) = self.cache.lookup(&format!("{code}{quote}")) {
                return price;
            }
        }

        // Bridge: {code}{X} priced against X's own fiat pair.
        for bridge in &self.bridge_assets {
            let edge = self.cache.lookup(&format!("{code}{bridge}"));
            let fiat = self.cache.lookup(&format!("{bridge}{FIAT_QUOTE}"));
            if let (Some(edge), Some(fiat)) = (edge, fiat) {
                return edge * fiat;
            }
        }

        0.0
    }

    pub fn valuate(&self, code: &str, quantity: f64) -> Valuation {
        let price = self.resolve_price(code);
        Valuation {
            price,
            value: price * quantity,
        }
    }

    /// Keeps only assets whose total quantity is positive.
    ///
    /// Assets with `available + on_order <= 0` are absent from the result,
    /// not present with a zero value.
    pub fn filter_non_zero(raw: &HashMap<String, RawBalance>) -> BTreeMap<String, AssetBalance> {
        raw.iter()
            .filter(|(_, balance)| balance.total() > 0.0)
            .map(|(code, balance)| {
                (
                    code.clone(),
                    AssetBalance::from_quantities(balance.available, balance.on_order),
                )
            })
            .collect()
    }

    /// Filters raw balances and resolves each survivor's price and value.
    pub fn valuate_balances(
        &self,
        raw: &HashMap<String, RawBalance>,
    ) -> BTreeMap<String, AssetBalance> {
        let mut balances = Self::filter_non_zero(raw);
        for (code, balance) in balances.iter_mut() {
            let valuation = self.valuate(code, balance.total);
            balance.price = valuation.price;
            balance.value = valuation.value;
        }
        balances
    }
}
