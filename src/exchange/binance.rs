//! Binance REST client.
//!
//! Covers the three endpoints the system consumes: the server-time handshake,
//! the full ticker-price table, and the signed account-balance query.
//! Signed requests carry a millisecond timestamp; Binance rejects signatures
//! whose timestamp drifts from the server clock, so every session syncs
//! server time once before first authenticated use.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use super::{ExchangeApi, RawBalance};

const BINANCE_API_BASE: &str = "https://api.binance.com";

const DEFAULT_RECV_WINDOW_MS: u64 = 5_000;

type HmacSha256 = Hmac<Sha256>;

/// A user's (or the global market-data) API key pair.
#[derive(Debug, Clone)]
pub struct BinanceCredentials {
    pub key: String,
    pub secret: String,
}

impl BinanceCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerTimeResponse {
    #[serde(rename = "serverTime")]
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AccountAssetEntry>,
}

#[derive(Debug, Deserialize)]
struct AccountAssetEntry {
    asset: String,
    free: String,
    locked: String,
}

/// One session against the Binance REST API.
///
/// Unauthenticated sessions can only fetch the price table; sessions built
/// with credentials can additionally fetch account balances.
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<BinanceCredentials>,
    recv_window_ms: u64,
    /// Server clock minus local clock, applied to signed request timestamps.
    time_offset_ms: i64,
}

impl BinanceClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BINANCE_API_BASE.to_string(),
            credentials: None,
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
            time_offset_ms: 0,
        }
    }

    /// Creates a client with a custom reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            ..Self::new()
        }
    }

    /// Overrides the API base URL (used by tests to point at a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credentials(mut self, credentials: BinanceCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_recv_window_ms(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    pub fn time_offset_ms(&self) -> i64 {
        self.time_offset_ms
    }

    /// Server-time synchronization handshake.
    ///
    /// Must complete once per session before the first signed request.
    pub async fn sync_server_time(&mut self) -> Result<()> {
        let url = format!("{}/api/v3/time", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Binance time endpoint error: {status} - {body}"));
        }

        let data: ServerTimeResponse = response.json().await?;
        self.time_offset_ms = data.server_time - Utc::now().timestamp_millis();
        Ok(())
    }

    fn signed_timestamp_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.time_offset_ms
    }

    fn sign(&self, query: &str, secret: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow!("invalid API secret: {e}"))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ExchangeApi for BinanceClient {
    async fn all_prices(&self) -> Result<HashMap<String, f64>> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Binance ticker endpoint error: {status} - {body}"));
        }

        let tickers: Vec<TickerPrice> = response
            .json()
            .await
            .context("Failed to parse ticker price response")?;

        let mut prices = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            match ticker.price.parse::<f64>() {
                Ok(price) => {
                    prices.insert(ticker.symbol, price);
                }
                Err(_) => {
                    warn!(symbol = %ticker.symbol, price = %ticker.price, "dropping unparseable ticker price");
                }
            }
        }
        Ok(prices)
    }

    async fn account_balances(&self) -> Result<HashMap<String, RawBalance>> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| anyhow!("account balances require an authenticated session"))?;

        let query = format!(
            "timestamp={}&recvWindow={}",
            self.signed_timestamp_ms(),
            self.recv_window_ms
        );
        let signature = self.sign(&query, &credentials.secret)?;
        let url = format!("{}/api/v3/account?{query}&signature={signature}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &credentials.key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Binance account endpoint error: {status} - {body}"));
        }

        let account: AccountResponse = response
            .json()
            .await
            .context("Failed to parse account response")?;

        let mut balances = HashMap::with_capacity(account.balances.len());
        for entry in account.balances {
            match (entry.free.parse::<f64>(), entry.locked.parse::<f64>()) {
                (Ok(available), Ok(on_order)) => {
                    balances.insert(entry.asset, RawBalance { available, on_order });
                }
                _ => {
                    warn!(asset = %entry.asset, "dropping account entry with unparseable quantities");
                }
            }
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // Example from the Binance API documentation.
        let client = BinanceClient::new();
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        let signature = client.sign(query, secret).unwrap();
        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BinanceClient::new().with_base_url("http://localhost:9999/");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
