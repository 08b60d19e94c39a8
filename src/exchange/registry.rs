use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::User;

use super::{BinanceClient, BinanceCredentials, ExchangeApi};

/// Errors for session lookups against the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid user id")]
    InvalidUserId,
    #[error("user {user_id} has no initialized exchange session")]
    NotInitialized { user_id: String },
}

/// Holds one authenticated exchange session per active user plus one global
/// market-data session, all created at startup.
///
/// The registry is immutable after `initialize`: users activated later are
/// invisible until the process restarts, and sessions are never recreated.
pub struct ExchangeAccountRegistry {
    global: Arc<dyn ExchangeApi>,
    sessions: HashMap<String, Arc<dyn ExchangeApi>>,
}

impl ExchangeAccountRegistry {
    /// Opens the global session and one session per user, performing the
    /// server-time handshake on each before it is considered ready.
    pub async fn initialize(
        base_url: Option<&str>,
        global_credentials: BinanceCredentials,
        users: &[User],
    ) -> Result<Self> {
        let global = connect_session(base_url, global_credentials)
            .await
            .context("Failed to open global exchange session")?;

        let mut sessions = HashMap::with_capacity(users.len());
        for user in users {
            let credentials = BinanceCredentials::new(&user.api_key, &user.api_secret);
            let session = connect_session(base_url, credentials)
                .await
                .with_context(|| format!("Failed to open exchange session for user {}", user.id))?;
            sessions.insert(user.id.clone(), session);
        }

        info!(users = sessions.len(), "exchange sessions initialized");

        Ok(Self { global, sessions })
    }

    /// Builds a registry from pre-constructed sessions (used by tests).
    pub fn with_sessions(
        global: Arc<dyn ExchangeApi>,
        sessions: HashMap<String, Arc<dyn ExchangeApi>>,
    ) -> Self {
        Self { global, sessions }
    }

    /// The unauthenticated session used only for price queries.
    pub fn global(&self) -> Arc<dyn ExchangeApi> {
        Arc::clone(&self.global)
    }

    pub fn session(&self, user_id: &str) -> Result<Arc<dyn ExchangeApi>, RegistryError> {
        if user_id.is_empty() {
            return Err(RegistryError::InvalidUserId);
        }
        self.sessions
            .get(user_id)
            .map(Arc::clone)
            .ok_or_else(|| RegistryError::NotInitialized {
                user_id: user_id.to_string(),
            })
    }

    pub fn user_ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }
}

async fn connect_session(
    base_url: Option<&str>,
    credentials: BinanceCredentials,
) -> Result<Arc<dyn ExchangeApi>> {
    let mut client = BinanceClient::new().with_credentials(credentials);
    if let Some(base_url) = base_url {
        client = client.with_base_url(base_url);
    }
    client.sync_server_time().await?;
    Ok(Arc::new(client))
}
