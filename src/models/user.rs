use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account holder whose exchange balances are tracked.
///
/// Credentials are the user's own exchange API key pair; only users with
/// `active == true` get an exchange session at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(id: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}
