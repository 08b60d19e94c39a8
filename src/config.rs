use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::duration::deserialize_duration;

/// Environment variables holding the global (market-data) API credentials.
/// They override whatever the config file carries.
pub const GLOBAL_API_KEY_ENV: &str = "COINTRAIL_API_KEY";
pub const GLOBAL_API_SECRET_ENV: &str = "COINTRAIL_API_SECRET";

/// Default provider name; the only one history requests are routed to.
fn default_provider() -> String {
    "binance".to_string()
}

/// Which halves of the system this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Only the history query server.
    Serve,
    /// Only the price refresher and balance schedulers.
    Schedule,
    #[default]
    Both,
}

impl Role {
    pub fn serves(&self) -> bool {
        matches!(self, Role::Serve | Role::Both)
    }

    pub fn schedules(&self) -> bool {
        matches!(self, Role::Schedule | Role::Both)
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "serve" => Ok(Role::Serve),
            "schedule" => Ok(Role::Schedule),
            "both" => Ok(Role::Both),
            other => anyhow::bail!("Unknown role {other:?} (expected serve, schedule, or both)"),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Exchange API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Override of the exchange REST base URL (tests, proxies).
    pub base_url: Option<String>,

    /// Global market-data API key; `COINTRAIL_API_KEY` wins over this.
    pub api_key: String,

    /// Global market-data API secret; `COINTRAIL_API_SECRET` wins over this.
    pub api_secret: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

/// Default price-refresh interval (25s).
fn default_price_refresh_interval() -> Duration {
    Duration::from_secs(25)
}

/// Default balance-poll interval (60s).
fn default_balance_poll_interval() -> Duration {
    Duration::from_secs(60)
}

/// Timer configuration for the scheduler half.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the price cache refreshes. Valuations may use prices up to
    /// this much older than the tick that reads them.
    #[serde(
        default = "default_price_refresh_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub price_refresh_interval: Duration,

    /// How often each user's balances are polled and snapshotted.
    #[serde(
        default = "default_balance_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub balance_poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            price_refresh_interval: default_price_refresh_interval(),
            balance_poll_interval: default_balance_poll_interval(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Provider name history requests must match.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Which halves of the system this process runs.
    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            provider: default_provider(),
            role: Role::default(),
            server: ServerConfig::default(),
            exchange: ExchangeConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./cointrail.toml` if it exists in current directory
/// 2. `~/.local/share/cointrail/cointrail.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("cointrail.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("cointrail").join("cointrail.toml");
    }

    local_config
}

/// Loaded configuration with resolved paths and credentials.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The resolved data directory path.
    pub data_dir: PathBuf,

    pub provider: String,

    pub role: Role,

    pub server: ServerConfig,

    pub exchange: ExchangeConfig,

    pub scheduler: SchedulerConfig,
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    ///
    /// The data directory is resolved relative to the config file's parent
    /// directory, and credential env vars override the file's values.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        let data_dir = config.resolve_data_dir(config_dir);

        Ok(Self::from_parts(config, data_dir))
    }

    /// Load config, creating a default if the file doesn't exist.
    ///
    /// If the config file doesn't exist, uses the config file's intended
    /// parent directory as the data directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };

        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        let config = Config::default();
        let data_dir = config.resolve_data_dir(config_dir);

        Ok(Self::from_parts(config, data_dir))
    }

    fn from_parts(config: Config, data_dir: PathBuf) -> Self {
        let mut exchange = config.exchange;
        if let Ok(key) = std::env::var(GLOBAL_API_KEY_ENV) {
            exchange.api_key = key;
        }
        if let Ok(secret) = std::env::var(GLOBAL_API_SECRET_ENV) {
            exchange.api_secret = secret;
        }

        Self {
            data_dir,
            provider: config.provider,
            role: config.role,
            server: config.server,
            exchange,
            scheduler: config.scheduler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_everything() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.provider, "binance");
        assert_eq!(config.role, Role::Both);
        assert_eq!(config.server.port, 3000);
        assert_eq!(
            config.scheduler.price_refresh_interval,
            Duration::from_secs(25)
        );
        assert_eq!(
            config.scheduler.balance_poll_interval,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn intervals_parse_from_human_durations() {
        let config: Config = toml::from_str(
            r#"
            role = "schedule"

            [scheduler]
            price_refresh_interval = "10s"
            balance_poll_interval = "5m"
            "#,
        )
        .unwrap();
        assert_eq!(config.role, Role::Schedule);
        assert!(config.role.schedules());
        assert!(!config.role.serves());
        assert_eq!(
            config.scheduler.price_refresh_interval,
            Duration::from_secs(10)
        );
        assert_eq!(
            config.scheduler.balance_poll_interval,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn role_parses_from_str() {
        assert_eq!("serve".parse::<Role>().unwrap(), Role::Serve);
        assert_eq!(" Both ".parse::<Role>().unwrap(), Role::Both);
        assert!("neither".parse::<Role>().is_err());
    }

    #[test]
    fn data_dir_resolution() {
        let config = Config {
            data_dir: Some(PathBuf::from("data")),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_data_dir(Path::new("/etc/cointrail")),
            PathBuf::from("/etc/cointrail/data")
        );

        let config = Config::default();
        assert_eq!(
            config.resolve_data_dir(Path::new("/etc/cointrail")),
            PathBuf::from("/etc/cointrail")
        );
    }
}
