use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cointrail::config::{default_config_path, ResolvedConfig};
use cointrail::duration::format_duration;
use cointrail::storage::{JsonFileStorage, UserStore};

#[derive(Parser)]
#[command(name = "cointrail")]
#[command(about = "Exchange portfolio tracker")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,
    /// List active users
    Users,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ResolvedConfig::load_or_default(&cli.config)?;

    match cli.command {
        Some(Command::Config) => {
            println!("Config file: {}", cli.config.display());
            println!("Data directory: {}", config.data_dir.display());
            println!("Provider: {}", config.provider);
            println!("Role: {:?}", config.role);
            println!(
                "Price refresh interval: {}",
                format_duration(config.scheduler.price_refresh_interval)
            );
            println!(
                "Balance poll interval: {}",
                format_duration(config.scheduler.balance_poll_interval)
            );
        }
        Some(Command::Users) => {
            let storage = JsonFileStorage::new(&config.data_dir);
            let users = storage.active_users().await?;
            if users.is_empty() {
                println!("No active users.");
            }
            for user in users {
                println!("{}  {}", user.id, user.name);
            }
        }
        None => {
            println!("cointrail - Exchange Portfolio Tracker");
            println!("======================================\n");
            println!("Config: {}", cli.config.display());
            println!("Data directory: {}\n", config.data_dir.display());
            println!("Commands:");
            println!("  config    Show current configuration");
            println!("  users     List active users\n");
            println!("Run 'cointrail --help' for more options.");
        }
    }

    Ok(())
}
