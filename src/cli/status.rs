//! Status command implementation

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::config::Config;
use crate::credentials::{CredentialPair, FileStore, StorageKind};
use crate::error::Result;

/// Run the status command to display configuration and session status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "tokenpipe Status".bold());

    let config_path = Config::resolve_path(opts.config_ref())?;
    let mut config = Config::load_from(&config_path)?;
    if let Some(host) = opts.api_host_ref() {
        config.api_host = host.to_string();
    }

    if config_path.exists() {
        println!("Config file: {}", config_path.display().to_string().cyan());
    } else {
        println!(
            "Config file: {} {}",
            config_path.display().to_string().cyan(),
            "(not found, using defaults)".dimmed()
        );
    }
    println!("API host: {}", config.api_host.cyan());

    match config.storage {
        StorageKind::Memory => {
            println!("Storage: {}", "memory".bold());
            println!();
            println!(
                "{} Sessions are kept in memory and end with each command",
                "○".dimmed()
            );
            println!();
            return Ok(());
        }
        StorageKind::File => {
            let path = match &config.session_path {
                Some(path) => path.clone(),
                None => FileStore::default_path()?,
            };
            println!("Storage: {} ({})", "file".bold(), path.display());
        }
    }

    println!();

    match config.open_store()?.load() {
        Ok(Some(pair)) => print_session(&pair, Utc::now()),
        Ok(None) => {
            println!("{} Not logged in", "✗".red());
            println!("  → Run 'tokenpipe login' to start a session");
        }
        Err(err) => {
            println!("{} Session file unreadable: {}", "✗".red(), err);
            println!("  → Run 'tokenpipe login' to replace it");
        }
    }

    if let Some(ref email) = config.email {
        println!("{} Login email: {}", "○".dimmed(), email);
    }

    println!();
    Ok(())
}

fn print_session(pair: &CredentialPair, now: DateTime<Utc>) {
    match pair.expires_at {
        Some(expires_at) if pair.is_expired() => {
            println!(
                "{} Access token expired {} (will refresh on next request)",
                "⚠".yellow(),
                expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        Some(expires_at) => {
            println!(
                "{} Access token valid (expires in {})",
                "✓".green(),
                format_remaining(expires_at, now)
            );
        }
        None => {
            println!("{} Session stored (access token expiry unknown)", "✓".green());
        }
    }
}

/// Remaining lifetime as `XhYm`
fn format_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = expires_at.signed_duration_since(now);
    let hours = remaining.num_hours();
    let mins = remaining.num_minutes() % 60;
    format!("{}h {}m", hours, mins)
}
