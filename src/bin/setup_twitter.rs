//! setup-twitter — store and verify the Twitter credentials used for announcements.
//!
//! Expects `config.toml` to already exist (copied from `config.toml.template`).
//! Reads the four OAuth 1.0a values, checks them against the Twitter API,
//! prints the account they belong to, and writes them into the config file.
//!
//! By default, secrets are read interactively (hidden input) to avoid
//! leaking them into shell history. Use the flags only for scripted/CI use.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use stream_announcer::announce::TwitterAnnouncer;
use stream_announcer::config::{AppConfig, CONFIG_PATH, TwitterConfig};

#[derive(Parser)]
#[command(
    name = "setup-twitter",
    about = "Verify Twitter credentials and save them to config.toml"
)]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    #[arg(long)]
    consumer_key: Option<String>,

    #[arg(long)]
    consumer_secret: Option<String>,

    #[arg(long)]
    access_token: Option<String>,

    #[arg(long)]
    access_secret: Option<String>,
}

fn read_value(flag: Option<String>, prompt: &str, hidden: bool) -> Result<String> {
    let value = match flag {
        Some(v) => v,
        None if hidden => rpassword::prompt_password(prompt)
            .with_context(|| format!("failed to read {prompt}"))?,
        None => {
            eprint!("{prompt}");
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .with_context(|| format!("failed to read {prompt}"))?;
            line
        }
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        bail!("{} cannot be empty", prompt.trim_end_matches(": "));
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut app_config = AppConfig::load(&cli.config).with_context(|| {
        format!(
            "{} not found — copy config.toml.template to config.toml first",
            cli.config.display()
        )
    })?;

    println!("=== Stream Announcer — Twitter Setup ===\n");

    // ── Step 1: Read credentials ───────────────────────────────────
    let credentials = TwitterConfig {
        consumer_key: read_value(cli.consumer_key, "Consumer key: ", false)?,
        consumer_secret: read_value(cli.consumer_secret, "Consumer secret: ", true)?,
        access_token: read_value(cli.access_token, "Access token: ", false)?,
        access_secret: read_value(cli.access_secret, "Access secret: ", true)?,
    };

    // ── Step 2: Verify with the API ────────────────────────────────
    println!("Verifying credentials...");
    let username = TwitterAnnouncer::new(credentials.clone())
        .verify_credentials()
        .await
        .context("Twitter rejected the credentials")?;
    println!("  Authenticated as @{username}");
    println!();

    // ── Step 3: Save to config.toml ────────────────────────────────
    println!("Updating credentials in {}...", cli.config.display());
    app_config.twitter = credentials;
    app_config.settings.use_twitter = true;
    app_config.save(&cli.config)?;
    println!("  Config updated successfully");
    println!();

    println!("=== Setup Complete ===");
    println!();
    println!("Next steps:");
    println!("  cargo run --bin probe_team -- --site twitch");
    println!("  cargo run --bin announcer -- --once");

    Ok(())
}
