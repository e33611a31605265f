use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use stream_announcer::announce::{Announcer, ConsoleAnnouncer, TwitterAnnouncer};
use stream_announcer::api::{self, HitboxTeamSource, StreamSource, TwitchTeamSource};
use stream_announcer::config::{AppConfig, CONFIG_PATH, SettingsConfig};
use stream_announcer::engine::Engine;
use stream_announcer::reporter;
use stream_announcer::types::Site;

#[derive(Parser)]
#[command(name = "announcer", about = "Announce team streamers going live on tracked games")]
struct Args {
    /// Path to the config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Run a single cycle and exit (for cron / external schedulers)
    #[arg(long)]
    once: bool,

    /// Print announcements instead of tweeting them
    #[arg(long)]
    dry_run: bool,
}

/// Console logging on stderr, plus an optional plain-text copy in `log_file`.
fn init_logging(settings: &SettingsConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_log_filter()));
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match &settings.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("failed to open log file {}: {e}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set global subscriber: {e}"))?;
    Ok(guard)
}

fn build_sources(config: &AppConfig, client: &reqwest::Client) -> Vec<Box<dyn StreamSource>> {
    let mut sources: Vec<Box<dyn StreamSource>> = Vec::new();
    for site in Site::ALL {
        let Some(team) = config.teams.team(site) else {
            continue;
        };
        match site {
            Site::Twitch => sources.push(Box::new(TwitchTeamSource::new(client.clone(), team))),
            Site::Hitbox => sources.push(Box::new(HitboxTeamSource::new(client.clone(), team))),
        }
    }
    sources
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    config.twitter.apply_env();
    let _log_guard = init_logging(&config.settings)?;
    info!("Loaded config from {}", args.config.display());

    let client = api::http_client()?;
    let sources = build_sources(&config, &client);
    if sources.is_empty() {
        anyhow::bail!("No teams configured; set [teams] twitch and/or hitbox");
    }

    let tweeting = config.settings.use_twitter && !args.dry_run;
    let announcer: Box<dyn Announcer> = if tweeting {
        if !config.twitter.is_complete() {
            anyhow::bail!("use_twitter is set but Twitter credentials are incomplete");
        }
        Box::new(TwitterAnnouncer::new(config.twitter.clone()))
    } else {
        Box::new(ConsoleAnnouncer)
    };

    let poll_interval_secs = config.settings.poll_interval_secs;
    info!(
        "Starting announcer — sites={} tweeting={tweeting} expire={}m poll={poll_interval_secs}s",
        sources
            .iter()
            .map(|s| s.site().to_string())
            .collect::<Vec<_>>()
            .join(","),
        config.settings.recently_live_expire_minutes,
    );

    let mut engine = Engine::new(&config, sources, announcer, client)?;
    let poll_duration = Duration::from_secs(poll_interval_secs);

    loop {
        match engine.run_cycle(chrono::Utc::now()).await {
            Ok(report) => reporter::report_cycle(&report),
            Err(e) => warn!("Poll cycle error: {e:#}"),
        }

        if args.once {
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(poll_duration) => {}
        }
    }

    Ok(())
}
