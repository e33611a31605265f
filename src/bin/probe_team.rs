//! Probe: one fetch of a site's team endpoint.
//!
//! Prints the normalized live channels (name, display name, game) and
//! whether each game is on the tracked list, without touching saved state.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

use stream_announcer::api::{self, HitboxTeamSource, StreamSource, TwitchTeamSource};
use stream_announcer::config::{AppConfig, CONFIG_PATH};
use stream_announcer::roster::Roster;
use stream_announcer::types::Site;

#[derive(Clone, Copy, ValueEnum)]
enum SiteArg {
    Twitch,
    Hitbox,
}

impl From<SiteArg> for Site {
    fn from(arg: SiteArg) -> Self {
        match arg {
            SiteArg::Twitch => Site::Twitch,
            SiteArg::Hitbox => Site::Hitbox,
        }
    }
}

#[derive(Parser)]
#[command(name = "probe_team", about = "Fetch a team's live channels once and print them")]
struct Args {
    #[arg(long, value_enum)]
    site: SiteArg,

    /// Team name; defaults to the one in the config file
    #[arg(long)]
    team: Option<String>,

    /// Path to the config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let site = Site::from(args.site);
    let config = AppConfig::load(&args.config).unwrap_or_default();

    let team = match args.team.or_else(|| config.teams.team(site).map(str::to_string)) {
        Some(team) => team,
        None => bail!("no {site} team given and none configured"),
    };

    let client = api::http_client()?;
    let source: Box<dyn StreamSource> = match site {
        Site::Twitch => Box::new(TwitchTeamSource::new(client, &team)),
        Site::Hitbox => Box::new(HitboxTeamSource::new(client, &team)),
    };

    // Roster is optional here; without one every game shows as untracked.
    let roster = Roster::load(&config.roster.games_csv, &config.roster.streamers_csv).ok();
    let tracked = |game: &str| {
        roster
            .as_ref()
            .and_then(|r| r.site(site))
            .is_some_and(|r| r.games.contains_key(game))
    };

    println!("=== Probe: {site} team {team} ===");
    let start = Instant::now();
    let live = source.fetch_live().await?;
    println!("Latency: {:?}", start.elapsed());
    println!("Live channels: {}", live.len());
    println!();

    for ch in &live {
        let game = ch.game.as_deref().unwrap_or("-");
        let mark = if tracked(game) { "tracked" } else { "other" };
        println!("  {:<24} {:<24} {game} [{mark}]", ch.name, ch.display_name);
    }

    Ok(())
}
