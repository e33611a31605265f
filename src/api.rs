use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::types::{LiveChannel, Site};
use crate::{HITBOX_API_BASE, TWITCH_API_BASE};

/// Per-request timeout for site API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Failure fetching one site's live channels. Either way the site is skipped for the cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// A site that can list its team's live channels.
#[async_trait]
pub trait StreamSource: Send + Sync {
    fn site(&self) -> Site;

    /// One request per call; returns only channels that are live right now.
    async fn fetch_live(&self) -> Result<Vec<LiveChannel>, FetchError>;
}

/// Build the HTTP client used by site sources.
pub fn http_client() -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// GET a URL and decode its JSON body, keeping network and decode failures apart.
async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T, FetchError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Network(format!("{url} returned {status}")));
    }
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

// ── Twitch ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TwitchTeamResponse {
    channels: Vec<TwitchTeamEntry>,
}

#[derive(Debug, Deserialize)]
struct TwitchTeamEntry {
    channel: TwitchChannel,
}

#[derive(Debug, Deserialize)]
struct TwitchChannel {
    name: String,
    display_name: Option<String>,
    status: Option<String>,
    meta_game: Option<String>,
}

/// Twitch team endpoint: lists every team channel, live ones first.
pub struct TwitchTeamSource {
    client: reqwest::Client,
    url: String,
}

impl TwitchTeamSource {
    pub fn new(client: reqwest::Client, team: &str) -> Self {
        Self::with_base(client, TWITCH_API_BASE, team)
    }

    pub fn with_base(client: reqwest::Client, base: &str, team: &str) -> Self {
        let url = format!(
            "{}/api/team/{}/all_channels.json",
            base.trim_end_matches('/'),
            urlencoding::encode(team)
        );
        Self { client, url }
    }
}

/// Keep the leading run of live channels. The API lists live channels first,
/// so the scan ends at the first one that isn't.
fn parse_twitch_team(body: TwitchTeamResponse) -> Vec<LiveChannel> {
    body.channels
        .into_iter()
        .map(|entry| entry.channel)
        .take_while(|ch| ch.status.as_deref() == Some("live"))
        .map(|ch| LiveChannel {
            display_name: ch.display_name.unwrap_or_else(|| ch.name.clone()),
            name: ch.name.to_lowercase(),
            game: ch.meta_game.filter(|g| !g.is_empty()),
        })
        .collect()
}

#[async_trait]
impl StreamSource for TwitchTeamSource {
    fn site(&self) -> Site {
        Site::Twitch
    }

    async fn fetch_live(&self) -> Result<Vec<LiveChannel>, FetchError> {
        let body: TwitchTeamResponse = get_json(&self.client, &self.url).await?;
        let live = parse_twitch_team(body);
        debug!("Fetched {} live Twitch channel(s)", live.len());
        Ok(live)
    }
}

// ── Hitbox ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HitboxLiveResponse {
    #[serde(default)]
    livestream: Vec<HitboxStream>,
}

#[derive(Debug, Deserialize)]
struct HitboxStream {
    media_name: String,
    media_display_name: Option<String>,
    category_name: Option<String>,
}

/// Hitbox live list filtered to a team: every entry is already live.
pub struct HitboxTeamSource {
    client: reqwest::Client,
    url: String,
}

impl HitboxTeamSource {
    pub fn new(client: reqwest::Client, team: &str) -> Self {
        Self::with_base(client, HITBOX_API_BASE, team)
    }

    pub fn with_base(client: reqwest::Client, base: &str, team: &str) -> Self {
        let url = format!(
            "{}/media/live/list?team={}&liveonly=true",
            base.trim_end_matches('/'),
            urlencoding::encode(team)
        );
        Self { client, url }
    }
}

fn parse_hitbox_live(body: HitboxLiveResponse) -> Vec<LiveChannel> {
    body.livestream
        .into_iter()
        .map(|s| LiveChannel {
            display_name: s.media_display_name.unwrap_or_else(|| s.media_name.clone()),
            name: s.media_name.to_lowercase(),
            game: s.category_name.filter(|g| !g.is_empty()),
        })
        .collect()
}

#[async_trait]
impl StreamSource for HitboxTeamSource {
    fn site(&self) -> Site {
        Site::Hitbox
    }

    async fn fetch_live(&self) -> Result<Vec<LiveChannel>, FetchError> {
        let body: HitboxLiveResponse = get_json(&self.client, &self.url).await?;
        let live = parse_hitbox_live(body);
        debug!("Fetched {} live Hitbox channel(s)", live.len());
        Ok(live)
    }
}
