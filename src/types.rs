use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A streaming site we poll for team channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Twitch,
    Hitbox,
}

impl Site {
    pub const ALL: [Site; 2] = [Site::Twitch, Site::Hitbox];

    /// Roster column holding this site's names (games and streamers CSVs).
    pub fn column(self) -> &'static str {
        match self {
            Site::Twitch => "twitch",
            Site::Hitbox => "hitbox",
        }
    }

    /// Domain used in announcement links, e.g. `twitch.tv/<channel>`.
    pub fn domain(self) -> &'static str {
        match self {
            Site::Twitch => "twitch.tv",
            Site::Hitbox => "hitbox.tv",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A channel the site reports as currently live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveChannel {
    /// Lowercased channel name (identity key).
    pub name: String,
    /// Display name as the site reports it.
    pub display_name: String,
    /// Current game, if the site reported one.
    pub game: Option<String>,
}

/// A game from the roster, keyed elsewhere by its site-specific name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedGame {
    pub display_name: String,
}

/// Extra info about a team member, keyed elsewhere by lowercased channel name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedStreamer {
    pub display_name: Option<String>,
    /// Twitter handle without the leading `@`.
    pub twitter: Option<String>,
}

/// Recently-live bookkeeping for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub last_seen_live: DateTime<Utc>,
    pub game: String,
}

/// Why a channel is being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnounceReason {
    WentLive,
    StartedGame,
}

/// One announcement produced by the liveness tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnounceEvent {
    pub site: Site,
    pub channel: String,
    pub game: String,
    pub reason: AnnounceReason,
    pub text: String,
}

/// Per-site outcome of a polling cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub site: Site,
    /// `false` when the fetch failed and the site was skipped.
    pub fetched: bool,
    pub live_channels: usize,
    pub tracked_channels: usize,
    pub announcements: Vec<AnnounceEvent>,
}

/// Summary of one polling cycle, emitted by the reporter.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub timestamp: String,
    pub checked_recently: bool,
    pub roster_refreshed: bool,
    pub sites: Vec<SiteReport>,
}
