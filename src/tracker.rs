use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::roster::SiteRoster;
use crate::types::{AnnounceEvent, AnnounceReason, ChannelRecord, LiveChannel, Site};

/// Decide whether this cycle may announce.
///
/// With `only_if_recent` set, announcing requires a previous check no older
/// than `expiry`. Otherwise channels seen on a cold start may have been live
/// for a long time already.
pub fn should_announce(
    last_checked: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    expiry: Duration,
    only_if_recent: bool,
) -> bool {
    if !only_if_recent {
        return true;
    }
    match last_checked {
        Some(t) => now - t <= expiry,
        None => false,
    }
}

/// Pick how to show a streamer: `@handle`, then roster display name, then the site's name.
pub fn streamer_display(roster: &SiteRoster, channel: &LiveChannel) -> String {
    match roster.streamers.get(&channel.name.to_lowercase()) {
        Some(s) => match (&s.twitter, &s.display_name) {
            (Some(handle), _) => format!("@{handle}"),
            (None, Some(name)) => name.clone(),
            (None, None) => channel.display_name.clone(),
        },
        None => channel.display_name.clone(),
    }
}

/// `"{game} {streamer} is live: {domain}/{channel}"`
pub fn format_announcement(game_display: &str, streamer: &str, site: Site, channel: &str) -> String {
    format!("{game_display} {streamer} is live: {}/{channel}", site.domain())
}

/// Recently-live cache for one site.
///
/// A channel is present only while it has been seen live, playing a tracked
/// game, within the expiry window.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    site: Site,
    expiry: Duration,
    records: HashMap<String, ChannelRecord>,
}

impl LivenessTracker {
    pub fn new(site: Site, expiry: Duration) -> Self {
        Self::with_records(site, expiry, HashMap::new())
    }

    pub fn with_records(
        site: Site,
        expiry: Duration,
        records: HashMap<String, ChannelRecord>,
    ) -> Self {
        Self {
            site,
            expiry,
            records,
        }
    }

    pub fn site(&self) -> Site {
        self.site
    }

    pub fn records(&self) -> &HashMap<String, ChannelRecord> {
        &self.records
    }

    pub fn into_records(self) -> HashMap<String, ChannelRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop channels not seen live for longer than the expiry window.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        let (site, expiry) = (self.site, self.expiry);
        self.records.retain(|channel, record| {
            let keep = now - record.last_seen_live <= expiry;
            if !keep {
                debug!("{site} {channel} expired from recently live");
            }
            keep
        });
    }

    /// Fold one poll's live channels into the cache and return the announcements.
    ///
    /// Channels on untracked (or unknown) games are ignored entirely; channels
    /// not observed are left to expire. With `announce` false the cache is still
    /// updated but nothing is returned.
    pub fn update(
        &mut self,
        observed: &[LiveChannel],
        roster: &SiteRoster,
        now: DateTime<Utc>,
        announce: bool,
    ) -> Vec<AnnounceEvent> {
        self.expire(now);

        let mut events = Vec::new();
        for channel in observed {
            let name = channel.name.to_lowercase();
            let tracked = channel
                .game
                .as_ref()
                .and_then(|g| roster.games.get(g).map(|tg| (g, tg)));
            let Some((game, tracked_game)) = tracked else {
                debug!("{} is playing other stuff", channel.display_name);
                continue;
            };

            let reason = match self.records.get(&name) {
                None => Some(AnnounceReason::WentLive),
                Some(record) if record.game != *game => Some(AnnounceReason::StartedGame),
                Some(_) => None,
            };

            if let (Some(reason), true) = (reason, announce) {
                let streamer = streamer_display(roster, channel);
                let text =
                    format_announcement(&tracked_game.display_name, &streamer, self.site, &name);
                info!("{text}");
                events.push(AnnounceEvent {
                    site: self.site,
                    channel: name.clone(),
                    game: game.clone(),
                    reason,
                    text,
                });
            }

            debug!("{} is playing {game}", channel.display_name);
            self.records.insert(
                name,
                ChannelRecord {
                    last_seen_live: now,
                    game: game.clone(),
                },
            );
        }
        events
    }
}
