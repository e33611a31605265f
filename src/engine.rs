use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::SHEETS_BASE;
use crate::announce::Announcer;
use crate::api::StreamSource;
use crate::config::{AppConfig, RosterConfig};
use crate::roster::{self, Roster, SiteRoster};
use crate::state::PersistedState;
use crate::tracker::{LivenessTracker, should_announce};
use crate::types::{CycleReport, SiteReport};

/// One polling cycle at a time over a fixed set of site sources.
///
/// The recently-live state is read from disk once, when the engine is built,
/// and kept in memory from then on. The file is only a copy for the next run.
pub struct Engine {
    sources: Vec<Box<dyn StreamSource>>,
    announcer: Box<dyn Announcer>,
    roster: RosterConfig,
    roster_interval: chrono::Duration,
    sheets_base: String,
    state_path: PathBuf,
    state: PersistedState,
    expiry: chrono::Duration,
    only_if_recent: bool,
    http: reqwest::Client,
}

impl Engine {
    pub fn new(
        config: &AppConfig,
        sources: Vec<Box<dyn StreamSource>>,
        announcer: Box<dyn Announcer>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let state_path = config.settings.state_path.clone();
        Ok(Self {
            sources,
            announcer,
            roster: config.roster.clone(),
            roster_interval: config.roster.update_interval()?,
            sheets_base: SHEETS_BASE.to_string(),
            state: PersistedState::load(&state_path),
            state_path,
            expiry: config.settings.expiry()?,
            only_if_recent: config.settings.announce_only_if_checked_recently,
            http,
        })
    }

    /// Point spreadsheet downloads somewhere other than Google.
    pub fn with_sheets_base(mut self, base: impl Into<String>) -> Self {
        self.sheets_base = base.into();
        self
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    /// Refresh the streamers CSV from the spreadsheet when one is configured and due.
    ///
    /// Every attempt counts toward the interval, so an unreachable sheet is
    /// retried on the refresh schedule rather than on every poll. Failures
    /// leave the existing file in place.
    async fn refresh_roster_if_due(&mut self, now: DateTime<Utc>) -> bool {
        let Some(key) = self.roster.spreadsheet_key.as_deref() else {
            return false;
        };
        if !self.state.roster_update_due(now, self.roster_interval) {
            return false;
        }
        self.state.last_roster_update = Some(now);

        match roster::refresh_streamers_from_sheet(
            &self.http,
            &self.sheets_base,
            key,
            &self.roster.worksheet_id,
            &self.roster.streamers_csv,
        )
        .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Roster refresh failed, keeping current file: {e:#}");
                false
            }
        }
    }

    /// Run one cycle: roster → fetch per site → track → announce → save.
    ///
    /// A roster that can't be loaded aborts the cycle before anything is
    /// fetched. A site whose fetch fails keeps its previous records. A failed
    /// save is returned as an error, but the in-memory state has already
    /// moved on, so nothing is announced twice.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let roster_refreshed = self.refresh_roster_if_due(now).await;
        let roster = Roster::load(&self.roster.games_csv, &self.roster.streamers_csv)
            .context("roster unavailable, skipping cycle")?;

        let checked_recently =
            should_announce(self.state.last_checked, now, self.expiry, self.only_if_recent);
        if !checked_recently {
            info!("Last check was not recent; recording live channels without announcing");
        }

        let empty = SiteRoster::default();
        let mut sites = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let site = source.site();
            let live = match source.fetch_live().await {
                Ok(live) => live,
                Err(e) => {
                    warn!("{site} fetch failed, skipping this cycle: {e}");
                    sites.push(SiteReport {
                        site,
                        fetched: false,
                        live_channels: 0,
                        tracked_channels: self.state.sites.get(&site).map_or(0, |r| r.len()),
                        announcements: Vec::new(),
                    });
                    continue;
                }
            };

            let mut tracker =
                LivenessTracker::with_records(site, self.expiry, self.state.take_site(site));
            let site_roster = roster.site(site).unwrap_or(&empty);
            let events = tracker.update(&live, site_roster, now, checked_recently);
            self.state.put_site(site, tracker.into_records());

            for event in &events {
                if let Err(e) = self.announcer.announce(event).await {
                    warn!("Failed to announce {} on {site}: {e:#}", event.channel);
                }
            }

            let tracked_channels = self.state.sites.get(&site).map_or(0, |r| r.len());
            debug!("{site}: {} live, {tracked_channels} recently live", live.len());
            sites.push(SiteReport {
                site,
                fetched: true,
                live_channels: live.len(),
                tracked_channels,
                announcements: events,
            });
        }

        self.state.last_checked = Some(now);
        self.state.save(&self.state_path)?;

        Ok(CycleReport {
            timestamp: now.to_rfc3339(),
            checked_recently,
            roster_refreshed,
            sites,
        })
    }
}
