use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{ChannelRecord, Site};

/// Everything carried between runs: recently-live channels per site and poll bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// When the previous cycle ran. `None` on a cold start.
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    /// When the streamers roster was last refreshed from the spreadsheet.
    #[serde(default)]
    pub last_roster_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sites: BTreeMap<Site, HashMap<String, ChannelRecord>>,
}

impl PersistedState {
    /// Load state from `path`. Any failure (no file yet, bad JSON) means a cold start.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(state) => {
                debug!("Loaded state from {}", path.display());
                state
            }
            Err(e) => {
                warn!("No usable state ({e:#}); starting cold");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(state)
    }

    /// Rewrite the whole state file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("failed to serialize state")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Take a site's records out of the state (empty if none were saved).
    pub fn take_site(&mut self, site: Site) -> HashMap<String, ChannelRecord> {
        self.sites.remove(&site).unwrap_or_default()
    }

    pub fn put_site(&mut self, site: Site, records: HashMap<String, ChannelRecord>) {
        self.sites.insert(site, records);
    }

    /// Whether the roster spreadsheet should be fetched again.
    pub fn roster_update_due(&self, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        match self.last_roster_update {
            Some(t) => now - t >= interval,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> PersistedState {
        let mut state = PersistedState {
            last_checked: Some(t0()),
            ..Default::default()
        };
        let mut twitch = HashMap::new();
        twitch.insert(
            "alice".to_string(),
            ChannelRecord {
                last_seen_live: t0(),
                game: "Foo".into(),
            },
        );
        state.put_site(Site::Twitch, twitch);
        state
    }

    #[test]
    fn missing_file_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let state = PersistedState::load(&dir.path().join("recently_live.json"));
        assert_eq!(state, PersistedState::default());
        assert!(state.last_checked.is_none());
    }

    #[test]
    fn corrupt_file_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recently_live.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(PersistedState::load(&path), PersistedState::default());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recently_live.json");
        let state = sample();
        state.save(&path).unwrap();

        let loaded = PersistedState::load(&path);
        assert_eq!(loaded, state);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["sites"]["twitch"]["alice"]["game"], "Foo");
    }

    #[test]
    fn take_site_defaults_empty() {
        let mut state = sample();
        assert_eq!(state.take_site(Site::Twitch).len(), 1);
        assert!(state.take_site(Site::Twitch).is_empty());
        assert!(state.take_site(Site::Hitbox).is_empty());
    }

    #[test]
    fn roster_update_schedule() {
        let mut state = PersistedState::default();
        let day = Duration::minutes(24 * 60);
        assert!(state.roster_update_due(t0(), day));
        state.last_roster_update = Some(t0());
        assert!(!state.roster_update_due(t0() + Duration::hours(23), day));
        assert!(state.roster_update_due(t0() + Duration::hours(24), day));
    }
}
