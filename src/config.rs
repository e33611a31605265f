use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::Site;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub teams: TeamsConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Team names as they appear in each site's URL. Unset sites are not polled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamsConfig {
    pub twitch: Option<String>,
    pub hitbox: Option<String>,
}

impl TeamsConfig {
    pub fn team(&self, site: Site) -> Option<&str> {
        let team = match site {
            Site::Twitch => self.twitch.as_deref(),
            Site::Hitbox => self.hitbox.as_deref(),
        };
        team.filter(|t| !t.trim().is_empty())
    }
}

/// Where the games and streamers rosters come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default = "default_games_csv")]
    pub games_csv: PathBuf,
    #[serde(default = "default_streamers_csv")]
    pub streamers_csv: PathBuf,
    /// Key of a published Google spreadsheet that `streamers_csv` is refreshed from.
    pub spreadsheet_key: Option<String>,
    #[serde(default = "default_worksheet_id")]
    pub worksheet_id: String,
    #[serde(default = "default_update_interval")]
    pub update_interval_minutes: u64,
}

fn default_games_csv() -> PathBuf {
    PathBuf::from("games.csv")
}

fn default_streamers_csv() -> PathBuf {
    PathBuf::from("streamers.csv")
}

fn default_worksheet_id() -> String {
    "0".to_string()
}

fn default_update_interval() -> u64 {
    24 * 60
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            games_csv: default_games_csv(),
            streamers_csv: default_streamers_csv(),
            spreadsheet_key: None,
            worksheet_id: default_worksheet_id(),
            update_interval_minutes: default_update_interval(),
        }
    }
}

/// Twitter app + account credentials (OAuth 1.0a user context).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_secret: String,
}

impl TwitterConfig {
    pub fn is_complete(&self) -> bool {
        [
            &self.consumer_key,
            &self.consumer_secret,
            &self.access_token,
            &self.access_secret,
        ]
        .iter()
        .all(|v| !v.is_empty())
    }

    /// Overlay any `TWITTER_*` environment variables onto the file values.
    pub fn apply_env(&mut self) {
        let pairs = [
            ("TWITTER_CONSUMER_KEY", &mut self.consumer_key),
            ("TWITTER_CONSUMER_SECRET", &mut self.consumer_secret),
            ("TWITTER_ACCESS_TOKEN", &mut self.access_token),
            ("TWITTER_ACCESS_SECRET", &mut self.access_secret),
        ];
        for (var, slot) in pairs {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *slot = value;
                }
            }
        }
    }
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Seconds to sleep between polling cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// A channel stays "recently live" until unseen for this long.
    #[serde(default = "default_expire_minutes")]
    pub recently_live_expire_minutes: u64,
    /// Skip announcements when the previous check is older than the expiry window.
    #[serde(default = "default_true")]
    pub announce_only_if_checked_recently: bool,
    /// Post to Twitter; otherwise announcements go to stdout only.
    #[serde(default)]
    pub use_twitter: bool,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// 0 = errors only, 1 = announcements, 2 = per-channel detail.
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
    /// Also append log output to this file.
    pub log_file: Option<PathBuf>,
}

fn default_poll_interval() -> u64 {
    120
}

fn default_expire_minutes() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_state_path() -> PathBuf {
    PathBuf::from("recently_live.json")
}

fn default_verbosity() -> u8 {
    1
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            recently_live_expire_minutes: default_expire_minutes(),
            announce_only_if_checked_recently: default_true(),
            use_twitter: false,
            state_path: default_state_path(),
            verbosity: default_verbosity(),
            log_file: None,
        }
    }
}

/// Convert a minutes setting into a duration, rejecting values chrono can't hold.
fn minutes(name: &str, value: u64) -> Result<chrono::Duration> {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .with_context(|| format!("{name} = {value} is out of range"))
}

impl RosterConfig {
    pub fn update_interval(&self) -> Result<chrono::Duration> {
        minutes("update_interval_minutes", self.update_interval_minutes)
    }
}

impl SettingsConfig {
    pub fn expiry(&self) -> Result<chrono::Duration> {
        minutes(
            "recently_live_expire_minutes",
            self.recently_live_expire_minutes,
        )
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "error",
            1 => "info",
            _ => "debug",
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings that can't be turned into durations.
    pub fn validate(&self) -> Result<()> {
        self.settings.expiry()?;
        self.roster.update_interval()?;
        Ok(())
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.settings.poll_interval_secs, 120);
        assert_eq!(config.settings.recently_live_expire_minutes, 30);
        assert!(config.settings.announce_only_if_checked_recently);
        assert!(!config.settings.use_twitter);
        assert_eq!(config.roster.games_csv, PathBuf::from("games.csv"));
        assert_eq!(config.roster.update_interval_minutes, 1440);
        assert!(config.teams.team(Site::Twitch).is_none());
    }

    #[test]
    fn parses_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [teams]
            twitch = "speedfriends"
            hitbox = ""

            [settings]
            recently_live_expire_minutes = 45
            use_twitter = true
            verbosity = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.teams.team(Site::Twitch), Some("speedfriends"));
        assert_eq!(config.teams.team(Site::Hitbox), None);
        assert_eq!(config.settings.expiry().unwrap(), chrono::Duration::minutes(45));
        assert!(config.settings.use_twitter);
        assert_eq!(config.settings.default_log_filter(), "debug");
    }

    #[test]
    fn twitter_completeness() {
        let mut twitter = TwitterConfig {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_secret: String::new(),
        };
        assert!(!twitter.is_complete());
        twitter.access_secret = "as".into();
        assert!(twitter.is_complete());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.teams.twitch = Some("team".into());
        config.twitter.consumer_key = "key".into();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.teams.twitch.as_deref(), Some("team"));
        assert_eq!(loaded.twitter.consumer_key, "key");
    }

    #[test]
    fn oversized_minutes_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[settings]\nrecently_live_expire_minutes = 1000000000000000\n",
        )
        .unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("recently_live_expire_minutes"));

        let mut config = AppConfig::default();
        config.roster.update_interval_minutes = u64::MAX;
        assert!(config.validate().is_err());
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(&dir.path().join("nope.toml")).is_err());
    }
}
