pub mod announce;
pub mod api;
pub mod config;
pub mod engine;
pub mod reporter;
pub mod roster;
pub mod state;
pub mod tracker;
pub mod types;

/// Twitch legacy API base URL (team endpoints, no auth required)
pub const TWITCH_API_BASE: &str = "http://api.twitch.tv";

/// Hitbox API base URL (public, no auth required)
pub const HITBOX_API_BASE: &str = "https://api.hitbox.tv";

/// Twitter API v2 base URL (OAuth 1.0a user context)
pub const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Google Sheets base URL; published sheets are exported as CSV from here.
pub const SHEETS_BASE: &str = "https://docs.google.com/spreadsheets/d";
