use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use tracing::info;

use crate::TWITTER_API_BASE;
use crate::config::TwitterConfig;
use crate::types::AnnounceEvent;

type HmacSha1 = Hmac<Sha1>;

/// Somewhere announcements go.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Publish one announcement. Called at most once per event.
    async fn announce(&self, event: &AnnounceEvent) -> Result<()>;
}

/// Prints announcements to stdout.
#[derive(Debug, Default, Clone)]
pub struct ConsoleAnnouncer;

#[async_trait]
impl Announcer for ConsoleAnnouncer {
    async fn announce(&self, event: &AnnounceEvent) -> Result<()> {
        println!("{}", event.text);
        Ok(())
    }
}

/// Posts announcements as tweets (API v2, OAuth 1.0a user context).
#[derive(Debug, Clone)]
pub struct TwitterAnnouncer {
    http: reqwest::Client,
    base_url: String,
    credentials: TwitterConfig,
}

#[derive(Debug, Serialize)]
struct TweetRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Debug, Deserialize)]
struct UserData {
    username: String,
}

impl TwitterAnnouncer {
    pub fn new(credentials: TwitterConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: TWITTER_API_BASE.to_string(),
            credentials,
        }
    }

    /// Post a status and return nothing; non-2xx responses are errors.
    pub async fn post(&self, text: &str) -> Result<()> {
        let url = format!("{}/2/tweets", self.base_url.trim_end_matches('/'));
        let auth = self.authorization("POST", &url, &[])?;

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&TweetRequest { text })
            .send()
            .await
            .with_context(|| format!("Twitter request failed: {url}"))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Twitter API non-2xx: {status} body={body}");
        }
        Ok(())
    }

    /// Check the credentials by fetching the authenticated account's username.
    pub async fn verify_credentials(&self) -> Result<String> {
        let url = format!("{}/2/users/me", self.base_url.trim_end_matches('/'));
        let auth = self.authorization("GET", &url, &[])?;

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .with_context(|| format!("Twitter request failed: {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Twitter API non-2xx: {status} body={body}");
        }
        let user: UserResponse = resp.json().await.context("unexpected /2/users/me body")?;
        Ok(user.data.username)
    }

    fn authorization(&self, method: &str, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        oauth1_header(&self.credentials, method, url, params, &nonce, &timestamp)
    }
}

#[async_trait]
impl Announcer for TwitterAnnouncer {
    async fn announce(&self, event: &AnnounceEvent) -> Result<()> {
        self.post(&event.text).await?;
        info!("Tweeted: {}", event.text);
        Ok(())
    }
}

fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// HMAC-SHA1 signature over the OAuth 1.0a signature base string.
///
/// `params` are any query or form parameters that take part in signing
/// (JSON bodies do not).
pub fn oauth1_signature(
    credentials: &TwitterConfig,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> Result<String> {
    let oauth = oauth_params(credentials, nonce, timestamp);
    let mut pairs: Vec<(String, String)> = oauth
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .chain(params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();
    let param_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&param_string)
    );
    let key = format!(
        "{}&{}",
        encode(&credentials.consumer_secret),
        encode(&credentials.access_secret)
    );

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {e}"))?;
    mac.update(base.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Full `Authorization: OAuth ...` header value.
pub fn oauth1_header(
    credentials: &TwitterConfig,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> Result<String> {
    let signature = oauth1_signature(credentials, method, url, params, nonce, timestamp)?;
    let mut fields = oauth_params(credentials, nonce, timestamp);
    fields.push(("oauth_signature", signature.as_str()));
    fields.sort();
    let joined = fields
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {joined}"))
}

fn oauth_params<'a>(
    credentials: &'a TwitterConfig,
    nonce: &'a str,
    timestamp: &'a str,
) -> Vec<(&'static str, &'a str)> {
    vec![
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example from Twitter's "Creating a signature" documentation.
    fn doc_credentials() -> TwitterConfig {
        TwitterConfig {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".into(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".into(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
            access_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".into(),
        }
    }

    const NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TIMESTAMP: &str = "1318622958";
    const URL: &str = "https://api.twitter.com/1.1/statuses/update.json";

    #[test]
    fn signature_matches_documented_example() {
        let params = [
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ("include_entities", "true"),
        ];
        let sig = oauth1_signature(&doc_credentials(), "POST", URL, &params, NONCE, TIMESTAMP).unwrap();
        assert_eq!(sig, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn header_carries_encoded_signature() {
        let params = [
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ("include_entities", "true"),
        ];
        let header =
            oauth1_header(&doc_credentials(), "POST", URL, &params, NONCE, TIMESTAMP).unwrap();
        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(!header.contains("status="));
    }

    #[test]
    fn signature_depends_on_nonce() {
        let creds = doc_credentials();
        let a = oauth1_signature(&creds, "POST", URL, &[], "nonce-a", TIMESTAMP).unwrap();
        let b = oauth1_signature(&creds, "POST", URL, &[], "nonce-b", TIMESTAMP).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn live_header_uses_current_time() {
        let announcer = TwitterAnnouncer::new(doc_credentials());
        let header = announcer.authorization("POST", URL, &[]).unwrap();
        let stamp: i64 = header
            .split("oauth_timestamp=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap()
            .parse()
            .unwrap();
        assert!((chrono::Utc::now().timestamp() - stamp).abs() <= 5);
    }

    #[tokio::test]
    async fn console_announcer_succeeds() {
        let event = AnnounceEvent {
            site: crate::types::Site::Twitch,
            channel: "alice".into(),
            game: "Foo".into(),
            reason: crate::types::AnnounceReason::WentLive,
            text: "Foo Bar @alicetw is live: twitch.tv/alice".into(),
        };
        ConsoleAnnouncer.announce(&event).await.unwrap();
    }
}
