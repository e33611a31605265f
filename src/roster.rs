use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::types::{Site, TrackedGame, TrackedStreamer};

/// One CSV row: lowercased column name → non-empty cell value.
type Row = HashMap<String, String>;

/// Games and streamers for one site, keyed by that site's names.
#[derive(Debug, Clone, Default)]
pub struct SiteRoster {
    /// Site game name (case-sensitive, as loaded) → game.
    pub games: HashMap<String, TrackedGame>,
    /// Lowercased channel name → streamer.
    pub streamers: HashMap<String, TrackedStreamer>,
}

/// Roster lookups for every site.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    sites: HashMap<Site, SiteRoster>,
}

impl Roster {
    /// Load the games and streamers CSVs. A missing or unreadable file is an error.
    pub fn load(games_csv: &Path, streamers_csv: &Path) -> Result<Self> {
        let games = std::fs::File::open(games_csv)
            .with_context(|| format!("failed to open {}", games_csv.display()))?;
        let streamers = std::fs::File::open(streamers_csv)
            .with_context(|| format!("failed to open {}", streamers_csv.display()))?;
        let roster = Self::from_readers(games, streamers)?;
        debug!(
            "Loaded roster from {} and {}",
            games_csv.display(),
            streamers_csv.display()
        );
        Ok(roster)
    }

    pub fn from_readers(games: impl Read, streamers: impl Read) -> Result<Self> {
        let game_rows = read_rows(games).context("failed to parse games CSV")?;
        let streamer_rows = read_rows(streamers).context("failed to parse streamers CSV")?;

        let mut sites: HashMap<Site, SiteRoster> = HashMap::new();
        for site in Site::ALL {
            let column = site.column();
            let entry = sites.entry(site).or_default();

            for row in &game_rows {
                let Some(name) = row.get(column) else {
                    continue;
                };
                let display_name = row
                    .get("display_name")
                    .cloned()
                    .unwrap_or_else(|| name.clone());
                entry
                    .games
                    .insert(name.clone(), TrackedGame { display_name });
            }

            for row in &streamer_rows {
                let Some(name) = row.get(column) else {
                    continue;
                };
                let twitter = row
                    .get("twitter")
                    .map(|h| h.trim_start_matches('@').to_string())
                    .filter(|h| !h.is_empty());
                entry.streamers.insert(
                    name.to_lowercase(),
                    TrackedStreamer {
                        display_name: row.get("display_name").cloned(),
                        twitter,
                    },
                );
            }
        }

        Ok(Self { sites })
    }

    pub fn site(&self, site: Site) -> Option<&SiteRoster> {
        self.sites.get(&site)
    }
}

/// Parse CSV text with a header row into rows keyed by lowercased header.
/// Empty cells are left out of the row.
fn read_rows(source: impl Read) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, cell)| !header.is_empty() && !cell.is_empty())
            .map(|(header, cell)| (header.clone(), cell.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// CSV export URL for a published spreadsheet worksheet.
pub fn sheet_export_url(base: &str, spreadsheet_key: &str, worksheet_id: &str) -> Result<url::Url> {
    let mut url = url::Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("sheets base URL cannot hold a path"))?
        .push(spreadsheet_key)
        .push("export");
    url.query_pairs_mut()
        .append_pair("format", "csv")
        .append_pair("gid", worksheet_id);
    Ok(url)
}

/// Drop the first column of every row. The shared sheet keeps its first column blank.
pub fn strip_leading_column(csv_text: &str) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv_text.as_bytes());
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for record in reader.records() {
        let record = record?;
        let rest: Vec<&str> = record.iter().skip(1).collect();
        if rest.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        writer.write_record(&rest)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}

/// Download the streamers worksheet and overwrite `dest` with it.
///
/// The download is validated by parsing it before the file is replaced,
/// so a bad response never clobbers a working roster.
pub async fn refresh_streamers_from_sheet(
    client: &reqwest::Client,
    base: &str,
    spreadsheet_key: &str,
    worksheet_id: &str,
    dest: &Path,
) -> Result<usize> {
    let url = sheet_export_url(base, spreadsheet_key, worksheet_id)?;
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("spreadsheet request failed: {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("spreadsheet export non-2xx: {status}");
    }
    let body = resp.text().await.context("failed to read spreadsheet body")?;

    let csv_text = strip_leading_column(&body)?;
    let rows = read_rows(csv_text.as_bytes()).context("spreadsheet is not valid CSV")?;

    std::fs::write(dest, &csv_text)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    info!("Refreshed {} streamer row(s) into {}", rows.len(), dest.display());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMES: &str = "\
Display_Name,TWITCH,hitbox
Foo Bar,Foo,Foo (hitbox)
Super Game,Super Game 64,
,Nameless,
";

    const STREAMERS: &str = "\
twitch,Twitter,display_name,hitbox
Alice,alicetw,,
bob,,Bobby,bobhb
carol,@caroltw,Carol C,
,,Nobody,
";

    fn roster() -> Roster {
        Roster::from_readers(GAMES.as_bytes(), STREAMERS.as_bytes()).unwrap()
    }

    #[test]
    fn games_keyed_by_site_name() {
        let roster = roster();
        let twitch = roster.site(Site::Twitch).unwrap();
        assert_eq!(twitch.games.len(), 3);
        assert_eq!(twitch.games["Foo"].display_name, "Foo Bar");
        assert_eq!(twitch.games["Super Game 64"].display_name, "Super Game");

        let hitbox = roster.site(Site::Hitbox).unwrap();
        assert_eq!(hitbox.games.len(), 1);
        assert_eq!(hitbox.games["Foo (hitbox)"].display_name, "Foo Bar");
    }

    #[test]
    fn game_names_are_case_sensitive() {
        let roster = roster();
        let twitch = roster.site(Site::Twitch).unwrap();
        assert!(twitch.games.contains_key("Foo"));
        assert!(!twitch.games.contains_key("foo"));
    }

    #[test]
    fn game_without_display_name_uses_site_name() {
        let roster = roster();
        let twitch = roster.site(Site::Twitch).unwrap();
        assert_eq!(twitch.games["Nameless"].display_name, "Nameless");
    }

    #[test]
    fn streamers_lowercased_and_missing_cells_absent() {
        let roster = roster();
        let twitch = roster.site(Site::Twitch).unwrap();
        assert_eq!(twitch.streamers.len(), 3);

        let alice = &twitch.streamers["alice"];
        assert_eq!(alice.twitter.as_deref(), Some("alicetw"));
        assert_eq!(alice.display_name, None);

        let bob = &twitch.streamers["bob"];
        assert_eq!(bob.twitter, None);
        assert_eq!(bob.display_name.as_deref(), Some("Bobby"));

        assert_eq!(twitch.streamers["carol"].twitter.as_deref(), Some("caroltw"));

        let hitbox = roster.site(Site::Hitbox).unwrap();
        assert_eq!(hitbox.streamers.len(), 1);
        assert!(hitbox.streamers.contains_key("bobhb"));
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let games = dir.path().join("games.csv");
        std::fs::write(&games, GAMES).unwrap();
        let err = Roster::load(&games, &dir.path().join("streamers.csv")).unwrap_err();
        assert!(err.to_string().contains("streamers.csv"));
    }

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let games = dir.path().join("games.csv");
        let streamers = dir.path().join("streamers.csv");
        std::fs::write(&games, GAMES).unwrap();
        std::fs::write(&streamers, STREAMERS).unwrap();
        let roster = Roster::load(&games, &streamers).unwrap();
        assert!(roster.site(Site::Twitch).unwrap().games.contains_key("Foo"));
    }

    #[test]
    fn strip_leading_column_drops_blank_rows() {
        let sheet = ",twitch,twitter\n,alice,alicetw\n,,\n,bob,\n";
        let csv_text = strip_leading_column(sheet).unwrap();
        assert_eq!(csv_text, "twitch,twitter\nalice,alicetw\nbob,\n");
    }

    #[test]
    fn export_url() {
        let url = sheet_export_url(crate::SHEETS_BASE, "abc123", "0").unwrap();
        assert_eq!(
            url.as_str(),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv&gid=0"
        );
    }
}
