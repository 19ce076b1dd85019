//! Music service HTTP client
//!
//! Thin wrapper over the third-party search/streaming API. Each call is a
//! single best-effort attempt; there is no retry policy.

use super::{PlayableTrack, Song};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("music service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("music service returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone)]
pub struct MusicClient {
    client: reqwest::Client,
    base_url: String,
}

impl MusicClient {
    const USER_AGENT: &'static str = "islet/0.1.0";

    pub fn new(
        base_url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Search songs by keyword. Zero matches is an empty list, not an error.
    ///
    /// Callers must not pass a blank keyword; the controller rejects those
    /// before a request is ever issued.
    pub async fn search(&self, keyword: &str) -> Result<Vec<Song>, ServiceError> {
        let url = format!(
            "{}/songs.php?type=search&keyword={}",
            self.base_url,
            urlencoding::encode(keyword)
        );
        tracing::debug!(%url, "search request");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        Ok(extract_songs(&body))
    }

    /// Resolve a song id into a stream URL plus optional raw lyric text.
    pub async fn resolve_track(&self, id: &str) -> Result<PlayableTrack, ServiceError> {
        let url = format!(
            "{}/kw.php?rid={}&type=json&level=exhigh&lrc=true",
            self.base_url,
            urlencoding::encode(id)
        );
        tracing::debug!(%url, "resolve request");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        Ok(extract_track(&body))
    }
}

/// Map the raw search payload (`{"data": [...]}`) onto normalized songs.
/// Entries without an id or title are skipped.
fn extract_songs(body: &Value) -> Vec<Song> {
    let Some(items) = body.get("data").and_then(|d| d.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = string_field(item, "rid")?;
            let title = string_field(item, "name")?;
            let artist = string_field(item, "artist")
                .or_else(|| string_field(item, "singer"))
                .unwrap_or_default();
            Some(Song {
                id,
                title,
                artist,
                album: string_field(item, "album").filter(|s| !s.is_empty()),
                cover: string_field(item, "pic").filter(|s| !s.is_empty()),
                duration_secs: duration_field(item, "time"),
            })
        })
        .collect()
}

/// Map the raw track-detail payload onto a `PlayableTrack`. The interesting
/// fields may sit at the top level or nested under `data`.
fn extract_track(body: &Value) -> PlayableTrack {
    let nested = body.get("data");
    let field = |name: &str| {
        nested
            .and_then(|d| string_field(d, name))
            .or_else(|| string_field(body, name))
            .filter(|s| !s.is_empty())
    };

    PlayableTrack {
        stream_url: field("url"),
        lyrics: field("lrc"),
    }
}

/// Read a field as a string, accepting raw numbers (ids sometimes are).
fn string_field(v: &Value, name: &str) -> Option<String> {
    match v.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Duration arrives either as plain seconds or as a "m:ss" string.
fn duration_field(v: &Value, name: &str) -> Option<u32> {
    match v.get(name)? {
        Value::Number(n) => n.as_u64().map(|s| s as u32),
        Value::String(s) => {
            if let Some((m, sec)) = s.split_once(':') {
                let m: u32 = m.trim().parse().ok()?;
                let sec: u32 = sec.trim().parse().ok()?;
                // The minutes field is untrusted input and may not fit.
                m.checked_mul(60)?.checked_add(sec)
            } else {
                s.trim().parse().ok()
            }
        }
        _ => None,
    }
}
