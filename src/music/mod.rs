pub mod client;

pub use client::{MusicClient, ServiceError};

use serde::{Deserialize, Serialize};

/// A normalized song record from the search API. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub cover: Option<String>,
    pub duration_secs: Option<u32>,
}

impl Song {
    /// "Title - Artist" line used by lists and the now-playing view.
    pub fn display(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

/// A resolved track. A response without a stream URL is a normal
/// "unplayable" outcome, not an error.
#[derive(Debug, Clone, Default)]
pub struct PlayableTrack {
    pub stream_url: Option<String>,
    pub lyrics: Option<String>,
}
