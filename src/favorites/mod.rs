//! Durable favorites set
//!
//! The favorite set is a JSON-serialized list of songs stored in a single
//! key-value slot, preserving insertion order. Persistence is best-effort:
//! read failures degrade to the empty set and write failures are logged and
//! ignored; they never surface to the caller.

use crate::music::Song;
use anyhow::Context;
use rusqlite::{Connection, params};
use std::path::Path;

const SLOT_KEY: &str = "favorites";

pub struct FavoritesStore {
    conn: Connection,
}

impl FavoritesStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    /// In-memory store, used by tests and as a fallback when the data dir
    /// is unusable.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory store")?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.load().iter().any(|s| s.id == id)
    }

    /// Add a song. No-op when the id is already present.
    pub fn add(&self, song: &Song) {
        let mut songs = self.load();
        if songs.iter().any(|s| s.id == song.id) {
            return;
        }
        songs.push(song.clone());
        self.store(&songs);
    }

    /// Remove a song by id. No-op when absent.
    pub fn remove(&self, id: &str) {
        let songs = self.load();
        if !songs.iter().any(|s| s.id == id) {
            return;
        }
        let songs: Vec<Song> = songs.into_iter().filter(|s| s.id != id).collect();
        self.store(&songs);
    }

    /// All favorites in insertion order.
    pub fn list(&self) -> Vec<Song> {
        self.load()
    }

    fn load(&self) -> Vec<Song> {
        let raw: Option<String> = match self
            .conn
            .query_row("SELECT value FROM kv WHERE key=?1", params![SLOT_KEY], |row| {
                row.get(0)
            }) {
            Ok(v) => Some(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                tracing::warn!("read favorites slot failed: {e}");
                None
            }
        };

        let Some(raw) = raw else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<Song>>(&raw) {
            Ok(songs) => songs,
            Err(e) => {
                // Corrupt slot reads as an empty set, never a fatal error.
                tracing::warn!("favorites slot is corrupt, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    fn store(&self, songs: &[Song]) {
        let raw = match serde_json::to_string(songs) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("serialize favorites failed: {e}");
                return;
            }
        };
        let res = self.conn.execute(
            r#"
INSERT INTO kv(key, value) VALUES(?1, ?2)
ON CONFLICT(key) DO UPDATE SET value=excluded.value
"#,
            params![SLOT_KEY, raw],
        );
        if let Err(e) = res {
            tracing::warn!("write favorites slot failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> Song {
        Song {
            id: id.to_string(),
            title: format!("Title {id}"),
            artist: "Artist".to_string(),
            album: None,
            cover: None,
            duration_secs: Some(200),
        }
    }

    #[test]
    fn test_add_remove_round_trip() {
        let store = FavoritesStore::open_in_memory().unwrap();
        let before = store.list();
        store.add(&song("a"));
        assert!(store.is_favorite("a"));
        store.remove("a");
        assert_eq!(store.list(), before);
        assert!(!store.is_favorite("a"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let store = FavoritesStore::open_in_memory().unwrap();
        store.add(&song("a"));
        store.add(&song("a"));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let store = FavoritesStore::open_in_memory().unwrap();
        store.add(&song("a"));
        store.remove("missing");
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let store = FavoritesStore::open_in_memory().unwrap();
        store.add(&song("c"));
        store.add(&song("a"));
        store.add(&song("b"));
        let ids: Vec<String> = store.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn test_corrupt_slot_reads_as_empty() {
        let store = FavoritesStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO kv(key, value) VALUES(?1, ?2)",
                params![SLOT_KEY, "not json"],
            )
            .unwrap();
        assert!(store.list().is_empty());
        // Writes still work afterwards.
        store.add(&song("a"));
        assert!(store.is_favorite("a"));
    }
}
