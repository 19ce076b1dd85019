use std::time::{Duration, Instant};

/// Playback session lifecycle. Exactly one session is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    Loading,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Transient user-facing notification, auto-dismissed after its TTL.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notice {
    pub fn info(message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Info,
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn error(message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// Snapshot of the playing session for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingView {
    pub title: String,
    pub artist: String,
    pub elapsed: String,
    pub total: String,
    pub percent: f64,
    pub lyric: String,
    pub favorited: bool,
    pub paused: bool,
}

/// Shown until the first cue becomes active (or when there are no cues).
pub const LYRIC_PLACEHOLDER: &str = "Loading lyrics...";

/// Format seconds as `m:ss`, flooring. NaN and negative inputs render as
/// `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{mins}:{secs:02}")
}
