//! Audio ports
//!
//! The controller owns at most one live handle at a time and never talks to
//! a player process directly; backends implement these traits. Dropping a
//! handle releases the underlying playback resource.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio backend rejected playback: {0}")]
    Rejected(String),

    #[error("audio backend unavailable: {0}")]
    Unavailable(String),
}

pub trait AudioBackend {
    type Handle: AudioHandle;

    /// Create a handle playing the given stream URL.
    fn open(&mut self, url: &str) -> Result<Self::Handle, PlaybackError>;
}

pub trait AudioHandle {
    fn pause(&mut self);
    fn resume(&mut self) -> Result<(), PlaybackError>;
    /// Jump to an absolute position in seconds.
    fn seek_to(&mut self, seconds: f64);
}

/// Progress and lifecycle notifications from the playing handle, delivered
/// on the handle's native timing rather than a custom scheduler.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Started,
    Paused,
    Position { seconds: f64 },
    Duration { seconds: f64 },
    Ended,
    Error(String),
}
