pub mod mpv;

pub use mpv::{MpvBackend, MpvPlayer};

/// Commands the synchronous session side sends to the mpv IPC writer task.
#[derive(Debug, Clone)]
pub enum MpvCommand {
    Load(String),
    SetPause(bool),
    /// Absolute position in seconds.
    Seek(f64),
    Stop,
}
