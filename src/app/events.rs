use crate::music::{PlayableTrack, ServiceError, Song};
use crate::session::audio::PlayerEvent;

/// Everything that wakes the app loop.
#[derive(Debug)]
pub enum Event {
    Player(PlayerEvent),
    Network(NetworkEvent),
    Panel(PanelEvent),
}

/// Completions of spawned client calls, tagged with the session token they
/// were issued under.
#[derive(Debug)]
pub enum NetworkEvent {
    SearchDone {
        token: u64,
        result: Result<Vec<Song>, ServiceError>,
    },
    ResolveDone {
        token: u64,
        result: Result<PlayableTrack, ServiceError>,
    },
}

/// Panel transition timers firing.
#[derive(Debug, Clone, Copy)]
pub enum PanelEvent {
    ContentPhase,
    TransitionDone,
}
