//! Playback session controller
//!
//! Orchestrates search -> selection -> playback -> live lyric/progress
//! display -> favorite toggling. The controller is a synchronous state
//! machine: network completions and player progress arrive as events, and
//! in-flight requests carry a session token so late responses for a
//! superseded request are discarded (last-request-wins).

pub mod audio;
pub mod state;

use crate::favorites::FavoritesStore;
use crate::island::Panel;
use crate::lyrics::{self, Cue};
use crate::music::{PlayableTrack, ServiceError, Song};
use audio::{AudioBackend, AudioHandle, PlayerEvent};
use state::{LYRIC_PLACEHOLDER, Notice, NowPlayingView, Phase, format_time};
use std::time::Duration;

/// A search the caller must run against the music client, tagged with the
/// token to hand back on completion.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub token: u64,
    pub keyword: String,
}

/// A track resolution the caller must run, likewise tagged.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub token: u64,
    pub song_id: String,
}

pub struct Controller<B: AudioBackend> {
    backend: B,
    favorites: FavoritesStore,
    panel: Panel,

    phase: Phase,
    /// Display state to restore when a load fails or resolves unplayable.
    prior_phase: Phase,
    results: Vec<Song>,
    current: Option<Song>,
    handle: Option<B::Handle>,
    cues: Vec<Cue>,
    favorited: bool,
    position_secs: f64,
    duration_secs: f64,

    notice: Option<Notice>,
    notice_ttl: Duration,

    next_token: u64,
    search_token: Option<u64>,
    loading: Option<(u64, Song)>,
}

impl<B: AudioBackend> Controller<B> {
    pub fn new(backend: B, favorites: FavoritesStore, panel: Panel, notice_ttl: Duration) -> Self {
        Self {
            backend,
            favorites,
            panel,
            phase: Phase::Idle,
            prior_phase: Phase::Idle,
            results: Vec::new(),
            current: None,
            handle: None,
            cues: Vec::new(),
            favorited: false,
            position_secs: 0.0,
            duration_secs: 0.0,
            notice: None,
            notice_ttl,
            next_token: 0,
            search_token: None,
            loading: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn results(&self) -> &[Song] {
        &self.results
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut Panel {
        &mut self.panel
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    /// The current unexpired notice, if any.
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| !n.is_expired())
    }

    fn bump(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn push_info(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::info(message, self.notice_ttl));
    }

    fn push_error(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::error(message, self.notice_ttl));
    }

    /// Begin a search. Blank keywords are rejected locally and never reach
    /// the service. A search started while another is in flight supersedes
    /// it: the older completion will be discarded by its stale token.
    pub fn start_search(&mut self, keyword: &str) -> Option<SearchRequest> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            self.push_error("enter a search keyword");
            return None;
        }
        let token = self.bump();
        self.search_token = Some(token);
        if self.phase == Phase::Idle {
            self.phase = Phase::Searching;
        }
        Some(SearchRequest {
            token,
            keyword: keyword.to_string(),
        })
    }

    /// Apply a completed search. Completions whose token no longer matches
    /// the active search are dropped.
    pub fn finish_search(&mut self, token: u64, result: Result<Vec<Song>, ServiceError>) {
        if self.search_token != Some(token) {
            tracing::debug!(token, "discarding stale search result");
            return;
        }
        self.search_token = None;
        if self.phase == Phase::Searching {
            self.phase = Phase::Idle;
        }

        match result {
            Ok(songs) => {
                if songs.is_empty() {
                    self.push_info("no songs found");
                }
                self.results = songs;
                self.panel.set_content(results_markup(&self.results));
            }
            Err(e) => {
                self.push_error(format!("search failed: {e} (try again)"));
            }
        }
    }

    /// Select a result for playback. Returns the resolution the caller must
    /// run. Selecting while a previous load is in flight supersedes it.
    pub fn select_result(&mut self, index: usize) -> Option<ResolveRequest> {
        let song = self.results.get(index).cloned()?;
        Some(self.select_song(song))
    }

    /// Begin loading a song that is not in the result list, e.g. one picked
    /// from the favorites list.
    pub fn select_song(&mut self, song: Song) -> ResolveRequest {
        if self.phase != Phase::Loading {
            self.prior_phase = self.phase;
        }
        self.phase = Phase::Loading;
        let token = self.bump();
        let song_id = song.id.clone();
        self.loading = Some((token, song));
        ResolveRequest { token, song_id }
    }

    /// Apply a completed track resolution.
    pub fn finish_resolve(&mut self, token: u64, result: Result<PlayableTrack, ServiceError>) {
        let song = match &self.loading {
            Some((t, song)) if *t == token => song.clone(),
            _ => {
                tracing::debug!(token, "discarding stale track resolution");
                return;
            }
        };
        self.loading = None;

        let track = match result {
            Ok(track) => track,
            Err(e) => {
                self.phase = self.prior_phase;
                self.push_error(format!("could not load \"{}\": {e}", song.title));
                return;
            }
        };

        let Some(url) = track.stream_url else {
            // A valid response with no stream URL: unplayable, not a crash.
            self.phase = self.prior_phase;
            self.push_error(format!("\"{}\" has no playable stream", song.title));
            return;
        };

        self.start_playback(song, &url, track.lyrics.as_deref());
    }

    fn start_playback(&mut self, song: Song, url: &str, lyric_text: Option<&str>) {
        // Pause and release the previous handle before creating the new one,
        // so at most one exists at any instant.
        if let Some(mut old) = self.handle.take() {
            old.pause();
        }

        match self.backend.open(url) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.cues = lyrics::parse_lyrics(lyric_text.unwrap_or(""));
                self.favorited = self.favorites.is_favorite(&song.id);
                self.position_secs = 0.0;
                self.duration_secs = song.duration_secs.map(f64::from).unwrap_or(0.0);
                self.panel.set_content(song.display());
                self.panel.expand();
                self.current = Some(song);
                self.phase = Phase::Playing;
            }
            Err(e) => {
                // No partially constructed session: the handle stays absent.
                self.current = None;
                self.cues.clear();
                self.phase = Phase::Idle;
                self.push_error(format!("playback failed: {e}"));
            }
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.phase {
            Phase::Playing => {
                if let Some(h) = self.handle.as_mut() {
                    h.pause();
                }
                self.phase = Phase::Paused;
            }
            Phase::Paused => {
                let resumed = match self.handle.as_mut() {
                    Some(h) => h.resume(),
                    None => return,
                };
                match resumed {
                    Ok(()) => self.phase = Phase::Playing,
                    Err(e) => self.push_error(format!("resume failed: {e}")),
                }
            }
            _ => {}
        }
    }

    /// Stop playback and return to idle, releasing the audio handle and
    /// cancelling interest in any in-flight resolution.
    pub fn stop(&mut self) {
        if let Some(mut h) = self.handle.take() {
            h.pause();
        }
        self.loading = None;
        self.current = None;
        self.cues.clear();
        self.position_secs = 0.0;
        self.duration_secs = 0.0;
        self.favorited = false;
        self.phase = Phase::Idle;
        self.panel.set_content(results_markup(&self.results));
        self.panel.collapse();
    }

    pub fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Position { seconds } => {
                if self.handle.is_some() {
                    self.position_secs = seconds;
                }
            }
            PlayerEvent::Duration { seconds } => {
                if self.handle.is_some() && seconds.is_finite() && seconds > 0.0 {
                    self.duration_secs = seconds;
                }
            }
            PlayerEvent::Started => {
                if self.phase == Phase::Paused {
                    self.phase = Phase::Playing;
                }
            }
            PlayerEvent::Paused => {
                if self.phase == Phase::Playing {
                    self.phase = Phase::Paused;
                }
            }
            PlayerEvent::Ended => {
                if self.handle.take().is_some() {
                    self.current = None;
                    self.cues.clear();
                    self.position_secs = 0.0;
                    self.duration_secs = 0.0;
                    self.favorited = false;
                    self.phase = Phase::Idle;
                    self.panel.set_content(results_markup(&self.results));
                    self.panel.collapse();
                    self.push_info("playback ended");
                }
            }
            PlayerEvent::Error(e) => {
                self.push_error(format!("player error: {e}"));
            }
        }
    }

    /// Seek from a click on the progress control: the offset is clamped to
    /// the track width before dividing. Ignored while the duration is still
    /// unknown, as is a NaN target (zero width).
    pub fn seek(&mut self, offset_x: f64, track_width: f64) {
        if self.duration_secs <= 0.0 {
            return;
        }
        let offset = offset_x.max(0.0).min(track_width);
        let target = (offset / track_width) * self.duration_secs;
        if !target.is_finite() {
            return;
        }
        if let Some(h) = self.handle.as_mut() {
            h.seek_to(target);
            self.position_secs = target;
        }
    }

    /// Flip the current song's membership in the favorites store and update
    /// the star flag synchronously.
    pub fn toggle_favorite(&mut self) {
        let Some(song) = self.current.clone() else {
            return;
        };
        if self.favorited {
            self.favorites.remove(&song.id);
            self.favorited = false;
            self.push_info("removed from favorites");
        } else {
            self.favorites.add(&song);
            self.favorited = true;
            self.push_info("added to favorites");
        }
    }

    /// Snapshot for rendering, recomputed from the latest position tick.
    pub fn now_playing(&self) -> Option<NowPlayingView> {
        let song = self.current.as_ref()?;
        let percent = if self.duration_secs > 0.0 {
            ((self.position_secs / self.duration_secs) * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let lyric = lyrics::cue_at(&self.cues, self.position_secs)
            .map(|c| c.text.clone())
            .unwrap_or_else(|| LYRIC_PLACEHOLDER.to_string());
        Some(NowPlayingView {
            title: song.title.clone(),
            artist: song.artist.clone(),
            elapsed: format_time(self.position_secs),
            total: format_time(self.duration_secs),
            percent,
            lyric,
            favorited: self.favorited,
            paused: self.phase == Phase::Paused,
        })
    }
}

fn results_markup(results: &[Song]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use state::NoticeKind;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeBackend {
        opened: Rc<Cell<usize>>,
        live: Rc<Cell<usize>>,
        seeks: Rc<Cell<f64>>,
        fail_open: bool,
    }

    struct FakeHandle {
        live: Rc<Cell<usize>>,
        seeks: Rc<Cell<f64>>,
    }

    impl AudioBackend for FakeBackend {
        type Handle = FakeHandle;

        fn open(&mut self, _url: &str) -> Result<FakeHandle, audio::PlaybackError> {
            if self.fail_open {
                return Err(audio::PlaybackError::Rejected("autoplay blocked".into()));
            }
            self.opened.set(self.opened.get() + 1);
            self.live.set(self.live.get() + 1);
            Ok(FakeHandle {
                live: self.live.clone(),
                seeks: self.seeks.clone(),
            })
        }
    }

    impl AudioHandle for FakeHandle {
        fn pause(&mut self) {}
        fn resume(&mut self) -> Result<(), audio::PlaybackError> {
            Ok(())
        }
        fn seek_to(&mut self, seconds: f64) {
            self.seeks.set(seconds);
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    fn controller(backend: FakeBackend) -> Controller<FakeBackend> {
        Controller::new(
            backend,
            FavoritesStore::open_in_memory().unwrap(),
            Panel::default(),
            Duration::from_secs(2),
        )
    }

    fn song(id: &str) -> Song {
        Song {
            id: id.to_string(),
            title: format!("Title {id}"),
            artist: "Artist".to_string(),
            album: None,
            cover: None,
            duration_secs: Some(180),
        }
    }

    fn playable(lyrics: Option<&str>) -> PlayableTrack {
        PlayableTrack {
            stream_url: Some("http://x/stream.mp3".to_string()),
            lyrics: lyrics.map(str::to_string),
        }
    }

    /// Drive a full search -> select -> play flow for one song.
    fn play_song(c: &mut Controller<FakeBackend>, id: &str) {
        let req = c.start_search("test").unwrap();
        c.finish_search(req.token, Ok(vec![song(id)]));
        let resolve = c.select_result(0).unwrap();
        c.finish_resolve(resolve.token, Ok(playable(Some("[00:10.00]line one"))));
    }

    #[test]
    fn test_blank_keyword_rejected_locally() {
        let mut c = controller(FakeBackend::default());
        assert!(c.start_search("   ").is_none());
        assert_eq!(c.notice().unwrap().kind, NoticeKind::Error);
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_empty_results_shows_indicator() {
        let mut c = controller(FakeBackend::default());
        let req = c.start_search("test").unwrap();
        assert_eq!(c.phase(), Phase::Searching);
        c.finish_search(req.token, Ok(vec![]));
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.results().is_empty());
        assert_eq!(c.notice().unwrap().message, "no songs found");
    }

    #[test]
    fn test_select_plays_and_expands_panel() {
        let backend = FakeBackend::default();
        let opened = backend.opened.clone();
        let live = backend.live.clone();
        let mut c = controller(backend);

        play_song(&mut c, "a");
        assert_eq!(c.phase(), Phase::Playing);
        assert_eq!(opened.get(), 1);
        assert_eq!(live.get(), 1);
        assert!(c.panel().is_animating());
        c.panel_mut().content_phase();
        c.panel_mut().finish_transition();
        assert!(c.panel().is_expanded());
        assert_eq!(c.current_song().unwrap().id, "a");
    }

    #[test]
    fn test_new_song_releases_previous_handle() {
        let backend = FakeBackend::default();
        let opened = backend.opened.clone();
        let live = backend.live.clone();
        let mut c = controller(backend);

        play_song(&mut c, "a");
        play_song(&mut c, "b");

        assert_eq!(opened.get(), 2);
        assert_eq!(live.get(), 1);
        assert_eq!(c.current_song().unwrap().id, "b");
        assert_eq!(c.phase(), Phase::Playing);
    }

    #[test]
    fn test_unplayable_track_stays_idle() {
        let backend = FakeBackend::default();
        let opened = backend.opened.clone();
        let mut c = controller(backend);

        let req = c.start_search("test").unwrap();
        c.finish_search(req.token, Ok(vec![song("a")]));
        let resolve = c.select_result(0).unwrap();
        c.finish_resolve(
            resolve.token,
            Ok(PlayableTrack {
                stream_url: None,
                lyrics: None,
            }),
        );

        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(opened.get(), 0);
        assert!(c.current_song().is_none());
        assert_eq!(c.notice().unwrap().kind, NoticeKind::Error);
    }

    #[test]
    fn test_open_failure_leaves_no_partial_session() {
        let mut c = controller(FakeBackend {
            fail_open: true,
            ..FakeBackend::default()
        });
        play_song(&mut c, "a");
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.current_song().is_none());
        assert!(c.now_playing().is_none());
        assert_eq!(c.notice().unwrap().kind, NoticeKind::Error);
    }

    #[test]
    fn test_overlapping_searches_last_request_wins() {
        let mut c = controller(FakeBackend::default());
        let first = c.start_search("first").unwrap();
        let second = c.start_search("second").unwrap();

        // The late completion of the superseded search is discarded.
        c.finish_search(first.token, Ok(vec![song("stale")]));
        assert!(c.results().is_empty());

        c.finish_search(second.token, Ok(vec![song("fresh")]));
        assert_eq!(c.results().len(), 1);
        assert_eq!(c.results()[0].id, "fresh");
    }

    #[test]
    fn test_stop_cancels_in_flight_resolution() {
        let backend = FakeBackend::default();
        let opened = backend.opened.clone();
        let mut c = controller(backend);

        let req = c.start_search("test").unwrap();
        c.finish_search(req.token, Ok(vec![song("a")]));
        let resolve = c.select_result(0).unwrap();
        c.stop();
        c.finish_resolve(resolve.token, Ok(playable(None)));

        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(opened.get(), 0);
    }

    #[test]
    fn test_resolve_failure_restores_prior_phase() {
        let mut c = controller(FakeBackend::default());
        play_song(&mut c, "a");

        // Failing to load the next song keeps the current one playing.
        let resolve = c.select_result(0).unwrap();
        c.finish_resolve(
            resolve.token,
            Err(ServiceError::Status(reqwest::StatusCode::BAD_GATEWAY)),
        );
        assert_eq!(c.phase(), Phase::Playing);
        assert_eq!(c.current_song().unwrap().id, "a");
    }

    #[test]
    fn test_pause_resume_and_stop() {
        let backend = FakeBackend::default();
        let live = backend.live.clone();
        let mut c = controller(backend);
        play_song(&mut c, "a");

        c.toggle_pause();
        assert_eq!(c.phase(), Phase::Paused);
        c.toggle_pause();
        assert_eq!(c.phase(), Phase::Playing);

        c.stop();
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(live.get(), 0);
        assert!(c.now_playing().is_none());
    }

    #[test]
    fn test_end_of_track_releases_resources() {
        let backend = FakeBackend::default();
        let live = backend.live.clone();
        let mut c = controller(backend);
        play_song(&mut c, "a");

        c.handle_player_event(PlayerEvent::Ended);
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(live.get(), 0);
        assert_eq!(c.notice().unwrap().message, "playback ended");

        // The notification is one-shot: a second Ended changes nothing.
        c.handle_player_event(PlayerEvent::Ended);
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_progress_view_tracks_cues() {
        let mut c = controller(FakeBackend::default());
        let req = c.start_search("test").unwrap();
        c.finish_search(req.token, Ok(vec![song("a")]));
        let resolve = c.select_result(0).unwrap();
        c.finish_resolve(
            resolve.token,
            Ok(playable(Some("[00:10.00]first\n[00:20.00]second"))),
        );

        c.handle_player_event(PlayerEvent::Duration { seconds: 200.0 });
        c.handle_player_event(PlayerEvent::Position { seconds: 5.0 });
        let view = c.now_playing().unwrap();
        assert_eq!(view.lyric, LYRIC_PLACEHOLDER);
        assert_eq!(view.elapsed, "0:05");
        assert_eq!(view.total, "3:20");

        c.handle_player_event(PlayerEvent::Position { seconds: 65.0 });
        let view = c.now_playing().unwrap();
        assert_eq!(view.lyric, "second");
        assert_eq!(view.elapsed, "1:05");
        assert!((view.percent - 32.5).abs() < 1e-9);
    }

    #[test]
    fn test_seek_clamps_and_ignores_nan() {
        let backend = FakeBackend::default();
        let seeks = backend.seeks.clone();
        let mut c = controller(backend);
        play_song(&mut c, "a");
        c.handle_player_event(PlayerEvent::Duration { seconds: 100.0 });

        c.seek(50.0, 200.0);
        assert_eq!(seeks.get(), 25.0);

        // Offsets past the track edge clamp to the full width.
        c.seek(500.0, 200.0);
        assert_eq!(seeks.get(), 100.0);
        c.seek(-40.0, 200.0);
        assert_eq!(seeks.get(), 0.0);

        // Zero width divides to NaN, which is ignored.
        seeks.set(-1.0);
        c.seek(10.0, 0.0);
        assert_eq!(seeks.get(), -1.0);
    }

    #[test]
    fn test_seek_before_duration_known_is_ignored() {
        let backend = FakeBackend::default();
        let seeks = backend.seeks.clone();
        let mut c = controller(backend);

        let req = c.start_search("test").unwrap();
        let mut untimed = song("a");
        untimed.duration_secs = None;
        c.finish_search(req.token, Ok(vec![untimed]));
        let resolve = c.select_result(0).unwrap();
        c.finish_resolve(resolve.token, Ok(playable(None)));
        c.handle_player_event(PlayerEvent::Position { seconds: 42.0 });

        // No Duration event yet: the click cannot map to a position, so
        // nothing reaches the handle and the position stays put.
        seeks.set(-1.0);
        c.seek(50.0, 200.0);
        assert_eq!(seeks.get(), -1.0);
        assert_eq!(c.now_playing().unwrap().elapsed, "0:42");

        c.handle_player_event(PlayerEvent::Duration { seconds: 100.0 });
        c.seek(50.0, 200.0);
        assert_eq!(seeks.get(), 25.0);
    }

    #[test]
    fn test_play_favorite_directly() {
        let backend = FakeBackend::default();
        let opened = backend.opened.clone();
        let mut c = controller(backend);
        let fav = song("fav");
        c.favorites().add(&fav);

        // No search, no result list: the song comes straight from the
        // favorites list.
        let resolve = c.select_song(fav);
        assert_eq!(c.phase(), Phase::Loading);
        c.finish_resolve(resolve.token, Ok(playable(None)));

        assert_eq!(c.phase(), Phase::Playing);
        assert_eq!(opened.get(), 1);
        assert_eq!(c.current_song().unwrap().id, "fav");
        assert!(c.now_playing().unwrap().favorited);
    }

    #[test]
    fn test_favorite_toggle_round_trip() {
        let mut c = controller(FakeBackend::default());
        play_song(&mut c, "a");
        assert!(!c.now_playing().unwrap().favorited);

        c.toggle_favorite();
        assert!(c.now_playing().unwrap().favorited);
        assert!(c.favorites().is_favorite("a"));

        c.toggle_favorite();
        assert!(!c.now_playing().unwrap().favorited);
        assert!(!c.favorites().is_favorite("a"));
    }
}
