pub mod events;

use crate::config::Config;
use crate::favorites::FavoritesStore;
use crate::island::Panel;
use crate::music::{MusicClient, Song};
use crate::player::MpvPlayer;
use crate::player::mpv::MpvBackend;
use crate::session::{Controller, ResolveRequest};
use crate::session::audio::PlayerEvent;
use crate::session::state::Phase;
use anyhow::Context;
use events::{Event, NetworkEvent, PanelEvent};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct App {
    client: MusicClient,
    controller: Controller<MpvBackend>,
    // Keeps the mpv process alive for the lifetime of the app.
    _player: MpvPlayer,
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
    panel_timers_pending: bool,
}

impl App {
    pub async fn new(cfg: &Config) -> anyhow::Result<Self> {
        let client = MusicClient::new(
            cfg.api.base_url.clone(),
            Duration::from_secs(cfg.api.timeout_secs),
        )?;
        let favorites = FavoritesStore::open(&cfg.paths.data_dir.join("islet.sqlite3"))
            .context("open favorites store")?;
        let panel = Panel::new(Duration::from_millis(cfg.panel.animation_ms));

        let (tx, rx) = mpsc::channel::<Event>(256);
        let (player, backend) = MpvPlayer::spawn(tx.clone(), cfg.player.volume)
            .await
            .context("start mpv")?;

        let controller = Controller::new(
            backend,
            favorites,
            panel,
            Duration::from_millis(cfg.panel.notice_ms),
        );

        Ok(Self {
            client,
            controller,
            _player: player,
            tx,
            rx,
            panel_timers_pending: false,
        })
    }

    /// Search, play the first result and print lyric/progress lines until
    /// the track ends.
    pub async fn play(&mut self, keyword: &str) -> anyhow::Result<()> {
        self.spawn_search(keyword);
        self.drive().await
    }

    /// Play a known song directly (no search), e.g. a favorite.
    pub async fn play_song(&mut self, song: Song) -> anyhow::Result<()> {
        println!("playing: {}", song.display());
        let req = self.controller.select_song(song);
        self.spawn_resolve_request(req);
        self.drive().await
    }

    /// Pump events until the track ends or playback cannot start.
    async fn drive(&mut self) -> anyhow::Result<()> {
        let mut last_line = String::new();
        let mut last_notice = String::new();
        while let Some(ev) = self.rx.recv().await {
            let search_done = matches!(&ev, Event::Network(NetworkEvent::SearchDone { .. }));
            let resolve_done = matches!(&ev, Event::Network(NetworkEvent::ResolveDone { .. }));
            let ended = matches!(&ev, Event::Player(PlayerEvent::Ended));
            self.handle_event(ev);

            if let Some(notice) = self.controller.notice()
                && notice.message != last_notice
            {
                eprintln!("{}", notice.message);
                last_notice = notice.message.clone();
            }

            if search_done {
                if self.controller.results().is_empty() {
                    break;
                }
                println!("playing: {}", self.controller.results()[0].display());
                self.spawn_resolve(0);
            }

            // Resolve came back unplayable or playback could not start.
            if resolve_done && self.controller.current_song().is_none() {
                break;
            }
            if ended && self.controller.phase() == Phase::Idle {
                break;
            }

            if let Some(view) = self.controller.now_playing() {
                let line = format!("[{}/{}] {}", view.elapsed, view.total, view.lyric);
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, ev: Event) {
        match ev {
            Event::Player(pe) => self.controller.handle_player_event(pe),
            Event::Network(NetworkEvent::SearchDone { token, result }) => {
                self.controller.finish_search(token, result);
            }
            Event::Network(NetworkEvent::ResolveDone { token, result }) => {
                self.controller.finish_resolve(token, result);
            }
            Event::Panel(PanelEvent::ContentPhase) => {
                self.controller.panel_mut().content_phase();
            }
            Event::Panel(PanelEvent::TransitionDone) => {
                self.controller.panel_mut().finish_transition();
                self.panel_timers_pending = false;
            }
        }
        self.schedule_panel_timers();
    }

    fn spawn_search(&mut self, keyword: &str) {
        let Some(req) = self.controller.start_search(keyword) else {
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.search(&req.keyword).await;
            let _ = tx
                .send(Event::Network(NetworkEvent::SearchDone {
                    token: req.token,
                    result,
                }))
                .await;
        });
    }

    fn spawn_resolve(&mut self, index: usize) {
        let Some(req) = self.controller.select_result(index) else {
            return;
        };
        self.spawn_resolve_request(req);
    }

    fn spawn_resolve_request(&mut self, req: ResolveRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.resolve_track(&req.song_id).await;
            let _ = tx
                .send(Event::Network(NetworkEvent::ResolveDone {
                    token: req.token,
                    result,
                }))
                .await;
        });
    }

    /// Arm the two transition timers when the panel just started animating.
    /// The content-phase timer fires partway through, the completion timer
    /// at the full duration.
    fn schedule_panel_timers(&mut self) {
        if self.panel_timers_pending || !self.controller.panel().is_animating() {
            return;
        }
        self.panel_timers_pending = true;

        let content_delay = self.controller.panel().content_phase_delay();
        let total = self.controller.panel().transition_duration();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(content_delay).await;
            let _ = tx.send(Event::Panel(PanelEvent::ContentPhase)).await;
            tokio::time::sleep(total.saturating_sub(content_delay)).await;
            let _ = tx.send(Event::Panel(PanelEvent::TransitionDone)).await;
        });
    }
}
