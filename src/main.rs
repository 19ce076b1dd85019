mod app;
mod config;
mod favorites;
mod island;
mod lyrics;
mod music;
mod player;
mod session;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "islet", version, about = "Expandable now-playing widget for the terminal")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search songs and print the results.
    Search { keyword: String },
    /// Search, play the first result and follow the lyrics.
    Play { keyword: String },
    /// Print the raw LRC lyrics of a song.
    Lyrics { id: String },
    /// Manage the favorites list.
    Favorites {
        #[command(subcommand)]
        cmd: FavoritesCommand,
    },
}

#[derive(Debug, Subcommand)]
enum FavoritesCommand {
    /// List favorites in the order they were added.
    List,
    /// Search and add the first result.
    Add { keyword: String },
    /// Remove a favorite by song id.
    Remove { id: String },
    /// Play a favorite by song id.
    Play { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command {
        Command::Search { keyword } => {
            let client = make_client(&cfg)?;
            let songs = client.search(&keyword).await?;
            print_songs(&songs);
        }
        Command::Play { keyword } => {
            let mut app = app::App::new(&cfg).await?;
            app.play(&keyword).await?;
        }
        Command::Lyrics { id } => {
            let client = make_client(&cfg)?;
            let track = client.resolve_track(&id).await?;
            match track.lyrics {
                Some(lrc) => println!("{lrc}"),
                None => println!("(no lyrics)"),
            }
        }
        Command::Favorites { cmd } => {
            let store = open_store(&cfg)?;
            match cmd {
                FavoritesCommand::List => {
                    print_songs(&store.list());
                }
                FavoritesCommand::Add { keyword } => {
                    let client = make_client(&cfg)?;
                    let songs = client.search(&keyword).await?;
                    match songs.first() {
                        Some(song) => {
                            store.add(song);
                            println!("Added: {}", song.display());
                        }
                        None => println!("No songs found."),
                    }
                }
                FavoritesCommand::Remove { id } => {
                    if store.is_favorite(&id) {
                        store.remove(&id);
                        println!("Removed.");
                    } else {
                        println!("Not a favorite.");
                    }
                }
                FavoritesCommand::Play { id } => {
                    match store.list().into_iter().find(|s| s.id == id) {
                        Some(song) => {
                            drop(store);
                            let mut app = app::App::new(&cfg).await?;
                            app.play_song(song).await?;
                        }
                        None => println!("Not a favorite."),
                    }
                }
            }
        }
    }

    Ok(())
}

fn make_client(cfg: &config::Config) -> anyhow::Result<music::MusicClient> {
    let client = music::MusicClient::new(
        cfg.api.base_url.clone(),
        Duration::from_secs(cfg.api.timeout_secs),
    )?;
    Ok(client)
}

fn open_store(cfg: &config::Config) -> anyhow::Result<favorites::FavoritesStore> {
    favorites::FavoritesStore::open(&cfg.paths.data_dir.join("islet.sqlite3"))
        .context("open favorites store")
}

fn print_songs(songs: &[music::Song]) {
    for (i, s) in songs.iter().enumerate() {
        let album = s
            .album
            .as_deref()
            .map(|a| format!("  [{a}]"))
            .unwrap_or_default();
        println!("{:02}. {}{}  (id={})", i + 1, s.display(), album, s.id);
    }
}
