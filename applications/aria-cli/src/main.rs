/// Aria CLI - headless playback driver and catalog tool
use anyhow::Context;
use aria_library::{Catalog, SongFilter};
use aria_playback::capability::DEFAULT_SKIP_INTERVAL;
use aria_playback::{
    Command, MediaItem, MetadataLoader, PlayerAdapters, PlayerHandle, PlayerRuntime,
    PlayerStatus, RemoteEvent, RepeatMode, ShuffleMode,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod metadata;
mod surface;

use config::AppConfig;
use engine::SimulatedEngine;
use metadata::LoftyMetadataLoader;
use surface::{LogNowPlaying, LogRemote};

#[derive(Parser)]
#[command(name = "aria-cli")]
#[command(about = "Aria Player headless driver", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play files through the simulated engine
    ///
    /// While playing, type a key and Enter: p (play/pause), n (next),
    /// b (previous), f / r (skip forward / back), s (shuffle), l (repeat),
    /// m (remote mode), q (quit).
    Play {
        /// Files to queue (defaults to `queue` from the configuration)
        files: Vec<PathBuf>,
        /// Shuffle the queue
        #[arg(long)]
        shuffle: bool,
        /// Repeat mode
        #[arg(long, value_enum)]
        repeat: Option<RepeatArg>,
        /// Playback rate
        #[arg(long)]
        rate: Option<f32>,
    },
    /// Inspect and edit the song catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// List folders and playlists under a folder path
    List {
        #[arg(default_value = "")]
        path: String,
    },
    /// List songs sorted by artist, album and title
    Songs {
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        playlist: Option<String>,
    },
    /// Add files to the catalog, optionally to a playlist too
    Add {
        files: Vec<PathBuf>,
        #[arg(long)]
        playlist: Option<String>,
    },
    /// Create an empty playlist
    NewPlaylist { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RepeatArg {
    None,
    One,
    All,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::None => RepeatMode::None,
            RepeatArg::One => RepeatMode::One,
            RepeatArg::All => RepeatMode::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aria_playback=info,aria_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            files,
            shuffle,
            repeat,
            rate,
        } => {
            let mut config = config;
            if shuffle {
                config.player.shuffle = ShuffleMode::Songs;
            }
            if let Some(repeat) = repeat {
                config.player.repeat = repeat.into();
            }
            if let Some(rate) = rate {
                config.player.desired_rate = rate;
            }
            config.validate()?;
            play(config, files).await?;
        }
        Commands::Catalog { command } => {
            catalog(&config.catalog_dir, command)?;
        }
    }

    Ok(())
}

async fn play(config: AppConfig, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let locators: Vec<String> = if files.is_empty() {
        config.queue.clone()
    } else {
        files.iter().map(|f| f.display().to_string()).collect()
    };
    anyhow::ensure!(
        !locators.is_empty(),
        "nothing to play: pass files or set `queue` in the configuration"
    );

    let loader: Arc<dyn MetadataLoader> = Arc::new(LoftyMetadataLoader);
    let items: Vec<MediaItem> = locators
        .into_iter()
        .map(|locator| MediaItem::load(locator, loader.clone()))
        .collect();

    let engine = Arc::new(SimulatedEngine::new(Duration::from_millis(config.tick_ms)));
    let (remote_tx, remote_rx) = mpsc::unbounded_channel();
    let adapters = PlayerAdapters::new(Box::new(LogNowPlaying::default()), Box::new(LogRemote))
        .with_remote_events(remote_rx);

    let player = PlayerRuntime::spawn(config.player, engine, adapters)?;
    info!("Queued {} items", items.len());
    player.new_songs(items).await?;
    player.send(Command::Play).await?;

    let (quit_tx, mut quit_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_controls(player.clone(), remote_tx, quit_tx));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut status = player.status();
    let mut started = false;

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                info!("Status: {:?}", current);
                match current {
                    PlayerStatus::Playing => started = true,
                    PlayerStatus::Ready if started => {
                        info!("Queue finished");
                        break;
                    }
                    PlayerStatus::Failed(e) => {
                        warn!("Playback failed: {}", e);
                        if let Err(e) = player.send(Command::Next).await {
                            warn!("Nothing left to try: {}", e);
                            break;
                        }
                    }
                    PlayerStatus::Critical(e) => {
                        error!("Engine failure: {}", e);
                    }
                    _ => {}
                }
            }
            Some(()) = quit_rx.recv() => {
                info!("Quit requested");
                break;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    player.shutdown().await?;
    Ok(())
}

/// Map keyboard lines to remote presses and mode toggles
async fn read_controls(
    player: PlayerHandle,
    remote: mpsc::UnboundedSender<RemoteEvent>,
    quit: mpsc::UnboundedSender<()>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let press = match line.trim() {
            "p" | "" => Some(RemoteEvent::TogglePlayPause),
            "n" => Some(RemoteEvent::NextTrack),
            "b" => Some(RemoteEvent::PreviousTrack),
            "f" => Some(RemoteEvent::SkipForward),
            "r" => Some(RemoteEvent::SkipBackward),
            _ => None,
        };
        if let Some(press) = press {
            if remote.send(press).is_err() {
                break;
            }
            continue;
        }

        let result = match line.trim() {
            "s" => player.toggle_shuffle().await,
            "l" => player.cycle_repeat().await,
            "m" => player.toggle_remote_control(DEFAULT_SKIP_INTERVAL).await,
            "q" => {
                let _ = quit.send(());
                break;
            }
            other => {
                warn!("Unknown control {:?}", other);
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Control failed: {}", e);
            break;
        }

        let snapshot = player.snapshot();
        info!(
            "Shuffle {:?}, repeat {:?}, remote {:?}",
            snapshot.shuffle, snapshot.repeat, snapshot.remote_control
        );
    }
}

fn catalog(dir: &Path, command: CatalogCommand) -> anyhow::Result<()> {
    let mut catalog = Catalog::load_with(dir, metadata::resolve_song)
        .with_context(|| format!("failed to load catalog from {}", dir.display()))?;

    match command {
        CatalogCommand::List { path } => {
            let listing = catalog.list(&path);
            for folder in &listing.folders {
                println!("{folder}");
            }
            for playlist in &listing.playlists {
                println!("{playlist}");
            }
        }
        CatalogCommand::Songs {
            artist,
            album,
            playlist,
        } => {
            let filter = SongFilter {
                artist,
                album,
                playlist,
            };
            for song in catalog.songs(&filter) {
                println!("{} - {} - {}\t{}", song.artist, song.album, song.title, song.locator);
            }
        }
        CatalogCommand::Add { files, playlist } => {
            for file in &files {
                match metadata::song_record(file) {
                    Ok(record) => {
                        let locator = record.locator.clone();
                        catalog.add_song(record);
                        if let Some(playlist) = &playlist {
                            catalog.add_to_playlist(playlist, &locator)?;
                        }
                        info!("Added {}", locator);
                    }
                    Err(e) => warn!("Skipping {}: {}", file.display(), e),
                }
            }
            catalog.save(dir)?;
        }
        CatalogCommand::NewPlaylist { name } => {
            let id = catalog.create_playlist(&name);
            catalog.save(dir)?;
            println!("{id}");
        }
    }

    Ok(())
}
