//! Aria Player - Playback Control
//!
//! The control and state layer above a media engine. This crate provides:
//! - A play queue with insertion order and shuffled played order
//! - Shuffle (current item pinned) and repeat modes (None, One, All)
//! - Capability predicates gating every transport command
//! - A synchronous controller state machine with last-command-wins
//!   superseding of asynchronous loads
//! - A tokio runtime driver merging user, remote, engine and OS events
//! - Now-playing telemetry and remote-control button enablement
//!
//! # Architecture
//!
//! `aria-playback` does not decode or render audio. The engine is reached
//! through the [`MediaEngine`] / [`EngineInstance`] traits; the operating
//! system through [`NowPlayingCenter`], [`RemoteCommandCenter`] and the
//! [`SessionEvent`] / [`RemoteEvent`] channels.
//!
//! # Example: Driving the controller directly
//!
//! ```rust,no_run
//! use aria_playback::{
//!     Command, CommandOrigin, Effect, ItemMetadata, MediaEngine, MediaItem, PlaybackController,
//!     PlayerConfig,
//! };
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # fn demo(engine: Arc<dyn MediaEngine>) -> aria_playback::Result<()> {
//! let (engine_tx, _engine_rx) = mpsc::unbounded_channel();
//! let mut controller = PlaybackController::new(PlayerConfig::default(), engine, engine_tx)?;
//!
//! controller.new_songs(vec![
//!     MediaItem::new("/music/one.mp3", ItemMetadata::default()),
//!     MediaItem::new("/music/two.mp3", ItemMetadata::default()),
//! ]);
//!
//! for effect in controller.execute(Command::Play, CommandOrigin::User)? {
//!     if let Effect::Load { generation, item, .. } = effect {
//!         // Load `item` on the engine, then report back
//!         controller.complete_load(generation, &item, Ok(()));
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Running a player
//!
//! ```rust,no_run
//! use aria_playback::{
//!     Command, MediaEngine, NowPlayingCenter, PlayerAdapters, PlayerConfig, PlayerRuntime,
//!     RemoteCommandCenter,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo(
//! #     engine: Arc<dyn MediaEngine>,
//! #     now_playing: Box<dyn NowPlayingCenter>,
//! #     remote: Box<dyn RemoteCommandCenter>,
//! # ) -> aria_playback::Result<()> {
//! let player = PlayerRuntime::spawn(
//!     PlayerConfig::default(),
//!     engine,
//!     PlayerAdapters::new(now_playing, remote),
//! )?;
//!
//! let mut status = player.status();
//! player.send(Command::Play).await?;
//! status.changed().await.ok();
//! player.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod capability;
mod command;
mod controller;
pub mod engine;
mod error;
mod events;
mod item;
pub mod now_playing;
mod queue;
mod runtime;
pub mod shuffle;
pub mod types;

// Public exports
pub use adapter::{
    NowPlayingCenter, RemoteButton, RemoteCommandCenter, RemoteEvent, RouteChangeReason,
    SessionEvent,
};
pub use capability::{Capabilities, PlayerView};
pub use command::{Command, CommandOrigin};
pub use controller::{Effect, PlaybackController, PlayerSnapshot};
pub use engine::{
    EngineEnvelope, EngineEvent, EngineEventSink, EngineInstance, InstanceId, InstanceOptions,
    InstanceStatus, ItemStatus, MediaEngine,
};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use item::{
    Artwork, ItemMetadata, MediaItem, MetadataLoader, UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_SONG,
};
pub use now_playing::NowPlayingInfo;
pub use queue::PlayQueue;
pub use runtime::{PlayerAdapters, PlayerHandle, PlayerRuntime};
pub use types::{PlayerConfig, PlayerStatus, RemoteControlMode, RepeatMode, ShuffleMode};
