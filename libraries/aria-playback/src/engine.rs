//! Media engine abstraction
//!
//! The controller never decodes anything itself. It drives an engine
//! through this trait: load an asset, create an instance for it, then
//! play/pause/seek that instance. Instances report back through an
//! [`EngineEventSink`] tagged with their [`InstanceId`], so events from a
//! replaced instance can be told apart and dropped.

use crate::error::Result;
use crate::item::MediaItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Identifies one engine instance for the lifetime of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// Options applied when creating an instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceOptions {
    pub automatically_waits_to_minimize_stalling: bool,
}

/// Status of the engine instance itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Status of the item loaded into an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Unknown,
    Loading,
    ReadyToPlay,
    Failed(String),
}

/// Asynchronous notification from an engine instance
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    InstanceStatus(InstanceStatus),
    ItemStatus(ItemStatus),
    /// Periodic playback position
    Time(Duration),
    /// End of the buffered range
    BufferedRange(Duration),
    EndOfTrack,
    Stalled,
    /// New entry in the item's error log
    ErrorLog(String),
    /// Playback stopped early; `reason` is missing when the engine sent a
    /// malformed notification
    FailedToPlayToEnd {
        reason: Option<String>,
        details: String,
    },
}

/// An [`EngineEvent`] tagged with the instance that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEnvelope {
    pub instance: InstanceId,
    pub event: EngineEvent,
}

/// Sending half handed to an engine instance
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    instance: InstanceId,
    tx: mpsc::UnboundedSender<EngineEnvelope>,
}

impl EngineEventSink {
    pub fn new(instance: InstanceId, tx: mpsc::UnboundedSender<EngineEnvelope>) -> Self {
        Self { instance, tx }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Send an event; returns `false` once the controller is gone
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(EngineEnvelope {
                instance: self.instance,
                event,
            })
            .is_ok()
    }
}

/// Media decoding/rendering engine
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Load the asset behind `item` so it can be played without delay
    async fn load(&self, item: &MediaItem) -> Result<()>;

    /// Create a playable instance for an already loaded item
    ///
    /// The instance starts paused at position zero.
    fn create_instance(
        &self,
        item: &MediaItem,
        options: InstanceOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn EngineInstance>>;
}

/// One loaded, playable asset
///
/// Dropping the instance must stop it and release its resources.
pub trait EngineInstance: Send {
    fn play(&mut self, rate: f32);

    fn pause(&mut self);

    fn seek(&mut self, position: Duration);

    /// Change the rate; `0.0` means paused
    fn set_rate(&mut self, rate: f32);

    fn rate(&self) -> f32;

    fn current_time(&self) -> Option<Duration>;
}
