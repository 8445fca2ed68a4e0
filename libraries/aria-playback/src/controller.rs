//! Playback controller - the command-gated state machine
//!
//! The controller is synchronous. It owns the queue, status, modes, rate and
//! the engine instance, and never awaits anything itself. Asynchronous work
//! (loading an asset, prefetching, preloading neighbours, re-issuing a
//! command) is handed back to the caller as [`Effect`] values; their results
//! come back through [`complete_load`](PlaybackController::complete_load)
//! and [`complete_prefetch`](PlaybackController::complete_prefetch).
//!
//! Every accepted command bumps a generation counter. Async results carry
//! the generation they were started under and are discarded when it no
//! longer matches, so the last accepted command always wins.

use crate::adapter::{command_for, RemoteEvent, RouteChangeReason, SessionEvent};
use crate::capability::{self, Capabilities, PlayerView, DEFAULT_SKIP_INTERVAL};
use crate::command::{Command, CommandOrigin};
use crate::engine::{
    EngineEnvelope, EngineEvent, EngineEventSink, EngineInstance, InstanceId, InstanceOptions,
    InstanceStatus, ItemStatus, MediaEngine,
};
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::item::MediaItem;
use crate::now_playing::{self, NowPlayingInfo};
use crate::queue::PlayQueue;
use crate::types::{PlayerConfig, PlayerStatus, RemoteControlMode, RepeatMode, ShuffleMode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Asynchronous work requested by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Load `item` and report back via `complete_load`
    Load {
        generation: u64,
        index: usize,
        item: MediaItem,
    },

    /// Load `item` without playing and report back via `complete_prefetch`
    Prefetch { generation: u64, item: MediaItem },

    /// Warm up neighbours; results are ignored
    Preload(Vec<MediaItem>),

    /// Run `command` as an auto command via `execute_issued`
    ///
    /// Carries the generation it was issued under; a newer accepted command
    /// makes it stale.
    Issue { generation: u64, command: Command },
}

struct LoadedInstance {
    id: InstanceId,
    item: MediaItem,
    handle: Box<dyn EngineInstance>,
    /// Last position reported by the engine (or set by a seek)
    elapsed: Duration,
    /// Reached its end and has not been rewound since
    ended: bool,
}

/// Read-only copy of the controller state
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    pub index: usize,
    pub queue: Vec<MediaItem>,
    pub shuffle: ShuffleMode,
    pub repeat: RepeatMode,
    pub remote_control: RemoteControlMode,
    pub desired_rate: f32,
    pub capabilities: Capabilities,
    pub now_playing: Option<NowPlayingInfo>,
    pub elapsed: Option<Duration>,
    pub buffered_progress: Option<f32>,
}

impl PlayerSnapshot {
    pub fn current(&self) -> Option<&MediaItem> {
        self.queue.get(self.index)
    }
}

/// Command-gated playback state machine
pub struct PlaybackController {
    config: PlayerConfig,
    engine: Arc<dyn MediaEngine>,
    engine_events: mpsc::UnboundedSender<EngineEnvelope>,

    queue: PlayQueue,
    status: PlayerStatus,
    repeat: RepeatMode,
    remote_control: RemoteControlMode,
    desired_rate: f32,

    instance: Option<LoadedInstance>,
    next_instance_id: u64,

    /// Bumped by every accepted command
    generation: u64,

    /// Generation of a `previous` that is waiting for the rewind to land
    pending_rewind: Option<u64>,

    /// End of the buffered range of the current instance
    buffered: Option<Duration>,

    capabilities: Capabilities,
    now_playing: Option<NowPlayingInfo>,
    force_refresh: bool,

    pending_events: Vec<PlaybackEvent>,
}

impl PlaybackController {
    /// Create a controller with an empty queue
    ///
    /// Engine instances created by this controller report into
    /// `engine_events`.
    pub fn new(
        config: PlayerConfig,
        engine: Arc<dyn MediaEngine>,
        engine_events: mpsc::UnboundedSender<EngineEnvelope>,
    ) -> Result<Self> {
        config.validate()?;

        let mut controller = Self {
            queue: PlayQueue::new(config.shuffle),
            status: PlayerStatus::Ready,
            repeat: config.repeat,
            remote_control: config.remote_control,
            desired_rate: config.desired_rate,
            config,
            engine,
            engine_events,
            instance: None,
            next_instance_id: 0,
            generation: 0,
            pending_rewind: None,
            buffered: None,
            capabilities: Capabilities::default(),
            now_playing: None,
            force_refresh: false,
            pending_events: Vec::new(),
        };
        controller.capabilities = controller.evaluate_capabilities();
        Ok(controller)
    }

    // ===== Commands =====

    /// Gate and run a transport command
    ///
    /// Rejected commands leave the state untouched and return
    /// [`PlaybackError::InvalidCommand`].
    pub fn execute(&mut self, command: Command, origin: CommandOrigin) -> Result<Vec<Effect>> {
        if !capability::can_send(&self.view(), &command) {
            debug!("Rejected {:?} from {:?} in {:?}", command, origin, self.status);
            let error = PlaybackError::InvalidCommand(command);
            self.pending_events.push(PlaybackEvent::CommandRejected {
                command,
                origin,
                error: error.clone(),
            });
            return Err(error);
        }
        if let Command::PlayAt { index } = command {
            if !self.queue.is_empty() && index >= self.queue.len() {
                return Err(PlaybackError::IndexOutOfBounds(index));
            }
        }

        debug!("Accepted {:?} from {:?}", command, origin);
        self.generation += 1;
        self.pending_rewind = None;

        let effects = match command {
            Command::Play => self.play_at(self.queue.index()),
            Command::PlayAt { index } => self.play_at(index),
            Command::Next => self.play_at(self.queue.index() + 1),
            Command::Previous => self.previous(),
            Command::Pause => {
                self.pause();
                Vec::new()
            }
            Command::Stop => {
                self.stop();
                Vec::new()
            }
            Command::Seek {
                position,
                should_play,
            } => {
                self.seek(position, should_play);
                Vec::new()
            }
            Command::Skip { seconds } => self.skip(seconds),
            Command::Restart => {
                self.restart();
                Vec::new()
            }
            Command::Prefetch => self.prefetch(),
        };

        self.settle();
        Ok(effects)
    }

    /// Run an auto command produced by [`Effect::Issue`]
    ///
    /// Dropped without effect when another command was accepted after it
    /// was issued.
    pub fn execute_issued(&mut self, generation: u64, command: Command) -> Result<Vec<Effect>> {
        if generation != self.generation {
            debug!(
                "Discarding superseded auto {:?} (generation {})",
                command, generation
            );
            return Ok(Vec::new());
        }
        self.execute(command, CommandOrigin::Auto)
    }

    fn issue(&self, command: Command) -> Effect {
        Effect::Issue {
            generation: self.generation,
            command,
        }
    }

    fn play_at(&mut self, index: usize) -> Vec<Effect> {
        if self.queue.is_empty() {
            return Vec::new();
        }
        let Some(item) = self.queue.get(index).cloned() else {
            return Vec::new();
        };

        let resumable = self.instance.as_ref().is_some_and(|instance| {
            instance.item.same_entry(&item) && !instance.ended
        }) && index == self.queue.index()
            && self.status == PlayerStatus::Paused;

        if resumable {
            if let Some(instance) = self.instance.as_mut() {
                instance.handle.play(self.desired_rate);
            }
            self.set_status(PlayerStatus::Playing);
            return Vec::new();
        }

        self.teardown_instance();
        self.set_index(index);
        self.set_status(PlayerStatus::Loading);

        vec![Effect::Load {
            generation: self.generation,
            index,
            item,
        }]
    }

    fn previous(&mut self) -> Vec<Effect> {
        let elapsed = self.current_elapsed().unwrap_or_default();
        if elapsed > capability::PREVIOUS_RESTART_THRESHOLD {
            if let Some(instance) = self.instance.as_mut() {
                instance.handle.seek(Duration::ZERO);
                instance.elapsed = Duration::ZERO;
                instance.ended = false;
            }
            self.pending_rewind = Some(self.generation);
            return Vec::new();
        }
        match self.queue.index().checked_sub(1) {
            Some(index) => self.play_at(index),
            None => Vec::new(),
        }
    }

    fn pause(&mut self) {
        if let Some(instance) = self.instance.as_mut() {
            instance.handle.pause();
        }
        self.set_status(PlayerStatus::Paused);
    }

    fn stop(&mut self) {
        self.teardown_instance();
        self.set_status(PlayerStatus::Ready);
    }

    fn seek(&mut self, position: Duration, should_play: bool) {
        let rate = self.desired_rate;
        let Some(instance) = self.instance.as_mut() else {
            return;
        };
        instance.handle.seek(position);
        instance.elapsed = position;
        instance.ended = false;

        if should_play {
            instance.handle.play(rate);
            self.set_status(PlayerStatus::Playing);
        }
    }

    fn skip(&mut self, seconds: i64) -> Vec<Effect> {
        match capability::skip_target(&self.view(), seconds) {
            Some(Command::Next) => self.play_at(self.queue.index() + 1),
            Some(Command::Previous) => self.previous(),
            Some(Command::Seek {
                position,
                should_play,
            }) => {
                self.seek(position, should_play);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn restart(&mut self) {
        if let Some(instance) = self.instance.as_mut() {
            instance.handle.pause();
        }
        self.set_status(PlayerStatus::Paused);
        if !self.queue.is_empty() {
            self.set_index(0);
        }
        self.seek(Duration::ZERO, false);
    }

    fn prefetch(&mut self) -> Vec<Effect> {
        match self.queue.current() {
            Some(item) => vec![Effect::Prefetch {
                generation: self.generation,
                item: item.clone(),
            }],
            None => Vec::new(),
        }
    }

    // ===== Async completions =====

    /// Result of an [`Effect::Load`]
    ///
    /// Creates the engine instance, starts it at the desired rate and asks
    /// for the neighbours to be preloaded.
    pub fn complete_load(
        &mut self,
        generation: u64,
        item: &MediaItem,
        result: Result<()>,
    ) -> Vec<Effect> {
        if generation != self.generation
            || !self.queue.current().is_some_and(|c| c.same_entry(item))
        {
            debug!(
                "Discarding superseded load of {} (generation {})",
                item.locator(),
                generation
            );
            return Vec::new();
        }

        if let Err(e) = result {
            warn!("Failed to load {}: {}", item.locator(), e);
            self.set_status(PlayerStatus::Failed(e));
            self.settle();
            return Vec::new();
        }

        self.next_instance_id += 1;
        let id = InstanceId(self.next_instance_id);
        let options = InstanceOptions {
            automatically_waits_to_minimize_stalling: self
                .config
                .automatically_waits_to_minimize_stalling,
        };
        let sink = EngineEventSink::new(id, self.engine_events.clone());

        let mut handle = match self.engine.create_instance(item, options, sink) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Engine refused {}: {}", item.locator(), e);
                self.set_status(PlayerStatus::Failed(e));
                self.settle();
                return Vec::new();
            }
        };
        handle.play(self.desired_rate);
        info!("Playing {} on {}", item.locator(), id);

        self.buffered = None;
        self.instance = Some(LoadedInstance {
            id,
            item: item.clone(),
            handle,
            elapsed: Duration::ZERO,
            ended: false,
        });
        self.settle();

        let index = self.queue.index();
        let neighbours: Vec<MediaItem> = [index.checked_sub(1), Some(index + 1)]
            .into_iter()
            .flatten()
            .filter_map(|i| self.queue.get(i).cloned())
            .collect();

        if neighbours.is_empty() {
            Vec::new()
        } else {
            vec![Effect::Preload(neighbours)]
        }
    }

    /// Result of an [`Effect::Prefetch`]
    pub fn complete_prefetch(&mut self, generation: u64, item: &MediaItem, result: Result<()>) {
        if generation != self.generation {
            debug!("Discarding superseded prefetch of {}", item.locator());
            return;
        }
        match result {
            Ok(()) => self.set_status(PlayerStatus::ReadyToPlay),
            Err(e) => self.set_status(PlayerStatus::Failed(e)),
        }
        self.settle();
    }

    // ===== Engine and OS signals =====

    /// React to an engine notification
    ///
    /// Events from an instance that has since been replaced are ignored.
    pub fn handle_engine_event(&mut self, envelope: EngineEnvelope) -> Vec<Effect> {
        let is_current = self
            .instance
            .as_ref()
            .is_some_and(|instance| instance.id == envelope.instance);
        if !is_current {
            debug!("Ignoring {:?} from stale {}", envelope.event, envelope.instance);
            return Vec::new();
        }

        let mut effects = Vec::new();
        match envelope.event {
            EngineEvent::InstanceStatus(InstanceStatus::Failed(reason)) => {
                error!("Engine failure on {}: {}", envelope.instance, reason);
                self.set_status(PlayerStatus::Critical(PlaybackError::EngineFatal(reason)));
                effects.push(self.issue(Command::Stop));
            }
            EngineEvent::InstanceStatus(_) => {}
            EngineEvent::ItemStatus(ItemStatus::ReadyToPlay) => {
                if self.status != PlayerStatus::Paused {
                    self.set_status(PlayerStatus::Playing);
                }
            }
            EngineEvent::ItemStatus(ItemStatus::Failed(reason)) => {
                self.set_status(PlayerStatus::Failed(PlaybackError::ItemLoadFailed(reason)));
            }
            EngineEvent::ItemStatus(ItemStatus::Unknown | ItemStatus::Loading) => {
                self.set_status(PlayerStatus::Loading);
            }
            EngineEvent::Time(time) => {
                if let Some(instance) = self.instance.as_mut() {
                    instance.elapsed = time;
                }
                if self.pending_rewind == Some(self.generation)
                    && time <= capability::PREVIOUS_RESTART_THRESHOLD
                {
                    self.pending_rewind = None;
                    self.force_refresh = true;
                }
            }
            EngineEvent::BufferedRange(end) => {
                self.buffered = Some(end);
            }
            EngineEvent::EndOfTrack => {
                effects.push(self.end_of_track());
            }
            EngineEvent::Stalled => {
                self.recover_from_stall();
            }
            EngineEvent::ErrorLog(log) => {
                self.set_status(PlayerStatus::Failed(PlaybackError::ItemPlaybackError(log)));
            }
            EngineEvent::FailedToPlayToEnd { reason, details } => {
                let error = match reason {
                    Some(reason) => PlaybackError::FailedToPlayToEnd(reason),
                    None => PlaybackError::EndOfTrackSignalMalformed(details),
                };
                self.set_status(PlayerStatus::Failed(error));
            }
        }

        self.settle();
        effects
    }

    fn end_of_track(&mut self) -> Effect {
        if let Some(instance) = self.instance.as_mut() {
            instance.ended = true;
        }

        let last = self.queue.len().saturating_sub(1);
        let command = match self.repeat {
            RepeatMode::None => Command::Next,
            RepeatMode::One => Command::seek_to_secs(0, true),
            RepeatMode::All if self.queue.index() == last => {
                if let Some(instance) = self.instance.as_mut() {
                    instance.handle.pause();
                }
                self.set_status(PlayerStatus::Paused);
                self.set_index(0);
                Command::PlayAt { index: 0 }
            }
            RepeatMode::All => Command::Next,
        };

        if capability::can_send(&self.view(), &command) {
            debug!("End of track, continuing with {:?}", command);
            self.issue(command)
        } else {
            debug!("End of track, {:?} not possible, stopping", command);
            self.issue(Command::Stop)
        }
    }

    fn recover_from_stall(&mut self) {
        if self.status != PlayerStatus::Playing {
            return;
        }
        let rate = self.desired_rate;
        let Some(instance) = self.instance.as_mut() else {
            return;
        };
        warn!("Playback stalled on {}, restarting", instance.id);
        instance.handle.pause();
        instance.handle.play(rate);

        if instance.handle.rate() == 0.0 {
            self.set_status(PlayerStatus::Failed(PlaybackError::PlaybackStalled));
        } else {
            self.pending_events.push(PlaybackEvent::PlaybackRecovered);
        }
    }

    /// React to an audio-session notification
    pub fn handle_session_event(&mut self, event: SessionEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            SessionEvent::InterruptionBegan
            | SessionEvent::RouteChanged(RouteChangeReason::OldDeviceUnavailable) => {
                debug!("{:?}, pausing", event);
                // Supersedes any in-flight load so it cannot start the engine
                self.generation += 1;
                self.pending_rewind = None;
                self.pause();
            }
            SessionEvent::InterruptionEnded { should_resume: true } => {
                if capability::can_play(&self.view()) {
                    effects.push(self.issue(Command::Play));
                }
            }
            SessionEvent::InterruptionEnded { .. } | SessionEvent::RouteChanged(_) => {}
        }
        self.settle();
        effects
    }

    /// Run the command behind a remote button press
    pub fn handle_remote_event(&mut self, event: RemoteEvent) -> Result<Vec<Effect>> {
        match command_for(event, &self.status, self.remote_control) {
            Some(command) => self.execute(command, CommandOrigin::Remote),
            None => {
                debug!("Ignoring {:?} in {:?}", event, self.remote_control);
                Ok(Vec::new())
            }
        }
    }

    // ===== Queue mutation =====

    /// Replace the queue, stop playback and rewind to the head
    pub fn new_songs(&mut self, items: Vec<MediaItem>) {
        self.generation += 1;
        self.pending_rewind = None;
        self.teardown_instance();

        let old_index = self.queue.index();
        self.queue.replace(items);
        self.pending_events.push(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
        });
        if old_index != 0 {
            self.pending_events
                .push(PlaybackEvent::IndexChanged { index: 0 });
        }
        self.set_status(PlayerStatus::Ready);
        self.settle();
    }

    pub fn append(&mut self, items: Vec<MediaItem>) {
        if items.is_empty() {
            return;
        }
        self.queue.append(items);
        self.queue_changed();
    }

    pub fn insert(&mut self, item: MediaItem, at: usize) -> Result<()> {
        let old_index = self.queue.index();
        self.queue.insert(item, at)?;
        self.index_may_have_moved(old_index);
        self.queue_changed();
        Ok(())
    }

    pub fn remove(&mut self, at: usize) -> Result<MediaItem> {
        let old_index = self.queue.index();
        let removed = self.queue.remove(at)?;
        self.index_may_have_moved(old_index);
        self.queue_changed();
        Ok(removed)
    }

    /// Queue `items` right after the current item (or append to an empty queue)
    pub fn front_queue(&mut self, items: Vec<MediaItem>) -> Result<()> {
        if self.queue.is_empty() {
            self.append(items);
            return Ok(());
        }
        let old_index = self.queue.index();
        let at = old_index + 1;
        for (offset, item) in items.into_iter().enumerate() {
            self.queue.insert(item, at + offset)?;
        }
        self.index_may_have_moved(old_index);
        self.queue_changed();
        Ok(())
    }

    /// Remove every queued occurrence of `locator` except the playing one
    ///
    /// Returns how many entries were removed.
    pub fn remove_item(&mut self, locator: &str) -> usize {
        let old_index = self.queue.index();
        let positions: Vec<usize> = self
            .queue
            .items()
            .iter()
            .enumerate()
            .filter(|(i, item)| item.locator() == locator && *i != old_index)
            .map(|(i, _)| i)
            .collect();

        let mut removed = 0;
        // Back to front so earlier positions stay valid
        for at in positions.into_iter().rev() {
            if self.queue.remove(at).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.index_may_have_moved(old_index);
            self.queue_changed();
        }
        removed
    }

    // ===== Modes and rate =====

    pub fn set_shuffle(&mut self, mode: ShuffleMode) {
        let old_index = self.queue.index();
        if self.queue.set_shuffle(mode) {
            self.pending_events
                .push(PlaybackEvent::ShuffleChanged { mode });
            self.index_may_have_moved(old_index);
            self.queue_changed();
        }
    }

    pub fn toggle_shuffle(&mut self) {
        let mode = match self.queue.shuffle() {
            ShuffleMode::Off => ShuffleMode::Songs,
            ShuffleMode::Songs => ShuffleMode::Off,
        };
        self.set_shuffle(mode);
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        if self.repeat != mode {
            self.repeat = mode;
            self.pending_events.push(PlaybackEvent::RepeatChanged { mode });
            self.settle();
        }
    }

    /// none → all → one → none
    pub fn cycle_repeat(&mut self) {
        let mode = match self.repeat {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        };
        self.set_repeat(mode);
    }

    pub fn set_remote_control(&mut self, mode: RemoteControlMode) {
        if self.remote_control != mode {
            self.remote_control = mode;
            self.pending_events
                .push(PlaybackEvent::RemoteControlChanged { mode });
            self.settle();
        }
    }

    /// Switch between track buttons and skip buttons of `interval` seconds
    pub fn toggle_remote_control(&mut self, interval: u32) {
        let mode = match self.remote_control {
            RemoteControlMode::MoveTrack => RemoteControlMode::SkipBySeconds(interval),
            RemoteControlMode::SkipBySeconds(_) => RemoteControlMode::MoveTrack,
        };
        self.set_remote_control(mode);
    }

    /// Change the desired rate; applied right away while the engine is moving
    pub fn set_desired_rate(&mut self, rate: f32) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PlaybackError::InvalidRate(rate));
        }
        if self.desired_rate == rate {
            return Ok(());
        }
        self.desired_rate = rate;
        if let Some(instance) = self.instance.as_mut() {
            if instance.handle.rate() != 0.0 {
                instance.handle.set_rate(rate);
            }
        }
        self.pending_events.push(PlaybackEvent::RateChanged { rate });
        self.settle();
        Ok(())
    }

    // ===== Transport helpers =====

    /// Play when allowed, pause otherwise
    pub fn play_pause(&mut self, origin: CommandOrigin) -> Result<Vec<Effect>> {
        if capability::can_play(&self.view()) {
            self.execute(Command::Play, origin)
        } else {
            self.execute(Command::Pause, origin)
        }
    }

    /// Next item, wrapping at the end of the queue according to the repeat mode
    pub fn play_next_wrapping(&mut self, origin: CommandOrigin) -> Result<Vec<Effect>> {
        if self.queue.index() + 1 >= self.queue.len() {
            let command = match self.repeat {
                RepeatMode::None => Command::Restart,
                RepeatMode::One => Command::seek_to_secs(0, false),
                RepeatMode::All => Command::PlayAt { index: 0 },
            };
            return self.execute(command, origin);
        }
        self.execute(Command::Next, origin)
    }

    // ===== Accessors =====

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn index(&self) -> usize {
        self.queue.index()
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn current_item(&self) -> Option<&MediaItem> {
        self.queue.current()
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn shuffle(&self) -> ShuffleMode {
        self.queue.shuffle()
    }

    pub fn remote_control(&self) -> RemoteControlMode {
        self.remote_control
    }

    pub fn desired_rate(&self) -> f32 {
        self.desired_rate
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn now_playing(&self) -> Option<&NowPlayingInfo> {
        self.now_playing.as_ref()
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Position of the current item, when its instance is loaded
    pub fn current_elapsed(&self) -> Option<Duration> {
        let instance = self.instance.as_ref()?;
        let current = self.queue.current()?;
        instance.item.same_entry(current).then_some(instance.elapsed)
    }

    /// Buffered share of the current item
    pub fn buffered_progress(&self) -> Option<f32> {
        let duration = self.queue.current().and_then(|item| item.duration());
        now_playing::buffered_progress(duration, self.buffered)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            status: self.status.clone(),
            index: self.queue.index(),
            queue: self.queue.items().to_vec(),
            shuffle: self.queue.shuffle(),
            repeat: self.repeat,
            remote_control: self.remote_control,
            desired_rate: self.desired_rate,
            capabilities: self.capabilities,
            now_playing: self.now_playing.clone(),
            elapsed: self.current_elapsed(),
            buffered_progress: self.buffered_progress(),
        }
    }

    /// Take the events emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Recompute derived state after an external change (metadata arrived)
    pub fn refresh(&mut self) {
        self.settle();
    }

    /// Request a now-playing republish on the next settle
    pub fn force_now_playing_refresh(&mut self) {
        self.force_refresh = true;
        self.settle();
    }

    /// Stop and release the engine instance
    pub fn shutdown(&mut self) {
        self.generation += 1;
        self.teardown_instance();
    }

    // ===== Internals =====

    fn view(&self) -> PlayerView<'_> {
        PlayerView {
            status: &self.status,
            queue_len: self.queue.len(),
            index: self.queue.index(),
            has_instance: self.instance.is_some(),
            elapsed: self.current_elapsed(),
            duration: self.queue.current().and_then(|item| item.duration()),
        }
    }

    fn skip_interval(&self) -> u32 {
        match self.remote_control {
            RemoteControlMode::SkipBySeconds(n) => n,
            RemoteControlMode::MoveTrack => DEFAULT_SKIP_INTERVAL,
        }
    }

    fn evaluate_capabilities(&self) -> Capabilities {
        Capabilities::evaluate(&self.view(), self.skip_interval())
    }

    fn compose_now_playing(&self) -> Option<NowPlayingInfo> {
        let item = self.queue.current()?;
        Some(NowPlayingInfo::compose(
            item,
            &self.status,
            self.current_elapsed(),
            self.queue.len(),
            self.queue.index(),
            self.desired_rate,
        ))
    }

    /// Recompute capabilities and now-playing, emitting what changed
    fn settle(&mut self) {
        let capabilities = self.evaluate_capabilities();
        if capabilities != self.capabilities {
            self.capabilities = capabilities;
            self.pending_events
                .push(PlaybackEvent::CapabilitiesChanged { capabilities });
        }

        let info = self.compose_now_playing();
        if self.force_refresh || info != self.now_playing {
            self.force_refresh = false;
            self.now_playing.clone_from(&info);
            self.pending_events
                .push(PlaybackEvent::NowPlayingChanged { info });
        }
    }

    fn set_status(&mut self, status: PlayerStatus) {
        if self.status != status {
            debug!("Status {:?} -> {:?}", self.status, status);
            self.status = status.clone();
            self.pending_events
                .push(PlaybackEvent::StatusChanged { status });
        }
    }

    fn set_index(&mut self, index: usize) {
        let old_index = self.queue.index();
        if self.queue.set_index(index).is_ok() {
            self.index_may_have_moved(old_index);
        }
    }

    fn index_may_have_moved(&mut self, old_index: usize) {
        let index = self.queue.index();
        if index != old_index {
            self.pending_events.push(PlaybackEvent::IndexChanged { index });
        }
    }

    fn queue_changed(&mut self) {
        self.pending_events.push(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
        });
        self.settle();
    }

    fn teardown_instance(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            debug!("Releasing {}", instance.id);
            instance.handle.pause();
        }
        self.buffered = None;
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("status", &self.status)
            .field("index", &self.queue.index())
            .field("queue_len", &self.queue.len())
            .field("repeat", &self.repeat)
            .field("shuffle", &self.queue.shuffle())
            .field("remote_control", &self.remote_control)
            .field("desired_rate", &self.desired_rate)
            .field("generation", &self.generation)
            .field("instance", &self.instance.as_ref().map(|i| i.id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemMetadata;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InstanceLog {
        calls: Vec<String>,
        rate: f32,
    }

    struct LoggedInstance(Arc<Mutex<InstanceLog>>);

    impl EngineInstance for LoggedInstance {
        fn play(&mut self, rate: f32) {
            let mut log = self.0.lock().unwrap();
            log.calls.push(format!("play {rate}"));
            log.rate = rate;
        }
        fn pause(&mut self) {
            let mut log = self.0.lock().unwrap();
            log.calls.push("pause".into());
            log.rate = 0.0;
        }
        fn seek(&mut self, position: Duration) {
            self.0
                .lock()
                .unwrap()
                .calls
                .push(format!("seek {}", position.as_secs()));
        }
        fn set_rate(&mut self, rate: f32) {
            let mut log = self.0.lock().unwrap();
            log.calls.push(format!("rate {rate}"));
            log.rate = rate;
        }
        fn rate(&self) -> f32 {
            self.0.lock().unwrap().rate
        }
        fn current_time(&self) -> Option<Duration> {
            None
        }
    }

    #[derive(Default)]
    struct LoggedEngine {
        log: Arc<Mutex<InstanceLog>>,
    }

    #[async_trait]
    impl MediaEngine for LoggedEngine {
        async fn load(&self, _item: &MediaItem) -> Result<()> {
            Ok(())
        }

        fn create_instance(
            &self,
            _item: &MediaItem,
            _options: InstanceOptions,
            _events: EngineEventSink,
        ) -> Result<Box<dyn EngineInstance>> {
            Ok(Box::new(LoggedInstance(self.log.clone())))
        }
    }

    fn song(name: &str, secs: u64) -> MediaItem {
        MediaItem::new(
            format!("/music/{name}.mp3"),
            ItemMetadata {
                title: Some(name.to_string()),
                duration: Some(Duration::from_secs(secs)),
                ..ItemMetadata::default()
            },
        )
    }

    fn controller() -> (PlaybackController, Arc<Mutex<InstanceLog>>) {
        let engine = LoggedEngine::default();
        let log = engine.log.clone();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut controller =
            PlaybackController::new(PlayerConfig::default(), Arc::new(engine), tx).unwrap();
        controller.new_songs(vec![song("a", 30), song("b", 30), song("c", 30)]);
        controller.drain_events();
        (controller, log)
    }

    fn start(controller: &mut PlaybackController, command: Command) {
        let effects = controller.execute(command, CommandOrigin::User).unwrap();
        let Some(Effect::Load {
            generation, item, ..
        }) = effects.into_iter().next()
        else {
            panic!("expected a load");
        };
        controller.complete_load(generation, &item, Ok(()));
        let id = InstanceId(controller.next_instance_id);
        controller.handle_engine_event(EngineEnvelope {
            instance: id,
            event: EngineEvent::ItemStatus(ItemStatus::ReadyToPlay),
        });
    }

    #[test]
    fn play_loads_then_engine_drives_status() {
        let (mut controller, log) = controller();
        let effects = controller.execute(Command::Play, CommandOrigin::User).unwrap();
        assert_eq!(controller.status(), &PlayerStatus::Loading);
        assert!(matches!(effects.as_slice(), [Effect::Load { index: 0, .. }]));

        let Effect::Load {
            generation, item, ..
        } = &effects[0]
        else {
            unreachable!()
        };
        let effects = controller.complete_load(*generation, item, Ok(()));
        // Only the following neighbour exists
        assert_eq!(effects, vec![Effect::Preload(vec![song("b", 30)])]);
        assert_eq!(log.lock().unwrap().calls, vec!["play 1"]);
        assert_eq!(controller.status(), &PlayerStatus::Loading);

        controller.handle_engine_event(EngineEnvelope {
            instance: InstanceId(1),
            event: EngineEvent::ItemStatus(ItemStatus::ReadyToPlay),
        });
        assert_eq!(controller.status(), &PlayerStatus::Playing);
    }

    #[test]
    fn pause_in_ready_is_rejected() {
        let (mut controller, _) = controller();
        let generation = controller.generation();
        let result = controller.execute(Command::Pause, CommandOrigin::User);
        assert_eq!(result, Err(PlaybackError::InvalidCommand(Command::Pause)));
        assert_eq!(controller.status(), &PlayerStatus::Ready);
        assert_eq!(controller.generation(), generation);
        assert!(matches!(
            controller.drain_events().as_slice(),
            [PlaybackEvent::CommandRejected { .. }]
        ));
    }

    #[test]
    fn resume_reuses_instance() {
        let (mut controller, log) = controller();
        start(&mut controller, Command::Play);
        controller.execute(Command::Pause, CommandOrigin::User).unwrap();
        assert_eq!(controller.status(), &PlayerStatus::Paused);

        let effects = controller.execute(Command::Play, CommandOrigin::User).unwrap();
        assert!(effects.is_empty());
        assert_eq!(controller.status(), &PlayerStatus::Playing);
        assert_eq!(log.lock().unwrap().calls, vec!["play 1", "pause", "play 1"]);
    }

    #[test]
    fn superseded_load_is_discarded() {
        let (mut controller, _) = controller();
        let first = controller.execute(Command::Play, CommandOrigin::User).unwrap();
        let second = controller
            .execute(Command::PlayAt { index: 2 }, CommandOrigin::User)
            .unwrap_err();
        // Loading blocks playAt; pause then jump instead
        assert_eq!(
            second,
            PlaybackError::InvalidCommand(Command::PlayAt { index: 2 })
        );
        controller.execute(Command::Pause, CommandOrigin::User).unwrap();

        let Effect::Load {
            generation, item, ..
        } = &first[0]
        else {
            unreachable!()
        };
        let effects = controller.complete_load(*generation, item, Ok(()));
        assert!(effects.is_empty());
        assert!(!controller.has_instance());
        assert_eq!(controller.status(), &PlayerStatus::Paused);
    }

    #[test]
    fn failed_load_sets_failed() {
        let (mut controller, _) = controller();
        let effects = controller.execute(Command::Play, CommandOrigin::User).unwrap();
        let Effect::Load {
            generation, item, ..
        } = &effects[0]
        else {
            unreachable!()
        };
        controller.complete_load(
            *generation,
            item,
            Err(PlaybackError::ItemLoadFailed("404".into())),
        );
        assert_eq!(
            controller.status(),
            &PlayerStatus::Failed(PlaybackError::ItemLoadFailed("404".into()))
        );
        // A failed item can be retried
        assert!(controller.capabilities().play);
    }

    #[test]
    fn desired_rate_applies_only_while_moving() {
        let (mut controller, log) = controller();
        start(&mut controller, Command::Play);
        controller.set_desired_rate(1.5).unwrap();
        assert_eq!(log.lock().unwrap().rate, 1.5);

        controller.execute(Command::Pause, CommandOrigin::User).unwrap();
        controller.set_desired_rate(2.0).unwrap();
        assert_eq!(log.lock().unwrap().rate, 0.0);
        assert_eq!(controller.now_playing().unwrap().rate, 0.0);

        assert_eq!(
            controller.set_desired_rate(-1.0),
            Err(PlaybackError::InvalidRate(-1.0))
        );
    }

    #[test]
    fn restart_rewinds_to_head() {
        let (mut controller, log) = controller();
        start(&mut controller, Command::PlayAt { index: 2 });
        controller.execute(Command::Restart, CommandOrigin::User).unwrap();
        assert_eq!(controller.status(), &PlayerStatus::Paused);
        assert_eq!(controller.index(), 0);
        assert!(log.lock().unwrap().calls.ends_with(&["pause".to_string(), "seek 0".to_string()]));
    }

    #[test]
    fn cycle_repeat_order() {
        let (mut controller, _) = controller();
        controller.cycle_repeat();
        assert_eq!(controller.repeat(), RepeatMode::All);
        controller.cycle_repeat();
        assert_eq!(controller.repeat(), RepeatMode::One);
        controller.cycle_repeat();
        assert_eq!(controller.repeat(), RepeatMode::None);
    }

    #[test]
    fn front_queue_inserts_after_current() {
        let (mut controller, _) = controller();
        start(&mut controller, Command::PlayAt { index: 1 });
        controller
            .front_queue(vec![song("x", 10), song("y", 10)])
            .unwrap();
        let names: Vec<String> = controller
            .queue()
            .items()
            .iter()
            .map(|i| i.title_or_default())
            .collect();
        assert_eq!(names, vec!["a", "b", "x", "y", "c"]);
        assert_eq!(controller.index(), 1);
    }

    #[test]
    fn remove_item_skips_playing_entry() {
        let (mut controller, _) = controller();
        controller.append(vec![song("a", 30)]);
        start(&mut controller, Command::Play);

        let removed = controller.remove_item("/music/a.mp3");
        assert_eq!(removed, 1);
        assert_eq!(controller.queue().len(), 3);
        assert_eq!(controller.index(), 0);
        assert_eq!(controller.current_item().unwrap().locator(), "/music/a.mp3");
    }

    #[test]
    fn play_next_wrapping_at_end() {
        let (mut controller, _) = controller();
        start(&mut controller, Command::PlayAt { index: 2 });

        controller.set_repeat(RepeatMode::All);
        let effects = controller
            .play_next_wrapping(CommandOrigin::User)
            .unwrap();
        assert!(matches!(effects.as_slice(), [Effect::Load { index: 0, .. }]));
    }

    #[test]
    fn toggle_remote_control_swaps_modes() {
        let (mut controller, _) = controller();
        controller.toggle_remote_control(15);
        assert_eq!(
            controller.remote_control(),
            RemoteControlMode::SkipBySeconds(15)
        );
        assert_eq!(controller.capabilities().skip_interval, 15);
        controller.toggle_remote_control(15);
        assert_eq!(controller.remote_control(), RemoteControlMode::MoveTrack);
    }
}
