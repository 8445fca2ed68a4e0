//! Media items and their lazily loaded metadata
//!
//! A [`MediaItem`] is a cheap, cloneable handle to a playable asset. Its
//! metadata starts out empty and is filled in by a [`MetadataLoader`] in
//! the background; observers can [`subscribe`](MediaItem::subscribe) to be
//! told when it arrives.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Display fallback for a missing title
pub const UNKNOWN_SONG: &str = "Unknown Song";

/// Display fallback for a missing artist
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Display fallback for a missing album
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Embedded cover art
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    /// Encoded image bytes
    pub data: Arc<[u8]>,
    /// MIME type, when the container declares one
    pub mime_type: Option<String>,
}

/// Metadata attached to a media item
///
/// Every field is optional: absent until a loader provides it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMetadata {
    pub duration: Option<Duration>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub lyrics: Option<String>,
    pub artwork: Option<Artwork>,
}

impl ItemMetadata {
    /// Overlay every field present in `loaded` onto `self`
    pub fn merge(&mut self, loaded: ItemMetadata) {
        if loaded.duration.is_some() {
            self.duration = loaded.duration;
        }
        if loaded.title.is_some() {
            self.title = loaded.title;
        }
        if loaded.artist.is_some() {
            self.artist = loaded.artist;
        }
        if loaded.album.is_some() {
            self.album = loaded.album;
        }
        if loaded.lyrics.is_some() {
            self.lyrics = loaded.lyrics;
        }
        if loaded.artwork.is_some() {
            self.artwork = loaded.artwork;
        }
    }
}

/// Source of item metadata (tag reader, remote catalog, ...)
#[async_trait]
pub trait MetadataLoader: Send + Sync + 'static {
    /// Read metadata for the asset at `locator`
    async fn load(&self, locator: &str) -> Result<ItemMetadata>;
}

struct ItemInner {
    locator: String,
    meta: watch::Sender<ItemMetadata>,
    loaded: AtomicBool,
}

/// Reference to a playable asset
///
/// Equality and hashing use the locator only. Two clones of the same item
/// are additionally the same queue entry (see [`MediaItem::same_entry`]).
#[derive(Clone)]
pub struct MediaItem {
    inner: Arc<ItemInner>,
}

impl MediaItem {
    /// Create an item whose metadata is already known
    pub fn new(locator: impl Into<String>, metadata: ItemMetadata) -> Self {
        let (meta, _) = watch::channel(metadata);
        Self {
            inner: Arc::new(ItemInner {
                locator: locator.into(),
                meta,
                loaded: AtomicBool::new(true),
            }),
        }
    }

    /// Create an item and start loading its metadata in the background
    ///
    /// The load runs on the current tokio runtime. Without one, the item
    /// keeps empty metadata. Failures are logged and otherwise ignored.
    pub fn load(locator: impl Into<String>, loader: Arc<dyn MetadataLoader>) -> Self {
        let (meta, _) = watch::channel(ItemMetadata::default());
        let item = Self {
            inner: Arc::new(ItemInner {
                locator: locator.into(),
                meta,
                loaded: AtomicBool::new(false),
            }),
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                "No async runtime, metadata for {} will not be loaded",
                item.locator()
            );
            return item;
        };

        let weak = Arc::downgrade(&item.inner);
        let locator = item.locator().to_string();
        handle.spawn(async move {
            let result = loader.load(&locator).await;
            let Some(inner) = weak.upgrade() else {
                debug!("Item {} dropped before metadata arrived", locator);
                return;
            };
            inner.loaded.store(true, Ordering::Release);
            match result {
                Ok(loaded) => {
                    inner.meta.send_modify(|meta| meta.merge(loaded));
                }
                Err(e) => {
                    warn!("Failed to load metadata for {}: {}", locator, e);
                    // Wake subscribers so they stop waiting.
                    inner.meta.send_modify(|_| {});
                }
            }
        });

        item
    }

    /// Asset locator (file path or stream URL)
    pub fn locator(&self) -> &str {
        &self.inner.locator
    }

    /// Snapshot of the current metadata
    pub fn meta(&self) -> ItemMetadata {
        self.inner.meta.borrow().clone()
    }

    /// Watch for metadata changes
    pub fn subscribe(&self) -> watch::Receiver<ItemMetadata> {
        self.inner.meta.subscribe()
    }

    /// Whether the background load has finished (successfully or not)
    pub fn is_metadata_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    /// Replace the metadata outright
    pub fn set_meta(&self, metadata: ItemMetadata) {
        self.inner.meta.send_replace(metadata);
        self.inner.loaded.store(true, Ordering::Release);
    }

    pub fn duration(&self) -> Option<Duration> {
        self.inner.meta.borrow().duration
    }

    pub fn title(&self) -> Option<String> {
        self.inner.meta.borrow().title.clone()
    }

    pub fn lyrics(&self) -> Option<String> {
        self.inner.meta.borrow().lyrics.clone()
    }

    pub fn title_or_default(&self) -> String {
        self.title().unwrap_or_else(|| UNKNOWN_SONG.to_string())
    }

    pub fn artist_or_default(&self) -> String {
        self.inner
            .meta
            .borrow()
            .artist
            .clone()
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
    }

    pub fn album_or_default(&self) -> String {
        self.inner
            .meta
            .borrow()
            .album
            .clone()
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
    }

    /// Whether `self` and `other` are clones of the same queue entry
    pub fn same_entry(&self, other: &MediaItem) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for MediaItem {
    fn eq(&self, other: &Self) -> bool {
        self.inner.locator == other.inner.locator
    }
}

impl Eq for MediaItem {}

impl Hash for MediaItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.locator.hash(state);
    }
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("locator", &self.inner.locator)
            .field("loaded", &self.is_metadata_loaded())
            .finish()
    }
}
