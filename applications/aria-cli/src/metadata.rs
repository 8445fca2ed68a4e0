/// Tag reading with lofty
use aria_library::SongRecord;
use aria_playback::{Artwork, ItemMetadata, MetadataLoader, PlaybackError, Result};
use async_trait::async_trait;
use lofty::{AudioFile, ItemKey, PictureType, TaggedFileExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Loads item metadata from the tags of a local file
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyMetadataLoader;

#[async_trait]
impl MetadataLoader for LoftyMetadataLoader {
    async fn load(&self, locator: &str) -> Result<ItemMetadata> {
        let path = PathBuf::from(locator);
        tokio::task::spawn_blocking(move || read_metadata(&path))
            .await
            .map_err(|e| PlaybackError::ItemLoadFailed(e.to_string()))?
    }
}

/// Read duration, display tags, lyrics and cover art from `path`
pub fn read_metadata(path: &Path) -> Result<ItemMetadata> {
    let tagged_file = lofty::read_from_path(path)
        .map_err(|e| PlaybackError::ItemLoadFailed(format!("{}: {}", path.display(), e)))?;

    let mut metadata = ItemMetadata {
        duration: Some(tagged_file.properties().duration()),
        ..ItemMetadata::default()
    };

    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(metadata);
    };

    for item in tag.items() {
        let text = || item.value().text().map(|s| s.to_string());
        match item.key() {
            ItemKey::TrackTitle => metadata.title = text(),
            ItemKey::TrackArtist => metadata.artist = text(),
            ItemKey::AlbumTitle => metadata.album = text(),
            ItemKey::Lyrics => metadata.lyrics = text(),
            _ => {}
        }
    }

    let pictures = tag.pictures();
    metadata.artwork = pictures
        .iter()
        .find(|p| matches!(p.pic_type(), PictureType::CoverFront))
        .or_else(|| pictures.first())
        .map(|picture| Artwork {
            data: Arc::from(picture.data()),
            mime_type: picture.mime_type().map(|m| m.as_str().to_string()),
        });

    Ok(metadata)
}

/// Catalog record for `path`, with placeholders where tags are missing
pub fn song_record(path: &Path) -> Result<SongRecord> {
    let metadata = read_metadata(path)?;
    let mut record = SongRecord::unknown(&path.display().to_string());
    if let Some(title) = metadata.title {
        record.title = title;
    }
    if let Some(artist) = metadata.artist {
        record.artist = artist;
    }
    if let Some(album) = metadata.album {
        record.album = album;
    }
    Ok(record)
}

/// Rebuild a catalog record from the file at `locator`
///
/// The catalog only persists locators, so display tags are re-read on
/// load. Unreadable files keep placeholders.
pub fn resolve_song(locator: &str) -> SongRecord {
    song_record(Path::new(locator)).unwrap_or_else(|e| {
        debug!("No tags for {}: {}", locator, e);
        SongRecord::unknown(locator)
    })
}
