//! Song catalog and playlist membership
//!
//! Playlists are stored by membership, not by order: `playlists.json` maps
//! each locator to the playlists containing it. Loading rebuilds member
//! lists in `songs.json` order.

use crate::error::{LibraryError, Result};
use aria_playback::{MediaItem, UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_SONG};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

pub const SONGS_FILE: &str = "songs.json";
pub const PLAYLISTS_FILE: &str = "playlists.json";
pub const PLAYLIST_SUFFIX: &str = ".playlist";

/// Key in `playlists.json` listing playlists without members
const EMPTY_PLAYLISTS_KEY: &str = "";

/// Display strings of a known song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub locator: String,
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl SongRecord {
    pub fn new(
        locator: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
        }
    }

    /// Record with placeholder display strings
    pub fn unknown(locator: &str) -> Self {
        Self::new(locator, UNKNOWN_SONG, UNKNOWN_ARTIST, UNKNOWN_ALBUM)
    }

    /// Record from whatever metadata `item` has loaded so far
    pub fn from_item(item: &MediaItem) -> Self {
        Self::new(
            item.locator(),
            item.title_or_default(),
            item.artist_or_default(),
            item.album_or_default(),
        )
    }

    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.artist, &self.album, &self.title)
    }
}

/// Narrow [`Catalog::songs`]; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct SongFilter {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub playlist: Option<String>,
}

impl SongFilter {
    fn matches(&self, song: &SongRecord) -> bool {
        self.artist.as_ref().map_or(true, |a| *a == song.artist)
            && self.album.as_ref().map_or(true, |a| *a == song.album)
    }
}

/// One level of the playlist hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Child folders, each ending in `/`
    pub folders: Vec<String>,
    /// Playlists directly at this level, without the `.playlist` suffix
    pub playlists: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    songs: BTreeMap<String, SongRecord>,
    /// Playlist id → member locators
    playlists: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog in `dir` with placeholder song metadata
    ///
    /// Missing files are treated as empty.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(dir, SongRecord::unknown)
    }

    /// Load the catalog in `dir`, building each song record with `resolve`
    pub fn load_with(
        dir: impl AsRef<Path>,
        mut resolve: impl FnMut(&str) -> SongRecord,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let memberships: BTreeMap<String, Vec<String>> =
            read_json(&dir.join(PLAYLISTS_FILE))?.unwrap_or_default();
        let locators: Vec<String> = read_json(&dir.join(SONGS_FILE))?.unwrap_or_default();

        let mut catalog = Self::new();
        if let Some(empty) = memberships.get(EMPTY_PLAYLISTS_KEY) {
            for name in empty {
                catalog.playlists.entry(name.clone()).or_default();
            }
        }

        for locator in locators {
            if let Some(names) = memberships.get(&locator) {
                for name in names {
                    let members = catalog.playlists.entry(name.clone()).or_default();
                    if !members.contains(&locator) {
                        members.push(locator.clone());
                    }
                }
            }
            let record = resolve(&locator);
            catalog.songs.insert(locator, record);
        }

        info!(
            "Loaded catalog from {}: {} songs, {} playlists",
            dir.display(),
            catalog.songs.len(),
            catalog.playlists.len()
        );
        Ok(catalog)
    }

    /// Write both catalog files into `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let locators: Vec<&String> = self.songs.keys().collect();
        fs::write(dir.join(SONGS_FILE), serde_json::to_vec_pretty(&locators)?)?;
        fs::write(
            dir.join(PLAYLISTS_FILE),
            serde_json::to_vec_pretty(&self.memberships())?,
        )?;

        debug!("Saved catalog to {}", dir.display());
        Ok(())
    }

    /// Locator → playlist ids, with empty playlists under the `""` key
    fn memberships(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut out: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, members) in &self.playlists {
            if members.is_empty() {
                out.entry(EMPTY_PLAYLISTS_KEY).or_default().push(name);
            }
            for locator in members {
                out.entry(locator).or_default().push(name);
            }
        }
        out
    }

    // ===== Songs =====

    /// Add or replace a song, returning the previous record
    pub fn add_song(&mut self, record: SongRecord) -> Option<SongRecord> {
        self.songs.insert(record.locator.clone(), record)
    }

    /// Forget a song and drop it from every playlist
    pub fn delete_song(&mut self, locator: &str) -> Result<SongRecord> {
        let record = self
            .songs
            .remove(locator)
            .ok_or_else(|| LibraryError::SongNotFound(locator.to_string()))?;
        for members in self.playlists.values_mut() {
            members.retain(|m| m != locator);
        }
        Ok(record)
    }

    pub fn song(&self, locator: &str) -> Option<&SongRecord> {
        self.songs.get(locator)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Songs matching `filter`, sorted by artist, album, then title
    pub fn songs(&self, filter: &SongFilter) -> Vec<&SongRecord> {
        let mut songs: Vec<&SongRecord> = match &filter.playlist {
            Some(id) => self
                .playlists
                .get(id)
                .map(|members| members.iter().filter_map(|m| self.songs.get(m)).collect())
                .unwrap_or_default(),
            None => self.songs.values().collect(),
        };
        songs.retain(|song| filter.matches(song));
        songs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        songs
    }

    // ===== Playlists =====

    /// Create an empty playlist named `name` (may contain `/` folders)
    ///
    /// Returns the generated id: the name, a unique suffix and `.playlist`.
    pub fn create_playlist(&mut self, name: &str) -> String {
        let id = format!("{name}{}{PLAYLIST_SUFFIX}", Uuid::new_v4());
        self.playlists.insert(id.clone(), Vec::new());
        id
    }

    /// Create an empty folder entry, returning its id
    pub fn create_folder(&mut self, name: &str) -> String {
        let id = format!("{name}{}", Uuid::new_v4());
        self.playlists.insert(id.clone(), Vec::new());
        id
    }

    /// Remove a playlist, returning its members
    pub fn delete_playlist(&mut self, id: &str) -> Result<Vec<String>> {
        self.playlists
            .remove(id)
            .ok_or_else(|| LibraryError::PlaylistNotFound(id.to_string()))
    }

    /// Move a playlist's members to a fresh id derived from `new_name`
    pub fn rename_playlist(&mut self, id: &str, new_name: &str) -> Result<String> {
        let members = self.delete_playlist(id)?;
        let new_id = format!("{new_name}{}{PLAYLIST_SUFFIX}", Uuid::new_v4());
        self.playlists.insert(new_id.clone(), members);
        Ok(new_id)
    }

    pub fn playlist(&self, id: &str) -> Option<&[String]> {
        self.playlists.get(id).map(Vec::as_slice)
    }

    pub fn playlist_ids(&self) -> impl Iterator<Item = &str> {
        self.playlists.keys().map(String::as_str)
    }

    /// Add a known song to a playlist; `false` if it was already a member
    pub fn add_to_playlist(&mut self, id: &str, locator: &str) -> Result<bool> {
        if !self.songs.contains_key(locator) {
            return Err(LibraryError::SongNotFound(locator.to_string()));
        }
        let members = self
            .playlists
            .get_mut(id)
            .ok_or_else(|| LibraryError::PlaylistNotFound(id.to_string()))?;
        if members.iter().any(|m| m == locator) {
            return Ok(false);
        }
        members.push(locator.to_string());
        Ok(true)
    }

    /// Remove a song from a playlist; `false` if it was not a member
    pub fn remove_from_playlist(&mut self, id: &str, locator: &str) -> Result<bool> {
        let members = self
            .playlists
            .get_mut(id)
            .ok_or_else(|| LibraryError::PlaylistNotFound(id.to_string()))?;
        match members.iter().position(|m| m == locator) {
            Some(at) => {
                members.remove(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Folders and playlists directly under `path`
    ///
    /// `path` is empty for the root, otherwise a folder prefix ending in `/`.
    pub fn list(&self, path: &str) -> Listing {
        let mut listing = Listing::default();
        for id in self.playlists.keys() {
            let Some(remainder) = id.strip_prefix(path) else {
                continue;
            };
            if remainder.is_empty() {
                continue;
            }
            match remainder.strip_suffix(PLAYLIST_SUFFIX) {
                Some(name) if !remainder.contains('/') => {
                    listing.playlists.push(name.to_string());
                }
                _ => {
                    let end = remainder.find('/').unwrap_or(remainder.len());
                    let folder = format!("{}/", &remainder[..end]);
                    if !listing.folders.contains(&folder) {
                        listing.folders.push(folder);
                    }
                }
            }
        }
        listing
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
