//! Aria Player - Catalog
//!
//! Known songs and the playlists they belong to, persisted as two small
//! JSON files in a catalog directory:
//! - `songs.json`: every known locator
//! - `playlists.json`: locator → names of the playlists containing it, with
//!   the `""` key listing playlists that have no members
//!
//! Playlist names form a `/`-separated hierarchy. Leaf playlists end in
//! `.playlist`; anything else with a `/` after it is a folder.
//!
//! # Example
//!
//! ```rust,no_run
//! use aria_library::{Catalog, SongFilter, SongRecord};
//!
//! # fn demo() -> aria_library::Result<()> {
//! let mut catalog = Catalog::load("/home/me/.aria")?;
//! catalog.add_song(SongRecord::new("/music/one.mp3", "One", "Artist", "Album"));
//!
//! let id = catalog.create_playlist("Favourites");
//! catalog.add_to_playlist(&id, "/music/one.mp3")?;
//!
//! for song in catalog.songs(&SongFilter::default()) {
//!     println!("{} - {}", song.artist, song.title);
//! }
//! catalog.save("/home/me/.aria")?;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod error;

pub use catalog::{Catalog, Listing, SongFilter, SongRecord, PLAYLISTS_FILE, PLAYLIST_SUFFIX, SONGS_FILE};
pub use error::{LibraryError, Result};
