/// Catalog error types
use thiserror::Error;

/// Result type alias using `LibraryError`
pub type Result<T> = std::result::Result<T, LibraryError>;

#[derive(Error, Debug)]
pub enum LibraryError {
    /// Reading or writing the catalog files failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A catalog file is not valid JSON of the expected shape
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("Song not found: {0}")]
    SongNotFound(String),
}
