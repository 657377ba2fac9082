//! On-disk cache of the last received deck.
//!
//! One file named `slides` in the data directory, holding the same bytes as a
//! deck push.

use std::io;
use std::path::{Path, PathBuf};

use deckrocket_types::{Deck, DeckError};
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the cached deck.
pub const SLIDES_FILE_NAME: &str = "slides";

/// Errors from saving the deck.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Deck could not be encoded.
    #[error("failed to encode deck: {0}")]
    Encode(#[from] DeckError),

    /// File system write failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Reads and writes the cached deck.
#[derive(Debug, Clone)]
pub struct DeckStore {
    path: PathBuf,
}

impl DeckStore {
    /// Store backed by an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `slides` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SLIDES_FILE_NAME))
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached deck.
    ///
    /// A missing, unreadable, corrupt, or empty cache all mean "no deck yet".
    pub async fn load(&self) -> Option<Deck> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cached deck");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read cached deck");
                return None;
            }
        };

        match Deck::from_bytes(&bytes) {
            Ok(deck) if deck.is_empty() => None,
            Ok(deck) => Some(deck),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cached deck is corrupt");
                None
            }
        }
    }

    /// Replace the cached deck.
    pub async fn save(&self, deck: &Deck) -> Result<(), StoreError> {
        let bytes = deck.to_bytes()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckrocket_types::Slide;
    use tempfile::TempDir;

    fn sample_deck() -> Deck {
        Deck::new(vec![
            Slide::new(vec![1, 2, 3], "intro"),
            Slide::new(vec![4, 5, 6], ""),
        ])
    }

    #[tokio::test]
    async fn missing_cache_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = DeckStore::in_dir(dir.path());

        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn saved_deck_loads_back() {
        let dir = TempDir::new().unwrap();
        let store = DeckStore::in_dir(dir.path());

        store.save(&sample_deck()).await.unwrap();

        assert_eq!(store.path(), dir.path().join("slides"));
        assert_eq!(store.load().await, Some(sample_deck()));
    }

    #[tokio::test]
    async fn save_creates_data_directory() {
        let dir = TempDir::new().unwrap();
        let store = DeckStore::in_dir(&dir.path().join("nested").join("data"));

        store.save(&sample_deck()).await.unwrap();

        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn corrupt_cache_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = DeckStore::in_dir(dir.path());
        std::fs::write(store.path(), b"definitely not a deck").unwrap();

        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn empty_cached_deck_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = DeckStore::in_dir(dir.path());
        store.save(&Deck::default()).await.unwrap();

        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn save_into_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let store = DeckStore::in_dir(&blocker);

        let result = store.save(&sample_deck()).await;
        assert!(matches!(result, Err(StoreError::Write { .. })));
    }
}
