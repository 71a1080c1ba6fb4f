//! Persisted track collections: search results, play history and favorites.
//!
//! Each collection is one pretty-printed JSON array of `{title, url}`.  Files
//! are read lazily and rewritten wholesale on every mutation.  There is no
//! cross-process locking: two invocations racing on the same document lose
//! one update (last writer wins on the whole file).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::platform;

/// A playable item.  Identity is the exact `url` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub url: String,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("index {index} out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load/save seam for one collection.
pub trait TrackStore {
    /// Missing or unparseable data reads as an empty collection.
    fn load(&self) -> Vec<Track>;
    fn save(&self, tracks: &[Track]) -> Result<(), StoreError>;
}

/// A collection backed by a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrackStore for JsonFileStore {
    fn load(&self) -> Vec<Track> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_str(&content) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("[store] {} unreadable, treating as empty: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn save(&self, tracks: &[Track]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(tracks)?;
        // Write beside the target and rename so readers never see half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("[store] wrote {} tracks to {}", tracks.len(), self.path.display());
        Ok(())
    }
}

/// In-process collection, used where the filesystem should not be touched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tracks: Mutex<Vec<Track>>,
}

impl MemoryStore {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: Mutex::new(tracks),
        }
    }
}

impl TrackStore for MemoryStore {
    fn load(&self) -> Vec<Track> {
        self.tracks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn save(&self, tracks: &[Track]) -> Result<(), StoreError> {
        if let Ok(mut guard) = self.tracks.lock() {
            *guard = tracks.to_vec();
        }
        Ok(())
    }
}

/// The three collections behind every command.
pub struct Library<S: TrackStore> {
    pub results: S,
    pub history: S,
    pub favorites: S,
}

impl Library<JsonFileStore> {
    /// Documents under the platform data directory.
    pub fn open_default() -> Self {
        Self {
            results: JsonFileStore::new(platform::results_file()),
            history: JsonFileStore::new(platform::history_file()),
            favorites: JsonFileStore::new(platform::favorites_file()),
        }
    }
}

impl Library<MemoryStore> {
    pub fn in_memory() -> Self {
        Self {
            results: MemoryStore::default(),
            history: MemoryStore::default(),
            favorites: MemoryStore::default(),
        }
    }
}

impl<S: TrackStore> Library<S> {
    /// Replace the results snapshot with a fresh search.
    pub fn replace_results(&self, tracks: &[Track]) -> Result<(), StoreError> {
        self.results.save(tracks)
    }

    /// Results entry at a 1-based position.
    pub fn result_at(&self, ordinal: usize) -> Option<Track> {
        nth_ordinal(self.results.load(), ordinal)
    }

    /// Append to history unless the URL is already there.  The first title
    /// recorded for a URL is kept.  Returns whether the track was added.
    pub fn save_to_history(&self, track: &Track) -> Result<bool, StoreError> {
        let mut history = self.history.load();
        if history.iter().any(|t| t.url == track.url) {
            return Ok(false);
        }
        history.push(track.clone());
        self.history.save(&history)?;
        Ok(true)
    }

    pub fn favorites(&self) -> Vec<Track> {
        self.favorites.load()
    }

    /// Favorites entry at a 1-based position.
    pub fn favorite_at(&self, ordinal: usize) -> Option<Track> {
        nth_ordinal(self.favorites.load(), ordinal)
    }

    /// Append to favorites unless the URL is already there.
    pub fn add_favorite(&self, track: &Track) -> Result<bool, StoreError> {
        let mut favs = self.favorites.load();
        if favs.iter().any(|t| t.url == track.url) {
            return Ok(false);
        }
        favs.push(track.clone());
        self.favorites.save(&favs)?;
        Ok(true)
    }

    /// Remove the favorite at a 0-based `index`; later entries shift down.
    pub fn remove_favorite(&self, index: usize) -> Result<Track, StoreError> {
        let mut favs = self.favorites.load();
        if index >= favs.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: favs.len(),
            });
        }
        let removed = favs.remove(index);
        self.favorites.save(&favs)?;
        Ok(removed)
    }
}

fn nth_ordinal(tracks: Vec<Track>, ordinal: usize) -> Option<Track> {
    let idx = ordinal.checked_sub(1)?;
    tracks.into_iter().nth(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("history.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(JsonFileStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_save_is_pretty_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("sub").join("results.json"));
        store.save(&[Track::new("Song", "https://x/1")]).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("[\n"));
        assert!(raw.contains("\"title\": \"Song\""));
        assert_eq!(store.load(), vec![Track::new("Song", "https://x/1")]);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_result_at_is_one_based() {
        let lib = Library::in_memory();
        lib.replace_results(&[Track::new("A", "a"), Track::new("B", "b")])
            .unwrap();
        assert_eq!(lib.result_at(1), Some(Track::new("A", "a")));
        assert_eq!(lib.result_at(2), Some(Track::new("B", "b")));
        assert_eq!(lib.result_at(0), None);
        assert_eq!(lib.result_at(3), None);
    }

    #[test]
    fn test_new_search_replaces_results() {
        let lib = Library::in_memory();
        lib.replace_results(&[Track::new("A", "a"), Track::new("B", "b")])
            .unwrap();
        lib.replace_results(&[Track::new("C", "c")]).unwrap();
        assert_eq!(lib.results.load(), vec![Track::new("C", "c")]);
    }

    #[test]
    fn test_remove_favorite_out_of_range() {
        let lib = Library::in_memory();
        lib.add_favorite(&Track::new("A", "a")).unwrap();
        match lib.remove_favorite(1) {
            Err(StoreError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 1);
                assert_eq!(len, 1);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
        assert_eq!(lib.favorites().len(), 1);
    }
}
