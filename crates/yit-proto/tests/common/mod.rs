#![allow(dead_code)]

use std::path::Path;

use yit_proto::store::{JsonFileStore, Library, Track};

/// A library whose three documents live under `dir`.
pub fn file_library(dir: &Path) -> Library<JsonFileStore> {
    Library {
        results: JsonFileStore::new(dir.join("results.json")),
        history: JsonFileStore::new(dir.join("history.json")),
        favorites: JsonFileStore::new(dir.join("favorites.json")),
    }
}

pub fn track(title: &str, url: &str) -> Track {
    Track::new(title, url)
}
