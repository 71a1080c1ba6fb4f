//! Display titles for player queue entries.
//!
//! The player often reports only the URL it was handed.  Titles come from the
//! results and history documents, matched first on the exact URL and then on
//! the 11-character video id so that e.g. `&list=` suffixes do not matter.

use std::collections::HashMap;

use crate::protocol::QueueEntry;
use crate::store::Track;

const VIDEO_ID_LEN: usize = 11;
const SHORT_LINK_HOST: &str = "youtu.be/";

/// Placeholder for an entry with neither title nor URL.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Extract the video id from `...?v=<id>` or `youtu.be/<id>` URLs.
pub fn video_id(url: &str) -> Option<String> {
    if let Some((_, query)) = url.split_once('?') {
        let from_param = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("v="))
            .and_then(take_id);
        if from_param.is_some() {
            return from_param;
        }
    }
    let (_, rest) = url.split_once(SHORT_LINK_HOST)?;
    take_id(rest)
}

fn take_id(s: &str) -> Option<String> {
    let id: String = s
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(VIDEO_ID_LEN)
        .collect();
    (id.len() == VIDEO_ID_LEN).then_some(id)
}

/// Title lookups keyed by URL and by video id.
#[derive(Debug, Default)]
pub struct TitleIndex {
    by_url: HashMap<String, String>,
    by_id: HashMap<String, String>,
}

impl TitleIndex {
    /// Merge results first, then history.  History wins when both know the
    /// same URL or id.
    pub fn build(results: &[Track], history: &[Track]) -> Self {
        let mut index = Self::default();
        index.merge(results);
        index.merge(history);
        index
    }

    fn merge(&mut self, tracks: &[Track]) {
        for track in tracks {
            let url = track.url.trim_matches(|c| c == '|' || c == ' ');
            self.by_url.insert(url.to_string(), track.title.clone());
            if let Some(id) = video_id(url) {
                self.by_id.insert(id, track.title.clone());
            }
        }
    }

    /// Title for an entry that carries no title of its own.
    pub fn lookup(&self, url_or_filename: &str) -> String {
        if let Some(title) = self.by_url.get(url_or_filename) {
            return title.clone();
        }
        if let Some(title) = video_id(url_or_filename).and_then(|id| self.by_id.get(&id)) {
            return title.clone();
        }
        if url_or_filename.is_empty() {
            UNKNOWN_TITLE.to_string()
        } else {
            url_or_filename.to_string()
        }
    }

    /// Display title for a queue entry; an inline title from the player wins.
    pub fn resolve(&self, entry: &QueueEntry) -> String {
        match entry.title.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => self.lookup(&entry.url_or_filename),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> QueueEntry {
        QueueEntry {
            url_or_filename: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_video_id_shapes() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id("https://www.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(video_id("https://example.com/song.mp3"), None);
        assert_eq!(video_id("https://x/watch?v=short"), None);
        assert_eq!(video_id(""), None);
    }

    #[test]
    fn test_inline_title_wins() {
        let index = TitleIndex::build(&[Track::new("Cached", "u")], &[]);
        let e = QueueEntry {
            url_or_filename: "u".into(),
            title: Some("From player".into()),
            current: true,
        };
        assert_eq!(index.resolve(&e), "From player");
    }

    #[test]
    fn test_history_shadows_results() {
        let url = "https://x/watch?v=abc12345678";
        let index = TitleIndex::build(
            &[Track::new("Result title", url)],
            &[Track::new("History title", url)],
        );
        assert_eq!(index.resolve(&entry(url)), "History title");
    }

    #[test]
    fn test_id_shadowing_follows_merge_order() {
        let index = TitleIndex::build(
            &[Track::new("Result", "https://x/watch?v=abc12345678&list=a")],
            &[Track::new("History", "https://youtu.be/abc12345678")],
        );
        assert_eq!(index.resolve(&entry("https://x/watch?v=abc12345678")), "History");
    }

    #[test]
    fn test_stray_separators_are_ignored_in_cache() {
        let index = TitleIndex::build(&[Track::new("Song", "| https://x/a |")], &[]);
        assert_eq!(index.resolve(&entry("https://x/a")), "Song");
    }

    #[test]
    fn test_unmatched_falls_back_to_url() {
        let index = TitleIndex::default();
        assert_eq!(index.resolve(&entry("/music/a.flac")), "/music/a.flac");
        assert_eq!(index.resolve(&entry("")), UNKNOWN_TITLE);
    }
}
