use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Channel that published a video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub name: String,
    pub verified: bool,
    pub id: Option<String>,
    pub url: String,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            verified: false,
            id: None,
            url: String::new(),
        }
    }
}

/// A normalized search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: String,
    pub title: String,
    /// Display duration such as "4:13"
    pub duration: String,
    /// Duration in milliseconds
    pub duration_raw: u64,
    pub snippet: String,
    pub upload_date: String,
    pub thumbnail: String,
    /// Same URL as `thumbnail`, kept for older clients
    pub thumbnail_src: String,
    pub views: u64,
    pub channel: Channel,
    pub url: String,
}

impl Video {
    /// Create a video with only an id, the watch URL filled in
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = watch_url(&id);
        Self {
            id,
            title: String::new(),
            duration: String::new(),
            duration_raw: 0,
            snippet: String::new(),
            upload_date: String::new(),
            thumbnail: String::new(),
            thumbnail_src: String::new(),
            views: 0,
            channel: Channel::default(),
            url,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Removes videos whose title or description contains a listed word.
///
/// Matching is case-insensitive and on whole words only, so "ass" does not
/// reject "class". An empty word list returns the input unchanged.
pub fn filter_bad_words(videos: Vec<Video>, bad_words: &HashSet<String>) -> Vec<Video> {
    if bad_words.is_empty() {
        return videos;
    }

    videos
        .into_iter()
        .filter(|video| !contains_word(&video.title, bad_words) && !contains_word(&video.snippet, bad_words))
        .collect()
}

fn contains_word(text: &str, words: &HashSet<String>) -> bool {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|token| !token.is_empty() && words.contains(token))
}
