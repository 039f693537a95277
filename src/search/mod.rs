//! Upstream video search

use async_trait::async_trait;

use crate::error::Result;
use crate::video::Video;

pub mod youtube;

pub use youtube::YouTubeProvider;

/// Something that turns a search term into a list of videos
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<Video>>;
}
