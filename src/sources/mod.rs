//! Link detection, search and streaming backed by YouTube.

pub mod youtube;
pub mod youtube_api_v3;

pub use youtube::{is_youtube_link, YtDlpResolver, YtDlpStreamSource};
pub use youtube_api_v3::YouTubeApiResolver;
