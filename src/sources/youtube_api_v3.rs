use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::{
    audio::Resolver,
    error::{PlayerError, Result},
};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

impl SearchResponse {
    fn first_link(self) -> Option<String> {
        self.items
            .into_iter()
            .find_map(|item| item.id.video_id)
            .map(|id| format!("https://www.youtube.com/watch?v={}", id))
    }
}

/// Cliente de búsqueda de YouTube Data API v3.
pub struct YouTubeApiResolver {
    api_key: String,
    client: reqwest::Client,
}

impl YouTubeApiResolver {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PlayerError::ResolutionFailed(format!("http client: {}", e)))?;

        Ok(Self { api_key, client })
    }
}

#[async_trait]
impl Resolver for YouTubeApiResolver {
    async fn search(&self, text: &str) -> Result<Option<String>> {
        debug!("🔍 Búsqueda YouTube API v3: {}", text);
        let failed = |reason: String| {
            error!("❌ YouTube API error: {}", reason);
            PlayerError::ResolutionFailed(text.to_string())
        };

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("q", text),
                ("type", "video"),
                ("maxResults", "1"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("{} - {}", status, body)));
        }

        let body: SearchResponse = response.json().await.map_err(|e| failed(e.to_string()))?;
        Ok(body.first_link())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_video_becomes_a_watch_link() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"items":[{"id":{"kind":"youtube#video","videoId":"dQw4w9WgXcQ"},"snippet":{}}]}"#,
        )
        .unwrap();
        assert_eq!(
            body.first_link().as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn no_items_means_no_match() {
        let body: SearchResponse = serde_json::from_str(r#"{"kind":"youtube#searchListResponse"}"#).unwrap();
        assert_eq!(body.first_link(), None);
    }
}
