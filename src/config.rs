use anyhow::Result;
use std::time::Duration;

use crate::audio::StreamOptions;

/// Links appended by the `fill` command when `FILL_LINKS` is not set.
pub const DEFAULT_FILL_LINKS: [&str; 3] = [
    "https://www.youtube.com/watch?v=mJS8xrafNdI",
    "https://www.youtube.com/watch?v=H4xE0u4OQcY",
    "https://www.youtube.com/watch?v=mJS8xrafNdI",
];

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Playback
    pub grace_period_ms: u64,
    pub stream_buffer_bytes: usize,
    pub audio_only: bool,
    pub fill_links: Vec<String>,

    // Sources
    pub ytdlp_path: String,
    pub youtube_api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),

            grace_period_ms: std::env::var("GRACE_PERIOD_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            stream_buffer_bytes: std::env::var("STREAM_BUFFER_BYTES")
                .unwrap_or_else(|_| "262144".to_string())
                .parse()?,
            audio_only: std::env::var("AUDIO_ONLY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            fill_links: match std::env::var("FILL_LINKS") {
                Ok(val) if !val.trim().is_empty() => parse_links(&val),
                _ => default_fill_links(),
            },

            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            youtube_api_key: std::env::var("YOUTUBE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks on values that would otherwise fail at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if self.grace_period_ms == 0 {
            anyhow::bail!("Grace period must be greater than 0");
        }

        if self.stream_buffer_bytes == 0 {
            anyhow::bail!("Stream buffer size must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("yt-dlp path must not be empty");
        }

        Ok(())
    }

    /// Settings handed to every session player.
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            grace_period: Duration::from_millis(self.grace_period_ms),
            stream: StreamOptions {
                audio_only: self.audio_only,
                buffer_size_bytes: self.stream_buffer_bytes,
            },
            fill_links: self.fill_links.clone(),
        }
    }

    /// Summary for logging. The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix \"{}\"\n  \
            Playback: {}ms grace, {} byte buffer, audio only={}\n  \
            Sources: yt-dlp at {}, YouTube API={}\n  \
            Fill: {} links",
            self.command_prefix,
            self.grace_period_ms,
            self.stream_buffer_bytes,
            self.audio_only,
            self.ytdlp_path,
            self.youtube_api_key.is_some(),
            self.fill_links.len(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "!".to_string(),
            grace_period_ms: DEFAULT_GRACE_PERIOD.as_millis() as u64,
            stream_buffer_bytes: StreamOptions::default().buffer_size_bytes,
            audio_only: true,
            fill_links: default_fill_links(),
            ytdlp_path: "yt-dlp".to_string(),
            youtube_api_key: None,
        }
    }
}

/// Per-session playback settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// How long a dropped connection may take to start re-signalling before
    /// it is treated as gone for good.
    pub grace_period: Duration,
    pub stream: StreamOptions,
    pub fill_links: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            stream: StreamOptions::default(),
            fill_links: default_fill_links(),
        }
    }
}

fn default_fill_links() -> Vec<String> {
    DEFAULT_FILL_LINKS.iter().map(|link| link.to_string()).collect()
}

fn parse_links(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
        .collect()
}
