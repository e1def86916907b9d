//! Contracts for the collaborators a session player drives.
//!
//! The player never talks to Discord or yt-dlp directly. It connects through a
//! [`Transport`], plays through a [`PlaybackEngine`] created by an
//! [`AudioSink`], resolves free text with a [`Resolver`] and opens audio with a
//! [`StreamSource`]. Collaborators report back by pushing events into the
//! session's [`EventSink`].

use async_trait::async_trait;
use std::{fmt, sync::Arc};
use tokio::io::AsyncRead;

use super::player::EventSink;
use crate::error::Result;

/// Identity of one voice session (the guild id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The voice channel a session should join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRef(u64);

impl ChannelRef {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ChannelRef {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a voice connection as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Signalling,
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

/// Playback engine state, mirrored by the session player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Tags every play request so events from abandoned tracks can be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TrackToken(pub u64);

impl TrackToken {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Events emitted by a playback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The track finished (or was ended) and the engine is idle.
    Idle { track: TrackToken },
    /// The engine failed while playing the track.
    Error {
        track: TrackToken,
        message: String,
        resource: Option<String>,
    },
}

/// Readable audio bytes for one link.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub audio_only: bool,
    pub buffer_size_bytes: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            audio_only: true,
            // 1 MiB / 4
            buffer_size_bytes: 262_144,
        }
    }
}

/// Joins voice channels.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects `session` to `channel`. State transitions of the resulting
    /// connection must be reported through `events`.
    async fn connect(
        &self,
        session: SessionId,
        channel: ChannelRef,
        events: EventSink,
    ) -> Result<Box<dyn ConnectionHandle>>;
}

/// A live connection into one voice channel.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Leaves the channel and releases the connection.
    async fn destroy(&mut self);

    /// The songbird call behind this connection, when there is one.
    fn voice_call(&self) -> Option<Arc<tokio::sync::Mutex<songbird::Call>>> {
        None
    }
}

/// Creates playback engines bound to a connection.
pub trait AudioSink: Send + Sync {
    fn create_engine(
        &self,
        connection: &dyn ConnectionHandle,
        events: EventSink,
    ) -> Result<Box<dyn PlaybackEngine>>;
}

/// Plays one stream at a time.
///
/// Finishing or ending a track must produce [`PlaybackEvent::Idle`] carrying
/// the token passed to [`PlaybackEngine::play`].
#[async_trait]
pub trait PlaybackEngine: Send {
    async fn play(&mut self, stream: ByteStream, track: TrackToken) -> Result<()>;
    async fn pause(&mut self);
    async fn resume(&mut self);
    async fn stop(&mut self);
}

/// Turns free text into a single playable link.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the best match, or `None` when nothing was found.
    async fn search(&self, text: &str) -> Result<Option<String>>;
}

/// Opens audio for links.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Whether `text` can be played directly instead of being searched.
    fn is_playable_link(&self, text: &str) -> bool;

    async fn open(&self, link: &str, options: &StreamOptions) -> Result<ByteStream>;
}

/// Everything a session needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub sink: Arc<dyn AudioSink>,
    pub resolver: Arc<dyn Resolver>,
    pub streams: Arc<dyn StreamSource>,
}
