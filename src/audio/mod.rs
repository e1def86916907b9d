//! # Audio Module
//!
//! Session playback core for Guild Jukebox.
//!
//! ## Architecture
//!
//! ### [`player`] - Session Player
//! - One task per guild, the single writer of that guild's queue and state
//! - Advances the queue whenever the engine goes idle
//! - Tells transient voice migrations apart from real disconnects
//!
//! ### [`registry`] - Session Registry
//! - Maps guilds to their player, creating on first use
//! - Evicts a player once its connection is confirmed lost
//!
//! ### [`queue`] - Link Queue
//! - Strict FIFO of playable links
//!
//! ### [`backend`] - Collaborators
//! - Transport, playback engine, resolver and stream source contracts
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::audio::{ChannelRef, Collaborators, SessionId, SessionRegistry};
//! use guild_jukebox::config::PlayerConfig;
//!
//! # async fn example(collaborators: Collaborators) -> guild_jukebox::Result<()> {
//! let registry = SessionRegistry::new(collaborators, PlayerConfig::default());
//! let guild = SessionId::new(123456789);
//! let channel = ChannelRef::new(987654321);
//!
//! registry.enqueue_link(guild, channel, "https://youtu.be/dQw4w9WgXcQ").await?;
//! registry.pause(guild).await?;
//! registry.resume(guild).await?;
//! registry.skip(guild).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod player;
pub mod queue;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{
    AudioSink, ByteStream, ChannelRef, Collaborators, ConnectionHandle, ConnectionState,
    PlaybackEngine, PlaybackEvent, PlaybackState, Resolver, SessionId, StreamOptions,
    StreamSource, TrackToken, Transport,
};
pub use player::{DisconnectCallback, EventSink, PlayerStatus, SessionHandle};
pub use queue::{LinkQueue, QueueListing};
pub use registry::SessionRegistry;
