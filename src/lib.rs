//! # Guild Jukebox
//!
//! Per-guild voice playback controller. Each guild with an active voice
//! connection gets one session player that owns the link queue, the voice
//! connection and the playback engine, and that decides whether a dropped
//! connection is a transient migration or a permanent disconnect.
//!
//! - [`audio`]: session player, session registry and the collaborator traits
//! - [`voice`]: songbird-backed transport and playback engine
//! - [`sources`]: yt-dlp / YouTube Data API search and stream sources
//! - [`bot`]: serenity command surface

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod voice;

pub use error::{PlayerError, Result};
