//! Songbird-backed transport and playback engine.
//!
//! Songbird reports driver events rather than connection states, so they
//! are translated: a (re)connected driver reports `Connecting` then `Ready`,
//! a dropped driver reports `Disconnected`. The bot's own voice-state
//! updates add `Signalling` (see [`crate::bot`]).

pub mod connection;
pub mod engine;

pub use connection::{SongbirdConnection, SongbirdTransport};
pub use engine::{SongbirdEngine, SongbirdSink};
