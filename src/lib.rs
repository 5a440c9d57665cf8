//! # Open Music Link
//!
//! Lavalink v4 client runtime for Discord music bots: a pool of audio nodes,
//! one player state machine per guild, queues with repeat and shuffle, and
//! lazy resolution of tracks known only by title and author.
//!
//! The host bot owns the Discord gateway. It forwards voice packets through
//! [`Manager::update_voice_state`] and sends the voice join/leave payloads the
//! runtime hands to its [`VoiceGateway`](manager::voice::VoiceGateway).

pub mod audio;
pub mod config;
pub mod error;
pub mod lavalink;
pub mod manager;

#[cfg(test)]
mod testing;

pub use audio::player::{Player, PlayerOptions, PlayOptions};
pub use audio::track::{QueueTrack, Track, UnresolvedTrack};
pub use error::{Error, Result};
pub use lavalink::{Node, NodeOptions};
pub use manager::events::ManagerEvent;
pub use manager::{Manager, ManagerOptions};
