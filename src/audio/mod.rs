//! # Audio Module
//!
//! Per-guild playback state built on top of the Lavalink nodes.
//!
//! ## Architecture
//!
//! ### [`player`] - Player
//! - One session per guild, bound to one node
//! - Commands (play, stop, pause, seek, volume, filters) go out as REST
//!   `update_player` calls
//! - Node events drive the track-end decision table (repeat modes, autoplay,
//!   queue end)
//!
//! ### [`queue`] - Queue
//! - Ordered upcoming tracks plus `current` and `previous` slots
//! - Shuffle and stable unshuffle by insertion time
//!
//! ### [`track`] - Tracks
//! - Resolved tracks built from node data, optionally trimmed to a field set
//! - Unresolved tracks searched and matched on demand
//!
//! ### [`filters`] - Filters
//! - Equalizer, timescale and other Lavalink filters with named presets

pub mod filters;
pub mod player;
pub mod queue;
pub mod track;
