//! Eventos que el manager reenvía a la aplicación anfitriona.

use serde_json::Value;

use crate::audio::track::QueueTrack;
use crate::lavalink::protocol::{TrackEndReason, TrackException};

/// Evento del runtime, entregado por [`Manager::subscribe`](super::Manager::subscribe)
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    NodeCreate {
        node: String,
    },
    NodeDestroy {
        node: String,
    },
    NodeConnect {
        node: String,
    },
    NodeReconnect {
        node: String,
        attempt: u32,
    },
    NodeDisconnect {
        node: String,
        code: u16,
        reason: String,
    },
    NodeError {
        node: String,
        error: String,
    },
    /// Frame entrante tal cual llegó
    NodeRaw {
        node: String,
        payload: Value,
    },
    PlayerCreate {
        guild_id: String,
    },
    PlayerDestroy {
        guild_id: String,
    },
    PlayerMove {
        guild_id: String,
        old_channel: Option<String>,
        new_channel: String,
    },
    PlayerDisconnect {
        guild_id: String,
        old_channel: Option<String>,
    },
    TrackStart {
        guild_id: String,
        track: Option<QueueTrack>,
    },
    TrackEnd {
        guild_id: String,
        track: Option<QueueTrack>,
        reason: TrackEndReason,
    },
    TrackStuck {
        guild_id: String,
        track: Option<QueueTrack>,
        threshold_ms: u64,
    },
    TrackError {
        guild_id: String,
        track: Option<QueueTrack>,
        error: TrackException,
    },
    QueueEnd {
        guild_id: String,
        track: Option<QueueTrack>,
    },
    SocketClosed {
        guild_id: String,
        code: u16,
        reason: String,
        by_remote: bool,
    },
}

impl ManagerEvent {
    /// Nombre corto para logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::NodeCreate { .. } => "nodeCreate",
            Self::NodeDestroy { .. } => "nodeDestroy",
            Self::NodeConnect { .. } => "nodeConnect",
            Self::NodeReconnect { .. } => "nodeReconnect",
            Self::NodeDisconnect { .. } => "nodeDisconnect",
            Self::NodeError { .. } => "nodeError",
            Self::NodeRaw { .. } => "nodeRaw",
            Self::PlayerCreate { .. } => "playerCreate",
            Self::PlayerDestroy { .. } => "playerDestroy",
            Self::PlayerMove { .. } => "playerMove",
            Self::PlayerDisconnect { .. } => "playerDisconnect",
            Self::TrackStart { .. } => "trackStart",
            Self::TrackEnd { .. } => "trackEnd",
            Self::TrackStuck { .. } => "trackStuck",
            Self::TrackError { .. } => "trackError",
            Self::QueueEnd { .. } => "queueEnd",
            Self::SocketClosed { .. } => "socketClosed",
        }
    }
}
