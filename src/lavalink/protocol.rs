//! Tipos del protocolo Lavalink v4: frames del WebSocket, cuerpos REST y
//! resultados de `loadtracks`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Datos crudos de un track tal como los envía el nodo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackData {
    pub encoded: Option<String>,
    pub info: Option<TrackDataInfo>,
    #[serde(default)]
    pub plugin_info: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackDataInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duración en milisegundos
    pub length: u64,
    pub is_stream: bool,
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

/// Excepción reportada por el nodo (carga fallida, error de reproducción)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackException {
    pub message: Option<String>,
    pub severity: String,
    pub cause: String,
}

impl TrackException {
    pub fn describe(&self) -> String {
        match &self.message {
            Some(message) => format!("{} ({})", message, self.cause),
            None => self.cause.clone(),
        }
    }
}

// Stats

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStats {
    pub players: u32,
    pub playing_players: u32,
    pub uptime: u64,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
    pub frame_stats: Option<FrameStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuStats {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameStats {
    pub sent: i64,
    pub nulled: i64,
    pub deficit: i64,
}

impl NodeStats {
    /// Carga relativa del sistema: `(systemLoad / cores) * 100`, 0 si no hay datos
    pub fn load_percent(&self) -> f64 {
        if self.cpu.cores == 0 {
            return 0.0;
        }
        (self.cpu.system_load / f64::from(self.cpu.cores)) * 100.0
    }
}

// Frames entrantes

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ready {
    pub session_id: String,
    #[serde(default)]
    pub resumed: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub guild_id: String,
    pub state: PlayerUpdateState,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerUpdateState {
    pub time: i64,
    pub position: u64,
    pub connected: bool,
    pub ping: i64,
}

/// Subtipos de `op: "event"`
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    TrackStart,
    TrackEnd { reason: TrackEndReason },
    TrackException { exception: TrackException },
    TrackStuck { threshold_ms: u64 },
    WebSocketClosed { code: u16, reason: String, by_remote: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Ready(Ready),
    PlayerUpdate(PlayerUpdate),
    Stats(NodeStats),
    Event {
        guild_id: Option<String>,
        event: NodeEvent,
    },
}

#[derive(Deserialize)]
struct TrackEndPayload {
    reason: TrackEndReason,
}

#[derive(Deserialize)]
struct TrackExceptionPayload {
    exception: TrackException,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackStuckPayload {
    #[serde(default)]
    threshold_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebSocketClosedPayload {
    code: u16,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    by_remote: bool,
}

impl InboundFrame {
    /// Interpreta un frame ya decodificado como JSON.
    ///
    /// Un `op` o `type` desconocido se devuelve como [`Error::Protocol`].
    pub fn parse(value: &Value) -> Result<Self> {
        let op = value
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("frame sin campo `op`".to_string()))?;

        match op {
            "ready" => Ok(Self::Ready(Ready::deserialize(value)?)),
            "playerUpdate" => Ok(Self::PlayerUpdate(PlayerUpdate::deserialize(value)?)),
            "stats" => Ok(Self::Stats(NodeStats::deserialize(value)?)),
            "event" => {
                let guild_id = value
                    .get("guildId")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let event = Self::parse_event(value)?;
                Ok(Self::Event { guild_id, event })
            }
            other => Err(Error::Protocol(format!("op desconocido: {}", other))),
        }
    }

    fn parse_event(value: &Value) -> Result<NodeEvent> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("evento sin campo `type`".to_string()))?;

        let event = match kind {
            "TrackStartEvent" => NodeEvent::TrackStart,
            "TrackEndEvent" => {
                let payload = TrackEndPayload::deserialize(value)?;
                NodeEvent::TrackEnd {
                    reason: payload.reason,
                }
            }
            "TrackExceptionEvent" => {
                let payload = TrackExceptionPayload::deserialize(value)?;
                NodeEvent::TrackException {
                    exception: payload.exception,
                }
            }
            "TrackStuckEvent" => {
                let payload = TrackStuckPayload::deserialize(value)?;
                NodeEvent::TrackStuck {
                    threshold_ms: payload.threshold_ms,
                }
            }
            "WebSocketClosedEvent" => {
                let payload = WebSocketClosedPayload::deserialize(value)?;
                NodeEvent::WebSocketClosed {
                    code: payload.code,
                    reason: payload.reason,
                    by_remote: payload.by_remote,
                }
            }
            other => return Err(Error::Protocol(format!("tipo de evento desconocido: {}", other))),
        };

        Ok(event)
    }
}

// Cuerpos REST

/// Cuerpo de `PATCH /sessions/{id}/players/{guildId}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdatePlayerTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoicePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayerTrack {
    /// `Some(None)` se serializa como `null` y detiene el track actual
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Value>,
}

impl UpdatePlayerTrack {
    pub fn encoded(encoded: impl Into<String>) -> Self {
        Self {
            encoded: Some(Some(encoded.into())),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            encoded: Some(None),
            ..Default::default()
        }
    }
}

/// Credenciales de voz tal como las espera el nodo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicePayload {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

// loadtracks

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    Track,
    Playlist,
    Search,
    Empty,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistInfo {
    pub name: String,
    /// -1 cuando el nodo no marcó ningún track
    pub selected_track: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    #[serde(default)]
    pub info: PlaylistInfo,
    #[serde(default)]
    pub plugin_info: Value,
    #[serde(default)]
    pub tracks: Vec<TrackData>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Track(TrackData),
    Playlist(PlaylistData),
    Search(Vec<TrackData>),
    Empty,
    Error(TrackException),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoadResult {
    load_type: LoadType,
    #[serde(default)]
    data: Value,
}

impl LoadResult {
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawLoadResult = serde_json::from_value(value)?;
        let result = match raw.load_type {
            LoadType::Track => Self::Track(serde_json::from_value(raw.data)?),
            LoadType::Playlist => Self::Playlist(serde_json::from_value(raw.data)?),
            LoadType::Search => Self::Search(serde_json::from_value(raw.data)?),
            LoadType::Empty => Self::Empty,
            LoadType::Error => Self::Error(serde_json::from_value(raw.data)?),
        };
        Ok(result)
    }

    pub fn load_type(&self) -> LoadType {
        match self {
            Self::Track(_) => LoadType::Track,
            Self::Playlist(_) => LoadType::Playlist,
            Self::Search(_) => LoadType::Search,
            Self::Empty => LoadType::Empty,
            Self::Error(_) => LoadType::Error,
        }
    }
}
