//! Credenciales de voz y comunicación con el gateway del bot anfitrión.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::lavalink::protocol::VoicePayload;

/// Envía payloads al gateway de voz de Discord (lo implementa el bot anfitrión)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn send(&self, guild_id: &str, payload: Value) -> AnyResult<()>;
}

/// Payload `op: 4` para entrar a (o salir de, con `None`) un canal de voz
pub fn voice_state_payload(
    guild_id: &str,
    channel_id: Option<&str>,
    self_mute: bool,
    self_deaf: bool,
) -> Value {
    json!({
        "op": 4,
        "d": {
            "guild_id": guild_id,
            "channel_id": channel_id,
            "self_mute": self_mute,
            "self_deaf": self_deaf,
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoiceServerUpdate {
    pub guild_id: String,
    pub token: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoiceStateUpdate {
    pub guild_id: Option<String>,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub session_id: String,
}

/// Paquetes del gateway que aportan credenciales de voz
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoicePacket {
    Server(VoiceServerUpdate),
    State(VoiceStateUpdate),
}

impl VoicePacket {
    /// Reconoce un dispatch crudo del gateway (`{ "t": ..., "d": ... }`)
    pub fn from_gateway(raw: &Value) -> Option<Self> {
        let data = raw.get("d")?;
        match raw.get("t")?.as_str()? {
            "VOICE_SERVER_UPDATE" => VoiceServerUpdate::deserialize(data).ok().map(Self::Server),
            "VOICE_STATE_UPDATE" => VoiceStateUpdate::deserialize(data).ok().map(Self::State),
            _ => None,
        }
    }

    pub fn guild_id(&self) -> Option<&str> {
        match self {
            Self::Server(server) => Some(server.guild_id.as_str()),
            Self::State(state) => state.guild_id.as_deref(),
        }
    }
}

/// Credenciales armadas de a partes; sólo se envían al nodo completas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCredentials {
    pub token: Option<String>,
    pub endpoint: Option<String>,
    pub session_id: Option<String>,
}

impl VoiceCredentials {
    pub fn complete(&self) -> Option<VoicePayload> {
        Some(VoicePayload {
            token: self.token.clone()?,
            endpoint: self.endpoint.clone()?,
            session_id: self.session_id.clone()?,
        })
    }
}
