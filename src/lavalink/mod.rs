//! # Lavalink Module
//!
//! Client side of the Lavalink v4 protocol.
//!
//! - [`node`]: one [`Node`] per backend; owns the WebSocket lifecycle
//!   (connect, reconnect with a fixed delay, destroy) and dispatches inbound
//!   frames to the players bound to it
//! - [`rest`]: the REST surface, with a per-node call counter used for node
//!   selection
//! - [`protocol`]: wire types for frames, REST bodies and load results
//!
//! ## Example
//!
//! ```rust,no_run
//! use open_music_link::lavalink::NodeOptions;
//!
//! let options = NodeOptions {
//!     identifier: "main".to_string(),
//!     host: "localhost".to_string(),
//!     port: 2333,
//!     password: "youshallnotpass".to_string(),
//!     ..Default::default()
//! };
//! assert_eq!(options.ws_url(), "ws://localhost:2333/v4/websocket");
//! ```

pub mod node;
pub mod protocol;
pub mod rest;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use node::Node;

/// Estado de la conexión WebSocket de un nodo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Destroyed,
}

/// Configuración de un nodo Lavalink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeOptions {
    /// Clave única dentro del pool; si está vacía se usa `host`
    pub identifier: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub secure: bool,
    /// Intentos de conexión antes de destruir el nodo
    pub retry_amount: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
    /// Pide al nodo que conserve la sesión tras una desconexión
    pub resume_status: bool,
    pub resume_timeout_secs: u64,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            host: "localhost".to_string(),
            port: 2333,
            password: "youshallnotpass".to_string(),
            secure: false,
            retry_amount: 30,
            retry_delay_ms: 5_000,
            request_timeout_ms: 10_000,
            resume_status: false,
            resume_timeout_secs: 60,
        }
    }
}

impl NodeOptions {
    pub fn http_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/v4/websocket", scheme, self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(Error::InvalidArgument("El nodo necesita un identificador".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::InvalidArgument("El nodo necesita un host".to_string()));
        }
        if self.port == 0 {
            return Err(Error::InvalidArgument("Puerto de nodo inválido: 0".to_string()));
        }
        if self.retry_amount == 0 {
            return Err(Error::InvalidArgument(
                "retry_amount debe ser mayor que 0".to_string(),
            ));
        }
        Ok(())
    }
}
