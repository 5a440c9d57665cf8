//! Tipos de error comunes del runtime.

use thiserror::Error;

/// Resultado estándar de las operaciones de la librería
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Argumento inválido o fuera de rango (validación síncrona)
    #[error("Argumento inválido: {0}")]
    InvalidArgument(String),

    /// Llamada REST fallida, conserva la causa original
    #[error("Llamada REST `{operation}` fallida: {source:#}")]
    Rest {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// El nodo todavía no recibió el `ready` con su session id
    #[error("El nodo `{0}` no tiene sesión activa")]
    NoSession(String),

    #[error("No hay nodos conectados disponibles")]
    NoNodes,

    #[error("Nodo `{0}` no encontrado")]
    NodeNotFound(String),

    #[error("No hay track actual")]
    NoCurrentTrack,

    #[error("El player no tiene canal de voz asignado")]
    NoVoiceChannel,

    /// La búsqueda de un track no resuelto no devolvió nada utilizable
    #[error("No se pudo resolver el track: {0}")]
    Resolve(String),

    #[error("Error de protocolo: {0}")]
    Protocol(String),

    /// El manager, nodo o player ya fue destruido
    #[error("{0} destruido")]
    Destroyed(&'static str),

    /// El bot anfitrión no pudo enviar el payload de voz
    #[error("Error del gateway de voz: {0:#}")]
    Gateway(#[source] anyhow::Error),

    #[error("El manager no tiene user id del bot (llame a `init` primero)")]
    MissingUserId,

    #[error("Error de WebSocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Error de JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn rest(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Rest { operation, source }
    }
}
