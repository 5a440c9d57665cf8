use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header::AUTHORIZATION, Method};
use serde_json::Value;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
    time::Duration,
};
use tracing::debug;

use super::protocol::{LoadResult, TrackData, UpdatePlayer};
use super::NodeOptions;
use crate::error::{Error, Result};

/// Transporte HTTP hacia un nodo.
///
/// `path` incluye el prefijo de versión y la query string. Devuelve `None`
/// cuando el cuerpo de la respuesta está vacío; el texto que no es JSON
/// llega como `Value::String`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(&self, method: Method, path: &str, body: Option<Value>)
        -> AnyResult<Option<Value>>;
}

/// Transporte real basado en `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    password: String,
}

impl ReqwestTransport {
    pub fn new(options: &NodeOptions) -> AnyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(options.request_timeout_ms))
            .user_agent(concat!("open-music-link/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Error al crear cliente HTTP")?;

        Ok(Self {
            client,
            base_url: options.http_url(),
            password: options.password.clone(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AnyResult<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, &self.password);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("{} {} sin respuesta", method, path))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("{} {}: cuerpo ilegible", method, path))?;

        if !status.is_success() {
            anyhow::bail!("{} {} respondió {}: {}", method, path, status, text);
        }

        if text.trim().is_empty() {
            return Ok(None);
        }

        // Algunas rutas devuelven texto plano (p. ej. /version)
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(_) => Ok(Some(Value::String(text))),
        }
    }
}

/// Superficie REST de un nodo.
///
/// Cada llamada incrementa el contador aunque falle; el contador alimenta
/// la estrategia de selección por menor uso.
pub struct Rest {
    transport: Arc<dyn HttpTransport>,
    calls: AtomicU64,
    session_id: RwLock<Option<String>>,
    node: String,
}

const API: &str = "/v4";

impl Rest {
    pub fn new(node: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            calls: AtomicU64::new(0),
            session_id: RwLock::new(None),
            node: node.into(),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub(crate) fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.write() = session_id;
    }

    /// Sin sesión la llamada falla antes de salir, pero igual se cuenta
    fn session_path(&self) -> Result<String> {
        match self.session_id() {
            Some(session_id) => Ok(format!("{}/sessions/{}", API, session_id)),
            None => {
                self.calls.fetch_add(1, Ordering::Relaxed);
                Err(Error::NoSession(self.node.clone()))
            }
        }
    }

    async fn call(
        &self,
        operation: &'static str,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> Result<Option<Value>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!("🌐 [{}] {} {}", self.node, method, path);
        self.transport
            .request(method, &path, body)
            .await
            .map_err(|e| Error::rest(operation, e))
    }

    pub async fn get_players(&self) -> Result<Value> {
        let path = format!("{}/players", self.session_path()?);
        let players = self.call("get_players", Method::GET, path, None).await?;
        Ok(players.unwrap_or_else(|| Value::Array(Vec::new())))
    }

    pub async fn get_player(&self, guild_id: &str) -> Result<Option<Value>> {
        let path = format!("{}/players/{}", self.session_path()?, guild_id);
        self.call("get_player", Method::GET, path, None).await
    }

    pub async fn update_player(
        &self,
        guild_id: &str,
        body: &UpdatePlayer,
        no_replace: bool,
    ) -> Result<Option<Value>> {
        let path = format!(
            "{}/players/{}?noReplace={}",
            self.session_path()?,
            guild_id,
            no_replace
        );
        let body = serde_json::to_value(body)?;
        self.call("update_player", Method::PATCH, path, Some(body)).await
    }

    pub async fn destroy_player(&self, guild_id: &str) -> Result<()> {
        let path = format!("{}/players/{}", self.session_path()?, guild_id);
        self.call("destroy_player", Method::DELETE, path, None).await?;
        Ok(())
    }

    pub async fn update_session(&self, resuming: bool, timeout_secs: u64) -> Result<Option<Value>> {
        let path = self.session_path()?;
        let body = serde_json::json!({ "resuming": resuming, "timeout": timeout_secs });
        self.call("update_session", Method::PATCH, path, Some(body)).await
    }

    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult> {
        let path = format!(
            "{}/loadtracks?identifier={}",
            API,
            urlencoding::encode(identifier)
        );
        match self.call("load_tracks", Method::GET, path, None).await? {
            Some(value) => LoadResult::from_value(value),
            None => Ok(LoadResult::Empty),
        }
    }

    pub async fn decode_track(&self, encoded: &str) -> Result<TrackData> {
        let path = format!(
            "{}/decodetrack?encodedTrack={}",
            API,
            urlencoding::encode(encoded)
        );
        let value = self
            .call("decode_track", Method::GET, path, None)
            .await?
            .ok_or_else(|| Error::Protocol("decodetrack sin datos".to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn decode_tracks(&self, encoded: &[String]) -> Result<Vec<TrackData>> {
        let path = format!("{}/decodetracks", API);
        let body = serde_json::to_value(encoded)?;
        match self
            .call("decode_tracks", Method::POST, path, Some(body))
            .await?
        {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn info(&self) -> Result<Option<Value>> {
        self.call("info", Method::GET, format!("{}/info", API), None)
            .await
    }

    /// `/version` es la única ruta sin prefijo de versión
    pub async fn version(&self) -> Result<Option<String>> {
        let version = self
            .call("version", Method::GET, "/version".to_string(), None)
            .await?;
        Ok(version.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    pub async fn stats(&self) -> Result<Option<Value>> {
        self.call("stats", Method::GET, format!("{}/stats", API), None)
            .await
    }
}
