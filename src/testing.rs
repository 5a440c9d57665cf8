//! Dobles de prueba compartidos por los tests del crate.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

use crate::audio::track::{Track, UnresolvedTrack};
use crate::lavalink::{rest::HttpTransport, Node, NodeOptions, NodeState};
use crate::manager::{voice::VoiceGateway, Manager, ManagerOptions};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Transporte que graba cada petición y responde desde una tabla por prefijo
#[derive(Default)]
pub(crate) struct FakeTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<Vec<(String, Value)>>,
    failures: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responde `value` a toda ruta que empiece por `prefix`
    pub fn respond(&self, prefix: &str, value: Value) {
        self.responses.lock().push((prefix.to_string(), value));
    }

    /// La próxima petición falla con `message`
    pub fn fail_next(&self, message: &str) {
        self.failures.lock().push(message.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn patches(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::PATCH)
            .collect()
    }

    pub fn clear(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AnyResult<Option<Value>> {
        self.requests.lock().push(RecordedRequest {
            method,
            path: path.to_string(),
            body,
        });

        if let Some(message) = self.failures.lock().pop() {
            anyhow::bail!(message);
        }

        let responses = self.responses.lock();
        Ok(responses
            .iter()
            .rev()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, value)| value.clone()))
    }
}

/// Gateway de voz que sólo guarda los payloads enviados
#[derive(Default)]
pub(crate) struct RecordingGateway {
    pub sent: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl VoiceGateway for RecordingGateway {
    async fn send(&self, guild_id: &str, payload: Value) -> AnyResult<()> {
        self.sent.lock().push((guild_id.to_string(), payload));
        Ok(())
    }
}

pub(crate) fn manager_options() -> ManagerOptions {
    ManagerOptions {
        client_name: "tests".to_string(),
        autoplay: true,
        ..Default::default()
    }
}

/// Manager con un nodo `main` conectado sobre un [`FakeTransport`]
pub(crate) fn manager_with_node(
    options: ManagerOptions,
) -> (Manager, Arc<Node>, Arc<FakeTransport>, Arc<RecordingGateway>) {
    let gateway = Arc::new(RecordingGateway::default());
    let manager = Manager::new(options, gateway.clone());
    manager.set_user_id("bot");
    let (node, transport) = add_fake_node(&manager, "main");
    (manager, node, transport, gateway)
}

pub(crate) fn add_fake_node(manager: &Manager, identifier: &str) -> (Arc<Node>, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::new());
    let options = NodeOptions {
        identifier: identifier.to_string(),
        ..Default::default()
    };
    let node = manager.register_node(options, transport.clone());
    node.set_state(NodeState::Connected);
    node.rest().set_session_id(Some("session".to_string()));
    (node, transport)
}

pub(crate) fn track(id: &str, duration: u64) -> Track {
    Track {
        encoded: format!("enc-{}", id),
        identifier: id.to_string(),
        title: format!("Title {}", id),
        author: format!("Author {}", id),
        duration,
        is_seekable: true,
        source_name: "youtube".to_string(),
        created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        ..Default::default()
    }
}

/// Track con timestamp de creación `base + offset_ms`
pub(crate) fn track_at(id: &str, offset_ms: i64) -> Track {
    let mut track = track(id, 1000);
    track.created_at = Utc
        .timestamp_millis_opt(1_700_000_000_000 + offset_ms)
        .unwrap();
    track
}

pub(crate) fn unresolved(title: &str, author: Option<&str>) -> UnresolvedTrack {
    let mut unresolved = UnresolvedTrack::new(title);
    if let Some(author) = author {
        unresolved = unresolved.with_author(author);
    }
    unresolved
}
