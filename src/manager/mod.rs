//! # Manager Module
//!
//! Top-level handle of the runtime: owns the node pool, the per-guild
//! players and the event bus.
//!
//! ## Features
//!
//! - Node pool keyed by identifier, with least-calls / least-load /
//!   least-players ordering
//! - One [`Player`] per guild, created idempotently
//! - Voice packet routing from the host bot into players
//! - Typed event stream over a `tokio::sync::broadcast` channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use open_music_link::manager::{Manager, ManagerOptions, voice::VoiceGateway};
//! use open_music_link::audio::player::PlayerOptions;
//!
//! # async fn demo(gateway: Arc<dyn VoiceGateway>) -> open_music_link::Result<()> {
//! let manager = Manager::new(ManagerOptions::default(), gateway);
//! manager.init("123456789")?;
//! let player = manager.create_player(PlayerOptions::new("42").with_voice_channel("7"))?;
//! let result = manager.search("lofi beats", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod search;
pub mod voice;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::audio::player::{Player, PlayerOptions};
use crate::audio::track::{Track, TrackField};
use crate::error::{Error, Result};
use crate::lavalink::rest::{HttpTransport, ReqwestTransport};
use crate::lavalink::{Node, NodeOptions};

use events::ManagerEvent;
use search::{SearchPlatform, SearchQuery, SearchResult};
use voice::{VoiceGateway, VoicePacket};

const EVENT_CAPACITY: usize = 256;

/// Estrategia para elegir el nodo de un player nuevo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeSelection {
    #[default]
    LeastLoad,
    LeastPlayers,
}

impl std::str::FromStr for NodeSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "leastload" | "load" => Ok(Self::LeastLoad),
            "leastplayers" | "players" => Ok(Self::LeastPlayers),
            other => Err(Error::InvalidArgument(format!(
                "Estrategia de selección desconocida: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Nodos que `init` crea y conecta
    pub nodes: Vec<NodeOptions>,
    pub client_name: String,
    pub default_search_platform: SearchPlatform,
    /// Reproducir el siguiente track automáticamente al terminar uno
    pub autoplay: bool,
    /// Campos de track a conservar; `None` conserva todos
    pub track_partial: Option<Vec<TrackField>>,
    pub node_selection: NodeSelection,
    /// Volumen de los players creados sin volumen explícito
    pub default_volume: u16,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            nodes: vec![NodeOptions {
                identifier: "main".to_string(),
                ..Default::default()
            }],
            client_name: format!("open-music-link/{}", env!("CARGO_PKG_VERSION")),
            default_search_platform: SearchPlatform::YouTube,
            autoplay: true,
            track_partial: None,
            node_selection: NodeSelection::LeastLoad,
            default_volume: 100,
        }
    }
}

struct ManagerInner {
    options: ManagerOptions,
    user_id: RwLock<Option<String>>,
    nodes: DashMap<String, Arc<Node>>,
    players: DashMap<String, Arc<Player>>,
    events: broadcast::Sender<ManagerEvent>,
    voice: Arc<dyn VoiceGateway>,
}

/// Handle clonable del runtime
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

/// Referencia débil que guardan nodos y players
#[derive(Clone, Default)]
pub(crate) struct WeakManager(Weak<ManagerInner>);

impl WeakManager {
    pub(crate) fn upgrade(&self) -> Option<Manager> {
        self.0.upgrade().map(|inner| Manager { inner })
    }
}

impl Manager {
    pub fn new(options: ManagerOptions, voice: Arc<dyn VoiceGateway>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ManagerInner {
                options,
                user_id: RwLock::new(None),
                nodes: DashMap::new(),
                players: DashMap::new(),
                events,
                voice,
            }),
        }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.inner.options
    }

    pub fn client_name(&self) -> &str {
        &self.inner.options.client_name
    }

    /// Nuevo receptor de eventos; los eventos anteriores no se reciben
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: ManagerEvent) {
        // Sin receptores el envío falla y el evento se descarta
        let _ = self.inner.events.send(event);
    }

    pub(crate) fn downgrade(&self) -> WeakManager {
        WeakManager(Arc::downgrade(&self.inner))
    }

    pub(crate) fn voice_gateway(&self) -> Arc<dyn VoiceGateway> {
        Arc::clone(&self.inner.voice)
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.user_id.read().clone()
    }

    pub(crate) fn set_user_id(&self, user_id: impl Into<String>) {
        *self.inner.user_id.write() = Some(user_id.into());
    }

    /// Registra el user id del bot y conecta los nodos configurados
    pub fn init(&self, user_id: impl Into<String>) -> Result<()> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::MissingUserId);
        }
        self.set_user_id(user_id);

        for options in self.inner.options.nodes.clone() {
            let node = self.create_node(options)?;
            node.connect()?;
        }

        info!(
            "🚀 Manager inicializado con {} nodo(s)",
            self.inner.nodes.len()
        );
        Ok(())
    }

    // Nodos

    /// Crea un nodo; si el identificador ya existe devuelve el existente
    pub fn create_node(&self, mut options: NodeOptions) -> Result<Arc<Node>> {
        if options.identifier.trim().is_empty() {
            options.identifier = options.host.clone();
        }
        options.validate()?;

        if let Some(existing) = self.node(&options.identifier) {
            return Ok(existing);
        }

        let transport = ReqwestTransport::new(&options)
            .map_err(|e| Error::InvalidArgument(format!("{:#}", e)))?;
        Ok(self.register_node(options, Arc::new(transport)))
    }

    pub(crate) fn register_node(
        &self,
        options: NodeOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Arc<Node> {
        let identifier = options.identifier.clone();
        let mut created = false;
        let node = self
            .inner
            .nodes
            .entry(identifier.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(Node::new(options, self.downgrade(), transport))
            })
            .clone();

        if created {
            info!("🆕 Nodo {} creado", identifier);
            self.emit(ManagerEvent::NodeCreate { node: identifier });
        }
        node
    }

    pub fn node(&self, identifier: &str) -> Option<Arc<Node>> {
        self.inner.nodes.get(identifier).map(|n| Arc::clone(n.value()))
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        let mut nodes: Vec<_> = self.inner.nodes.iter().map(|n| Arc::clone(n.value())).collect();
        nodes.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        nodes
    }

    fn connected_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes().into_iter().filter(|n| n.is_connected()).collect()
    }

    /// Nodos conectados, el menos usado (menos llamadas REST) primero
    pub fn nodes_by_least_calls(&self) -> Vec<Arc<Node>> {
        let mut nodes = self.connected_nodes();
        nodes.sort_by(|a, b| {
            a.calls()
                .cmp(&b.calls())
                .then_with(|| a.identifier().cmp(b.identifier()))
        });
        nodes
    }

    /// Nodos conectados por carga de CPU relativa ascendente
    pub fn nodes_by_least_load(&self) -> Vec<Arc<Node>> {
        let mut nodes = self.connected_nodes();
        nodes.sort_by(|a, b| {
            a.stats()
                .load_percent()
                .total_cmp(&b.stats().load_percent())
                .then_with(|| a.identifier().cmp(b.identifier()))
        });
        nodes
    }

    pub fn nodes_by_least_players(&self) -> Vec<Arc<Node>> {
        let mut nodes = self.connected_nodes();
        nodes.sort_by(|a, b| {
            a.stats()
                .players
                .cmp(&b.stats().players)
                .then_with(|| a.identifier().cmp(b.identifier()))
        });
        nodes
    }

    fn select_node(&self) -> Option<Arc<Node>> {
        let ordered = match self.inner.options.node_selection {
            NodeSelection::LeastLoad => self.nodes_by_least_load(),
            NodeSelection::LeastPlayers => self.nodes_by_least_players(),
        };
        ordered.into_iter().next()
    }

    pub async fn destroy_node(&self, identifier: &str) -> Result<()> {
        let node = self
            .node(identifier)
            .ok_or_else(|| Error::NodeNotFound(identifier.to_string()))?;
        node.destroy().await;
        Ok(())
    }

    pub(crate) fn remove_node(&self, identifier: &str) {
        self.inner.nodes.remove(identifier);
    }

    // Players

    /// Crea el player del guild; si ya existe devuelve el existente sin tocarlo
    pub fn create_player(&self, mut options: PlayerOptions) -> Result<Arc<Player>> {
        options.validate()?;
        options.volume.get_or_insert(self.inner.options.default_volume);

        if let Some(existing) = self.player(&options.guild_id) {
            return Ok(existing);
        }

        let node = match options.node.as_deref() {
            Some(identifier) => self
                .node(identifier)
                .ok_or_else(|| Error::NodeNotFound(identifier.to_string()))?,
            None => self.select_node().ok_or(Error::NoNodes)?,
        };

        let guild_id = options.guild_id.clone();
        let mut created = false;
        let player = self
            .inner
            .players
            .entry(guild_id.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(Player::new(options, node, self.downgrade()))
            })
            .clone();

        if created {
            info!(
                "🎧 Player creado para guild {} en nodo {}",
                guild_id,
                player.node().identifier()
            );
            self.emit(ManagerEvent::PlayerCreate { guild_id });
        }
        Ok(player)
    }

    pub fn player(&self, guild_id: &str) -> Option<Arc<Player>> {
        self.inner.players.get(guild_id).map(|p| Arc::clone(p.value()))
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        self.inner.players.iter().map(|p| Arc::clone(p.value())).collect()
    }

    pub(crate) fn players_on(&self, node: &str) -> Vec<Arc<Player>> {
        self.players()
            .into_iter()
            .filter(|p| p.node().identifier() == node)
            .collect()
    }

    pub(crate) fn remove_player(&self, guild_id: &str) {
        self.inner.players.remove(guild_id);
    }

    /// Desconecta y destruye el player del guild, si existe
    pub async fn destroy_player(&self, guild_id: &str) -> Result<()> {
        match self.player(guild_id) {
            Some(player) => player.destroy(true).await,
            None => Ok(()),
        }
    }

    // Búsqueda

    /// Busca en el nodo con menos llamadas REST
    pub async fn search(
        &self,
        query: impl Into<SearchQuery>,
        requester: Option<Value>,
    ) -> Result<SearchResult> {
        let query = query.into();
        let node = self
            .nodes_by_least_calls()
            .into_iter()
            .next()
            .ok_or(Error::NoNodes)?;

        let identifier = query.identifier(self.inner.options.default_search_platform);
        debug!("🔍 [{}] Buscando: {}", node.identifier(), identifier);

        let result = node.rest().load_tracks(&identifier).await?;
        SearchResult::from_load(result, requester, self.inner.options.track_partial.as_deref())
    }

    pub async fn decode_tracks(&self, encoded: &[String]) -> Result<Vec<Track>> {
        let node = self
            .nodes_by_least_calls()
            .into_iter()
            .next()
            .ok_or(Error::NoNodes)?;

        let partial = self.inner.options.track_partial.as_deref();
        node.rest()
            .decode_tracks(encoded)
            .await?
            .iter()
            .map(|data| Track::build(data, None, partial))
            .collect()
    }

    // Voz

    /// Entrega un paquete de voz del gateway al player del guild
    pub async fn update_voice_state(&self, packet: VoicePacket) -> Result<()> {
        let Some(guild_id) = packet.guild_id().map(str::to_owned) else {
            return Ok(());
        };
        let Some(player) = self.player(&guild_id) else {
            return Ok(());
        };

        match packet {
            VoicePacket::Server(server) => {
                player
                    .apply_voice_server(server.token, server.endpoint)
                    .await
            }
            VoicePacket::State(state) => {
                if self.user_id().as_deref() != Some(state.user_id.as_str()) {
                    return Ok(());
                }
                player
                    .apply_voice_state(state.channel_id, state.session_id)
                    .await
            }
        }
    }

    /// Destruye todos los nodos (y con ellos sus players)
    pub async fn shutdown(&self) {
        for node in self.nodes() {
            node.destroy().await;
        }
        if !self.inner.players.is_empty() {
            warn!(
                "⚠️ {} player(s) sin nodo al cerrar",
                self.inner.players.len()
            );
        }
        info!("👋 Manager cerrado");
    }
}
