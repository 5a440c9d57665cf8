use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::protocol::{InboundFrame, NodeStats};
use super::rest::{HttpTransport, Rest};
use super::{NodeOptions, NodeState};
use crate::audio::player::Player;
use crate::error::{Error, Result};
use crate::manager::events::ManagerEvent;
use crate::manager::{Manager, WeakManager};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Motivo de cierre que marca una desconexión pedida por nosotros
const DESTROY_REASON: &str = "destroy";

/// Código de cierre cuando el socket se corta sin close frame
const ABNORMAL_CLOSE: u16 = 1006;

/// Conexión a un nodo Lavalink.
///
/// Una única tarea por nodo lleva el ciclo de vida del socket: abre,
/// lee frames hasta el cierre y reintenta con un retardo fijo hasta
/// `retry_amount` intentos, tras lo cual el nodo se destruye.
pub struct Node {
    options: NodeOptions,
    manager: WeakManager,
    rest: Rest,
    state: RwLock<NodeState>,
    stats: RwLock<NodeStats>,
    reconnect_attempts: AtomicU32,
    cancel: Mutex<CancellationToken>,
}

impl Node {
    pub(crate) fn new(
        options: NodeOptions,
        manager: WeakManager,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let rest = Rest::new(options.identifier.clone(), transport);
        Self {
            options,
            manager,
            rest,
            state: RwLock::new(NodeState::Disconnected),
            stats: RwLock::new(NodeStats::default()),
            reconnect_attempts: AtomicU32::new(1),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.options.identifier
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn rest(&self) -> &Rest {
        &self.rest
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == NodeState::Connected
    }

    pub(crate) fn set_state(&self, state: NodeState) {
        *self.state.write() = state;
    }

    /// Últimas stats recibidas del nodo
    pub fn stats(&self) -> NodeStats {
        self.stats.read().clone()
    }

    pub(crate) fn set_stats(&self, stats: NodeStats) {
        *self.stats.write() = stats;
    }

    /// Llamadas REST hechas contra este nodo
    pub fn calls(&self) -> u64 {
        self.rest.calls()
    }

    fn emit(&self, event: ManagerEvent) {
        if let Some(manager) = self.manager.upgrade() {
            manager.emit(event);
        }
    }

    fn emit_error(&self, error: impl ToString) {
        self.emit(ManagerEvent::NodeError {
            node: self.identifier().to_string(),
            error: error.to_string(),
        });
    }

    /// Arranca la tarea de conexión. No hace nada si ya está conectado o
    /// conectando.
    pub fn connect(self: &Arc<Self>) -> Result<()> {
        let manager = self.manager.upgrade().ok_or(Error::Destroyed("Manager"))?;
        if manager.user_id().is_none() {
            return Err(Error::MissingUserId);
        }

        {
            let mut state = self.state.write();
            match *state {
                NodeState::Connected | NodeState::Connecting | NodeState::Reconnecting => {
                    return Ok(())
                }
                NodeState::Destroyed => return Err(Error::Destroyed("Nodo")),
                NodeState::Disconnected => *state = NodeState::Connecting,
            }
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();
        self.reconnect_attempts.store(1, Ordering::SeqCst);

        info!("🔌 Conectando a nodo {} ({})", self.identifier(), self.options.ws_url());
        tokio::spawn(Arc::clone(self).run(cancel));
        Ok(())
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let opened = tokio::select! {
                _ = cancel.cancelled() => return,
                opened = self.open_socket() => opened,
            };

            match opened {
                Ok(socket) => {
                    self.set_state(NodeState::Connected);
                    self.reconnect_attempts.store(1, Ordering::SeqCst);
                    info!("✅ Nodo {} conectado", self.identifier());
                    self.emit(ManagerEvent::NodeConnect {
                        node: self.identifier().to_string(),
                    });

                    let (code, reason) = self.read_frames(socket, &cancel).await;
                    if cancel.is_cancelled() {
                        return;
                    }

                    self.set_state(NodeState::Disconnected);
                    warn!(
                        "🔌 Nodo {} desconectado: {} {}",
                        self.identifier(),
                        code,
                        reason
                    );
                    self.emit(ManagerEvent::NodeDisconnect {
                        node: self.identifier().to_string(),
                        code,
                        reason: reason.clone(),
                    });

                    if code == u16::from(CloseCode::Normal) && reason == DESTROY_REASON {
                        return;
                    }
                }
                Err(e) => {
                    error!("❌ Error conectando a nodo {}: {}", self.identifier(), e);
                    self.emit_error(&e);
                }
            }

            let attempt = self.reconnect_attempts.load(Ordering::SeqCst);
            if attempt >= self.options.retry_amount {
                let message = format!(
                    "No se pudo reconectar tras {} intentos",
                    attempt
                );
                error!("💀 Nodo {}: {}", self.identifier(), message);
                self.emit_error(message);
                self.destroy().await;
                return;
            }

            self.set_state(NodeState::Reconnecting);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_millis(self.options.retry_delay_ms)) => {}
            }

            self.set_state(NodeState::Connecting);
            info!(
                "🔄 Reconectando nodo {} (intento {})",
                self.identifier(),
                attempt
            );
            self.emit(ManagerEvent::NodeReconnect {
                node: self.identifier().to_string(),
                attempt,
            });
            self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn open_socket(&self) -> Result<Socket> {
        let (user_id, client_name) = {
            let manager = self.manager.upgrade().ok_or(Error::Destroyed("Manager"))?;
            let user_id = manager.user_id().ok_or(Error::MissingUserId)?;
            (user_id, manager.client_name().to_string())
        };

        let mut request = self.options.ws_url().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", header(&self.options.password)?);
        headers.insert("User-Id", header(&user_id)?);
        headers.insert("Client-Name", header(&client_name)?);
        if let Some(session_id) = self.rest.session_id() {
            headers.insert("Session-Id", header(&session_id)?);
        }

        let (socket, _) = connect_async(request).await?;
        Ok(socket)
    }

    /// Lee hasta el cierre y devuelve `(código, motivo)`
    async fn read_frames(&self, socket: Socket, cancel: &CancellationToken) -> (u16, String) {
        let (mut write, mut read) = socket.split();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: DESTROY_REASON.into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        debug!("Close frame no enviado a {}: {}", self.identifier(), e);
                    }
                    return (u16::from(CloseCode::Normal), DESTROY_REASON.to_string());
                }
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()).await,
                    Some(Ok(Message::Close(frame))) => {
                        return frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                            .unwrap_or((ABNORMAL_CLOSE, String::new()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("⚠️ Error leyendo del nodo {}: {}", self.identifier(), e);
                        self.emit_error(&e);
                        return (ABNORMAL_CLOSE, e.to_string());
                    }
                    None => return (ABNORMAL_CLOSE, String::new()),
                },
            }
        }
    }

    /// Procesa un frame de texto del nodo
    pub(crate) async fn handle_frame(&self, text: &str) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };

        let payload: Value = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("⚠️ Frame inválido de {}: {}", self.identifier(), e);
                self.emit_error(e);
                return;
            }
        };

        manager.emit(ManagerEvent::NodeRaw {
            node: self.identifier().to_string(),
            payload: payload.clone(),
        });

        let frame = match InboundFrame::parse(&payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("⚠️ {} en nodo {}", e, self.identifier());
                self.emit_error(e);
                return;
            }
        };

        match frame {
            InboundFrame::Ready(ready) => {
                info!(
                    "🤝 Nodo {} listo (sesión {}, resumed: {})",
                    self.identifier(),
                    ready.session_id,
                    ready.resumed
                );
                self.rest.set_session_id(Some(ready.session_id));
                if self.options.resume_status {
                    if let Err(e) = self
                        .rest
                        .update_session(true, self.options.resume_timeout_secs)
                        .await
                    {
                        warn!("⚠️ No se pudo activar resume en {}: {}", self.identifier(), e);
                        self.emit_error(e);
                    }
                }
            }
            InboundFrame::PlayerUpdate(update) => {
                if let Some(player) = self.bound_player(&manager, &update.guild_id) {
                    player.set_position(update.state.position).await;
                }
            }
            InboundFrame::Stats(stats) => {
                debug!(
                    "📊 Nodo {}: {} players, carga {:.1}%",
                    self.identifier(),
                    stats.players,
                    stats.load_percent()
                );
                self.set_stats(stats);
            }
            InboundFrame::Event { guild_id, event } => {
                let Some(player) = guild_id.and_then(|id| self.bound_player(&manager, &id)) else {
                    return;
                };
                if let Err(e) = player.handle_event(event).await {
                    warn!(
                        "⚠️ Error procesando evento en guild {}: {}",
                        player.guild_id(),
                        e
                    );
                    self.emit_error(e);
                }
            }
        }
    }

    /// Player del guild sólo si sigue asignado a este nodo; tras un
    /// `move_node` los frames tardíos del nodo anterior se descartan
    fn bound_player(&self, manager: &Manager, guild_id: &str) -> Option<Arc<Player>> {
        let player = manager.player(guild_id)?;
        if std::ptr::eq(Arc::as_ptr(&player.node()), self) {
            Some(player)
        } else {
            debug!(
                "🔀 Frame de {} ignorado: guild {} está en otro nodo",
                self.identifier(),
                guild_id
            );
            None
        }
    }

    /// Destruye el nodo: sus players, el socket y la tarea de reconexión
    pub async fn destroy(self: &Arc<Self>) {
        {
            let mut state = self.state.write();
            if *state == NodeState::Destroyed {
                return;
            }
            *state = NodeState::Destroyed;
        }

        let manager = self.manager.upgrade();
        if let Some(manager) = &manager {
            for player in manager.players_on(self.identifier()) {
                if let Err(e) = player.destroy(false).await {
                    warn!(
                        "⚠️ Error destruyendo player {} del nodo {}: {}",
                        player.guild_id(),
                        self.identifier(),
                        e
                    );
                }
            }
        }

        self.cancel.lock().cancel();

        if let Some(manager) = manager {
            manager.remove_node(self.identifier());
            manager.emit(ManagerEvent::NodeDestroy {
                node: self.identifier().to_string(),
            });
        }
        info!("🗑️ Nodo {} destruido", self.identifier());
    }
}

fn header(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidArgument(format!("Cabecera inválida: {}", e)))
}
