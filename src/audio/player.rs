use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::queue::Queue;
use super::track::QueueTrack;
use crate::error::{Error, Result};
use crate::lavalink::protocol::{
    NodeEvent, TrackEndReason, TrackException, UpdatePlayer, UpdatePlayerTrack, VoicePayload,
};
use crate::lavalink::Node;
use crate::manager::events::ManagerEvent;
use crate::manager::voice::{voice_state_payload, VoiceCredentials};
use crate::manager::{Manager, WeakManager};

const MAX_VOLUME: i32 = 1000;
const DEFAULT_VOLUME: u16 = 100;

/// Opciones para crear un player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOptions {
    pub guild_id: String,
    pub voice_channel: Option<String>,
    pub text_channel: Option<String>,
    /// Nodo fijo; sin él se usa la estrategia de selección del manager
    pub node: Option<String>,
    pub volume: Option<u16>,
    pub self_mute: bool,
    pub self_deafen: bool,
}

impl PlayerOptions {
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            voice_channel: None,
            text_channel: None,
            node: None,
            volume: None,
            self_mute: false,
            self_deafen: true,
        }
    }

    pub fn with_voice_channel(mut self, channel: impl Into<String>) -> Self {
        self.voice_channel = Some(channel.into());
        self
    }

    pub fn with_text_channel(mut self, channel: impl Into<String>) -> Self {
        self.text_channel = Some(channel.into());
        self
    }

    pub fn on_node(mut self, identifier: impl Into<String>) -> Self {
        self.node = Some(identifier.into());
        self
    }

    pub fn with_volume(mut self, volume: u16) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.guild_id.trim().is_empty() {
            return Err(Error::InvalidArgument("El player necesita un guild id".to_string()));
        }
        if self.voice_channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(Error::InvalidArgument("Canal de voz vacío".to_string()));
        }
        if self.text_channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(Error::InvalidArgument("Canal de texto vacío".to_string()));
        }
        Ok(())
    }
}

/// Estado de la conexión de voz del player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Destroying,
}

/// Opciones de `play`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayOptions {
    /// Posición inicial en ms
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    /// No reemplazar el track si el nodo ya está reproduciendo uno
    pub no_replace: bool,
}

#[derive(Debug)]
struct PlayerState {
    queue: Queue,
    connection: ConnectionState,
    voice_channel: Option<String>,
    text_channel: Option<String>,
    self_mute: bool,
    self_deafen: bool,
    volume: u16,
    paused: bool,
    playing: bool,
    position: u64,
    track_repeat: bool,
    queue_repeat: bool,
    shuffle: bool,
    /// Último payload de filtros aceptado por el nodo
    filters: Value,
    voice: VoiceCredentials,
    /// Últimas credenciales aceptadas por el nodo
    pushed_voice: Option<VoicePayload>,
    data: HashMap<String, Value>,
}

/// Qué hacer tras un `TrackEndEvent`
enum AfterEnd {
    NotifyOnly,
    Next,
    QueueEnd,
}

/// Sesión de reproducción de un guild.
///
/// Toda mutación (comandos y eventos del nodo) pasa por `ops`, así que un
/// evento nunca se intercala con un comando a medio aplicar. El estado vive
/// detrás de un mutex síncrono que nunca se mantiene durante un `.await`.
pub struct Player {
    guild_id: String,
    manager: WeakManager,
    node: RwLock<Arc<Node>>,
    state: Mutex<PlayerState>,
    ops: tokio::sync::Mutex<()>,
    destroyed: AtomicBool,
}

impl Player {
    pub(crate) fn new(options: PlayerOptions, node: Arc<Node>, manager: WeakManager) -> Self {
        Self {
            guild_id: options.guild_id,
            manager,
            node: RwLock::new(node),
            state: Mutex::new(PlayerState {
                queue: Queue::new(),
                connection: ConnectionState::Disconnected,
                voice_channel: options.voice_channel,
                text_channel: options.text_channel,
                self_mute: options.self_mute,
                self_deafen: options.self_deafen,
                volume: options.volume.unwrap_or(DEFAULT_VOLUME).min(MAX_VOLUME as u16),
                paused: false,
                playing: false,
                position: 0,
                track_repeat: false,
                queue_repeat: false,
                shuffle: false,
                filters: Value::Object(Default::default()),
                voice: VoiceCredentials::default(),
                pushed_voice: None,
                data: HashMap::new(),
            }),
            ops: tokio::sync::Mutex::new(()),
            destroyed: AtomicBool::new(false),
        }
    }

    // Lectura

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn node(&self) -> Arc<Node> {
        Arc::clone(&self.node.read())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    pub fn voice_channel(&self) -> Option<String> {
        self.state.lock().voice_channel.clone()
    }

    pub fn text_channel(&self) -> Option<String> {
        self.state.lock().text_channel.clone()
    }

    pub fn volume(&self) -> u16 {
        self.state.lock().volume
    }

    pub fn paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Posición en ms según el último `playerUpdate`
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    pub fn track_repeat(&self) -> bool {
        self.state.lock().track_repeat
    }

    pub fn queue_repeat(&self) -> bool {
        self.state.lock().queue_repeat
    }

    pub fn shuffle(&self) -> bool {
        self.state.lock().shuffle
    }

    pub fn filters(&self) -> Value {
        self.state.lock().filters.clone()
    }

    pub fn current(&self) -> Option<QueueTrack> {
        self.state.lock().queue.current().cloned()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Acceso de sólo lectura a la cola
    pub fn with_queue<R>(&self, f: impl FnOnce(&Queue) -> R) -> R {
        f(&self.state.lock().queue)
    }

    /// Edita la cola (agregar, quitar, limpiar). No dispara reproducción.
    pub async fn queue_mut<R>(&self, f: impl FnOnce(&mut Queue) -> R) -> R {
        let _op = self.ops.lock().await;
        f(&mut self.state.lock().queue)
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.state.lock().data.get(key).cloned()
    }

    pub async fn set_data(&self, key: impl Into<String>, value: Value) {
        let _op = self.ops.lock().await;
        self.state.lock().data.insert(key.into(), value);
    }

    // Ajustes locales

    pub async fn set_voice_channel(&self, channel: impl Into<String>) -> Result<()> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(Error::InvalidArgument("Canal de voz vacío".to_string()));
        }
        let _op = self.ops.lock().await;
        self.state.lock().voice_channel = Some(channel);
        Ok(())
    }

    pub async fn set_text_channel(&self, channel: impl Into<String>) -> Result<()> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(Error::InvalidArgument("Canal de texto vacío".to_string()));
        }
        let _op = self.ops.lock().await;
        self.state.lock().text_channel = Some(channel);
        Ok(())
    }

    /// Repite el track actual; desactiva la repetición de cola
    pub async fn set_track_repeat(&self, repeat: bool) {
        let _op = self.ops.lock().await;
        let mut state = self.state.lock();
        state.track_repeat = repeat;
        if repeat {
            state.queue_repeat = false;
        }
    }

    /// Repite la cola completa; desactiva la repetición de track
    pub async fn set_queue_repeat(&self, repeat: bool) {
        let _op = self.ops.lock().await;
        let mut state = self.state.lock();
        state.queue_repeat = repeat;
        if repeat {
            state.track_repeat = false;
        }
    }

    /// Activa o desactiva el modo aleatorio y reordena la cola en el acto
    pub async fn set_shuffle_play(&self, shuffle: bool) {
        let _op = self.ops.lock().await;
        let mut state = self.state.lock();
        state.shuffle = shuffle;
        if shuffle {
            state.queue.shuffle();
        } else {
            state.queue.unshuffle();
        }
    }

    pub(crate) async fn set_position(&self, position: u64) {
        let _op = self.ops.lock().await;
        self.state.lock().position = position;
    }

    // Helpers

    fn manager(&self) -> Result<Manager> {
        self.manager.upgrade().ok_or(Error::Destroyed("Manager"))
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed("Player"));
        }
        Ok(())
    }

    fn emit(&self, event: ManagerEvent) {
        if let Some(manager) = self.manager.upgrade() {
            manager.emit(event);
        }
    }

    async fn update(&self, body: &UpdatePlayer, no_replace: bool) -> Result<()> {
        let node = self.node();
        node.rest()
            .update_player(&self.guild_id, body, no_replace)
            .await?;
        Ok(())
    }

    // Voz

    /// Pide al gateway entrar al canal de voz configurado
    pub async fn connect(&self) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;

        let (channel, mute, deafen) = {
            let mut state = self.state.lock();
            let channel = state.voice_channel.clone().ok_or(Error::NoVoiceChannel)?;
            state.connection = ConnectionState::Connecting;
            (channel, state.self_mute, state.self_deafen)
        };

        let payload = voice_state_payload(&self.guild_id, Some(&channel), mute, deafen);
        let gateway = self.manager()?.voice_gateway();
        if let Err(e) = gateway.send(&self.guild_id, payload).await {
            self.state.lock().connection = ConnectionState::Disconnected;
            return Err(Error::Gateway(e));
        }

        self.state.lock().connection = ConnectionState::Connected;
        info!("🔊 Conectado al canal {} en guild {}", channel, self.guild_id);
        Ok(())
    }

    /// Pausa y sale del canal de voz
    pub async fn disconnect(&self) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;
        self.disconnect_locked().await
    }

    async fn disconnect_locked(&self) -> Result<()> {
        let (mute, deafen) = {
            let mut state = self.state.lock();
            if state.voice_channel.is_none() {
                return Ok(());
            }
            state.connection = ConnectionState::Disconnecting;
            (state.self_mute, state.self_deafen)
        };

        self.pause_locked(true).await?;

        let payload = voice_state_payload(&self.guild_id, None, mute, deafen);
        let gateway = self.manager()?.voice_gateway();
        gateway
            .send(&self.guild_id, payload)
            .await
            .map_err(Error::Gateway)?;

        {
            let mut state = self.state.lock();
            state.voice_channel = None;
            state.connection = ConnectionState::Disconnected;
        }
        info!("🔇 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    pub(crate) async fn apply_voice_server(
        &self,
        token: String,
        endpoint: Option<String>,
    ) -> Result<()> {
        let _op = self.ops.lock().await;
        if self.is_destroyed() {
            return Ok(());
        }
        {
            let mut state = self.state.lock();
            state.voice.token = Some(token);
            state.voice.endpoint = endpoint;
        }
        self.push_voice().await
    }

    pub(crate) async fn apply_voice_state(
        &self,
        channel_id: Option<String>,
        session_id: String,
    ) -> Result<()> {
        let _op = self.ops.lock().await;
        if self.is_destroyed() {
            return Ok(());
        }

        let Some(channel) = channel_id else {
            let old_channel = {
                let mut state = self.state.lock();
                state.voice = VoiceCredentials::default();
                state.pushed_voice = None;
                state.connection = ConnectionState::Disconnected;
                state.voice_channel.take()
            };
            warn!("🔇 Bot desconectado del canal de voz en guild {}", self.guild_id);
            self.emit(ManagerEvent::PlayerDisconnect {
                guild_id: self.guild_id.clone(),
                old_channel,
            });
            return self.pause_locked(true).await;
        };

        let moved_from = {
            let mut state = self.state.lock();
            state.voice.session_id = Some(session_id);
            state.connection = ConnectionState::Connected;
            if state.voice_channel.as_deref() == Some(channel.as_str()) {
                None
            } else {
                Some(state.voice_channel.replace(channel.clone()))
            }
        };

        if let Some(old_channel) = moved_from {
            info!(
                "➡️ Player de guild {} movido a canal {}",
                self.guild_id, channel
            );
            self.emit(ManagerEvent::PlayerMove {
                guild_id: self.guild_id.clone(),
                old_channel,
                new_channel: channel,
            });
        }

        self.push_voice().await
    }

    /// Envía las credenciales al nodo si están completas y cambiaron
    async fn push_voice(&self) -> Result<()> {
        let payload = {
            let state = self.state.lock();
            match state.voice.complete() {
                Some(payload) if state.pushed_voice.as_ref() != Some(&payload) => payload,
                _ => return Ok(()),
            }
        };

        let body = UpdatePlayer {
            voice: Some(payload.clone()),
            ..Default::default()
        };
        self.update(&body, false).await?;

        self.state.lock().pushed_voice = Some(payload);
        debug!("🎙️ Credenciales de voz enviadas para guild {}", self.guild_id);
        Ok(())
    }

    // Reproducción

    /// Reproduce `track` (o el actual de la cola si es `None`)
    pub async fn play(&self, track: Option<QueueTrack>, options: PlayOptions) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;

        if let Some(track) = track {
            track.validate()?;
            self.state.lock().queue.set_current(track);
        }
        self.play_current(options).await
    }

    /// Resuelve el actual si hace falta y lo envía al nodo. Los tracks que no
    /// se pueden resolver se saltan; si la cola se agota se emite `QueueEnd`.
    async fn play_current(&self, options: PlayOptions) -> Result<()> {
        loop {
            let current = self.current().ok_or(Error::NoCurrentTrack)?;

            let track = match &current {
                QueueTrack::Resolved(track) => track.clone(),
                QueueTrack::Unresolved(unresolved) => {
                    let manager = self.manager()?;
                    match unresolved.resolve(&manager).await {
                        Ok(track) => {
                            self.state
                                .lock()
                                .queue
                                .replace_current(&current, QueueTrack::Resolved(track.clone()));
                            track
                        }
                        Err(e) => {
                            warn!("❌ No se pudo resolver '{}': {}", current.title(), e);
                            manager.emit(ManagerEvent::TrackError {
                                guild_id: self.guild_id.clone(),
                                track: Some(current.clone()),
                                error: TrackException {
                                    message: Some(e.to_string()),
                                    severity: "common".to_string(),
                                    cause: "resolve".to_string(),
                                },
                            });

                            let has_next = self.state.lock().queue.advance().is_some();
                            if !has_next {
                                self.end_queue(Some(current.clone()));
                                return Ok(());
                            }
                            continue;
                        }
                    }
                }
            };

            let volume = self.volume();
            let body = UpdatePlayer {
                track: Some(UpdatePlayerTrack::encoded(track.encoded.clone())),
                position: options.start_time,
                end_time: options.end_time,
                volume: Some(volume),
                ..Default::default()
            };
            self.update(&body, options.no_replace).await?;

            {
                let mut state = self.state.lock();
                state.playing = true;
                state.position = options.start_time.unwrap_or(0);
            }
            info!("🎵 Reproduciendo: {} (guild {})", track.title, self.guild_id);
            return Ok(());
        }
    }

    /// Detiene el track actual, saltando antes `amount - 1` de la cola
    pub async fn stop(&self, amount: Option<usize>) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;
        self.stop_locked(amount).await
    }

    async fn stop_locked(&self, amount: Option<usize>) -> Result<()> {
        if let Some(amount) = amount.filter(|a| *a > 1) {
            let mut state = self.state.lock();
            if amount - 1 > state.queue.len() {
                return Err(Error::InvalidArgument(format!(
                    "No se pueden saltar {} tracks, la cola tiene {}",
                    amount - 1,
                    state.queue.len()
                )));
            }
            state.queue.remove_range(0, amount - 1)?;
        }

        let body = UpdatePlayer {
            track: Some(UpdatePlayerTrack::stop()),
            ..Default::default()
        };
        self.update(&body, false).await?;
        debug!("⏹️ Track detenido en guild {}", self.guild_id);
        Ok(())
    }

    /// Pausa o reanuda. No hace nada si ya está en ese estado o no hay tracks.
    pub async fn pause(&self, pause: bool) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;
        self.pause_locked(pause).await
    }

    async fn pause_locked(&self, pause: bool) -> Result<()> {
        {
            let state = self.state.lock();
            if state.paused == pause || state.queue.total_size() == 0 {
                return Ok(());
            }
        }

        let body = UpdatePlayer {
            paused: Some(pause),
            ..Default::default()
        };
        self.update(&body, false).await?;

        {
            let mut state = self.state.lock();
            state.paused = pause;
            state.playing = !pause;
        }
        info!(
            "{} Guild {}",
            if pause { "⏸️ Pausado" } else { "▶️ Reanudado" },
            self.guild_id
        );
        Ok(())
    }

    /// Salta a `position` ms, acotado a la duración del track actual
    pub async fn seek(&self, position: i64) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;

        let Some(duration) = self.current().map(|t| t.duration()) else {
            return Ok(());
        };
        let position = u64::try_from(position.max(0)).unwrap_or(0).min(duration);

        let body = UpdatePlayer {
            position: Some(position),
            ..Default::default()
        };
        self.update(&body, false).await?;
        self.state.lock().position = position;
        debug!("⏩ Seek a {} ms en guild {}", position, self.guild_id);
        Ok(())
    }

    /// Volumen acotado a 0..=1000
    pub async fn set_volume(&self, volume: i32) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;

        let volume = u16::try_from(volume.clamp(0, MAX_VOLUME)).unwrap_or(DEFAULT_VOLUME);
        let body = UpdatePlayer {
            volume: Some(volume),
            ..Default::default()
        };
        self.update(&body, false).await?;
        self.state.lock().volume = volume;
        info!("🔊 Volumen {} en guild {}", volume, self.guild_id);
        Ok(())
    }

    /// Envía los filtros tal cual al nodo. Acepta un [`Filters`](super::filters::Filters) o cualquier
    /// JSON (`channelMix`, `distortion`, `pluginFilters`...).
    pub async fn set_filters(&self, filters: impl Into<Value>) -> Result<()> {
        let filters = filters.into();
        if !filters.is_object() {
            return Err(Error::InvalidArgument(
                "Los filtros deben ser un objeto JSON".to_string(),
            ));
        }

        let _op = self.ops.lock().await;
        self.ensure_alive()?;

        let body = UpdatePlayer {
            filters: Some(filters.clone()),
            ..Default::default()
        };
        self.update(&body, false).await?;
        self.state.lock().filters = filters;
        Ok(())
    }

    pub async fn clear_filters(&self) -> Result<()> {
        self.set_filters(Value::Object(Default::default())).await
    }

    /// Vuelve a reproducir el track anterior
    pub async fn previous(&self) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;

        let stepped = self.state.lock().queue.step_back().is_some();
        if !stepped {
            return Err(Error::InvalidArgument("No hay track anterior".to_string()));
        }
        self.play_current(PlayOptions::default()).await
    }

    /// Mueve la sesión a otro nodo conservando track, posición y ajustes
    pub async fn move_node(&self, identifier: &str) -> Result<()> {
        let _op = self.ops.lock().await;
        self.ensure_alive()?;

        let target = self
            .manager()?
            .node(identifier)
            .filter(|node| node.is_connected())
            .ok_or_else(|| Error::NodeNotFound(identifier.to_string()))?;
        let old = self.node();
        if Arc::ptr_eq(&old, &target) {
            return Ok(());
        }

        if let Err(e) = old.rest().destroy_player(&self.guild_id).await {
            warn!(
                "⚠️ No se pudo borrar el player {} del nodo {}: {}",
                self.guild_id,
                old.identifier(),
                e
            );
        }
        *self.node.write() = Arc::clone(&target);

        let body = {
            let mut state = self.state.lock();
            state.pushed_voice = None;
            UpdatePlayer {
                track: state
                    .queue
                    .current()
                    .and_then(QueueTrack::as_resolved)
                    .map(|t| UpdatePlayerTrack::encoded(t.encoded.clone())),
                position: Some(state.position),
                volume: Some(state.volume),
                paused: Some(state.paused),
                filters: Some(state.filters.clone()),
                voice: state.voice.complete(),
                ..Default::default()
            }
        };
        self.update(&body, false).await?;
        self.state.lock().pushed_voice = body.voice;

        info!(
            "🚚 Player de guild {} movido de {} a {}",
            self.guild_id,
            old.identifier(),
            target.identifier()
        );
        Ok(())
    }

    /// Destruye el player. Siempre sale del pool, aunque falle el nodo.
    pub async fn destroy(&self, disconnect: bool) -> Result<()> {
        let _op = self.ops.lock().await;
        if self.is_destroyed() {
            return Ok(());
        }
        self.state.lock().connection = ConnectionState::Destroying;

        let mut result = Ok(());
        if disconnect {
            if let Err(e) = self.disconnect_locked().await {
                warn!("⚠️ Error desconectando guild {}: {}", self.guild_id, e);
                result = Err(e);
            }
        }

        if let Err(e) = self.node().rest().destroy_player(&self.guild_id).await {
            warn!("⚠️ Error borrando player {} en el nodo: {}", self.guild_id, e);
            if result.is_ok() {
                result = Err(e);
            }
        }

        self.destroyed.store(true, Ordering::SeqCst);
        if let Some(manager) = self.manager.upgrade() {
            manager.remove_player(&self.guild_id);
            manager.emit(ManagerEvent::PlayerDestroy {
                guild_id: self.guild_id.clone(),
            });
        }
        info!("🗑️ Player de guild {} destruido", self.guild_id);
        result
    }

    // Eventos del nodo

    pub(crate) async fn handle_event(&self, event: NodeEvent) -> Result<()> {
        let _op = self.ops.lock().await;
        if self.is_destroyed() {
            return Ok(());
        }
        let current = self.current();

        match event {
            NodeEvent::TrackStart => {
                {
                    let mut state = self.state.lock();
                    state.playing = true;
                    state.paused = false;
                }
                if let Some(track) = &current {
                    debug!("▶️ Track iniciado: {}", track.title());
                }
                self.emit(ManagerEvent::TrackStart {
                    guild_id: self.guild_id.clone(),
                    track: current,
                });
                Ok(())
            }
            NodeEvent::TrackEnd { reason } => self.track_end(current, reason).await,
            NodeEvent::TrackStuck { threshold_ms } => {
                warn!("⚠️ Track atascado en guild {} ({} ms)", self.guild_id, threshold_ms);
                let stopped = self.stop_locked(None).await;
                self.emit(ManagerEvent::TrackStuck {
                    guild_id: self.guild_id.clone(),
                    track: current,
                    threshold_ms,
                });
                stopped
            }
            NodeEvent::TrackException { exception } => {
                warn!(
                    "❌ Error de reproducción en guild {}: {}",
                    self.guild_id,
                    exception.describe()
                );
                let stopped = self.stop_locked(None).await;
                self.emit(ManagerEvent::TrackError {
                    guild_id: self.guild_id.clone(),
                    track: current,
                    error: exception,
                });
                stopped
            }
            NodeEvent::WebSocketClosed {
                code,
                reason,
                by_remote,
            } => {
                warn!(
                    "🔌 Socket de voz cerrado en guild {}: {} {}",
                    self.guild_id, code, reason
                );
                self.emit(ManagerEvent::SocketClosed {
                    guild_id: self.guild_id.clone(),
                    code,
                    reason,
                    by_remote,
                });
                Ok(())
            }
        }
    }

    async fn track_end(&self, ended: Option<QueueTrack>, reason: TrackEndReason) -> Result<()> {
        let autoplay = self.manager()?.options().autoplay;

        let after = {
            let mut state = self.state.lock();
            let advance = |queue: &mut Queue| {
                if queue.advance().is_some() {
                    AfterEnd::Next
                } else {
                    AfterEnd::QueueEnd
                }
            };

            match reason {
                TrackEndReason::LoadFailed | TrackEndReason::Cleanup => advance(&mut state.queue),
                TrackEndReason::Replaced => AfterEnd::NotifyOnly,
                _ if state.track_repeat => {
                    if reason == TrackEndReason::Stopped {
                        advance(&mut state.queue)
                    } else if state.queue.current().is_some() {
                        AfterEnd::Next
                    } else {
                        AfterEnd::QueueEnd
                    }
                }
                _ if state.queue_repeat => {
                    if reason == TrackEndReason::Stopped {
                        advance(&mut state.queue)
                    } else if state.queue.rotate().is_some() {
                        AfterEnd::Next
                    } else {
                        AfterEnd::QueueEnd
                    }
                }
                _ if !state.queue.is_empty() => advance(&mut state.queue),
                _ => AfterEnd::QueueEnd,
            }
        };

        match after {
            AfterEnd::NotifyOnly => {
                self.emit(ManagerEvent::TrackEnd {
                    guild_id: self.guild_id.clone(),
                    track: ended,
                    reason,
                });
                Ok(())
            }
            AfterEnd::Next => {
                self.emit(ManagerEvent::TrackEnd {
                    guild_id: self.guild_id.clone(),
                    track: ended,
                    reason,
                });
                if autoplay {
                    self.play_current(PlayOptions::default()).await?;
                }
                Ok(())
            }
            AfterEnd::QueueEnd => {
                self.end_queue(ended);
                Ok(())
            }
        }
    }

    fn end_queue(&self, ended: Option<QueueTrack>) {
        {
            let mut state = self.state.lock();
            state.queue.finish();
            state.playing = false;
        }
        info!("📭 Cola terminada en guild {}", self.guild_id);
        self.emit(ManagerEvent::QueueEnd {
            guild_id: self.guild_id.clone(),
            track: ended,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::UnresolvedTrack;
    use crate::manager::voice::MockVoiceGateway;
    use crate::manager::ManagerOptions;
    use crate::testing::{
        add_fake_node, manager_options, manager_with_node, track, unresolved, FakeTransport,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn drain(rx: &mut broadcast::Receiver<ManagerEvent>) -> Vec<ManagerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn ids(player: &Player) -> Vec<String> {
        player.with_queue(|q| q.iter().map(|t| t.sort_key().to_string()).collect())
    }

    fn current_id(player: &Player) -> Option<String> {
        player.current().map(|t| t.sort_key().to_string())
    }

    fn played(transport: &FakeTransport) -> Vec<String> {
        transport
            .patches()
            .iter()
            .filter_map(|r| r.body.as_ref()?["track"]["encoded"].as_str().map(str::to_string))
            .collect()
    }

    /// Player con C sonando y [A, B] en cola
    async fn playing_c(
        options: ManagerOptions,
    ) -> (Manager, Arc<Player>, Arc<FakeTransport>) {
        let (manager, _, transport, _) = manager_with_node(options);
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();
        player
            .queue_mut(|q| -> Result<()> {
                q.add(track("c", 3000), None)?;
                q.add_many(vec![track("a", 1000).into(), track("b", 2000).into()], None)
            })
            .await
            .unwrap();
        player.play(None, PlayOptions::default()).await.unwrap();
        transport.clear();
        (manager, player, transport)
    }

    fn finished() -> NodeEvent {
        NodeEvent::TrackEnd {
            reason: TrackEndReason::Finished,
        }
    }

    #[tokio::test]
    async fn test_finished_advances_and_autoplays() {
        let (manager, player, transport) = playing_c(manager_options()).await;
        let mut rx = manager.subscribe();

        player.handle_event(finished()).await.unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("a"));
        assert_eq!(
            player.with_queue(|q| q.previous().cloned()),
            Some(track("c", 3000).into())
        );
        assert_eq!(ids(&player), vec!["b"]);
        assert_eq!(
            drain(&mut rx),
            vec![ManagerEvent::TrackEnd {
                guild_id: "42".to_string(),
                track: Some(track("c", 3000).into()),
                reason: TrackEndReason::Finished,
            }]
        );
        assert_eq!(played(&transport), vec!["enc-a"]);
    }

    #[tokio::test]
    async fn test_finished_without_autoplay_only_advances() {
        let options = ManagerOptions {
            autoplay: false,
            ..manager_options()
        };
        let (_manager, player, transport) = playing_c(options).await;

        player.handle_event(finished()).await.unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("a"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_track_repeat_replays_current() {
        let (_manager, player, transport) = playing_c(manager_options()).await;
        player.set_track_repeat(true).await;

        player.handle_event(finished()).await.unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("c"));
        assert_eq!(ids(&player), vec!["a", "b"]);
        assert_eq!(played(&transport), vec!["enc-c"]);
    }

    #[tokio::test]
    async fn test_track_repeat_stopped_advances() {
        let (_manager, player, transport) = playing_c(manager_options()).await;
        player.set_track_repeat(true).await;

        player
            .handle_event(NodeEvent::TrackEnd {
                reason: TrackEndReason::Stopped,
            })
            .await
            .unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("a"));
        assert_eq!(played(&transport), vec!["enc-a"]);
    }

    #[tokio::test]
    async fn test_queue_repeat_rotates_current_to_the_back() {
        let (_manager, player, transport) = playing_c(manager_options()).await;
        player.set_queue_repeat(true).await;

        player.handle_event(finished()).await.unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("a"));
        assert_eq!(ids(&player), vec!["b", "c"]);
        assert_eq!(played(&transport), vec!["enc-a"]);
    }

    #[tokio::test]
    async fn test_queue_repeat_stopped_advances_without_rotating() {
        let (_manager, player, transport) = playing_c(manager_options()).await;
        player.set_queue_repeat(true).await;

        player
            .handle_event(NodeEvent::TrackEnd {
                reason: TrackEndReason::Stopped,
            })
            .await
            .unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("a"));
        assert_eq!(ids(&player), vec!["b"]);
        assert_eq!(played(&transport), vec!["enc-a"]);
    }

    #[tokio::test]
    async fn test_load_failed_and_cleanup_advance_with_queue_left() {
        for reason in [TrackEndReason::LoadFailed, TrackEndReason::Cleanup] {
            let (manager, player, transport) = playing_c(manager_options()).await;
            player.set_track_repeat(true).await;
            let mut rx = manager.subscribe();

            player
                .handle_event(NodeEvent::TrackEnd { reason })
                .await
                .unwrap();

            assert_eq!(current_id(&player).as_deref(), Some("a"));
            assert_eq!(ids(&player), vec!["b"]);
            assert_eq!(played(&transport), vec!["enc-a"]);
            assert_eq!(
                drain(&mut rx),
                vec![ManagerEvent::TrackEnd {
                    guild_id: "42".to_string(),
                    track: Some(track("c", 3000).into()),
                    reason,
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_track_exception_stops_and_reports() {
        let (manager, player, transport) = playing_c(manager_options()).await;
        let mut rx = manager.subscribe();
        let exception = TrackException {
            message: Some("Video no disponible".to_string()),
            severity: "common".to_string(),
            cause: "FriendlyException".to_string(),
        };

        player
            .handle_event(NodeEvent::TrackException {
                exception: exception.clone(),
            })
            .await
            .unwrap();

        let patches = transport.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].body, Some(json!({ "track": { "encoded": null } })));
        assert_eq!(
            drain(&mut rx),
            vec![ManagerEvent::TrackError {
                guild_id: "42".to_string(),
                track: Some(track("c", 3000).into()),
                error: exception,
            }]
        );
    }

    #[tokio::test]
    async fn test_socket_closed_only_notifies() {
        let (manager, player, transport) = playing_c(manager_options()).await;
        let mut rx = manager.subscribe();

        player
            .handle_event(NodeEvent::WebSocketClosed {
                code: 4006,
                reason: "Session is no longer valid.".to_string(),
                by_remote: true,
            })
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![ManagerEvent::SocketClosed {
                guild_id: "42".to_string(),
                code: 4006,
                reason: "Session is no longer valid.".to_string(),
                by_remote: true,
            }]
        );
        assert_eq!(current_id(&player).as_deref(), Some("c"));
        assert_eq!(ids(&player), vec!["a", "b"]);
        assert!(player.playing());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_replaced_only_notifies() {
        let (manager, player, transport) = playing_c(manager_options()).await;
        let mut rx = manager.subscribe();

        player
            .handle_event(NodeEvent::TrackEnd {
                reason: TrackEndReason::Replaced,
            })
            .await
            .unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("c"));
        assert_eq!(ids(&player), vec!["a", "b"]);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_end_of_queue_emits_queue_end() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();
        player
            .play(Some(track("c", 3000).into()), PlayOptions::default())
            .await
            .unwrap();
        transport.clear();
        let mut rx = manager.subscribe();

        player.handle_event(finished()).await.unwrap();

        assert_eq!(player.current(), None);
        assert!(!player.playing());
        assert_eq!(
            drain(&mut rx),
            vec![ManagerEvent::QueueEnd {
                guild_id: "42".to_string(),
                track: Some(track("c", 3000).into()),
            }]
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_load_failed_on_last_track_ends_queue() {
        let (manager, _, _, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();
        player
            .play(Some(track("c", 3000).into()), PlayOptions::default())
            .await
            .unwrap();
        let mut rx = manager.subscribe();

        player
            .handle_event(NodeEvent::TrackEnd {
                reason: TrackEndReason::LoadFailed,
            })
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [ManagerEvent::QueueEnd { .. }]));
        assert_eq!(player.current(), None);
    }

    #[tokio::test]
    async fn test_stuck_track_is_stopped() {
        let (manager, player, transport) = playing_c(manager_options()).await;
        let mut rx = manager.subscribe();

        player
            .handle_event(NodeEvent::TrackStuck { threshold_ms: 10_000 })
            .await
            .unwrap();

        let patches = transport.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].body, Some(json!({ "track": { "encoded": null } })));
        assert_eq!(
            drain(&mut rx),
            vec![ManagerEvent::TrackStuck {
                guild_id: "42".to_string(),
                track: Some(track("c", 3000).into()),
                threshold_ms: 10_000,
            }]
        );
    }

    #[tokio::test]
    async fn test_track_start_sets_playing() {
        let (manager, player, _) = playing_c(manager_options()).await;
        let mut rx = manager.subscribe();

        player.handle_event(NodeEvent::TrackStart).await.unwrap();

        assert!(player.playing());
        assert!(!player.paused());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ManagerEvent::TrackStart { track: Some(_), .. }]
        ));
    }

    #[tokio::test]
    async fn test_play_sends_track_with_options() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        let player = manager
            .create_player(PlayerOptions::new("42").with_volume(50))
            .unwrap();

        player
            .play(
                Some(track("x", 5000).into()),
                PlayOptions {
                    start_time: Some(1000),
                    end_time: Some(4000),
                    no_replace: true,
                },
            )
            .await
            .unwrap();

        let patches = transport.patches();
        assert_eq!(patches[0].path, "/v4/sessions/session/players/42?noReplace=true");
        assert_eq!(
            patches[0].body,
            Some(json!({
                "track": { "encoded": "enc-x" },
                "position": 1000,
                "endTime": 4000,
                "volume": 50
            }))
        );
        assert!(player.playing());
        assert_eq!(player.position(), 1000);
    }

    #[tokio::test]
    async fn test_play_without_track_fails() {
        let (manager, _, _, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();
        assert!(matches!(
            player.play(None, PlayOptions::default()).await,
            Err(Error::NoCurrentTrack)
        ));
    }

    #[tokio::test]
    async fn test_play_resolves_unresolved_current() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        transport.respond(
            "/v4/loadtracks",
            json!({
                "loadType": "search",
                "data": [{
                    "encoded": "enc-found",
                    "info": { "identifier": "found", "title": "Song", "author": "Band", "length": 1000 }
                }]
            }),
        );
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();

        player
            .play(Some(unresolved("Song", Some("Band")).into()), PlayOptions::default())
            .await
            .unwrap();

        let current = player.current().unwrap();
        assert!(current.is_resolved());
        assert_eq!(current.sort_key(), "found");
        assert_eq!(played(&transport), vec!["enc-found"]);
    }

    #[tokio::test]
    async fn test_unresolvable_track_is_skipped_until_queue_end() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        transport.respond("/v4/loadtracks", json!({ "loadType": "empty", "data": {} }));
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();
        let missing: QueueTrack = UnresolvedTrack::new("Nothing").into();
        let mut rx = manager.subscribe();

        player
            .play(Some(missing.clone()), PlayOptions::default())
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ManagerEvent::TrackError { track: Some(t), error, .. }
                if *t == missing && error.cause == "resolve"
        ));
        assert_eq!(
            events[1],
            ManagerEvent::QueueEnd {
                guild_id: "42".to_string(),
                track: Some(missing),
            }
        );
        assert_eq!(player.current(), None);
        assert!(transport.patches().is_empty());
    }

    #[tokio::test]
    async fn test_stop_skips_amount_minus_one() {
        let (_manager, player, transport) = playing_c(manager_options()).await;

        player.stop(Some(2)).await.unwrap();

        assert_eq!(ids(&player), vec!["b"]);
        assert_eq!(
            transport.patches()[0].body,
            Some(json!({ "track": { "encoded": null } }))
        );
    }

    #[tokio::test]
    async fn test_stop_rejects_amount_beyond_queue() {
        let (_manager, player, transport) = playing_c(manager_options()).await;

        assert!(matches!(
            player.stop(Some(5)).await,
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(ids(&player), vec!["a", "b"]);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_pause_is_guarded() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();

        player.pause(true).await.unwrap();
        assert!(transport.requests().is_empty());
        assert!(!player.paused());

        player
            .queue_mut(|q| q.add(track("a", 1000), None))
            .await
            .unwrap();
        player.pause(true).await.unwrap();
        player.pause(true).await.unwrap();

        assert_eq!(transport.patches().len(), 1);
        assert_eq!(transport.patches()[0].body, Some(json!({ "paused": true })));
        assert!(player.paused());
        assert!(!player.playing());
    }

    #[tokio::test]
    async fn test_volume_is_clamped() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();

        player.set_volume(5000).await.unwrap();
        assert_eq!(player.volume(), 1000);
        player.set_volume(-3).await.unwrap();
        assert_eq!(player.volume(), 0);

        let volumes: Vec<_> = transport
            .patches()
            .iter()
            .map(|r| r.body.clone().unwrap()["volume"].clone())
            .collect();
        assert_eq!(volumes, vec![json!(1000), json!(0)]);
    }

    #[tokio::test]
    async fn test_seek_is_clamped_to_duration() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();

        player.seek(500).await.unwrap();
        assert!(transport.requests().is_empty());

        player
            .play(Some(track("a", 3000).into()), PlayOptions::default())
            .await
            .unwrap();
        transport.clear();

        player.seek(10_000).await.unwrap();
        assert_eq!(player.position(), 3000);
        player.seek(-5).await.unwrap();
        assert_eq!(player.position(), 0);
        assert_eq!(transport.patches()[0].body, Some(json!({ "position": 3000 })));
    }

    #[tokio::test]
    async fn test_repeat_modes_are_exclusive() {
        let (manager, _, _, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();

        player.set_track_repeat(true).await;
        player.set_queue_repeat(true).await;
        assert!(player.queue_repeat());
        assert!(!player.track_repeat());

        player.set_track_repeat(true).await;
        assert!(player.track_repeat());
        assert!(!player.queue_repeat());

        player.set_track_repeat(false).await;
        assert!(!player.track_repeat());
        assert!(!player.queue_repeat());
    }

    #[tokio::test]
    async fn test_shuffle_off_restores_insertion_order() {
        let (_manager, player, _) = playing_c(manager_options()).await;
        player
            .queue_mut(|q| -> Result<()> {
                for id in ["d", "e", "f", "g"] {
                    q.add(crate::testing::track_at(id, 10), None)?;
                }
                Ok(())
            })
            .await
            .unwrap();

        player.set_shuffle_play(true).await;
        assert!(player.shuffle());
        player.set_shuffle_play(false).await;

        assert_eq!(ids(&player), vec!["a", "b", "d", "e", "f", "g"]);
    }

    #[tokio::test]
    async fn test_local_setters_wait_for_running_operation() {
        let (_manager, player, _) = playing_c(manager_options()).await;

        let running = player.ops.lock().await;
        let shuffle = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            player.set_shuffle_play(true),
        )
        .await;
        assert!(shuffle.is_err());
        assert!(!player.shuffle());
        drop(running);

        player.set_shuffle_play(true).await;
        assert!(player.shuffle());
    }

    #[tokio::test]
    async fn test_filters_are_sent_verbatim() {
        let (manager, _, transport, _) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();
        let custom = json!({
            "channelMix": { "leftToLeft": 0.5, "leftToRight": 0.5, "rightToLeft": 0.5, "rightToRight": 0.5 },
            "distortion": { "sinScale": 1.0 },
            "pluginFilters": { "echo": { "delay": 0.3 } }
        });

        player.set_filters(custom.clone()).await.unwrap();
        player
            .set_filters(crate::audio::filters::Filters::new().with_rotation(0.2))
            .await
            .unwrap();

        let bodies: Vec<_> = transport
            .patches()
            .iter()
            .map(|r| r.body.clone().unwrap()["filters"].clone())
            .collect();
        assert_eq!(bodies[0], custom);
        assert_eq!(bodies[1], json!({ "rotation": { "rotationHz": 0.2f32 } }));
        assert_eq!(player.filters(), bodies[1]);

        assert!(matches!(
            player.set_filters(json!([1, 2])).await,
            Err(Error::InvalidArgument(_))
        ));
        player.clear_filters().await.unwrap();
        assert_eq!(player.filters(), json!({}));
    }

    #[tokio::test]
    async fn test_previous_replays_last_track() {
        let (_manager, player, transport) = playing_c(manager_options()).await;
        player.handle_event(finished()).await.unwrap();
        transport.clear();

        player.previous().await.unwrap();

        assert_eq!(current_id(&player).as_deref(), Some("c"));
        assert_eq!(ids(&player), vec!["a", "b"]);
        assert_eq!(played(&transport), vec!["enc-c"]);
        assert!(matches!(
            player.previous().await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_use_the_gateway() {
        let mut gateway = MockVoiceGateway::new();
        gateway
            .expect_send()
            .withf(|guild_id, payload| {
                guild_id.to_string() == "42" && payload["d"]["channel_id"] == "7"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_send()
            .withf(|guild_id, payload| {
                guild_id.to_string() == "42" && payload["d"]["channel_id"].is_null()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let manager = Manager::new(manager_options(), Arc::new(gateway));
        manager.set_user_id("bot");
        add_fake_node(&manager, "main");
        let player = manager
            .create_player(PlayerOptions::new("42").with_voice_channel("7"))
            .unwrap();

        player.connect().await.unwrap();
        assert_eq!(player.connection_state(), ConnectionState::Connected);

        player.disconnect().await.unwrap();
        assert_eq!(player.connection_state(), ConnectionState::Disconnected);
        assert_eq!(player.voice_channel(), None);
    }

    #[tokio::test]
    async fn test_connect_failure_resets_state() {
        let mut gateway = MockVoiceGateway::new();
        gateway
            .expect_send()
            .returning(|_, _| Err(anyhow::anyhow!("gateway caído")));

        let manager = Manager::new(manager_options(), Arc::new(gateway));
        manager.set_user_id("bot");
        add_fake_node(&manager, "main");
        let player = manager
            .create_player(PlayerOptions::new("42").with_voice_channel("7"))
            .unwrap();

        assert!(matches!(player.connect().await, Err(Error::Gateway(_))));
        assert_eq!(player.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_requires_voice_channel() {
        let (manager, _, _, gateway) = manager_with_node(manager_options());
        let player = manager.create_player(PlayerOptions::new("42")).unwrap();

        assert!(matches!(player.connect().await, Err(Error::NoVoiceChannel)));
        assert!(gateway.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_move_node_replays_on_target() {
        let (manager, player, old_transport) = playing_c(manager_options()).await;
        let (_, new_transport) = add_fake_node(&manager, "backup");
        player.set_position(1500).await;

        player.move_node("backup").await.unwrap();

        assert_eq!(player.node().identifier(), "backup");
        assert_eq!(old_transport.requests()[0].method, reqwest::Method::DELETE);
        let body = new_transport.patches()[0].body.clone().unwrap();
        assert_eq!(body["track"]["encoded"], "enc-c");
        assert_eq!(body["position"], 1500);
        assert_eq!(body["volume"], 100);

        assert!(matches!(
            player.move_node("ghost").await,
            Err(Error::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_destroyed_player_rejects_commands() {
        let (manager, player, _) = playing_c(manager_options()).await;

        player.destroy(false).await.unwrap();

        assert!(player.is_destroyed());
        assert!(manager.player("42").is_none());
        assert!(matches!(
            player.set_volume(10).await,
            Err(Error::Destroyed(_))
        ));
        assert!(player.handle_event(finished()).await.is_ok());
    }

    #[test]
    fn test_player_options_validation() {
        assert!(PlayerOptions::new("").validate().is_err());
        assert!(PlayerOptions::new("1").with_voice_channel(" ").validate().is_err());
        assert!(PlayerOptions::new("1").with_text_channel("2").validate().is_ok());
    }
}
