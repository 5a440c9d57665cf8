use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::lavalink::protocol::{LoadType, TrackData};
use crate::manager::{search::SearchQuery, Manager};

/// Margen aceptado al comparar la duración sugerida de un track no resuelto
const DURATION_TOLERANCE_MS: u64 = 1500;

/// Campos que se pueden conservar en modo parcial.
///
/// `encoded` y `created_at` siempre se conservan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackField {
    Identifier,
    Author,
    Title,
    Duration,
    IsStream,
    IsSeekable,
    Uri,
    ArtworkUrl,
    Isrc,
    SourceName,
    PluginInfo,
    Requester,
}

impl std::str::FromStr for TrackField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s.trim().to_lowercase().as_str() {
            "identifier" => Self::Identifier,
            "author" => Self::Author,
            "title" => Self::Title,
            "duration" | "length" => Self::Duration,
            "isstream" => Self::IsStream,
            "isseekable" => Self::IsSeekable,
            "uri" => Self::Uri,
            "artworkurl" | "thumbnail" => Self::ArtworkUrl,
            "isrc" => Self::Isrc,
            "sourcename" => Self::SourceName,
            "plugininfo" => Self::PluginInfo,
            "requester" => Self::Requester,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Campo de track desconocido: {}",
                    other
                )))
            }
        };
        Ok(field)
    }
}

/// Track resuelto y listo para reproducir
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub encoded: String,
    pub identifier: String,
    pub author: String,
    pub title: String,
    /// Duración en milisegundos
    pub duration: u64,
    pub is_stream: bool,
    pub is_seekable: bool,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
    pub plugin_info: Value,
    pub requester: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl Track {
    /// Construye un track a partir de los datos del nodo.
    ///
    /// Falla si faltan `encoded` o `info`. Con `partial` sólo se conservan
    /// los campos listados.
    pub fn build(
        data: &TrackData,
        requester: Option<Value>,
        partial: Option<&[TrackField]>,
    ) -> Result<Self> {
        let (encoded, info) = match (&data.encoded, &data.info) {
            (Some(encoded), Some(info)) if !encoded.is_empty() => (encoded, info),
            _ => {
                return Err(Error::InvalidArgument(
                    "No se proporcionaron datos de track".to_string(),
                ))
            }
        };

        let mut track = Self {
            encoded: encoded.clone(),
            identifier: info.identifier.clone(),
            author: info.author.clone(),
            title: info.title.clone(),
            duration: info.length,
            is_stream: info.is_stream,
            is_seekable: info.is_seekable,
            uri: info.uri.clone(),
            artwork_url: info.artwork_url.clone(),
            isrc: info.isrc.clone(),
            source_name: info.source_name.clone(),
            plugin_info: data.plugin_info.clone(),
            requester,
            created_at: Utc::now(),
        };

        if let Some(fields) = partial {
            track.retain_fields(fields);
        }

        Ok(track)
    }

    fn retain_fields(&mut self, fields: &[TrackField]) {
        let keep = |field: TrackField| fields.contains(&field);

        if !keep(TrackField::Identifier) {
            self.identifier.clear();
        }
        if !keep(TrackField::Author) {
            self.author.clear();
        }
        if !keep(TrackField::Title) {
            self.title.clear();
        }
        if !keep(TrackField::Duration) {
            self.duration = 0;
        }
        if !keep(TrackField::IsStream) {
            self.is_stream = false;
        }
        if !keep(TrackField::IsSeekable) {
            self.is_seekable = false;
        }
        if !keep(TrackField::Uri) {
            self.uri = None;
        }
        if !keep(TrackField::ArtworkUrl) {
            self.artwork_url = None;
        }
        if !keep(TrackField::Isrc) {
            self.isrc = None;
        }
        if !keep(TrackField::SourceName) {
            self.source_name.clear();
        }
        if !keep(TrackField::PluginInfo) {
            self.plugin_info = Value::Null;
        }
        if !keep(TrackField::Requester) {
            self.requester = None;
        }
    }
}

/// Track pendiente de búsqueda (título y, opcionalmente, autor y duración)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedTrack {
    pub title: String,
    pub author: Option<String>,
    /// Duración sugerida en milisegundos
    pub duration: Option<u64>,
    pub requester: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl UnresolvedTrack {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
            duration: None,
            requester: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub fn with_requester(mut self, requester: Value) -> Self {
        self.requester = Some(requester);
        self
    }

    fn search_query(&self) -> String {
        match &self.author {
            Some(author) => format!("{} - {}", author, self.title),
            None => self.title.clone(),
        }
    }

    /// Busca el track en el pool y elige el mejor candidato.
    ///
    /// Preferencias, en orden: autor o título exactos, duración dentro de
    /// ±1.5 s, primer resultado.
    pub async fn resolve(&self, manager: &Manager) -> Result<Track> {
        let query = self.search_query();
        debug!("🔎 Resolviendo track: {}", query);

        let result = manager
            .search(SearchQuery::new(query.clone()), self.requester.clone())
            .await?;

        if result.load_type != LoadType::Search {
            if let Some(exception) = result.exception {
                return Err(Error::Resolve(exception.describe()));
            }
            return Err(Error::Resolve(format!(
                "No se encontraron tracks para: {}",
                query
            )));
        }

        let track = self
            .pick(result.tracks)
            .ok_or_else(|| Error::Resolve(format!("No se encontraron tracks para: {}", query)))?;
        info!("✅ Track resuelto: {} -> {}", query, track.title);
        Ok(track)
    }

    fn pick(&self, tracks: Vec<Track>) -> Option<Track> {
        if let Some(author) = &self.author {
            let author = author.to_lowercase();
            let topic = format!("{} - topic", author);
            let title = self.title.to_lowercase();

            let original = tracks.iter().position(|track| {
                let candidate = track.author.to_lowercase();
                candidate == author || candidate == topic || track.title.to_lowercase() == title
            });
            if let Some(index) = original {
                return tracks.into_iter().nth(index);
            }
        }

        if let Some(duration) = self.duration {
            let low = duration.saturating_sub(DURATION_TOLERANCE_MS);
            let high = duration + DURATION_TOLERANCE_MS;
            let same_duration = tracks
                .iter()
                .position(|track| track.duration >= low && track.duration <= high);
            if let Some(index) = same_duration {
                return tracks.into_iter().nth(index);
            }
        }

        tracks.into_iter().next()
    }
}

/// Elemento de la cola: resuelto o pendiente de búsqueda
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueueTrack {
    Resolved(Track),
    Unresolved(UnresolvedTrack),
}

impl From<Track> for QueueTrack {
    fn from(track: Track) -> Self {
        Self::Resolved(track)
    }
}

impl From<UnresolvedTrack> for QueueTrack {
    fn from(track: UnresolvedTrack) -> Self {
        Self::Unresolved(track)
    }
}

impl QueueTrack {
    /// Validación compartida por la cola y el player
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Resolved(track) if track.encoded.is_empty() => Err(Error::InvalidArgument(
                "El track no tiene payload `encoded`".to_string(),
            )),
            Self::Unresolved(track) if track.title.trim().is_empty() => Err(
                Error::InvalidArgument("El track no resuelto necesita un título".to_string()),
            ),
            _ => Ok(()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Resolved(track) => &track.title,
            Self::Unresolved(track) => &track.title,
        }
    }

    pub fn author(&self) -> Option<&str> {
        match self {
            Self::Resolved(track) => Some(track.author.as_str()),
            Self::Unresolved(track) => track.author.as_deref(),
        }
    }

    /// Duración en ms; la sugerencia (o 0) para tracks no resueltos
    pub fn duration(&self) -> u64 {
        match self {
            Self::Resolved(track) => track.duration,
            Self::Unresolved(track) => track.duration.unwrap_or(0),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Resolved(track) => track.created_at,
            Self::Unresolved(track) => track.created_at,
        }
    }

    pub fn requester(&self) -> Option<&Value> {
        match self {
            Self::Resolved(track) => track.requester.as_ref(),
            Self::Unresolved(track) => track.requester.as_ref(),
        }
    }

    /// Identificador o, si no lo hay, el título
    pub fn sort_key(&self) -> &str {
        match self {
            Self::Resolved(track) if !track.identifier.is_empty() => &track.identifier,
            other => other.title(),
        }
    }

    pub fn as_resolved(&self) -> Option<&Track> {
        match self {
            Self::Resolved(track) => Some(track),
            Self::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}
