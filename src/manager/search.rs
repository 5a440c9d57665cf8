use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::audio::track::{Track, TrackField};
use crate::error::{Error, Result};
use crate::lavalink::protocol::{LoadResult, LoadType, TrackData, TrackException};

/// Plataformas de búsqueda y su prefijo en Lavalink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPlatform {
    #[default]
    YouTube,
    YouTubeMusic,
    SoundCloud,
    Spotify,
    Deezer,
    AppleMusic,
    Bandcamp,
}

impl SearchPlatform {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::YouTube => "ytsearch",
            Self::YouTubeMusic => "ytmsearch",
            Self::SoundCloud => "scsearch",
            Self::Spotify => "spsearch",
            Self::Deezer => "dzsearch",
            Self::AppleMusic => "amsearch",
            Self::Bandcamp => "bcsearch",
        }
    }

    const ALL: [Self; 7] = [
        Self::YouTube,
        Self::YouTubeMusic,
        Self::SoundCloud,
        Self::Spotify,
        Self::Deezer,
        Self::AppleMusic,
        Self::Bandcamp,
    ];
}

impl std::str::FromStr for SearchPlatform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let platform = match s.trim().to_lowercase().replace([' ', '_', '-'], "").as_str() {
            "youtube" | "yt" => Self::YouTube,
            "youtubemusic" | "ytm" => Self::YouTubeMusic,
            "soundcloud" | "sc" => Self::SoundCloud,
            "spotify" | "sp" => Self::Spotify,
            "deezer" | "dz" => Self::Deezer,
            "applemusic" | "am" => Self::AppleMusic,
            "bandcamp" | "bc" => Self::Bandcamp,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Plataforma de búsqueda desconocida: {}",
                    other
                )))
            }
        };
        Ok(platform)
    }
}

/// Consulta de búsqueda con plataforma opcional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub source: Option<SearchPlatform>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            source: None,
        }
    }

    pub fn on(mut self, source: SearchPlatform) -> Self {
        self.source = Some(source);
        self
    }

    /// Identificador para `loadtracks`: URLs y consultas ya prefijadas pasan
    /// intactas, el resto recibe el prefijo de la plataforma
    pub fn identifier(&self, default: SearchPlatform) -> String {
        let query = self.query.trim();
        if is_url(query) || has_search_prefix(query) {
            return query.to_string();
        }
        let platform = self.source.unwrap_or(default);
        format!("{}:{}", platform.prefix(), query)
    }
}

impl From<&str> for SearchQuery {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for SearchQuery {
    fn from(query: String) -> Self {
        Self::new(query)
    }
}

fn is_url(query: &str) -> bool {
    url::Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn has_search_prefix(query: &str) -> bool {
    query
        .split_once(':')
        .map(|(prefix, _)| SearchPlatform::ALL.iter().any(|p| p.prefix() == prefix))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistInfo {
    pub name: String,
    /// Índice del track seleccionado dentro de la playlist
    pub selected_track: Option<usize>,
    /// Duración total en ms
    pub duration: u64,
}

/// Resultado uniforme de una búsqueda
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub load_type: LoadType,
    pub tracks: Vec<Track>,
    pub playlist: Option<PlaylistInfo>,
    pub exception: Option<TrackException>,
}

impl SearchResult {
    pub(crate) fn from_load(
        result: LoadResult,
        requester: Option<Value>,
        partial: Option<&[TrackField]>,
    ) -> Result<Self> {
        let load_type = result.load_type();
        let build = |data: &[TrackData]| -> Result<Vec<Track>> {
            data.iter()
                .map(|d| Track::build(d, requester.clone(), partial))
                .collect()
        };

        let search = match result {
            LoadResult::Track(data) => Self {
                load_type,
                tracks: build(std::slice::from_ref(&data))?,
                playlist: None,
                exception: None,
            },
            LoadResult::Search(data) => Self {
                load_type,
                tracks: build(&data)?,
                playlist: None,
                exception: None,
            },
            LoadResult::Playlist(data) => {
                let tracks = build(&data.tracks)?;
                let duration = tracks.iter().map(|t| t.duration).sum();
                let selected_track = usize::try_from(data.info.selected_track)
                    .ok()
                    .filter(|index| *index < tracks.len());
                Self {
                    load_type,
                    playlist: Some(PlaylistInfo {
                        name: data.info.name,
                        selected_track,
                        duration,
                    }),
                    tracks,
                    exception: None,
                }
            }
            LoadResult::Empty => Self {
                load_type,
                tracks: Vec::new(),
                playlist: None,
                exception: None,
            },
            LoadResult::Error(exception) => {
                warn!("❌ Error al cargar tracks: {}", exception.describe());
                Self {
                    load_type,
                    tracks: Vec::new(),
                    playlist: None,
                    exception: Some(exception),
                }
            }
        };

        Ok(search)
    }
}
