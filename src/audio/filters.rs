use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};

/// Bandas del ecualizador de Lavalink (25 Hz … 16 kHz)
pub const EQ_BANDS: usize = 15;

/// Rango de ganancia aceptado por el nodo
const MIN_GAIN: f32 = -0.25;
const MAX_GAIN: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub band: u8,
    pub gain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timescale {
    pub speed: f32,
    pub pitch: f32,
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    pub rotation_hz: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Karaoke {
    pub level: f32,
    pub mono_level: f32,
    pub filter_band: f32,
    pub filter_width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tremolo {
    pub frequency: f32,
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LowPass {
    pub smoothing: f32,
}

/// Constructor tipado de los filtros más comunes. Para filtros que no
/// cubre (`channelMix`, `distortion`, `vibrato`, plugins) se puede pasar
/// el JSON directamente a `Player::set_filters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub equalizer: Vec<Band>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timescale: Option<Timescale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<Karaoke>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tremolo: Option<Tremolo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_pass: Option<LowPass>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ecualizador completo; cada ganancia debe estar en [-0.25, 1.0]
    pub fn with_equalizer(mut self, gains: [f32; EQ_BANDS]) -> Result<Self> {
        for (band, &gain) in gains.iter().enumerate() {
            if !(MIN_GAIN..=MAX_GAIN).contains(&gain) {
                return Err(Error::InvalidArgument(format!(
                    "Ganancia fuera de rango en banda {}: {} (debe estar entre {} y {})",
                    band, gain, MIN_GAIN, MAX_GAIN
                )));
            }
        }

        self.equalizer = gains
            .iter()
            .enumerate()
            .filter(|(_, gain)| **gain != 0.0)
            .map(|(band, &gain)| Band {
                band: band as u8,
                gain,
            })
            .collect();
        Ok(self)
    }

    pub fn with_timescale(mut self, speed: f32, pitch: f32, rate: f32) -> Self {
        self.timescale = Some(Timescale { speed, pitch, rate });
        self
    }

    pub fn with_rotation(mut self, rotation_hz: f32) -> Self {
        self.rotation = Some(Rotation { rotation_hz });
        self
    }

    pub fn with_karaoke(mut self) -> Self {
        self.karaoke = Some(Karaoke {
            level: 1.0,
            mono_level: 1.0,
            filter_band: 220.0,
            filter_width: 100.0,
        });
        self
    }

    pub fn with_tremolo(mut self, frequency: f32, depth: f32) -> Self {
        self.tremolo = Some(Tremolo { frequency, depth });
        self
    }

    pub fn with_low_pass(mut self, smoothing: f32) -> Self {
        self.low_pass = Some(LowPass { smoothing });
        self
    }

    /// Payload JSON opaco para [`Player::set_filters`](crate::audio::player::Player::set_filters)
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

impl From<Filters> for Value {
    fn from(filters: Filters) -> Self {
        filters.to_payload()
    }
}

/// Presets predefinidos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPreset {
    Normal,
    Bass,
    Pop,
    Rock,
    Nightcore,
    Vaporwave,
    EightD,
    Karaoke,
}

impl FilterPreset {
    /// Obtiene un preset por nombre
    pub fn get(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "normal" | "reset" => Some(Self::Normal),
            "bass" | "bassboost" => Some(Self::Bass),
            "pop" => Some(Self::Pop),
            "rock" => Some(Self::Rock),
            "nightcore" => Some(Self::Nightcore),
            "vaporwave" => Some(Self::Vaporwave),
            "8d" | "eightd" => Some(Self::EightD),
            "karaoke" => Some(Self::Karaoke),
            _ => None,
        }
    }

    /// Lista todos los presets disponibles
    pub fn list() -> Vec<&'static str> {
        vec![
            "normal",
            "bass",
            "pop",
            "rock",
            "nightcore",
            "vaporwave",
            "8d",
            "karaoke",
        ]
    }

    pub fn filters(self) -> Filters {
        let eq = |gains: [f32; EQ_BANDS]| {
            // los presets están dentro de rango
            Filters::new().with_equalizer(gains).unwrap_or_default()
        };

        let filters = match self {
            Self::Normal => Filters::new(),
            Self::Bass => eq([
                0.6, 0.67, 0.67, 0.4, -0.2, 0.15, -0.25, 0.23, 0.35, 0.45, 0.55, 0.6, 0.55, 0.0,
                0.0,
            ]),
            Self::Pop => eq([
                -0.05, 0.1, 0.2, 0.25, 0.15, 0.0, -0.05, -0.05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ]),
            Self::Rock => eq([
                0.3, 0.25, 0.2, 0.1, 0.05, -0.05, -0.15, -0.2, -0.1, -0.05, 0.05, 0.1, 0.2, 0.25,
                0.3,
            ]),
            Self::Nightcore => Filters::new().with_timescale(1.3, 1.3, 1.0),
            Self::Vaporwave => Filters::new()
                .with_timescale(0.85, 0.8, 1.0)
                .with_tremolo(14.0, 0.3),
            Self::EightD => Filters::new().with_rotation(0.2),
            Self::Karaoke => Filters::new().with_karaoke(),
        };

        info!("🎛️ Preset de filtros: {:?}", self);
        filters
    }
}
