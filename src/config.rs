use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::track::TrackField;
use crate::lavalink::NodeOptions;
use crate::manager::search::SearchPlatform;
use crate::manager::{ManagerOptions, NodeSelection};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Bot
    pub bot_user_id: Option<String>,
    pub client_name: String,

    // Lavalink
    pub nodes: Vec<NodeOptions>,

    // Reproducción
    pub default_search_platform: SearchPlatform,
    pub enable_autoplay: bool,
    pub default_volume: u16,
    pub track_partial: Option<Vec<TrackField>>,
    pub node_selection: NodeSelection,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// variables (el entorno en `load`)
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let defaults = NodeOptions::default();

        let nodes = match get("LAVALINK_NODES").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => serde_json::from_str(&raw).context("LAVALINK_NODES no es un JSON válido")?,
            None => vec![NodeOptions {
                identifier: var("LAVALINK_IDENTIFIER", "main"),
                host: var("LAVALINK_HOST", &defaults.host),
                port: var("LAVALINK_PORT", "2333")
                    .parse()
                    .context("LAVALINK_PORT inválido")?,
                password: var("LAVALINK_PASSWORD", &defaults.password),
                secure: var("LAVALINK_SECURE", "false")
                    .parse()
                    .context("LAVALINK_SECURE inválido")?,
                retry_amount: var("RETRY_AMOUNT", "30")
                    .parse()
                    .context("RETRY_AMOUNT inválido")?,
                retry_delay_ms: var("RETRY_DELAY_MS", "5000")
                    .parse()
                    .context("RETRY_DELAY_MS inválido")?,
                request_timeout_ms: var("REQUEST_TIMEOUT_MS", "10000")
                    .parse()
                    .context("REQUEST_TIMEOUT_MS inválido")?,
                resume_status: var("RESUME_STATUS", "false")
                    .parse()
                    .context("RESUME_STATUS inválido")?,
                resume_timeout_secs: var("RESUME_TIMEOUT_SECS", "60")
                    .parse()
                    .context("RESUME_TIMEOUT_SECS inválido")?,
            }],
        };

        let track_partial = match get("TRACK_PARTIAL").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(
                raw.split(',')
                    .map(str::parse)
                    .collect::<std::result::Result<Vec<TrackField>, _>>()
                    .context("TRACK_PARTIAL inválido")?,
            ),
            None => None,
        };

        let config = Self {
            bot_user_id: get("BOT_USER_ID").filter(|id| !id.trim().is_empty()),
            client_name: var(
                "CLIENT_NAME",
                &format!("open-music-link/{}", env!("CARGO_PKG_VERSION")),
            ),
            nodes,
            default_search_platform: var("DEFAULT_SEARCH_PLATFORM", "youtube")
                .parse()
                .context("DEFAULT_SEARCH_PLATFORM inválido")?,
            enable_autoplay: var("ENABLE_AUTOPLAY", "true")
                .parse()
                .context("ENABLE_AUTOPLAY inválido")?,
            default_volume: var("DEFAULT_VOLUME", "100")
                .parse()
                .context("DEFAULT_VOLUME inválido")?,
            track_partial,
            node_selection: var("NODE_SELECTION", "least-load")
                .parse()
                .context("NODE_SELECTION inválido")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Valida rangos y coherencia de la configuración.
    ///
    /// - Volumen entre 0 y 1000
    /// - Al menos un nodo, identificadores únicos
    /// - Cada nodo con host, puerto y `retry_amount` válidos
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 1000 {
            anyhow::bail!("El volumen por defecto debe estar entre 0 y 1000, recibido: {}", self.default_volume);
        }

        if self.nodes.is_empty() {
            anyhow::bail!("Se necesita al menos un nodo Lavalink");
        }

        for (index, node) in self.nodes.iter().enumerate() {
            let mut node = node.clone();
            if node.identifier.trim().is_empty() {
                node.identifier = node.host.clone();
            }
            node.validate()
                .with_context(|| format!("Nodo #{} inválido", index))?;

            let duplicated = self
                .nodes
                .iter()
                .filter(|other| other.identifier == node.identifier)
                .count()
                > 1;
            if duplicated {
                anyhow::bail!("Identificador de nodo duplicado: {}", node.identifier);
            }
        }

        if self.client_name.trim().is_empty() {
            anyhow::bail!("CLIENT_NAME no puede estar vacío");
        }

        Ok(())
    }

    /// Resumen seguro para logs (sin contraseñas)
    pub fn summary(&self) -> String {
        let nodes = self
            .nodes
            .iter()
            .map(|n| format!("{}@{}", n.identifier, n.http_url()))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Config Summary:\n  \
            Bot: {} ({})\n  \
            Nodos: {}\n  \
            Búsqueda: {:?}, selección {:?}\n  \
            Reproducción: {}% vol, autoplay={}, partial={}",
            self.bot_user_id.as_deref().unwrap_or("sin user id"),
            self.client_name,
            nodes,
            self.default_search_platform,
            self.node_selection,
            self.default_volume,
            self.enable_autoplay,
            self.track_partial
                .as_ref()
                .map_or("no".to_string(), |fields| fields.len().to_string()),
        )
    }

    pub fn to_manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            nodes: self.nodes.clone(),
            client_name: self.client_name.clone(),
            default_search_platform: self.default_search_platform,
            autoplay: self.enable_autoplay,
            track_partial: self.track_partial.clone(),
            node_selection: self.node_selection,
            default_volume: self.default_volume,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let options = ManagerOptions::default();
        Self {
            bot_user_id: None,
            client_name: options.client_name,
            nodes: options.nodes,
            default_search_platform: options.default_search_platform,
            enable_autoplay: options.autoplay,
            default_volume: options.default_volume,
            track_partial: None,
            node_selection: options.node_selection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.nodes[0].identifier, "main");
        assert_eq!(config.nodes[0].port, 2333);
        assert_eq!(config.default_volume, 100);
        assert!(config.enable_autoplay);
        assert_eq!(config.node_selection, NodeSelection::LeastLoad);
        assert!(config.bot_user_id.is_none());
    }

    #[test]
    fn test_single_node_from_variables() {
        let config = Config::from_lookup(lookup(&[
            ("BOT_USER_ID", "1234"),
            ("LAVALINK_HOST", "lava.local"),
            ("LAVALINK_PORT", "443"),
            ("LAVALINK_SECURE", "true"),
            ("RETRY_AMOUNT", "3"),
            ("DEFAULT_SEARCH_PLATFORM", "soundcloud"),
            ("TRACK_PARTIAL", "title,author,duration"),
            ("NODE_SELECTION", "least-players"),
        ]))
        .unwrap();

        assert_eq!(config.bot_user_id.as_deref(), Some("1234"));
        assert_eq!(config.nodes[0].ws_url(), "wss://lava.local:443/v4/websocket");
        assert_eq!(config.nodes[0].retry_amount, 3);
        assert_eq!(config.default_search_platform, SearchPlatform::SoundCloud);
        assert_eq!(
            config.track_partial,
            Some(vec![TrackField::Title, TrackField::Author, TrackField::Duration])
        );

        let options = config.to_manager_options();
        assert_eq!(options.node_selection, NodeSelection::LeastPlayers);
        assert_eq!(options.nodes, config.nodes);
    }

    #[test]
    fn test_nodes_from_json() {
        let config = Config::from_lookup(lookup(&[(
            "LAVALINK_NODES",
            r#"[{"identifier":"eu","host":"eu.lava"},{"identifier":"us","host":"us.lava","port":80}]"#,
        )]))
        .unwrap();

        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[1].port, 80);
        assert_eq!(config.nodes[0].password, "youshallnotpass");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("DEFAULT_VOLUME", "2000")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LAVALINK_PORT", "abc")])).is_err());
        assert!(Config::from_lookup(lookup(&[("RETRY_AMOUNT", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LAVALINK_NODES", "[]")])).is_err());
        assert!(Config::from_lookup(lookup(&[(
            "LAVALINK_NODES",
            r#"[{"identifier":"a"},{"identifier":"a"}]"#
        )]))
        .is_err());
    }

    #[test]
    fn test_summary_hides_password() {
        let config = Config::default();
        let summary = config.summary();
        assert!(summary.contains("main@http://localhost:2333"));
        assert!(!summary.contains("youshallnotpass"));
    }
}
