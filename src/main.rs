use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use open_music_link::config::Config;
use open_music_link::manager::voice::VoiceGateway;
use open_music_link::{Manager, ManagerEvent};

/// Sin gateway de Discord propio: sólo registra los payloads de voz
struct LoggingGateway;

#[async_trait]
impl VoiceGateway for LoggingGateway {
    async fn send(&self, guild_id: &str, payload: Value) -> Result<()> {
        info!("🎙️ Payload de voz para guild {}: {}", guild_id, payload);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_music_link=debug".parse()?)
                .add_directive("reqwest=info".parse()?)
                .add_directive("tungstenite=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Music Link v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let manager = Manager::new(config.to_manager_options(), Arc::new(LoggingGateway));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&manager, &config).await;
    }

    let user_id = config
        .bot_user_id
        .clone()
        .context("BOT_USER_ID es obligatorio para conectar a Lavalink")?;

    let events = manager.subscribe();
    tokio::spawn(log_events(events));

    manager.init(user_id)?;

    if let Some(query) = search_argument() {
        wait_for_node(&manager).await?;
        let result = manager.search(query.as_str(), None).await?;
        info!("🔍 {:?}: {} resultado(s)", result.load_type, result.tracks.len());
        for (index, track) in result.tracks.iter().take(10).enumerate() {
            println!(
                "{:>2}. {} - {} [{}]",
                index + 1,
                track.author,
                track.title,
                format_duration(track.duration)
            );
        }
        manager.shutdown().await;
        return Ok(());
    }

    info!("🚀 Runtime iniciado, Ctrl+C para salir");
    tokio::signal::ctrl_c()
        .await
        .context("Error al registrar Ctrl+C")?;
    info!("⚠️ Señal de shutdown recibida, cerrando...");
    manager.shutdown().await;

    Ok(())
}

/// `--search <consulta>`
fn search_argument() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    let index = args.iter().position(|arg| arg == "--search")?;
    let query = args[index + 1..].join(" ");
    (!query.trim().is_empty()).then_some(query)
}

async fn wait_for_node(manager: &Manager) -> Result<()> {
    let mut events = manager.subscribe();
    if manager.nodes().iter().any(|n| n.is_connected()) {
        return Ok(());
    }

    tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            match events.recv().await {
                Ok(ManagerEvent::NodeConnect { .. }) => return Ok(()),
                Ok(ManagerEvent::NodeDestroy { node }) => {
                    anyhow::bail!("El nodo {} se destruyó sin conectar", node)
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => anyhow::bail!("Canal de eventos cerrado"),
            }
        }
    })
    .await
    .context("Timeout esperando conexión a Lavalink")?
}

async fn log_events(mut events: broadcast::Receiver<ManagerEvent>) {
    loop {
        match events.recv().await {
            Ok(ManagerEvent::NodeRaw { node, payload }) => {
                debug!("📨 [{}] {}", node, payload);
            }
            Ok(ManagerEvent::NodeError { node, error }) => {
                error!("❌ [{}] {}", node, error);
            }
            Ok(ManagerEvent::TrackError { guild_id, error, .. }) => {
                warn!("❌ Guild {}: {}", guild_id, error.describe());
            }
            Ok(event) => info!("📣 {}: {:?}", event.name(), event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("⚠️ {} eventos descartados por lentitud", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn health_check(manager: &Manager, config: &Config) -> Result<()> {
    // Verificar que cada nodo responde por REST
    for options in &config.nodes {
        let node = manager.create_node(options.clone())?;
        let version = node
            .rest()
            .version()
            .await
            .with_context(|| format!("El nodo {} no responde", node.identifier()))?;
        info!(
            "✅ Nodo {} versión {}",
            node.identifier(),
            version.unwrap_or_else(|| "desconocida".to_string())
        );
    }
    println!("OK");
    Ok(())
}

fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
