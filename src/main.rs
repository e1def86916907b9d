use anyhow::{Context as _, Result};
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

use guild_jukebox::{
    audio::{Collaborators, Resolver, SessionRegistry},
    bot::JukeboxBot,
    config::Config,
    sources::{YouTubeApiResolver, YtDlpResolver, YtDlpStreamSource},
    voice::{SongbirdSink, SongbirdTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Arc::new(Config::load().context("No se pudo cargar la configuración")?);
    info!("{}", config.summary());

    let songbird = Songbird::serenity();
    let collaborators = Collaborators {
        transport: Arc::new(SongbirdTransport::new(songbird.clone())),
        sink: Arc::new(SongbirdSink),
        resolver: resolver(&config),
        streams: Arc::new(YtDlpStreamSource::new(config.ytdlp_path.clone())),
    };
    let registry = Arc::new(SessionRegistry::new(collaborators, config.player_config()));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = JukeboxBot::new(config.clone(), registry.clone());
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("No se pudo crear el cliente de Discord")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

/// The YouTube Data API when a key is configured, yt-dlp search otherwise.
fn resolver(config: &Config) -> Arc<dyn Resolver> {
    if let Some(key) = &config.youtube_api_key {
        match YouTubeApiResolver::new(key.clone()) {
            Ok(api) => {
                info!("🔑 Búsquedas con YouTube Data API v3");
                return Arc::new(api);
            }
            Err(e) => warn!("YouTube API no disponible, usando yt-dlp: {}", e),
        }
    }
    Arc::new(YtDlpResolver::new(config.ytdlp_path.clone()))
}

async fn health_check() -> Result<()> {
    let ytdlp_path = std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string());

    let yt_dlp = async_process::Command::new(&ytdlp_path)
        .arg("--version")
        .output()
        .await
        .with_context(|| format!("{} no está instalado", ytdlp_path))?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
        .context("ffmpeg no está instalado")?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
