use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId};
use songbird::{Call, CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler, Songbird};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    audio::{ChannelRef, ConnectionHandle, ConnectionState, EventSink, SessionId, Transport},
    error::{PlayerError, Result},
};

/// Joins voice channels through a shared [`Songbird`] manager.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Transport for SongbirdTransport {
    async fn connect(
        &self,
        session: SessionId,
        channel: ChannelRef,
        events: EventSink,
    ) -> Result<Box<dyn ConnectionHandle>> {
        if session.get() == 0 || channel.get() == 0 {
            return Err(PlayerError::ConnectionUnavailable(format!(
                "invalid guild {} or channel {}",
                session, channel
            )));
        }
        let guild_id = GuildId::new(session.get());
        let channel_id = ChannelId::new(channel.get());

        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlayerError::ConnectionUnavailable(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            // A reused call may still carry handlers from an evicted session.
            handler.remove_all_global_events();
            for event in [
                CoreEvent::DriverConnect,
                CoreEvent::DriverReconnect,
                CoreEvent::DriverDisconnect,
            ] {
                handler.add_global_event(
                    Event::Core(event),
                    DriverWatcher {
                        events: events.clone(),
                    },
                );
            }
        }

        // `join` only returns once the driver is up.
        events.connection(ConnectionState::Ready);
        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(Box::new(SongbirdConnection {
            manager: self.manager.clone(),
            guild_id,
            call,
        }))
    }
}

/// A songbird call for one guild.
pub struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl ConnectionHandle for SongbirdConnection {
    async fn destroy(&mut self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Error al salir del canal de voz en guild {}: {:?}", self.guild_id, e);
        }
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
    }

    fn voice_call(&self) -> Option<Arc<Mutex<Call>>> {
        Some(self.call.clone())
    }
}

/// Handler que traduce eventos del driver a estados de conexión
struct DriverWatcher {
    events: EventSink,
}

#[async_trait]
impl VoiceEventHandler for DriverWatcher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match ctx {
            EventContext::DriverConnect(_) | EventContext::DriverReconnect(_) => {
                debug!("Driver (re)conectado para {}", self.events.session());
                self.events.connection(ConnectionState::Connecting);
                self.events.connection(ConnectionState::Ready);
            }
            EventContext::DriverDisconnect(data) => {
                warn!(
                    "🔌 Driver desconectado para {}: {:?} ({:?})",
                    self.events.session(),
                    data.reason,
                    data.kind
                );
                self.events.connection(ConnectionState::Disconnected);
            }
            _ => {}
        }

        None
    }
}
