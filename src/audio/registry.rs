use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{
    backend::{ChannelRef, Collaborators, ConnectionState, SessionId},
    player::{DisconnectCallback, SessionHandle, SessionPlayer},
    queue::QueueListing,
};
use crate::{config::PlayerConfig, error::Result};

/// An empty slot means the session is not (or not yet) connected.
type SessionSlot = Arc<OnceCell<SessionHandle>>;

/// Owns every live session player, keyed by guild.
///
/// Concurrent [`SessionRegistry::get_or_create`] calls for the same guild
/// share a single connection attempt, so at most one player exists per
/// session.
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, SessionSlot>>,
    collaborators: Collaborators,
    config: PlayerConfig,
}

impl SessionRegistry {
    pub fn new(collaborators: Collaborators, config: PlayerConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            collaborators,
            config,
        }
    }

    /// Returns the live player for `session`, if any. A player that is
    /// tearing down counts as absent.
    pub fn get(&self, session: SessionId) -> Option<SessionHandle> {
        self.sessions
            .get(&session)
            .and_then(|slot| slot.get().cloned())
            .filter(|handle| !handle.is_closed())
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.get(session).is_some()
    }

    /// Returns the live player for `session`, connecting a new one to
    /// `channel` when there is none.
    ///
    /// A player that is still tearing down after a lost connection is waited
    /// out and replaced, so its voice call is released before the new one
    /// joins.
    pub async fn get_or_create(&self, session: SessionId, channel: ChannelRef) -> Result<SessionHandle> {
        loop {
            let slot = self.sessions.entry(session).or_default().clone();

            let result = slot
                .get_or_try_init(|| self.spawn_session(session, channel, Arc::downgrade(&slot)))
                .await
                .cloned();

            match result {
                Ok(handle) if handle.is_closed() => {
                    debug!("⏳ El reproductor de {} se está cerrando, esperando para reemplazarlo", session);
                    handle.closed().await;
                    self.sessions
                        .remove_if(&session, |_, current| Arc::ptr_eq(current, &slot));
                }
                Ok(handle) => return Ok(handle),
                Err(e) => {
                    drop(slot);
                    // Only the map holds the slot now, so nobody else is connecting.
                    self.sessions.remove_if(&session, |_, slot| {
                        !slot.initialized() && Arc::strong_count(slot) == 1
                    });
                    return Err(e);
                }
            }
        }
    }

    async fn spawn_session(
        &self,
        session: SessionId,
        channel: ChannelRef,
        slot: Weak<OnceCell<SessionHandle>>,
    ) -> Result<SessionHandle> {
        info!("🆕 Creando reproductor para {}", session);

        let sessions = Arc::downgrade(&self.sessions);
        let on_disconnect: DisconnectCallback = Box::new(move |session| {
            info!("👋 Reproductor de {} desconectado, eliminándolo", session);
            if let Some(sessions) = sessions.upgrade() {
                sessions.remove_if(&session, |_, current| std::ptr::eq(Arc::as_ptr(current), slot.as_ptr()));
            }
        });

        SessionPlayer::connect(session, channel, &self.collaborators, &self.config, Some(on_disconnect)).await
    }

    /// Enqueues a directly playable link, joining `channel` if needed.
    pub async fn enqueue_link(&self, session: SessionId, channel: ChannelRef, link: &str) -> Result<()> {
        self.get_or_create(session, channel).await?.enqueue(link).await
    }

    /// Searches `text` and enqueues the best match, joining `channel` if
    /// needed. Returns the link that was queued.
    pub async fn enqueue_query(&self, session: SessionId, channel: ChannelRef, text: &str) -> Result<String> {
        self.get_or_create(session, channel).await?.enqueue_query(text).await
    }

    /// Appends the configured fill links, joining `channel` if needed.
    pub async fn fill(&self, session: SessionId, channel: ChannelRef) -> Result<()> {
        let handle = self.get_or_create(session, channel).await?;
        handle.enqueue_all(self.config.fill_links.clone()).await
    }

    pub async fn pause(&self, session: SessionId) -> Result<()> {
        match self.get(session) {
            Some(handle) => handle.pause().await,
            None => Ok(()),
        }
    }

    pub async fn resume(&self, session: SessionId) -> Result<()> {
        match self.get(session) {
            Some(handle) => handle.resume().await,
            None => Ok(()),
        }
    }

    pub async fn skip(&self, session: SessionId) -> Result<()> {
        match self.get(session) {
            Some(handle) => handle.skip().await,
            None => Ok(()),
        }
    }

    pub async fn stop(&self, session: SessionId) -> Result<()> {
        match self.get(session) {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }

    /// The queue of `session`, or `None` when there is no player.
    pub async fn list_queue(&self, session: SessionId) -> Result<Option<QueueListing>> {
        match self.get(session) {
            Some(handle) => handle.list_queue().await.map(Some),
            None => Ok(None),
        }
    }

    /// Whether `text` can be enqueued without searching.
    pub fn is_playable_link(&self, text: &str) -> bool {
        self.collaborators.streams.is_playable_link(text)
    }

    /// Forwards a connection transition observed outside the transport.
    pub fn notify_connection(&self, session: SessionId, state: ConnectionState) {
        if let Some(handle) = self.get(session) {
            handle.events().connection(state);
        }
    }

    /// Tears down every session. Used on process shutdown.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .filter_map(|slot| slot.value().get().cloned())
            .collect();
        self.sessions.clear();

        info!("🛑 Cerrando {} sesiones", handles.len());
        let results = futures::future::join_all(handles.iter().map(|handle| handle.shutdown())).await;
        for (handle, result) in handles.iter().zip(results) {
            if let Err(e) = result {
                debug!("La sesión {} ya estaba cerrada: {}", handle.session(), e);
            }
        }
    }
}
