//! One session player per guild.
//!
//! A player runs as its own task and is the only writer of its queue and
//! state. Commands from [`SessionHandle`]s, connection transitions, playback
//! events and reconnect-grace timeouts all arrive on one channel and are
//! applied in arrival order by [`SessionPlayer::dispatch`].

use std::{ops::ControlFlow, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    backend::{
        ByteStream, ChannelRef, Collaborators, ConnectionHandle, ConnectionState, PlaybackEngine,
        PlaybackEvent, PlaybackState, Resolver, SessionId, StreamOptions, StreamSource, TrackToken,
    },
    queue::{LinkQueue, QueueListing},
};
use crate::{
    config::PlayerConfig,
    error::{PlayerError, Result},
};

/// Invoked once when the session's connection is confirmed lost for good.
pub type DisconnectCallback = Box<dyn FnOnce(SessionId) + Send + 'static>;

pub(crate) enum SessionEvent {
    Command(Command),
    Connection(ConnectionState),
    Playback(PlaybackEvent),
    GraceExpired { epoch: u64 },
}

pub(crate) enum Command {
    Enqueue {
        links: Vec<String>,
        reply: oneshot::Sender<()>,
    },
    Skip(oneshot::Sender<()>),
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    List(oneshot::Sender<QueueListing>),
    Status(oneshot::Sender<PlayerStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// A running reconnect-grace window.
struct GraceWindow {
    epoch: u64,
    cancel: CancellationToken,
}

/// Where collaborators push connection and playback events for a session.
///
/// Holds only a weak reference: once every [`SessionHandle`] is gone the
/// session winds down and further events are dropped.
#[derive(Clone)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::WeakUnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn connection(&self, state: ConnectionState) {
        self.send(SessionEvent::Connection(state));
    }

    pub fn playback(&self, event: PlaybackEvent) {
        self.send(SessionEvent::Playback(event));
    }

    fn send(&self, event: SessionEvent) {
        let delivered = self
            .tx
            .upgrade()
            .is_some_and(|tx| tx.send(event).is_ok());
        if !delivered {
            debug!("La sesión {} ya no existe, descartando evento", self.session);
        }
    }
}

/// Snapshot of a player's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatus {
    pub playback: PlaybackState,
    pub connection: ConnectionState,
    pub now_playing: Option<String>,
    pub queued: usize,
    pub reconnecting: bool,
}

/// Cheap, cloneable front end to a running session player.
#[derive(Clone)]
pub struct SessionHandle {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
    resolver: Arc<dyn Resolver>,
    terminated: CancellationToken,
}

impl SessionHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Appends `link` and starts playback if nothing is playing.
    pub async fn enqueue(&self, link: impl Into<String>) -> Result<()> {
        let link = link.into();
        if link.trim().is_empty() {
            return Err(PlayerError::EmptyLink);
        }
        self.enqueue_all(vec![link]).await
    }

    /// Resolves `text` to a link, then enqueues it. The search runs on the
    /// caller's task so the session keeps serving other commands meanwhile.
    pub async fn enqueue_query(&self, text: &str) -> Result<String> {
        info!("🔍 Buscando: {}", text);
        let link = self
            .resolver
            .search(text)
            .await?
            .filter(|link| !link.trim().is_empty())
            .ok_or_else(|| PlayerError::ResolutionFailed(text.to_string()))?;

        self.enqueue(link.clone()).await?;
        Ok(link)
    }

    /// Appends every link in order, then starts playback if idle.
    pub async fn enqueue_all(&self, links: Vec<String>) -> Result<()> {
        self.request(|reply| Command::Enqueue { links, reply }).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.request(Command::Skip).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await
    }

    /// Clears the queue and halts playback. The connection stays up.
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    pub async fn list_queue(&self) -> Result<QueueListing> {
        self.request(Command::List).await
    }

    pub async fn status(&self) -> Result<PlayerStatus> {
        self.request(Command::Status).await
    }

    /// Tears the session down without invoking its disconnect callback.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }

    /// Sink for out-of-band connection transitions (e.g. gateway voice state
    /// updates).
    pub fn events(&self) -> EventSink {
        EventSink {
            session: self.session,
            tx: self.tx.downgrade(),
        }
    }

    /// True once the session stopped taking commands, which happens before
    /// its teardown finishes.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Waits until the session task has torn everything down and run its
    /// disconnect callback.
    pub async fn closed(&self) {
        self.terminated.cancelled().await;
    }

    /// Whether both handles drive the same player.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SessionEvent::Command(build(reply)))
            .map_err(|_| PlayerError::SessionClosed)?;
        response.await.map_err(|_| PlayerError::SessionClosed)
    }
}

pub(crate) struct SessionPlayer {
    session: SessionId,
    queue: LinkQueue,
    connection: Box<dyn ConnectionHandle>,
    engine: Box<dyn PlaybackEngine>,
    streams: Arc<dyn StreamSource>,
    options: StreamOptions,
    grace_period: Duration,
    playback: PlaybackState,
    now_playing: Option<String>,
    track: TrackToken,
    connection_state: ConnectionState,
    grace_epoch: u64,
    grace: Option<GraceWindow>,
    events: EventSink,
    inbox: mpsc::UnboundedReceiver<SessionEvent>,
    on_disconnect: Option<DisconnectCallback>,
    terminated: CancellationToken,
}

impl SessionPlayer {
    /// Connects to `channel`, creates the playback engine and spawns the
    /// session task. Nothing is left running if either step fails.
    pub(crate) async fn connect(
        session: SessionId,
        channel: ChannelRef,
        collaborators: &Collaborators,
        config: &PlayerConfig,
        on_disconnect: Option<DisconnectCallback>,
    ) -> Result<SessionHandle> {
        let (tx, inbox) = mpsc::unbounded_channel();
        let events = EventSink {
            session,
            tx: tx.downgrade(),
        };

        let mut connection = collaborators
            .transport
            .connect(session, channel, events.clone())
            .await
            .inspect_err(|e| warn!("🔌 No se pudo unir al canal {} en {}: {}", channel, session, e))?;

        let engine = match collaborators.sink.create_engine(connection.as_ref(), events.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                error!("❌ No se pudo crear el motor de reproducción para {}: {}", session, e);
                connection.destroy().await;
                return Err(e);
            }
        };

        let player = Self {
            session,
            queue: LinkQueue::new(),
            connection,
            engine,
            streams: collaborators.streams.clone(),
            options: config.stream.clone(),
            grace_period: config.grace_period,
            playback: PlaybackState::Idle,
            now_playing: None,
            track: TrackToken::default(),
            connection_state: ConnectionState::Idle,
            grace_epoch: 0,
            grace: None,
            events,
            inbox,
            on_disconnect,
            terminated: CancellationToken::new(),
        };
        let terminated = player.terminated.clone();

        tokio::spawn(player.run());
        info!("🔊 Sesión {} unida al canal {}", session, channel);

        Ok(SessionHandle {
            session,
            tx,
            resolver: collaborators.resolver.clone(),
            terminated,
        })
    }

    async fn run(mut self) {
        let _terminated = self.terminated.clone().drop_guard();

        while let Some(event) = self.inbox.recv().await {
            if self.dispatch(event).await.is_break() {
                return;
            }
        }

        debug!("Todos los handles de la sesión {} se soltaron, cerrando", self.session);
        self.teardown().await;
    }

    async fn dispatch(&mut self, event: SessionEvent) -> ControlFlow<()> {
        match event {
            SessionEvent::Command(command) => return self.handle_command(command).await,
            SessionEvent::Connection(state) => return self.on_connection(state).await,
            SessionEvent::Playback(event) => self.on_playback(event).await,
            SessionEvent::GraceExpired { epoch } => return self.on_grace_expired(epoch).await,
        }
        ControlFlow::Continue(())
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Enqueue { links, reply } => {
                for link in links {
                    if let Err(e) = self.queue.push(link) {
                        warn!("Ignorando link para {}: {}", self.session, e);
                    }
                }
                if self.playback == PlaybackState::Idle {
                    self.advance().await;
                }
                let _ = reply.send(());
            }
            Command::Skip(reply) => {
                self.skip().await;
                let _ = reply.send(());
            }
            Command::Pause(reply) => {
                if self.playback == PlaybackState::Playing {
                    self.engine.pause().await;
                    self.playback = PlaybackState::Paused;
                    info!("⏸️ Pausado en {}", self.session);
                }
                let _ = reply.send(());
            }
            Command::Resume(reply) => {
                if self.playback == PlaybackState::Paused {
                    self.engine.resume().await;
                    self.playback = PlaybackState::Playing;
                    info!("▶️ Reanudado en {}", self.session);
                }
                let _ = reply.send(());
            }
            Command::Stop(reply) => {
                self.queue.clear();
                self.halt().await;
                info!("⏹️ Detenido en {}", self.session);
                let _ = reply.send(());
            }
            Command::List(reply) => {
                let _ = reply.send(self.queue.snapshot());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown(reply) => {
                self.teardown().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn skip(&mut self) {
        if self.queue.is_empty() {
            debug!("Skip en {} con la cola vacía, nada que hacer", self.session);
            return;
        }

        self.halt().await;
        self.advance().await;
    }

    /// Pops links until one starts playing or the queue runs dry. Links whose
    /// stream cannot be opened are logged and dropped.
    async fn advance(&mut self) {
        while let Some(link) = self.queue.pop() {
            match self.start(&link).await {
                Ok(()) => return,
                Err(e) => warn!("⏭️ Saltando {} en {}: {}", link, self.session, e),
            }
        }
        debug!("Sesión {} inactiva, esperando nuevos links", self.session);
    }

    async fn start(&mut self, link: &str) -> Result<()> {
        info!("🎵 Reproduciendo: {}", link);
        let stream: ByteStream = self.streams.open(link, &self.options).await?;

        self.track = self.track.next();
        self.engine.play(stream, self.track).await?;

        self.playback = PlaybackState::Playing;
        self.now_playing = Some(link.to_string());
        Ok(())
    }

    /// Abandons the current track, if any.
    async fn halt(&mut self) {
        if self.playback != PlaybackState::Idle {
            self.engine.stop().await;
        }
        self.playback = PlaybackState::Idle;
        self.now_playing = None;
    }

    async fn on_playback(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Idle { track } => {
                if !self.is_current(track) {
                    debug!("Ignorando idle de un track viejo {:?}", track);
                    return;
                }
                debug!("Track terminado en {}", self.session);
                self.playback = PlaybackState::Idle;
                self.now_playing = None;
                self.advance().await;
            }
            PlaybackEvent::Error {
                track,
                message,
                resource,
            } => {
                if !self.is_current(track) {
                    debug!("Ignorando error de un track viejo {:?}: {}", track, message);
                    return;
                }
                error!(
                    "❌ Error: {} with resource {}",
                    message,
                    resource
                        .as_deref()
                        .or(self.now_playing.as_deref())
                        .unwrap_or("unknown")
                );
                self.halt().await;
                self.advance().await;
            }
        }
    }

    fn is_current(&self, track: TrackToken) -> bool {
        track == self.track && self.playback != PlaybackState::Idle
    }

    async fn on_connection(&mut self, state: ConnectionState) -> ControlFlow<()> {
        self.connection_state = state;

        match state {
            ConnectionState::Ready => info!("✅ Player is ready in {}", self.session),
            ConnectionState::Disconnected => self.start_grace(),
            ConnectionState::Signalling | ConnectionState::Connecting => {
                if let Some(grace) = self.grace.take() {
                    grace.cancel.cancel();
                    info!("🔁 La conexión en {} se está reconectando, manteniendo la sesión", self.session);
                }
            }
            ConnectionState::Destroyed => {
                warn!("🔌 La conexión de {} fue destruida", self.session);
                self.permanent_disconnect().await;
                return ControlFlow::Break(());
            }
            ConnectionState::Idle => debug!("Conexión de {} inactiva", self.session),
        }
        ControlFlow::Continue(())
    }

    /// Starts the grace window for a dropped connection. Reaching
    /// `Signalling` or `Connecting` cancels it; otherwise the timer reports
    /// back and the session is torn down. Only one window runs at a time.
    fn start_grace(&mut self) {
        if self.grace.is_some() {
            debug!("Ya hay una ventana de gracia activa para {}", self.session);
            return;
        }

        self.grace_epoch += 1;
        let epoch = self.grace_epoch;
        let cancel = CancellationToken::new();
        self.grace = Some(GraceWindow {
            epoch,
            cancel: cancel.clone(),
        });

        let window = self.grace_period;
        let events = self.events.clone();
        info!("🔄 Conexión perdida en {}, esperando {:?} a que se recupere", self.session, window);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(window) => events.send(SessionEvent::GraceExpired { epoch }),
            }
        });
    }

    async fn on_grace_expired(&mut self, epoch: u64) -> ControlFlow<()> {
        if !self.grace.as_ref().is_some_and(|grace| grace.epoch == epoch) {
            debug!("Ignorando timeout de gracia viejo para {}", self.session);
            return ControlFlow::Continue(());
        }
        self.grace = None;

        self.permanent_disconnect().await;
        ControlFlow::Break(())
    }

    async fn permanent_disconnect(&mut self) {
        warn!("🔌 Sesión {} desconectada definitivamente", self.session);
        self.teardown().await;

        if let Some(callback) = self.on_disconnect.take() {
            callback(self.session);
        }
    }

    async fn teardown(&mut self) {
        // Handles see `is_closed` for the whole teardown.
        self.inbox.close();
        self.queue.clear();
        self.halt().await;
        if let Some(grace) = self.grace.take() {
            grace.cancel.cancel();
        }
        // A `Destroyed` report means the transport already released it.
        if self.connection_state != ConnectionState::Destroyed {
            self.connection.destroy().await;
            self.connection_state = ConnectionState::Destroyed;
        }
    }

    fn status(&self) -> PlayerStatus {
        PlayerStatus {
            playback: self.playback,
            connection: self.connection_state,
            now_playing: self.now_playing.clone(),
            queued: self.queue.len(),
            reconnecting: self.grace.is_some(),
        }
    }
}
