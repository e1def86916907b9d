//! Recording fakes for the collaborator traits.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::io::AsyncReadExt;

use super::{
    backend::{
        AudioSink, ByteStream, ChannelRef, Collaborators, ConnectionHandle, ConnectionState,
        PlaybackEngine, PlaybackEvent, Resolver, SessionId, StreamOptions, StreamSource,
        TrackToken, Transport,
    },
    player::EventSink,
};
use crate::error::{PlayerError, Result};

#[derive(Default)]
struct State {
    connects: usize,
    destroyed: usize,
    fail_connect: bool,
    destroy_delay: Option<Duration>,
    failing_links: HashSet<String>,
    opened: Vec<String>,
    played: Vec<(String, TrackToken)>,
    pauses: usize,
    resumes: usize,
    stops: usize,
    events: Option<EventSink>,
}

/// Shared log written by every fake collaborator.
#[derive(Default)]
pub(crate) struct Recorder {
    state: Mutex<State>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock())
    }

    pub fn connects(&self) -> usize {
        self.with(|s| s.connects)
    }

    pub fn destroyed(&self) -> usize {
        self.with(|s| s.destroyed)
    }

    pub fn opened(&self) -> Vec<String> {
        self.with(|s| s.opened.clone())
    }

    pub fn played(&self) -> Vec<String> {
        self.with(|s| s.played.iter().map(|(link, _)| link.clone()).collect())
    }

    pub fn pauses(&self) -> usize {
        self.with(|s| s.pauses)
    }

    pub fn resumes(&self) -> usize {
        self.with(|s| s.resumes)
    }

    pub fn stops(&self) -> usize {
        self.with(|s| s.stops)
    }

    pub fn fail_connect(&self) {
        self.with(|s| s.fail_connect = true);
    }

    /// Makes every `destroy` take `delay`, like a gateway round-trip.
    pub fn slow_destroy(&self, delay: Duration) {
        self.with(|s| s.destroy_delay = Some(delay));
    }

    pub fn fail_link(&self, link: &str) {
        self.with(|s| s.failing_links.insert(link.to_string()));
    }

    /// Token of the most recent play request.
    pub fn last_track(&self) -> TrackToken {
        self.with(|s| s.played.last().map(|(_, track)| *track).unwrap_or_default())
    }

    /// Reports the current track as finished.
    pub fn finish_current(&self) {
        let track = self.last_track();
        self.emit_playback(PlaybackEvent::Idle { track });
    }

    pub fn emit_playback(&self, event: PlaybackEvent) {
        self.events().playback(event);
    }

    pub fn emit_connection(&self, state: ConnectionState) {
        self.events().connection(state);
    }

    fn events(&self) -> EventSink {
        self.with(|s| s.events.clone()).expect("no session connected yet")
    }
}

pub(crate) struct FakeTransport(pub Arc<Recorder>);

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(
        &self,
        _session: SessionId,
        channel: ChannelRef,
        events: EventSink,
    ) -> Result<Box<dyn ConnectionHandle>> {
        tokio::task::yield_now().await;

        let fail = self.0.with(|s| {
            s.connects += 1;
            s.fail_connect
        });
        if fail {
            return Err(PlayerError::ConnectionUnavailable(format!("channel {channel} is full")));
        }

        events.connection(ConnectionState::Ready);
        self.0.with(|s| s.events = Some(events));
        Ok(Box::new(FakeConnection(self.0.clone())))
    }
}

struct FakeConnection(Arc<Recorder>);

#[async_trait]
impl ConnectionHandle for FakeConnection {
    async fn destroy(&mut self) {
        if let Some(delay) = self.0.with(|s| s.destroy_delay) {
            tokio::time::sleep(delay).await;
        }
        self.0.with(|s| s.destroyed += 1);
    }
}

pub(crate) struct FakeSink(pub Arc<Recorder>);

impl AudioSink for FakeSink {
    fn create_engine(
        &self,
        _connection: &dyn ConnectionHandle,
        _events: EventSink,
    ) -> Result<Box<dyn PlaybackEngine>> {
        Ok(Box::new(FakeEngine(self.0.clone())))
    }
}

struct FakeEngine(Arc<Recorder>);

#[async_trait]
impl PlaybackEngine for FakeEngine {
    async fn play(&mut self, mut stream: ByteStream, track: TrackToken) -> Result<()> {
        let mut link = String::new();
        stream
            .read_to_string(&mut link)
            .await
            .map_err(|e| PlayerError::PlaybackEngineError(e.to_string()))?;
        self.0.with(|s| s.played.push((link, track)));
        Ok(())
    }

    async fn pause(&mut self) {
        self.0.with(|s| s.pauses += 1);
    }

    async fn resume(&mut self) {
        self.0.with(|s| s.resumes += 1);
    }

    async fn stop(&mut self) {
        self.0.with(|s| s.stops += 1);
    }
}

/// Streams whose bytes are the link itself, so the engine can log what it
/// played.
pub(crate) struct FakeStreams(pub Arc<Recorder>);

#[async_trait]
impl StreamSource for FakeStreams {
    fn is_playable_link(&self, text: &str) -> bool {
        text.starts_with("https://")
    }

    async fn open(&self, link: &str, _options: &StreamOptions) -> Result<ByteStream> {
        let failing = self.0.with(|s| {
            s.opened.push(link.to_string());
            s.failing_links.contains(link)
        });
        if failing {
            return Err(PlayerError::StreamOpenFailed {
                link: link.to_string(),
                reason: "video unavailable".to_string(),
            });
        }
        Ok(Box::new(std::io::Cursor::new(link.as_bytes().to_vec())))
    }
}

pub(crate) fn collaborators(recorder: &Arc<Recorder>, resolver: Arc<dyn Resolver>) -> Collaborators {
    Collaborators {
        transport: Arc::new(FakeTransport(recorder.clone())),
        sink: Arc::new(FakeSink(recorder.clone())),
        resolver,
        streams: Arc::new(FakeStreams(recorder.clone())),
    }
}
