use async_trait::async_trait;
use songbird::{
    input::{AudioStream, Input, LiveInput},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{
    io::{self, Read},
    sync::Arc,
};
use parking_lot::Mutex as SyncMutex;
use symphonia::core::io::{MediaSource, ReadOnlySource};
use tokio::sync::Mutex;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, warn};

use crate::{
    audio::{
        AudioSink, ByteStream, ConnectionHandle, EventSink, PlaybackEngine, PlaybackEvent,
        TrackToken,
    },
    error::{PlayerError, Result},
};

/// Creates [`SongbirdEngine`]s on songbird connections.
pub struct SongbirdSink;

impl AudioSink for SongbirdSink {
    fn create_engine(
        &self,
        connection: &dyn ConnectionHandle,
        events: EventSink,
    ) -> Result<Box<dyn PlaybackEngine>> {
        let call = connection.voice_call().ok_or_else(|| {
            PlayerError::ConnectionUnavailable("connection has no voice call".to_string())
        })?;

        Ok(Box::new(SongbirdEngine {
            call,
            current: None,
            events,
        }))
    }
}

/// Plays one track at a time on a songbird call.
pub struct SongbirdEngine {
    call: Arc<Mutex<Call>>,
    current: Option<TrackHandle>,
    events: EventSink,
}

#[async_trait]
impl PlaybackEngine for SongbirdEngine {
    async fn play(&mut self, stream: ByteStream, track: TrackToken) -> Result<()> {
        let input = into_input(stream);

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackWatcher {
                        track,
                        events: self.events.clone(),
                    },
                )
                .map_err(|e| PlayerError::PlaybackEngineError(format!("{:?}", e)))?;
        }

        self.current = Some(handle);
        Ok(())
    }

    async fn pause(&mut self) {
        if let Some(handle) = &self.current {
            if let Err(e) = handle.pause() {
                warn!("No se pudo pausar el track: {:?}", e);
            }
        }
    }

    async fn resume(&mut self) {
        if let Some(handle) = &self.current {
            if let Err(e) = handle.play() {
                warn!("No se pudo reanudar el track: {:?}", e);
            }
        }
    }

    async fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            // Already-finished tracks reject control messages.
            let _ = handle.stop();
        }
    }
}

/// Wraps a byte stream as a live songbird input probed by symphonia.
fn into_input(stream: ByteStream) -> Input {
    let source: Box<dyn MediaSource> = Box::new(ReadOnlySource::new(BlockingReader::new(stream)));

    Input::Live(
        LiveInput::Raw(AudioStream {
            input: source,
            hint: None,
        }),
        None,
    )
}

/// Songbird decodes on its own blocking threads; this adapts the async
/// stream for them. The mutex only provides the `Sync` bound symphonia wants.
struct BlockingReader(SyncMutex<SyncIoBridge<ByteStream>>);

impl BlockingReader {
    /// Must be called inside the runtime that drives `stream`.
    fn new(stream: ByteStream) -> Self {
        Self(SyncMutex::new(SyncIoBridge::new(stream)))
    }
}

impl Read for BlockingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.get_mut().read(buf)
    }
}

/// Handler para el fin o error de un track
struct TrackWatcher {
    track: TrackToken,
    events: EventSink,
}

#[async_trait]
impl VoiceEventHandler for TrackWatcher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                let event = match &state.playing {
                    PlayMode::Errored(e) => PlaybackEvent::Error {
                        track: self.track,
                        message: format!("{:?}", e),
                        resource: None,
                    },
                    _ => PlaybackEvent::Idle { track: self.track },
                };
                debug!("Evento de track en {}: {:?}", self.events.session(), event);
                self.events.playback(event);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_reader_drains_the_async_stream() {
        let stream: ByteStream = Box::new(std::io::Cursor::new(b"ID3 fake audio".to_vec()));
        let mut reader = BlockingReader::new(stream);

        let bytes = tokio::task::spawn_blocking(move || {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).map(|_| bytes)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(bytes, b"ID3 fake audio".to_vec());
    }
}
