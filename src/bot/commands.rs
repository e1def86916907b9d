use tracing::{debug, info};

use crate::{
    audio::{ChannelRef, SessionId, SessionRegistry},
    error::Result,
};

/// One parsed `youtube` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// List the queue.
    Queue,
    /// Append the configured fill links.
    Fill,
    Pause,
    Resume,
    Skip,
    Stop,
    /// Enqueue a link as-is.
    Link(String),
    /// Search and enqueue the first match.
    Search(String),
}

impl PlaybackCommand {
    /// Parses the words after the command name.
    ///
    /// A single word is a subcommand or, failing that, a link when
    /// `is_link` accepts it. Anything else is searched as free text.
    pub fn parse(args: &[&str], is_link: impl Fn(&str) -> bool) -> Option<Self> {
        match args {
            [] => None,
            [single] => Some(match *single {
                "q" => Self::Queue,
                "fill" => Self::Fill,
                "pause" => Self::Pause,
                "resume" => Self::Resume,
                "skip" => Self::Skip,
                "stop" => Self::Stop,
                link if is_link(link) => Self::Link(link.to_string()),
                text => Self::Search(text.to_string()),
            }),
            words => Some(Self::Search(words.join(" "))),
        }
    }

    /// Whether the command may join a voice channel to run.
    pub fn creates_session(&self) -> bool {
        matches!(self, Self::Fill | Self::Link(_) | Self::Search(_))
    }

    /// Whether running the command for `session` can change anything.
    /// Commands for a guild without a player are ignored.
    pub fn has_effect(&self, registry: &SessionRegistry, session: SessionId) -> bool {
        self.creates_session() || registry.contains(session)
    }
}

/// Runs `command` for `session`, joining `channel` when the command needs a
/// player. Returns the text to reply with, if any.
pub async fn dispatch(
    registry: &SessionRegistry,
    session: SessionId,
    channel: ChannelRef,
    command: PlaybackCommand,
) -> Result<Option<String>> {
    debug!("Ejecutando {:?} para {}", command, session);

    match command {
        PlaybackCommand::Queue => Ok(registry
            .list_queue(session)
            .await?
            .map(|listing| listing.to_string())),
        PlaybackCommand::Fill => {
            registry.fill(session, channel).await?;
            Ok(None)
        }
        PlaybackCommand::Pause => {
            registry.pause(session).await?;
            Ok(None)
        }
        PlaybackCommand::Resume => {
            registry.resume(session).await?;
            Ok(None)
        }
        PlaybackCommand::Skip => {
            registry.skip(session).await?;
            Ok(None)
        }
        PlaybackCommand::Stop => {
            registry.stop(session).await?;
            Ok(None)
        }
        PlaybackCommand::Link(link) => {
            registry.enqueue_link(session, channel, &link).await?;
            Ok(None)
        }
        PlaybackCommand::Search(text) => {
            let link = registry.enqueue_query(session, channel, &text).await?;
            info!("🎵 Búsqueda {:?} agregó {}", text, link);
            Ok(Some(format!("🎵 Agregado a la cola: {}", link)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            backend::MockResolver,
            testing::{collaborators, Recorder},
        },
        config::PlayerConfig,
        error::PlayerError,
        sources::is_youtube_link,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const GUILD: SessionId = SessionId::new(42);
    const CHANNEL: ChannelRef = ChannelRef::new(7);
    const A: &str = "https://youtu.be/aaaaaaaaaaa";
    const B: &str = "https://youtu.be/bbbbbbbbbbb";

    fn parse(args: &[&str]) -> Option<PlaybackCommand> {
        PlaybackCommand::parse(args, is_youtube_link)
    }

    fn registry(recorder: &Arc<Recorder>, resolver: MockResolver) -> SessionRegistry {
        SessionRegistry::new(
            collaborators(recorder, Arc::new(resolver)),
            PlayerConfig::default(),
        )
    }

    #[test]
    fn single_words_are_subcommands() {
        assert_eq!(parse(&["q"]), Some(PlaybackCommand::Queue));
        assert_eq!(parse(&["fill"]), Some(PlaybackCommand::Fill));
        assert_eq!(parse(&["pause"]), Some(PlaybackCommand::Pause));
        assert_eq!(parse(&["resume"]), Some(PlaybackCommand::Resume));
        assert_eq!(parse(&["skip"]), Some(PlaybackCommand::Skip));
        assert_eq!(parse(&["stop"]), Some(PlaybackCommand::Stop));
        assert_eq!(parse(&[]), None);
    }

    #[test]
    fn links_and_searches() {
        assert_eq!(
            parse(&["https://www.youtube.com/watch?v=dQw4w9WgXcQ"]),
            Some(PlaybackCommand::Link(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()
            ))
        );
        assert_eq!(
            parse(&["lofi"]),
            Some(PlaybackCommand::Search("lofi".to_string()))
        );
        // Subcommand words only count on their own.
        assert_eq!(
            parse(&["stop", "making", "sense"]),
            Some(PlaybackCommand::Search("stop making sense".to_string()))
        );
        assert_eq!(
            parse(&["https://youtu.be/dQw4w9WgXcQ", "extra"]),
            Some(PlaybackCommand::Search(
                "https://youtu.be/dQw4w9WgXcQ extra".to_string()
            ))
        );
    }

    #[test]
    fn only_enqueueing_commands_create_sessions() {
        assert!(PlaybackCommand::Fill.creates_session());
        assert!(PlaybackCommand::Link(A.to_string()).creates_session());
        assert!(PlaybackCommand::Search("x".to_string()).creates_session());
        assert!(!PlaybackCommand::Queue.creates_session());
        assert!(!PlaybackCommand::Stop.creates_session());
    }

    #[tokio::test]
    async fn controls_only_apply_to_existing_players() {
        let recorder = Recorder::new();
        let registry = registry(&recorder, MockResolver::new());

        assert!(!PlaybackCommand::Pause.has_effect(&registry, GUILD));
        assert!(!PlaybackCommand::Queue.has_effect(&registry, GUILD));
        assert!(PlaybackCommand::Fill.has_effect(&registry, GUILD));

        registry.get_or_create(GUILD, CHANNEL).await.unwrap();

        assert!(PlaybackCommand::Pause.has_effect(&registry, GUILD));
        assert!(PlaybackCommand::Queue.has_effect(&registry, GUILD));
        assert!(!PlaybackCommand::Skip.has_effect(&registry, SessionId::new(43)));
    }

    #[tokio::test]
    async fn queue_without_session_is_silent() {
        let recorder = Recorder::new();
        let registry = registry(&recorder, MockResolver::new());

        let reply = dispatch(&registry, GUILD, CHANNEL, PlaybackCommand::Queue)
            .await
            .unwrap();

        assert_eq!(reply, None);
        assert_eq!(recorder.connects(), 0);
    }

    #[tokio::test]
    async fn links_play_in_order_and_list() {
        let recorder = Recorder::new();
        let registry = registry(&recorder, MockResolver::new());

        for link in [A, B] {
            let command = PlaybackCommand::Link(link.to_string());
            assert_eq!(dispatch(&registry, GUILD, CHANNEL, command).await.unwrap(), None);
        }

        assert_eq!(recorder.played(), vec![A.to_string()]);
        let reply = dispatch(&registry, GUILD, CHANNEL, PlaybackCommand::Queue)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some(B));

        dispatch(&registry, GUILD, CHANNEL, PlaybackCommand::Stop)
            .await
            .unwrap();
        let reply = dispatch(&registry, GUILD, CHANNEL, PlaybackCommand::Queue)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Empty"));
    }

    #[tokio::test]
    async fn search_replies_with_queued_link() {
        let recorder = Recorder::new();
        let mut resolver = MockResolver::new();
        resolver
            .expect_search()
            .withf(|text| text == "never gonna give you up")
            .times(1)
            .returning(|_| Ok(Some(A.to_string())));
        let registry = registry(&recorder, resolver);

        let reply = dispatch(
            &registry,
            GUILD,
            CHANNEL,
            PlaybackCommand::Search("never gonna give you up".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(reply, Some(format!("🎵 Agregado a la cola: {}", A)));
        assert_eq!(recorder.played(), vec![A.to_string()]);
    }

    #[tokio::test]
    async fn failed_search_surfaces_error() {
        let recorder = Recorder::new();
        let mut resolver = MockResolver::new();
        resolver.expect_search().returning(|_| Ok(None));
        let registry = registry(&recorder, resolver);

        let result = dispatch(
            &registry,
            GUILD,
            CHANNEL,
            PlaybackCommand::Search("zzzz".to_string()),
        )
        .await;

        assert!(matches!(result, Err(PlayerError::ResolutionFailed(_))));
        assert!(recorder.played().is_empty());
    }
}
