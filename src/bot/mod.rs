//! # Bot Module
//!
//! Prefix-command front end for Guild Jukebox.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. It turns
//! `!youtube ...` messages (aliases `yt` and `play`) into
//! [`PlaybackCommand`]s, runs them against the shared [`SessionRegistry`]
//! and replies with the queue listing or the error. It also reports the
//! bot's own voice channel moves to the affected session as `Signalling`,
//! which is how a migration is told apart from a real disconnect.

use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;

pub use commands::{dispatch, PlaybackCommand};

use crate::{
    audio::{ChannelRef, ConnectionState, SessionId, SessionRegistry},
    config::Config,
};

/// Names the playback command answers to.
pub const COMMAND_NAMES: [&str; 3] = ["youtube", "yt", "play"];

pub struct JukeboxBot {
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }

    /// Splits `content` into arguments when it invokes the playback command.
    fn command_args<'a>(&self, content: &'a str) -> Option<Vec<&'a str>> {
        parse_invocation(&self.config.command_prefix, content)
    }

    /// The voice channel `msg`'s author is currently in.
    fn author_channel(ctx: &Context, guild_id: GuildId, msg: &Message) -> Option<ChannelId> {
        ctx.cache.guild(guild_id).and_then(|guild| {
            guild
                .voice_states
                .get(&msg.author.id)
                .and_then(|state| state.channel_id)
        })
    }
}

/// Returns the arguments of a `<prefix><name> ...` message, or `None` when
/// the message is not addressed to the playback command.
pub fn parse_invocation<'a>(prefix: &str, content: &'a str) -> Option<Vec<&'a str>> {
    let mut words = content.strip_prefix(prefix)?.split_whitespace();
    let name = words.next()?;
    COMMAND_NAMES
        .contains(&name.to_lowercase().as_str())
        .then(|| words.collect())
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("✅ {} está conectado!", ready.user.name);
        info!("🎵 Escuchando {}youtube en {} guilds", self.config.command_prefix, ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(args) = self.command_args(&msg.content) else {
            return;
        };
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let Some(channel_id) = Self::author_channel(&ctx, guild_id, &msg) else {
            info!("El usuario {} no está en un canal de voz", msg.author.name);
            return;
        };

        let registry = &self.registry;
        let Some(command) = PlaybackCommand::parse(&args, |text| registry.is_playable_link(text)) else {
            info!("El usuario {} no dio argumentos", msg.author.name);
            return;
        };

        let session = SessionId::new(guild_id.get());
        let channel = ChannelRef::new(channel_id.get());

        if !command.has_effect(&self.registry, session) {
            debug!("Sin reproductor en {}, ignorando {:?}", session, command);
            return;
        }

        let reply = match dispatch(&self.registry, session, channel, command).await {
            Ok(Some(text)) => text,
            Ok(None) => return,
            Err(e) => {
                warn!("❌ Comando fallido en {}: {}", session, e);
                format!("❌ {}", e)
            }
        };

        if let Err(e) = msg.reply(&ctx, reply).await {
            error!("Error al enviar respuesta: {:?}", e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let previous = old.and_then(|state| state.channel_id);
        match (previous, new.channel_id) {
            (Some(from), Some(to)) if from != to => {
                info!("🔄 Movido de {} a {} en guild {}", from, to, guild_id);
                self.registry
                    .notify_connection(SessionId::new(guild_id.get()), ConnectionState::Signalling);
            }
            (_, None) => debug!("Salió del canal de voz en guild {}", guild_id),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invocation_needs_prefix_and_name() {
        assert_eq!(
            parse_invocation("!", "!youtube never gonna"),
            Some(vec!["never", "gonna"])
        );
        assert_eq!(parse_invocation("!", "!yt q"), Some(vec!["q"]));
        assert_eq!(parse_invocation("!", "!PLAY skip"), Some(vec!["skip"]));
        assert_eq!(parse_invocation("!", "!yt"), Some(vec![]));
        assert_eq!(parse_invocation("!", "youtube q"), None);
        assert_eq!(parse_invocation("!", "!avatar"), None);
        assert_eq!(parse_invocation("?", "!yt q"), None);
    }
}
