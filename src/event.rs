//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks into a distinct Event enum.

use crate::{context::Context, log_error};
use serenity::all::{Member, Message, Reaction, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
    ReactionAdd(Reaction),
    ReactionRemove(Reaction),
    MemberJoin(Member),
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in plugin {}: {:#}", plugin.name(), err),
            }
        }
    }

    // Check if a message should be interpreted as a special bot command.
    //
    // These are prefixed with the configured command prefix, e. g. `;cmd foo bar baz`.  Returns
    // the message and the whitespace-separated arguments following the command.
    pub async fn is_bot_cmd<'e>(
        &'e self,
        ctx: &Context<'_>,
        cmd: &str,
    ) -> Option<(&'e Message, Vec<&'e str>)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let mut words = msg.content.split_whitespace();
        if words.next()?.strip_prefix(prefix.as_str())? != cmd {
            return None;
        }

        Some((msg, words.collect()))
    }
}

pub enum EventHandled {
    Yes,
    No,
}
