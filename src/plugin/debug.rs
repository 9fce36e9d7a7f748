use crate::{event::*, helper::emoji_key, log_event, logging::*, plugin::*};
use anyhow::Result;

/// Prints debug information about event to stdout
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                let me = ctx.cache.current_user().color();
                log_event!("Connected to {} server(s) as {}", ready.guilds.len(), me);
            }
            Event::Message(msg) => {
                log_event!(
                    "{}{}{}{}{}{} {}",
                    msg.guild_id.color(ctx.http).await,
                    Glue.color(),
                    msg.channel_id.color(ctx.http).await,
                    Glue.color(),
                    msg.author.color(),
                    Glue.color(),
                    msg.content,
                );
            }
            Event::ReactionAdd(reaction) => log_event!(
                "{} reacted to message {} with \"{}\"",
                reaction.user_id.color(ctx.http).await,
                reaction.message_id,
                emoji_key(&reaction.emoji).unwrap_or("<unknown-emoji>".to_owned()),
            ),
            Event::ReactionRemove(reaction) => log_event!(
                "{} removed reaction \"{}\" from message {}",
                reaction.user_id.color(ctx.http).await,
                emoji_key(&reaction.emoji).unwrap_or("<unknown-emoji>".to_owned()),
                reaction.message_id,
            ),
            Event::MemberJoin(member) => log_event!(
                "{} joined {}",
                member.user.color(),
                Some(member.guild_id).color(ctx.http).await,
            ),
        }

        Ok(EventHandled::No)
    }
}
