use crate::{event::*, plugin::*};
use anyhow::Result;

/// Bots never run commands, earn XP, or trigger reaction roles.
pub struct IgnoreBots;

#[serenity::async_trait]
impl Plugin for IgnoreBots {
    fn name(&self) -> &'static str {
        "ignore_bots"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let from_bot = match event {
            Event::Message(msg) => msg.author.bot,
            Event::ReactionAdd(reaction) | Event::ReactionRemove(reaction) => {
                reaction.user_id == Some(ctx.cache.current_user().id)
                    || reaction.member.as_ref().is_some_and(|m| m.user.bot)
            }
            Event::Ready(_) | Event::MemberJoin(_) => false,
        };

        if from_bot {
            Ok(EventHandled::Yes)
        } else {
            Ok(EventHandled::No)
        }
    }
}
