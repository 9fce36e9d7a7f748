use crate::{
    event::*,
    helper::{now_millis, UserHelper},
    plugin::*,
    records::{self, UserRecord},
};
use anyhow::Result;
use serenity::all::Message;

/// Away-from-keyboard status.  Cleared by the user's next message; mentions of an AFK user get
/// an automatic reply.
pub struct Afk;

#[serenity::async_trait]
impl Plugin for Afk {
    fn name(&self) -> &'static str {
        "afk"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(format!(
            "{}{} [reason] - mark yourself as away until your next message",
            cmd_prefix(ctx).await,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await {
            let reason = if args.is_empty() {
                "AFK".to_owned()
            } else {
                args.join(" ")
            };
            set_afk(ctx, msg, reason).await?;
            return Ok(EventHandled::Yes);
        }

        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };
        if msg.guild_id.is_none() {
            return Ok(EventHandled::No);
        }

        clear_afk(ctx, msg).await?;
        notify_mentions(ctx, msg).await?;

        // Other plugins still get to act on the message
        Ok(EventHandled::No)
    }
}

async fn set_afk(ctx: &Context<'_>, msg: &Message, reason: String) -> Result<()> {
    let reply = format!("You are now AFK: {}", reason);
    let afk = records::Afk {
        status: true,
        reason,
        since: now_millis(),
        ..Default::default()
    };

    ctx.store
        .write()
        .await
        .update_record(&msg.author.id.to_string(), |user: &mut UserRecord| {
            user.afk = Some(afk)
        })
        .await?;

    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn clear_afk(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let author_id = msg.author.id.to_string();
    let was_afk = {
        let mut store = ctx.store.write().await;
        let is_afk = store
            .peek_record::<UserRecord>(&author_id)?
            .and_then(|user| user.afk)
            .is_some_and(|afk| afk.status);
        if is_afk {
            store.update_record(&author_id, come_back).await?;
        }
        is_afk
    };

    if was_afk {
        msg.reply(ctx.cache_http, "Welcome back! I've removed your AFK status.")
            .await?;
    }
    Ok(())
}

async fn notify_mentions(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let now = now_millis();
    for user in &msg.mentions {
        let afk = ctx
            .store
            .read()
            .await
            .peek_record::<UserRecord>(&user.id.to_string())?
            .and_then(|record| record.afk)
            .filter(|afk| afk.status);
        let Some(afk) = afk else {
            continue;
        };

        let name = user.nick_in_guild(ctx, msg.guild_id).await;
        msg.reply(ctx.cache_http, afk_notice(&name, &afk, now))
            .await?;
    }
    Ok(())
}

/// Clear the AFK status.  Returns whether the user was AFK.
fn come_back(user: &mut UserRecord) -> bool {
    match &mut user.afk {
        Some(afk) if afk.status => {
            afk.status = false;
            true
        }
        _ => false,
    }
}

fn afk_notice(name: &str, afk: &records::Afk, now: i64) -> String {
    let minutes = now.saturating_sub(afk.since).max(0) / 60_000;
    format!(
        "{} is AFK: {} ({} minute{} ago)",
        name,
        afk.reason,
        minutes,
        if minutes == 1 { "" } else { "s" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn away(since: i64) -> records::Afk {
        records::Afk {
            status: true,
            reason: "lunch".to_owned(),
            since,
            ..Default::default()
        }
    }

    #[test]
    fn next_message_clears_afk_once() {
        let mut user = UserRecord {
            afk: Some(away(0)),
            ..Default::default()
        };

        assert!(come_back(&mut user));
        assert!(!come_back(&mut user));
        assert_eq!(user.afk.map(|afk| (afk.status, afk.reason)), Some((false, "lunch".to_owned())));
        assert!(!come_back(&mut UserRecord::default()));
    }

    #[test]
    fn notice_counts_whole_minutes() {
        assert_eq!(
            afk_notice("bob", &away(0), 59_999),
            "bob is AFK: lunch (0 minutes ago)"
        );
        assert_eq!(
            afk_notice("bob", &away(0), 60_000),
            "bob is AFK: lunch (1 minute ago)"
        );
        assert_eq!(
            afk_notice("bob", &away(1_000), 1_000 + 5 * 60_000),
            "bob is AFK: lunch (5 minutes ago)"
        );
        assert_eq!(
            afk_notice("bob", &away(i64::MAX), 0),
            "bob is AFK: lunch (0 minutes ago)"
        );
    }
}
