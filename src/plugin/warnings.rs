use crate::{
    event::*,
    helper::{self, now_millis, MessageHelper},
    log_error,
    plugin::*,
    records::{GuildRecord, Warning},
};
use anyhow::Result;
use serenity::all::{CreateMessage, GuildId, Message, Permissions, UserId};

const NO_REASON: &str = "No reason provided";

/// Moderator warnings, kept per guild and member.
pub struct Warnings;

#[serenity::async_trait]
impl Plugin for Warnings {
    fn name(&self) -> &'static str {
        "warnings"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}warn <@user> [reason] - warn a member (mods)\n\
             {prefix}warnings [@user] - list warnings (mods for other members)\n\
             {prefix}clearwarnings <@user> - forget a member's warnings (mods)",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        for cmd in ["warn", "warnings", "clearwarnings"] {
            let Some((msg, args)) = event.is_bot_cmd(ctx, cmd).await else {
                continue;
            };
            let Some(guild_id) = msg.guild_id else {
                msg.reply(ctx.cache_http, "This only works in a server.")
                    .await?;
                return Ok(EventHandled::Yes);
            };
            let reply = match cmd {
                "warn" => warn(ctx, msg, guild_id, &args).await?,
                "warnings" => list(ctx, msg, guild_id, &args).await?,
                _ => clear(ctx, msg, guild_id, &args).await?,
            };
            msg.reply(ctx.cache_http, reply).await?;
            return Ok(EventHandled::Yes);
        }
        Ok(EventHandled::No)
    }
}

/// Record a warning, returning how many the member now has.
fn add_warning(guild: &mut GuildRecord, user_id: &str, warning: Warning) -> usize {
    let warnings = guild.warnings.entry(user_id.to_owned()).or_default();
    warnings.push(warning);
    warnings.len()
}

fn describe(user_id: UserId, warnings: &[Warning]) -> String {
    if warnings.is_empty() {
        return format!("<@{}> has no warnings.", user_id);
    }
    let lines: Vec<String> = warnings
        .iter()
        .enumerate()
        .map(|(i, w)| {
            format!(
                "{}. {} (by <@{}> <t:{}:R>)",
                i + 1,
                w.reason,
                w.moderator,
                w.created_at / 1000
            )
        })
        .collect();
    format!("**Warnings for <@{}>** ({})\n{}", user_id, warnings.len(), lines.join("\n"))
}

fn target(args: &[&str]) -> Option<(UserId, String)> {
    let (user, reason) = args.split_first()?;
    let reason = if reason.is_empty() {
        NO_REASON.to_owned()
    } else {
        reason.join(" ")
    };
    Some((helper::parse_user(user)?, reason))
}

async fn is_moderator(ctx: &Context<'_>, msg: &Message) -> Result<bool> {
    msg.has_permissions(ctx, Permissions::MODERATE_MEMBERS).await
}

async fn warn(ctx: &Context<'_>, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<String> {
    if !is_moderator(ctx, msg).await? {
        return Ok("Only moderators can warn members.".to_owned());
    }
    let Some((user_id, reason)) = target(args) else {
        return Ok(format!("Usage: {}warn <@user> [reason]", cmd_prefix(ctx).await));
    };

    let warning = Warning {
        reason: reason.clone(),
        moderator: msg.author.id.to_string(),
        created_at: now_millis(),
        ..Default::default()
    };
    let (count, mod_log) = ctx
        .store
        .write()
        .await
        .update_record(&guild_id.to_string(), |guild: &mut GuildRecord| {
            let count = add_warning(guild, &user_id.to_string(), warning);
            (count, guild.mod_log_channel.clone())
        })
        .await?;

    let guild_name = guild_id
        .to_partial_guild(ctx.cache_http)
        .await
        .map(|guild| guild.name)
        .unwrap_or_else(|_| "a server".to_owned());
    let notice = CreateMessage::new().content(format!(
        "You have been warned in **{}**.\nReason: {}",
        guild_name, reason
    ));
    let dm = match user_id.to_user(ctx.cache_http).await {
        Ok(user) => user.direct_message(ctx.cache_http, notice).await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = dm {
        log_error!("Could not DM warning to {}: {}", user_id, e);
    }

    let summary = format!(
        "<@{}> has been warned by <@{}>.\nReason: {}\nTotal warnings: {}",
        user_id, msg.author.id, reason, count
    );
    if let Some(channel_id) = mod_log.as_deref().and_then(helper::parse_channel) {
        if let Err(e) = channel_id.say(ctx.http, &summary).await {
            log_error!("Could not post warning to mod log {}: {}", channel_id, e);
        }
    }
    Ok(summary)
}

async fn list(ctx: &Context<'_>, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<String> {
    let user_id = match args.first() {
        Some(arg) => match helper::parse_user(arg) {
            Some(id) => id,
            None => return Ok(format!("`{}` is not a user.", arg)),
        },
        None => msg.author.id,
    };
    if user_id != msg.author.id && !is_moderator(ctx, msg).await? {
        return Ok("Only moderators can see other members' warnings.".to_owned());
    }

    let guild = ctx
        .store
        .read()
        .await
        .peek_record::<GuildRecord>(&guild_id.to_string())?
        .unwrap_or_default();
    let warnings = guild
        .warnings
        .get(&user_id.to_string())
        .map_or(&[][..], Vec::as_slice);
    Ok(describe(user_id, warnings))
}

async fn clear(ctx: &Context<'_>, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<String> {
    if !is_moderator(ctx, msg).await? {
        return Ok("Only moderators can clear warnings.".to_owned());
    }
    let Some(user_id) = args.first().and_then(|arg| helper::parse_user(arg)) else {
        return Ok(format!("Usage: {}clearwarnings <@user>", cmd_prefix(ctx).await));
    };
    let cleared = ctx
        .store
        .write()
        .await
        .update_record(&guild_id.to_string(), |guild: &mut GuildRecord| {
            guild
                .warnings
                .remove(&user_id.to_string())
                .map_or(0, |warnings| warnings.len())
        })
        .await?;
    Ok(format!("Cleared {} warning(s) for <@{}>.", cleared, user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(reason: &str, created_at: i64) -> Warning {
        Warning {
            reason: reason.to_owned(),
            moderator: "9".to_owned(),
            created_at,
            ..Default::default()
        }
    }

    #[test]
    fn warnings_accumulate_per_member() {
        let mut guild = GuildRecord::default();
        assert_eq!(add_warning(&mut guild, "1", warning("spam", 0)), 1);
        assert_eq!(add_warning(&mut guild, "2", warning("caps", 0)), 1);
        assert_eq!(add_warning(&mut guild, "1", warning("spam again", 0)), 2);
        assert_eq!(guild.warnings["1"][1].reason, "spam again");
    }

    #[test]
    fn reason_defaults() {
        assert_eq!(target(&["<@5>"]), Some((UserId::new(5), NO_REASON.to_owned())));
        assert_eq!(
            target(&["<@!5>", "being", "rude"]),
            Some((UserId::new(5), "being rude".to_owned()))
        );
        assert_eq!(target(&["someone", "rude"]), None);
        assert_eq!(target(&[]), None);
    }

    #[test]
    fn listing_is_numbered() {
        let user = UserId::new(5);
        assert_eq!(describe(user, &[]), "<@5> has no warnings.");
        assert_eq!(
            describe(user, &[warning("spam", 2_000), warning("caps", 3_000)]),
            "**Warnings for <@5>** (2)\n1. spam (by <@9> <t:2:R>)\n2. caps (by <@9> <t:3:R>)"
        );
    }
}
