use crate::{
    event::*,
    helper::{self, now_millis, MessageHelper, UserHelper},
    log_error,
    plugin::*,
    records::{GuildRecord, UserRecord, XpAward},
    store::{DocumentStore, StoreError},
};
use anyhow::{anyhow, Result};
use rand::Rng;
use serenity::all::{ChannelId, GuildId, Message};

/// XP for chatting, level-up announcements and role rewards.
pub struct Leveling;

#[serenity::async_trait]
impl Plugin for Leveling {
    fn name(&self) -> &'static str {
        "leveling"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}rank [@user] - show level and XP\n\
             {prefix}levels <enable|disable> - toggle leveling (admins)\n\
             {prefix}levels channel <#channel|off> - where level-ups are announced (admins)\n\
             {prefix}levels role <level> <@role> - role awarded on reaching a level (admins)",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = msg.guild_id else {
            return Ok(EventHandled::No);
        };

        award_xp(ctx, msg, guild_id).await?;

        if let Some((msg, args)) = event.is_bot_cmd(ctx, "rank").await {
            rank(ctx, msg, &args).await?;
            return Ok(EventHandled::Yes);
        }
        if let Some((msg, args)) = event.is_bot_cmd(ctx, "levels").await {
            configure(ctx, msg, guild_id, &args).await?;
            return Ok(EventHandled::Yes);
        }

        Ok(EventHandled::No)
    }
}

async fn award_xp(ctx: &Context<'_>, msg: &Message, guild_id: GuildId) -> Result<()> {
    let earned = rand::thread_rng().gen_range(15..=25);
    let awarded = apply_xp(
        &mut *ctx.store.write().await,
        &guild_id.to_string(),
        &msg.author.id.to_string(),
        earned,
        now_millis(),
    )
    .await?;
    let Some((guild, award)) = awarded else {
        return Ok(());
    };

    let XpAward::LevelUp(level) = award else {
        return Ok(());
    };

    let reward = guild
        .level_system
        .role_for_level(level)
        .and_then(helper::parse_role);
    if let Some(role_id) = reward {
        // A missing role or permission shouldn't stop the announcement
        if let Err(err) = ctx
            .http
            .add_member_role(guild_id, msg.author.id, role_id, Some("level reward"))
            .await
        {
            log_error!("Could not award level {} role: {}", level, err);
        }
    }

    let mut announcement = format!(
        "Congratulations <@{}>! You've reached level {}!",
        msg.author.id, level
    );
    if let Some(role_id) = reward {
        announcement.push_str(&format!(" You've been awarded the <@&{}> role!", role_id));
    }

    let channel_id = announce_target(guild.level_system.announce_channel.as_deref(), msg.channel_id);
    channel_id.say(ctx.http, announcement).await?;
    Ok(())
}

async fn rank(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let user_id = match args.first() {
        Some(arg) => helper::parse_user(arg).ok_or(anyhow!("Invalid user `{}`", arg))?,
        None => msg.author.id,
    };
    let user: UserRecord = ctx.store.write().await.record(&user_id.to_string()).await?;
    let name = user_id.nick_in_guild(ctx, msg.guild_id).await;

    msg.reply(
        ctx.cache_http,
        format!(
            "{} is level {} ({}/{} XP, {} total)",
            name,
            user.xp.level,
            user.xp.xp,
            user.xp.needed_for_next_level(),
            user.xp.total_xp
        ),
    )
    .await?;
    Ok(())
}

async fn configure(ctx: &Context<'_>, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<()> {
    if !msg.is_from_admin(ctx).await? {
        msg.reply(ctx.cache_http, "Only server admins can configure leveling.")
            .await?;
        return Ok(());
    }

    let prefix = cmd_prefix(ctx).await;
    let change: Box<dyn FnOnce(&mut GuildRecord) -> String + Send> = match args {
        ["enable"] => Box::new(|guild: &mut GuildRecord| {
            guild.level_system.enabled = true;
            "Leveling enabled.".to_owned()
        }),
        ["disable"] => Box::new(|guild: &mut GuildRecord| {
            guild.level_system.enabled = false;
            "Leveling disabled.".to_owned()
        }),
        ["channel", "off"] => Box::new(|guild: &mut GuildRecord| {
            guild.level_system.announce_channel = None;
            "Level-ups will be announced where they happen.".to_owned()
        }),
        ["channel", channel] => {
            let Some(channel_id) = helper::parse_channel(channel) else {
                msg.reply(ctx.cache_http, format!("`{}` is not a channel.", channel))
                    .await?;
                return Ok(());
            };
            Box::new(move |guild: &mut GuildRecord| {
                guild.level_system.announce_channel = Some(channel_id.to_string());
                format!("Level-ups will be announced in <#{}>.", channel_id)
            })
        }
        ["role", level, role] => {
            let (Ok(level), Some(role_id)) = (level.parse::<u32>(), helper::parse_role(role))
            else {
                msg.reply(
                    ctx.cache_http,
                    format!("Usage: {}levels role <level> <@role>", prefix),
                )
                .await?;
                return Ok(());
            };
            Box::new(move |guild: &mut GuildRecord| {
                guild
                    .level_system
                    .roles
                    .insert(level.to_string(), role_id.to_string());
                format!("Reaching level {} now awards <@&{}>.", level, role_id)
            })
        }
        _ => {
            msg.reply(
                ctx.cache_http,
                format!("Unknown option.  See `{}help`", prefix),
            )
            .await?;
            return Ok(());
        }
    };

    let reply = ctx
        .store
        .write()
        .await
        .update_record::<GuildRecord, _, _>(&guild_id.to_string(), change)
        .await?;
    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

/// Credit a message's XP to the author if the guild has leveling enabled.  Guilds without
/// leveling never create user documents.
async fn apply_xp(
    store: &mut DocumentStore,
    guild_id: &str,
    user_id: &str,
    earned: u64,
    now: i64,
) -> Result<Option<(GuildRecord, XpAward)>, StoreError> {
    let Some(guild) = store.peek_record::<GuildRecord>(guild_id)? else {
        return Ok(None);
    };
    if !guild.level_system.enabled {
        return Ok(None);
    }
    let award = store
        .update_record(user_id, |user: &mut UserRecord| user.xp.award(earned, now))
        .await?;
    Ok(Some((guild, award)))
}

/// The configured announcement channel, or the channel the level was earned in.
fn announce_target(configured: Option<&str>, fallback: ChannelId) -> ChannelId {
    configured.and_then(helper::parse_channel).unwrap_or(fallback)
}
