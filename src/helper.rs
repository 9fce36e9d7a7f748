//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::{ChannelId, GuildId, Permissions, ReactionType, RoleId, UserId};

#[serenity::async_trait]
pub trait UserHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserHelper for serenity::all::User {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let nick_in_guild = match guild_id {
            Some(guild_id) => self.nick_in(ctx.cache_http, guild_id).await,
            None => None,
        };

        // May not be in a guild, e.g. DM.  Fall back to global username.
        match nick_in_guild {
            Some(nick_in_guild) => nick_in_guild,
            None => self.name.clone(),
        }
    }
}

#[serenity::async_trait]
impl UserHelper for UserId {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        match self.to_user(ctx.cache_http).await {
            Ok(user) => user.nick_in_guild(ctx, guild_id).await,
            Err(_) => format!("<unknown-user-{}>", self),
        }
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn is_from_owner(&self, ctx: &Context) -> bool;
    /// Bot owners, the guild owner, and members who may manage the guild.
    async fn is_from_admin(&self, ctx: &Context) -> Result<bool>;
    /// Bot owners, the guild owner, and members holding `required` (or administrator) in the
    /// guild the message was sent in.  Always false in DMs for everyone but bot owners.
    async fn has_permissions(&self, ctx: &Context, required: Permissions) -> Result<bool>;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    async fn is_from_owner(&self, ctx: &Context) -> bool {
        let owners = &ctx.cfg.read().await.general.bot_owners;
        let author_global_name = &self.author.name;

        owners.contains(author_global_name)
    }

    async fn is_from_admin(&self, ctx: &Context) -> Result<bool> {
        self.has_permissions(ctx, Permissions::MANAGE_GUILD).await
    }

    async fn has_permissions(&self, ctx: &Context, required: Permissions) -> Result<bool> {
        if self.is_from_owner(ctx).await {
            return Ok(true);
        }
        let Some(guild_id) = self.guild_id else {
            return Ok(false);
        };
        let guild = guild_id.to_partial_guild(ctx.cache_http).await?;
        if guild.owner_id == self.author.id {
            return Ok(true);
        }
        let member = guild_id.member(ctx.cache_http, self.author.id).await?;
        Ok(grants(guild.member_permissions(&member), required))
    }
}

/// Administrator implies every other permission.
pub fn grants(held: Permissions, required: Permissions) -> bool {
    held.administrator() || held.contains(required)
}

/// Current time as Unix milliseconds, the timestamp format used in stored documents.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// Render a millisecond duration as e.g. `3h 12m` or `4m 5s`.
pub fn human_duration(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, seconds)
    }
}

/// Accepts a raw id or a mention wrapping one, e.g. `<@&123>` with `"@&"`.
fn parse_mention(arg: &str, sigil: &str) -> Option<u64> {
    let inner = match arg.strip_prefix('<').and_then(|a| a.strip_suffix('>')) {
        Some(inner) => inner.strip_prefix(sigil)?,
        None => arg,
    };
    inner.parse().ok().filter(|id| *id != 0)
}

pub fn parse_user(arg: &str) -> Option<UserId> {
    let arg = arg.replacen("<@!", "<@", 1);
    parse_mention(&arg, "@").map(UserId::new)
}

pub fn parse_role(arg: &str) -> Option<RoleId> {
    parse_mention(arg, "@&").map(RoleId::new)
}

pub fn parse_channel(arg: &str) -> Option<ChannelId> {
    parse_mention(arg, "#").map(ChannelId::new)
}

/// How an emoji is identified in stored reaction role bindings: the id of a custom emoji, or
/// the character(s) of a unicode one.
pub fn emoji_key(emoji: &ReactionType) -> Option<String> {
    match emoji {
        ReactionType::Custom { id, .. } => Some(id.to_string()),
        ReactionType::Unicode(s) => Some(s.clone()),
        _ => None,
    }
}

/// Same key as [`emoji_key`], from a command argument such as `👍` or `<:party:1234>`.
pub fn emoji_key_from_arg(arg: &str) -> String {
    arg.strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .and_then(|inner| inner.rsplit(':').next())
        .filter(|id| id.parse::<u64>().is_ok())
        .map(str::to_owned)
        .unwrap_or_else(|| arg.to_owned())
}
