use crate::{
    event::*,
    helper::{self, MessageHelper},
    log_error,
    plugin::*,
    records::GuildRecord,
};
use anyhow::Result;
use serenity::all::{Member, Message};

/// Per-guild settings and the member-join greeting that uses them.
pub struct Settings;

#[serenity::async_trait]
impl Plugin for Settings {
    fn name(&self) -> &'static str {
        "settings"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}welcome <#channel|off> - greet new members (admins)\n\
             {prefix}autorole <@role|off> - role given to new members (admins)\n\
             {prefix}modlog <#channel|off> - where member joins and warnings are logged (admins)\n\
             {prefix}prefix <prefix> - prefix for custom commands (admins)",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Event::MemberJoin(member) = event {
            greet(ctx, member).await?;
            return Ok(EventHandled::No);
        }

        for cmd in ["welcome", "autorole", "modlog", "prefix"] {
            if let Some((msg, args)) = event.is_bot_cmd(ctx, cmd).await {
                configure(ctx, msg, cmd, &args).await?;
                return Ok(EventHandled::Yes);
            }
        }
        Ok(EventHandled::No)
    }
}

type Change = Box<dyn FnOnce(&mut GuildRecord) + Send>;

/// Parse a settings command into the change it makes and a confirmation.  `Err` carries the
/// reply for invalid input.
fn parse_change(cmd: &str, args: &[&str]) -> Result<(Change, String), String> {
    let arg = match args {
        [arg] => *arg,
        _ => return Err(format!("Usage: {} <value|off>", cmd)),
    };
    let off = arg == "off";

    match cmd {
        "welcome" | "modlog" => {
            let channel = if off {
                None
            } else {
                Some(helper::parse_channel(arg).ok_or(format!("`{}` is not a channel.", arg))?)
            };
            let confirmation = match channel {
                Some(channel_id) => format!("{} channel set to <#{}>.", cmd, channel_id),
                None => format!("{} channel disabled.", cmd),
            };
            let channel = channel.map(|id| id.to_string());
            let change: Change = if cmd == "welcome" {
                Box::new(move |guild: &mut GuildRecord| guild.welcome_channel = channel)
            } else {
                Box::new(move |guild: &mut GuildRecord| guild.mod_log_channel = channel)
            };
            Ok((change, confirmation))
        }
        "autorole" => {
            let role = if off {
                None
            } else {
                Some(helper::parse_role(arg).ok_or(format!("`{}` is not a role.", arg))?)
            };
            let confirmation = match role {
                Some(role_id) => format!("New members will get <@&{}>.", role_id),
                None => "Auto role disabled.".to_owned(),
            };
            let role = role.map(|id| id.to_string());
            let change: Change = Box::new(move |guild: &mut GuildRecord| guild.auto_role = role);
            Ok((change, confirmation))
        }
        _ => {
            if off || arg.chars().count() > 5 {
                return Err("A prefix must be 1 to 5 characters.".to_owned());
            }
            let prefix = arg.to_owned();
            let confirmation = format!("Custom command prefix set to `{}`.", prefix);
            let change: Change = Box::new(move |guild: &mut GuildRecord| guild.prefix = prefix);
            Ok((change, confirmation))
        }
    }
}

async fn configure(ctx: &Context<'_>, msg: &Message, cmd: &str, args: &[&str]) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        msg.reply(ctx.cache_http, "This only works in a server.")
            .await?;
        return Ok(());
    };
    if !msg.is_from_admin(ctx).await? {
        msg.reply(ctx.cache_http, "Only server admins can change settings.")
            .await?;
        return Ok(());
    }

    let reply = match parse_change(cmd, args) {
        Ok((change, confirmation)) => {
            ctx.store
                .write()
                .await
                .update_record::<GuildRecord, _, _>(&guild_id.to_string(), change)
                .await?;
            confirmation
        }
        Err(reply) => reply,
    };
    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn greet(ctx: &Context<'_>, member: &Member) -> Result<()> {
    let guild = ctx
        .store
        .write()
        .await
        .record::<GuildRecord>(&member.guild_id.to_string())
        .await?;

    if let Some(channel_id) = guild.welcome_channel.as_deref().and_then(helper::parse_channel) {
        let guild_name = member
            .guild_id
            .to_partial_guild(ctx.http)
            .await
            .map(|guild| guild.name)
            .unwrap_or_else(|_| "the server".to_owned());
        channel_id
            .say(
                ctx.http,
                format!(
                    "Welcome to **{}**, <@{}>! We hope you enjoy your stay.",
                    guild_name, member.user.id
                ),
            )
            .await?;
    }

    if let Some(role_id) = guild.auto_role.as_deref().and_then(helper::parse_role) {
        if let Err(err) = ctx
            .http
            .add_member_role(member.guild_id, member.user.id, role_id, Some("auto role"))
            .await
        {
            log_error!("Could not add auto role to {}: {}", member.user.name, err);
        }
    }

    if let Some(channel_id) = guild.mod_log_channel.as_deref().and_then(helper::parse_channel) {
        channel_id
            .say(
                ctx.http,
                format!("<@{}> ({}) joined", member.user.id, member.user.name),
            )
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(cmd: &str, args: &[&str]) -> Result<GuildRecord, String> {
        let (change, _) = parse_change(cmd, args)?;
        let mut guild = GuildRecord::default();
        change(&mut guild);
        Ok(guild)
    }

    #[test]
    fn channels_and_roles_are_stored_as_ids() {
        assert_eq!(
            apply("welcome", &["<#10>"]).unwrap().welcome_channel.as_deref(),
            Some("10")
        );
        assert_eq!(
            apply("modlog", &["11"]).unwrap().mod_log_channel.as_deref(),
            Some("11")
        );
        assert_eq!(
            apply("autorole", &["<@&12>"]).unwrap().auto_role.as_deref(),
            Some("12")
        );
        assert_eq!(apply("prefix", &["$"]).unwrap().prefix, "$");
    }

    #[test]
    fn off_clears_a_setting() {
        assert_eq!(apply("welcome", &["off"]).unwrap().welcome_channel, None);
        assert_eq!(apply("autorole", &["off"]).unwrap().auto_role, None);
    }

    #[test]
    fn bad_input_is_explained() {
        assert!(apply("welcome", &["<@&10>"]).is_err());
        assert!(apply("autorole", &[]).is_err());
        assert!(apply("prefix", &["toolong"]).is_err());
        assert!(apply("prefix", &["off"]).is_err());
    }
}
