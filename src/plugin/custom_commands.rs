use crate::{
    event::*,
    helper::{now_millis, MessageHelper},
    plugin::*,
    records::{CustomCommand, GuildRecord},
};
use anyhow::Result;
use serenity::all::{GuildId, Message};

/// Guild-defined commands that reply with fixed text.
pub struct CustomCommands;

#[serenity::async_trait]
impl Plugin for CustomCommands {
    fn name(&self) -> &'static str {
        "custom"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}custom add <name> <response> - add a server command (admins)\n\
             {prefix}custom remove <name> - remove a server command (admins)\n\
             {prefix}custom list - list server commands",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = msg.guild_id else {
            return Ok(EventHandled::No);
        };

        if let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await {
            let reply = manage(ctx, msg, guild_id, &args).await?;
            msg.reply(ctx.cache_http, reply).await?;
            return Ok(EventHandled::Yes);
        }

        let Some(guild) = ctx
            .store
            .read()
            .await
            .peek_record::<GuildRecord>(&guild_id.to_string())?
        else {
            return Ok(EventHandled::No);
        };

        match triggered(&guild, &msg.content) {
            Some(command) => {
                msg.channel_id.say(ctx.http, &command.response).await?;
                Ok(EventHandled::Yes)
            }
            None => Ok(EventHandled::No),
        }
    }
}

/// The custom command a message invokes, if any.  The name must directly follow the guild's
/// prefix and is matched case-insensitively.
fn triggered<'g>(guild: &'g GuildRecord, content: &str) -> Option<&'g CustomCommand> {
    if guild.prefix.is_empty() {
        return None;
    }
    let name = content
        .strip_prefix(guild.prefix.as_str())?
        .split(char::is_whitespace)
        .next()?
        .to_lowercase();
    guild.custom_commands.get(&name)
}

async fn manage(ctx: &Context<'_>, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<String> {
    let prefix = cmd_prefix(ctx).await;
    let guild_key = guild_id.to_string();

    if let ["list"] = args {
        let guild = ctx
            .store
            .read()
            .await
            .peek_record::<GuildRecord>(&guild_key)?
            .unwrap_or_default();
        if guild.custom_commands.is_empty() {
            return Ok("This server has no custom commands.".to_owned());
        }
        let names: Vec<String> = guild
            .custom_commands
            .keys()
            .map(|name| format!("{}{}", guild.prefix, name))
            .collect();
        return Ok(format!("Custom commands: {}", names.join(", ")));
    }

    if !msg.is_from_admin(ctx).await? {
        return Ok("Only server admins can change custom commands.".to_owned());
    }

    let reply = match args {
        ["add", name, response @ ..] if !response.is_empty() => {
            let name = name.to_lowercase();
            let command = CustomCommand {
                response: response.join(" "),
                created_by: msg.author.id.to_string(),
                created_at: now_millis(),
                ..Default::default()
            };
            let replaced = ctx
                .store
                .write()
                .await
                .update_record(&guild_key, |guild: &mut GuildRecord| {
                    guild.custom_commands.insert(name.clone(), command).is_some()
                })
                .await?;
            if replaced {
                format!("Custom command \"{}\" has been updated.", name)
            } else {
                format!("Custom command \"{}\" has been added.", name)
            }
        }
        ["remove", name] => {
            let name = name.to_lowercase();
            let removed = ctx
                .store
                .write()
                .await
                .update_record(&guild_key, |guild: &mut GuildRecord| {
                    guild.custom_commands.remove(&name).is_some()
                })
                .await?;
            if removed {
                format!("Custom command \"{}\" has been removed.", name)
            } else {
                format!("There is no custom command called \"{}\".", name)
            }
        }
        _ => format!("Invalid command.  See `{}help`", prefix),
    };
    Ok(reply)
}
