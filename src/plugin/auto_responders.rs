use crate::{
    event::*,
    helper::{now_millis, MessageHelper},
    plugin::*,
    records::{AutoResponder, AutoResponders as Responders, GuildRecord},
};
use anyhow::Result;
use serenity::all::{GuildId, Message, Permissions};

/// Separates the trigger from the response in `autoresponder add`.
const SEPARATOR: &str = "|";

/// Replies to ordinary messages that contain, or exactly match, a guild-defined trigger.
pub struct AutoResponders;

#[serenity::async_trait]
impl Plugin for AutoResponders {
    fn name(&self) -> &'static str {
        "autoresponder"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}autoresponder add [--exact] [--case] <trigger> | <response> - reply to a phrase (mods)\n\
             {prefix}autoresponder remove <trigger> - stop replying to a phrase (mods)\n\
             {prefix}autoresponder enable|disable - toggle all auto responses (mods)\n\
             {prefix}autoresponder list",
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

        match respond(ctx, guild_id, &msg.content).await? {
            Some(response) => {
                msg.channel_id.say(ctx.http, response).await?;
                Ok(EventHandled::Yes)
            }
            None => Ok(EventHandled::No),
        }
    }
}

async fn respond(ctx: &Context<'_>, guild_id: GuildId, content: &str) -> Result<Option<String>> {
    let guild_key = guild_id.to_string();
    let mut store = ctx.store.write().await;
    let fires = store
        .peek_record::<GuildRecord>(&guild_key)?
        .is_some_and(|guild| {
            guild.auto_responders.enabled
                && guild.auto_responders.responses.iter().any(|r| r.matches(content))
        });
    if !fires {
        return Ok(None);
    }
    let response = store
        .update_record(&guild_key, |guild: &mut GuildRecord| {
            fire(&mut guild.auto_responders, content)
        })
        .await?;
    Ok(response)
}

/// Response of the first responder `content` matches, counting its use.
fn fire(responders: &mut Responders, content: &str) -> Option<String> {
    if !responders.enabled {
        return None;
    }
    let responder = responders.responses.iter_mut().find(|r| r.matches(content))?;
    responder.uses = responder.uses.saturating_add(1);
    Some(responder.response.clone())
}

/// Parse `add` arguments: optional flags, then `<trigger> | <response>`.
fn parse_add(args: &[&str], created_by: &str, now: i64) -> Option<AutoResponder> {
    let mut responder = AutoResponder {
        created_by: created_by.to_owned(),
        created_at: now,
        ..Default::default()
    };
    let mut rest = args;
    while let Some((flag, tail)) = rest.split_first() {
        match *flag {
            "--exact" => responder.exact = true,
            "--case" => responder.case_sensitive = true,
            _ => break,
        }
        rest = tail;
    }

    let split = rest.iter().position(|word| *word == SEPARATOR)?;
    responder.trigger = rest[..split].join(" ");
    responder.response = rest[split + 1..].join(" ");
    if responder.trigger.is_empty() || responder.response.is_empty() {
        return None;
    }
    Some(responder)
}

/// False if a responder with the same trigger, ignoring case, exists.
fn add(responders: &mut Responders, responder: AutoResponder) -> bool {
    let trigger = responder.trigger.to_lowercase();
    if responders
        .responses
        .iter()
        .any(|r| r.trigger.to_lowercase() == trigger)
    {
        return false;
    }
    responders.responses.push(responder);
    true
}

fn remove(responders: &mut Responders, trigger: &str) -> bool {
    let trigger = trigger.to_lowercase();
    let before = responders.responses.len();
    responders
        .responses
        .retain(|r| r.trigger.to_lowercase() != trigger);
    responders.responses.len() != before
}

fn list(responders: &Responders) -> String {
    if responders.responses.is_empty() {
        return "This server has no auto responses.".to_owned();
    }
    let lines: Vec<String> = responders
        .responses
        .iter()
        .map(|r| {
            let mut modes = Vec::new();
            if r.exact {
                modes.push("exact");
            }
            if r.case_sensitive {
                modes.push("case sensitive");
            }
            let modes = if modes.is_empty() {
                String::new()
            } else {
                format!(" [{}]", modes.join(", "))
            };
            format!("`{}`{} ({} uses)", r.trigger, modes, r.uses)
        })
        .collect();
    format!(
        "**Auto Responses** ({})\n{}",
        if responders.enabled { "enabled" } else { "disabled" },
        lines.join("\n")
    )
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
        return Ok(list(&guild.auto_responders));
    }
    if !msg.has_permissions(ctx, Permissions::MANAGE_MESSAGES).await? {
        return Ok("Only moderators can change auto responses.".to_owned());
    }

    let mut store = ctx.store.write().await;
    let reply = match args {
        ["add", rest @ ..] => {
            let Some(responder) = parse_add(rest, &msg.author.id.to_string(), now_millis()) else {
                return Ok(format!(
                    "Usage: {}autoresponder add [--exact] [--case] <trigger> | <response>",
                    prefix
                ));
            };
            let trigger = responder.trigger.clone();
            let added = store
                .update_record(&guild_key, |guild: &mut GuildRecord| {
                    add(&mut guild.auto_responders, responder)
                })
                .await?;
            if added {
                format!("Auto response for \"{}\" has been added.", trigger)
            } else {
                format!("An auto response for \"{}\" already exists.", trigger)
            }
        }
        ["remove", trigger @ ..] if !trigger.is_empty() => {
            let trigger = trigger.join(" ");
            let removed = store
                .update_record(&guild_key, |guild: &mut GuildRecord| {
                    remove(&mut guild.auto_responders, &trigger)
                })
                .await?;
            if removed {
                format!("Auto response for \"{}\" has been removed.", trigger)
            } else {
                format!("There is no auto response for \"{}\".", trigger)
            }
        }
        [toggle @ ("enable" | "disable")] => {
            let enabled = *toggle == "enable";
            store
                .update_record(&guild_key, |guild: &mut GuildRecord| {
                    guild.auto_responders.enabled = enabled
                })
                .await?;
            format!("Auto responses {}d.", toggle)
        }
        _ => format!("Invalid command.  See `{}help`", prefix),
    };
    Ok(reply)
}
