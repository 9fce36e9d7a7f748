use crate::{
    event::*,
    helper::{now_millis, MessageHelper},
    plugin::*,
    records::{GuildRecord, Tag},
};
use anyhow::Result;
use serenity::all::{GuildId, Message, Permissions};

/// Character that recalls a tag, e.g. `?rules`.
const TAG_SIGIL: char = '?';

/// Named snippets of text anyone can recall.
pub struct Tags;

#[serenity::async_trait]
impl Plugin for Tags {
    fn name(&self) -> &'static str {
        "tag"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}tag add <name> <content> - save a snippet\n\
             {prefix}tag edit <name> <content> - change a snippet you created\n\
             {prefix}tag remove <name> - delete a snippet you created\n\
             {prefix}tag info <name> - who made a snippet and how often it is used\n\
             {prefix}tag list - list snippets, most used first\n\
             {TAG_SIGIL}<name> - post a snippet",
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

        let Some(name) = msg.content.strip_prefix(TAG_SIGIL) else {
            return Ok(EventHandled::No);
        };
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Ok(EventHandled::No);
        }

        match recall(ctx, guild_id, &name).await? {
            Some(content) => {
                msg.channel_id.say(ctx.http, content).await?;
                Ok(EventHandled::Yes)
            }
            None => Ok(EventHandled::No),
        }
    }
}

/// Tag content, counting the use.  `None` if the guild has no such tag.
async fn recall(ctx: &Context<'_>, guild_id: GuildId, name: &str) -> Result<Option<String>> {
    let guild_key = guild_id.to_string();
    let mut store = ctx.store.write().await;
    let exists = store
        .peek_record::<GuildRecord>(&guild_key)?
        .is_some_and(|guild| guild.tags.contains_key(name));
    if !exists {
        return Ok(None);
    }

    let content = store
        .update_record(&guild_key, |guild: &mut GuildRecord| {
            guild.tags.get_mut(name).map(|tag| {
                tag.uses = tag.uses.saturating_add(1);
                tag.content.clone()
            })
        })
        .await?;
    Ok(content)
}

async fn manage(ctx: &Context<'_>, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<String> {
    let prefix = cmd_prefix(ctx).await;
    let author = msg.author.id.to_string();
    let guild_key = guild_id.to_string();

    let reply = match args {
        ["add", name, content @ ..] if !content.is_empty() => {
            let name = name.to_lowercase();
            let tag = Tag {
                content: content.join(" "),
                created_by: author,
                created_at: now_millis(),
                ..Default::default()
            };
            let added = ctx
                .store
                .write()
                .await
                .update_record(&guild_key, |guild: &mut GuildRecord| add_tag(guild, &name, tag))
                .await?;
            if added {
                format!("Tag \"{}\" has been created!", name)
            } else {
                format!(
                    "A tag with the name \"{}\" already exists.  Use `{}tag edit` to edit it.",
                    name, prefix
                )
            }
        }
        ["edit", name, content @ ..] if !content.is_empty() => {
            let name = name.to_lowercase();
            let content = content.join(" ");
            let moderator = msg.has_permissions(ctx, Permissions::MANAGE_MESSAGES).await?;
            let edited = ctx
                .store
                .write()
                .await
                .update_record(&guild_key, |guild: &mut GuildRecord| {
                    edit_tag(guild, &name, &author, moderator, content, now_millis())
                })
                .await?;
            match edited {
                Ok(()) => format!("Tag \"{}\" has been edited!", name),
                Err(reason) => reason,
            }
        }
        ["remove", name] => {
            let name = name.to_lowercase();
            let moderator = msg.has_permissions(ctx, Permissions::MANAGE_MESSAGES).await?;
            let removed = ctx
                .store
                .write()
                .await
                .update_record(&guild_key, |guild: &mut GuildRecord| {
                    remove_tag(guild, &name, &author, moderator)
                })
                .await?;
            match removed {
                Ok(()) => format!("Tag \"{}\" has been deleted.", name),
                Err(reason) => reason,
            }
        }
        ["info", name] => {
            let name = name.to_lowercase();
            let guild = peek_guild(ctx, &guild_key).await?;
            match guild.tags.get(&name) {
                Some(tag) => describe(&name, tag),
                None => format!("A tag with the name \"{}\" doesn't exist.", name),
            }
        }
        ["list"] => list(&peek_guild(ctx, &guild_key).await?),
        _ => format!("Invalid command.  See `{}help`", prefix),
    };
    Ok(reply)
}

async fn peek_guild(ctx: &Context<'_>, guild_key: &str) -> Result<GuildRecord> {
    Ok(ctx
        .store
        .read()
        .await
        .peek_record::<GuildRecord>(guild_key)?
        .unwrap_or_default())
}

/// False if the name is taken.
fn add_tag(guild: &mut GuildRecord, name: &str, tag: Tag) -> bool {
    if guild.tags.contains_key(name) {
        return false;
    }
    guild.tags.insert(name.to_owned(), tag);
    true
}

/// The tag, if `requested_by` created it or is a moderator.
fn modifiable<'g>(
    guild: &'g mut GuildRecord,
    name: &str,
    requested_by: &str,
    moderator: bool,
) -> Result<&'g mut Tag, String> {
    match guild.tags.get_mut(name) {
        None => Err(format!("A tag with the name \"{}\" doesn't exist.", name)),
        Some(tag) if tag.created_by != requested_by && !moderator => {
            Err("Only the creator of a tag or a moderator can change it.".to_owned())
        }
        Some(tag) => Ok(tag),
    }
}

fn edit_tag(
    guild: &mut GuildRecord,
    name: &str,
    requested_by: &str,
    moderator: bool,
    content: String,
    now: i64,
) -> Result<(), String> {
    let tag = modifiable(guild, name, requested_by, moderator)?;
    tag.content = content;
    tag.edited_by = Some(requested_by.to_owned());
    tag.edited_at = Some(now);
    Ok(())
}

fn remove_tag(
    guild: &mut GuildRecord,
    name: &str,
    requested_by: &str,
    moderator: bool,
) -> Result<(), String> {
    modifiable(guild, name, requested_by, moderator)?;
    guild.tags.remove(name);
    Ok(())
}

fn describe(name: &str, tag: &Tag) -> String {
    let mut info = format!(
        "**Tag: {}**\nCreated by <@{}> <t:{}:R>\nUses: {}",
        name,
        tag.created_by,
        tag.created_at / 1000,
        tag.uses
    );
    if let (Some(editor), Some(at)) = (&tag.edited_by, tag.edited_at) {
        info.push_str(&format!("\nEdited by <@{}> <t:{}:R>", editor, at / 1000));
    }
    info
}

/// Most used first.
fn list(guild: &GuildRecord) -> String {
    if guild.tags.is_empty() {
        return "There are no tags in this server.".to_owned();
    }
    let mut tags: Vec<(&String, &Tag)> = guild.tags.iter().collect();
    tags.sort_by(|a, b| b.1.uses.cmp(&a.1.uses).then_with(|| a.0.cmp(b.0)));

    let lines: Vec<String> = tags
        .iter()
        .map(|(name, tag)| format!("`{}` ({} uses)", name, tag.uses))
        .collect();
    format!("**Server Tags**\n{}\nTotal tags: {}", lines.join("\n"), tags.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(created_by: &str) -> Tag {
        Tag {
            content: "Be nice".to_owned(),
            created_by: created_by.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn names_are_unique() {
        let mut guild = GuildRecord::default();
        assert!(add_tag(&mut guild, "rules", tag("1")));
        assert!(!add_tag(&mut guild, "rules", tag("2")));
        assert_eq!(guild.tags["rules"].created_by, "1");
    }

    #[test]
    fn creator_or_moderator_removes() {
        let mut guild = GuildRecord::default();
        add_tag(&mut guild, "rules", tag("1"));
        add_tag(&mut guild, "faq", tag("1"));

        assert!(remove_tag(&mut guild, "rules", "2", false).is_err());
        assert!(remove_tag(&mut guild, "missing", "1", false).is_err());
        assert_eq!(remove_tag(&mut guild, "rules", "1", false), Ok(()));
        assert_eq!(remove_tag(&mut guild, "faq", "2", true), Ok(()));
        assert!(guild.tags.is_empty());
    }

    #[test]
    fn edits_record_who_and_when() {
        let mut guild = GuildRecord::default();
        add_tag(&mut guild, "rules", tag("1"));

        assert!(edit_tag(&mut guild, "rules", "2", false, "x".to_owned(), 5).is_err());
        assert_eq!(guild.tags["rules"].content, "Be nice");

        assert_eq!(
            edit_tag(&mut guild, "rules", "2", true, "Be kind".to_owned(), 5_000),
            Ok(())
        );
        let edited = &guild.tags["rules"];
        assert_eq!(edited.content, "Be kind");
        assert_eq!(edited.edited_by.as_deref(), Some("2"));
        assert_eq!(edited.edited_at, Some(5_000));
        assert!(describe("rules", edited).ends_with("Edited by <@2> <t:5:R>"));
        assert!(!describe("rules", &tag("1")).contains("Edited"));
    }

    #[test]
    fn list_is_ordered_by_uses() {
        let mut guild = GuildRecord::default();
        assert_eq!(list(&guild), "There are no tags in this server.");

        for (name, uses) in [("a", 1), ("b", 7), ("c", 1)] {
            add_tag(&mut guild, name, Tag { uses, ..tag("1") });
        }
        assert_eq!(
            list(&guild),
            "**Server Tags**\n`b` (7 uses)\n`a` (1 uses)\n`c` (1 uses)\nTotal tags: 3"
        );
    }
}
