use crate::{
    event::*,
    helper::{self, emoji_key, emoji_key_from_arg, MessageHelper},
    log_error,
    plugin::*,
    records::{ReactionRole, REACTION_ROLES},
    store::{Document, DocumentStore},
};
use anyhow::Result;
use serde_json::json;
use serenity::all::{Message, Reaction};

/// Grants a role to whoever reacts to a message with a given emoji, and takes it away when the
/// reaction is removed.
pub struct ReactionRoles;

#[serenity::async_trait]
impl Plugin for ReactionRoles {
    fn name(&self) -> &'static str {
        "reactionrole"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}reactionrole add <message-id> <emoji> <@role> - react to get a role (admins)\n\
             {prefix}reactionrole remove <message-id> <emoji> - remove a reaction role (admins)",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::ReactionAdd(reaction) => {
                toggle_role(ctx, reaction, true).await?;
                Ok(EventHandled::No)
            }
            Event::ReactionRemove(reaction) => {
                toggle_role(ctx, reaction, false).await?;
                Ok(EventHandled::No)
            }
            _ => {
                let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
                    return Ok(EventHandled::No);
                };
                let reply = configure(ctx, msg, &args).await?;
                msg.reply(ctx.cache_http, reply).await?;
                Ok(EventHandled::Yes)
            }
        }
    }
}

async fn toggle_role(ctx: &Context<'_>, reaction: &Reaction, grant: bool) -> Result<()> {
    let (Some(guild_id), Some(user_id), Some(emoji)) =
        (reaction.guild_id, reaction.user_id, emoji_key(&reaction.emoji))
    else {
        return Ok(());
    };

    let role_id = {
        let store = ctx.store.read().await;
        let Some(document) = store.get(REACTION_ROLES, &reaction.message_id.to_string()) else {
            return Ok(());
        };
        bindings(document)
            .into_iter()
            .find(|binding| binding.emoji == emoji)
            .and_then(|binding| helper::parse_role(&binding.role_id))
    };
    let Some(role_id) = role_id else {
        return Ok(());
    };

    if grant {
        ctx.http
            .add_member_role(guild_id, user_id, role_id, Some("reaction role"))
            .await?;
    } else {
        ctx.http
            .remove_member_role(guild_id, user_id, role_id, Some("reaction role"))
            .await?;
    }
    Ok(())
}

async fn configure(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<String> {
    if msg.guild_id.is_none() {
        return Ok("This only works in a server.".to_owned());
    }
    if !msg.is_from_admin(ctx).await? {
        return Ok("Only server admins can manage reaction roles.".to_owned());
    }

    let prefix = cmd_prefix(ctx).await;
    let reply = match args {
        ["add", message_id, emoji, role] => {
            let (Some(message_id), Some(role_id)) = (parse_message_id(message_id), helper::parse_role(role))
            else {
                return Ok(format!(
                    "Usage: {}reactionrole add <message-id> <emoji> <@role>",
                    prefix
                ));
            };
            let binding = ReactionRole {
                role_id: role_id.to_string(),
                emoji: emoji_key_from_arg(emoji),
                ..Default::default()
            };
            let mut store = ctx.store.write().await;
            if add_binding(&mut store, &message_id, binding).await {
                format!("Reacting with {} to message {} now grants <@&{}>.", emoji, message_id, role_id)
            } else {
                "Could not save that reaction role.".to_owned()
            }
        }
        ["remove", message_id, emoji] => {
            let Some(message_id) = parse_message_id(message_id) else {
                return Ok(format!(
                    "Usage: {}reactionrole remove <message-id> <emoji>",
                    prefix
                ));
            };
            let mut store = ctx.store.write().await;
            if remove_binding(&mut store, &message_id, &emoji_key_from_arg(emoji)).await {
                format!("Removed the {} reaction role from message {}.", emoji, message_id)
            } else {
                format!("Message {} has no {} reaction role.", message_id, emoji)
            }
        }
        _ => format!("Invalid command.  See `{}help`", prefix),
    };
    Ok(reply)
}

fn parse_message_id(arg: &str) -> Option<String> {
    arg.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(|id| id.to_string())
}

/// Bindings stored for one message.  Unparseable entries are skipped.
fn bindings(document: &Document) -> Vec<ReactionRole> {
    let Some(entries) = document.as_array() else {
        log_error!("Reaction role document is not a list: {}", document);
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect()
}

/// Bind `binding.emoji` on `message_id` to a role, replacing any earlier binding for the same
/// emoji.  Returns false if nothing could be stored.
async fn add_binding(store: &mut DocumentStore, message_id: &str, binding: ReactionRole) -> bool {
    let Ok(entry) = serde_json::to_value(&binding) else {
        return false;
    };
    let stored = store
        .with_document(REACTION_ROLES, message_id, json!([]), |document| {
            let mut kept: Vec<Document> = bindings(document)
                .into_iter()
                .filter(|existing| existing.emoji != binding.emoji)
                .filter_map(|existing| serde_json::to_value(existing).ok())
                .collect();
            kept.push(entry);
            *document = Document::Array(kept);
        })
        .await;
    stored.is_some()
}

/// Unbind an emoji from a message, dropping the message's document once no bindings are left.
/// Returns whether a binding was removed.
async fn remove_binding(store: &mut DocumentStore, message_id: &str, emoji: &str) -> bool {
    let Some(document) = store.get(REACTION_ROLES, message_id) else {
        return false;
    };
    let current = bindings(document);
    let remaining: Vec<&ReactionRole> = current.iter().filter(|b| b.emoji != emoji).collect();
    if remaining.len() == current.len() {
        return false;
    }

    if remaining.is_empty() {
        store.delete(REACTION_ROLES, message_id);
        store.save().await;
    } else {
        let remaining = json!(remaining);
        store
            .with_document(REACTION_ROLES, message_id, json!([]), |document| {
                *document = remaining
            })
            .await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(role_id: &str, emoji: &str) -> ReactionRole {
        ReactionRole {
            role_id: role_id.to_owned(),
            emoji: emoji.to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn bindings_are_added_replaced_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let mut store = DocumentStore::open(&path, 0).await;

        assert!(add_binding(&mut store, "100", binding("1", "👍")).await);
        assert!(add_binding(&mut store, "100", binding("2", "🎉")).await);
        assert!(add_binding(&mut store, "100", binding("3", "👍")).await);

        let stored = bindings(store.get(REACTION_ROLES, "100").unwrap());
        assert_eq!(stored, vec![binding("2", "🎉"), binding("3", "👍")]);

        assert!(!remove_binding(&mut store, "100", "❓").await);
        assert!(!remove_binding(&mut store, "999", "👍").await);
        assert!(remove_binding(&mut store, "100", "👍").await);
        assert_eq!(
            bindings(store.get(REACTION_ROLES, "100").unwrap()),
            vec![binding("2", "🎉")]
        );

        assert!(remove_binding(&mut store, "100", "🎉").await);
        assert!(store.get(REACTION_ROLES, "100").is_none());

        let reopened = DocumentStore::open(&path, 0).await;
        assert!(reopened.collection(REACTION_ROLES).unwrap().is_empty());
    }

    #[test]
    fn malformed_bindings_are_skipped() {
        let document = json!([{ "roleId": "1", "emoji": "👍" }, { "role": 5 }]);
        assert_eq!(bindings(&document), vec![binding("1", "👍")]);
        assert!(bindings(&json!({ "roleId": "1" })).is_empty());
    }

    #[test]
    fn message_ids_must_be_snowflakes() {
        assert_eq!(parse_message_id("1234"), Some("1234".to_owned()));
        assert_eq!(parse_message_id("0"), None);
        assert_eq!(parse_message_id("abc"), None);
    }
}
