use crate::{
    event::*,
    helper::{self, UserHelper},
    plugin::*,
    records::UserRecord,
    store::{DocumentStore, StoreError},
};
use anyhow::Result;
use serenity::all::UserId;

/// Remembers each user's Last.fm account name.
pub struct LastFm;

#[serenity::async_trait]
impl Plugin for LastFm {
    fn name(&self) -> &'static str {
        "lastfm"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}lastfm set <username> - link your Last.fm account\n\
             {prefix}lastfm show [@user] - show a linked Last.fm account",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let reply = match parse(&args, msg.author.id) {
            Command::Set(username) => {
                link(&mut *ctx.store.write().await, msg.author.id, &username).await?;
                format!("Your Last.fm username has been set to **{}**!", username)
            }
            Command::Show(user_id) => {
                let lastfm = linked(&*ctx.store.read().await, user_id)?;
                let name = user_id.nick_in_guild(ctx, msg.guild_id).await;
                match lastfm {
                    Some(lastfm) => format!("{} is **{}** on Last.fm", name, lastfm),
                    None => format!("{} hasn't linked a Last.fm account.", name),
                }
            }
            Command::NotAUser => "That is not a user.".to_owned(),
            Command::Invalid => format!("Invalid command.  See `{}help`", cmd_prefix(ctx).await),
        };

        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Set(String),
    Show(UserId),
    NotAUser,
    Invalid,
}

fn parse(args: &[&str], author: UserId) -> Command {
    match args {
        ["set", username] => Command::Set(username.to_string()),
        ["show"] => Command::Show(author),
        ["show", user] => match helper::parse_user(user) {
            Some(user_id) => Command::Show(user_id),
            None => Command::NotAUser,
        },
        _ => Command::Invalid,
    }
}

async fn link(store: &mut DocumentStore, user_id: UserId, username: &str) -> Result<(), StoreError> {
    store
        .update_record(&user_id.to_string(), |user: &mut UserRecord| {
            user.lastfm = Some(username.to_owned())
        })
        .await
}

/// The linked account, without creating a record for users who never linked one.
fn linked(store: &DocumentStore, user_id: UserId) -> Result<Option<String>, StoreError> {
    Ok(store
        .peek_record::<UserRecord>(&user_id.to_string())?
        .and_then(|user| user.lastfm))
}
