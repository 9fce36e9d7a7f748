use crate::{
    event::*,
    helper::{self, emoji_key, emoji_key_from_arg, MessageHelper},
    plugin::*,
    records::{self, GuildRecord, StarredMessage},
};
use anyhow::Result;
use serenity::all::{
    ChannelId, CreateEmbed, CreateEmbedAuthor, CreateMessage, EditMessage, GuildId, Message,
    MessageId, Permissions, Reaction,
};

const STAR_COLOUR: u32 = 0xffd700;
const MAX_THRESHOLD: u64 = 25;

/// Reposts messages that collect enough of a guild's star emoji into a starboard channel.
pub struct Starboard;

#[serenity::async_trait]
impl Plugin for Starboard {
    fn name(&self) -> &'static str {
        "starboard"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}starboard setup <#channel> [threshold] [emoji] - enable the starboard (admins)\n\
             {prefix}starboard threshold <1-25> | emoji <emoji> - tune it (admins)\n\
             {prefix}starboard ignore|unignore <#channel> - skip a channel (admins)\n\
             {prefix}starboard disable | settings",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Event::ReactionAdd(reaction) = event {
            star(ctx, reaction).await?;
            return Ok(EventHandled::No);
        }

        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        let reply = configure(ctx, msg, &args).await?;
        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

#[derive(Debug, PartialEq)]
enum StarAction {
    Nothing,
    Post,
    /// Change the count on an existing starboard post
    Update(String),
}

/// What a reaction with `emoji` on a message leaves the starboard to do.
fn star_action(
    board: &records::Starboard,
    emoji: &str,
    channel_id: &str,
    author_is_bot: bool,
    message_id: &str,
    count: u64,
) -> StarAction {
    if !board.enabled
        || emoji != board.emoji
        || author_is_bot
        || board.channel_id.as_deref() == Some(channel_id)
        || board.ignored_channels.iter().any(|c| c == channel_id)
        || count < board.threshold
    {
        return StarAction::Nothing;
    }
    match board.starred_messages.get(message_id) {
        None => StarAction::Post,
        Some(starred) if starred.count != count => {
            StarAction::Update(starred.starboard_message_id.clone())
        }
        Some(_) => StarAction::Nothing,
    }
}

fn star_header(emoji: &str, count: u64, channel_id: ChannelId) -> String {
    format!("{} **{}** <#{}>", emoji, count, channel_id)
}

fn star_embed(message: &Message) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new(message.author.tag()).icon_url(message.author.face()))
        .description(message.content.clone())
        .field("Source", format!("[Jump to message]({})", message.link()), false)
        .colour(STAR_COLOUR)
        .timestamp(message.timestamp);
    let image = message.attachments.iter().find(|attachment| {
        attachment
            .content_type
            .as_deref()
            .is_some_and(|kind| kind.starts_with("image/"))
    });
    if let Some(image) = image {
        embed = embed.image(image.url.clone());
    }
    embed
}

async fn star(ctx: &Context<'_>, reaction: &Reaction) -> Result<()> {
    let (Some(guild_id), Some(emoji)) = (reaction.guild_id, emoji_key(&reaction.emoji)) else {
        return Ok(());
    };
    let guild_key = guild_id.to_string();
    let Some(guild) = ctx.store.read().await.peek_record::<GuildRecord>(&guild_key)? else {
        return Ok(());
    };
    let board = guild.starboard;
    if !board.enabled || board.emoji != emoji {
        return Ok(());
    }
    let Some(board_channel) = board.channel_id.as_deref().and_then(helper::parse_channel) else {
        return Ok(());
    };

    let message = reaction.message(ctx.cache_http).await?;
    let count = message
        .reactions
        .iter()
        .find(|r| emoji_key(&r.reaction_type).as_deref() == Some(emoji.as_str()))
        .map_or(0, |r| r.count);
    let message_key = message.id.to_string();
    let action = star_action(
        &board,
        &emoji,
        &message.channel_id.to_string(),
        message.author.bot,
        &message_key,
        count,
    );

    let header = star_header(&reaction.emoji.to_string(), count, message.channel_id);
    let posted_id = match action {
        StarAction::Nothing => return Ok(()),
        StarAction::Post => {
            let builder = CreateMessage::new().content(header).embed(star_embed(&message));
            board_channel
                .send_message(ctx.cache_http, builder)
                .await?
                .id
                .to_string()
        }
        StarAction::Update(posted_id) => {
            let Some(id) = posted_id.parse::<u64>().ok().filter(|id| *id != 0) else {
                return Ok(());
            };
            board_channel
                .edit_message(ctx.cache_http, MessageId::new(id), EditMessage::new().content(header))
                .await?;
            posted_id
        }
    };

    ctx.store
        .write()
        .await
        .update_record(&guild_key, |guild: &mut GuildRecord| {
            guild.starboard.starred_messages.insert(
                message_key,
                StarredMessage {
                    starboard_message_id: posted_id,
                    count,
                    ..Default::default()
                },
            );
        })
        .await?;
    Ok(())
}

/// Apply a configuration subcommand.  `Ok` and `Err` both carry the reply; `Err` means nothing
/// changed.
fn apply_setting(board: &mut records::Starboard, args: &[&str]) -> Result<String, String> {
    match args {
        ["setup", channel, rest @ ..] if rest.len() <= 2 => {
            let channel_id =
                helper::parse_channel(channel).ok_or(format!("`{}` is not a channel.", channel))?;
            let threshold = match rest.first() {
                Some(arg) => parse_threshold(arg)?,
                None => board.threshold,
            };
            board.enabled = true;
            board.channel_id = Some(channel_id.to_string());
            board.threshold = threshold;
            if let Some(emoji) = rest.get(1) {
                board.emoji = emoji_key_from_arg(emoji);
            }
            Ok(format!(
                "Starboard enabled in <#{}>.  Messages need {} {} reactions.",
                channel_id,
                board.threshold,
                emoji_display(&board.emoji)
            ))
        }
        ["disable"] => {
            board.enabled = false;
            Ok("Starboard disabled.".to_owned())
        }
        [_, ..] if !board.enabled => {
            Err("The starboard is not enabled.  Set it up first.".to_owned())
        }
        ["threshold", arg] => {
            board.threshold = parse_threshold(arg)?;
            Ok(format!("Starboard threshold set to {}.", board.threshold))
        }
        ["emoji", emoji] => {
            board.emoji = emoji_key_from_arg(emoji);
            Ok(format!("Starboard emoji set to {}.", emoji))
        }
        ["ignore", channel] => {
            let channel_id = helper::parse_channel(channel)
                .ok_or(format!("`{}` is not a channel.", channel))?
                .to_string();
            if board.ignored_channels.contains(&channel_id) {
                return Err(format!("<#{}> is already ignored.", channel_id));
            }
            board.ignored_channels.push(channel_id.clone());
            Ok(format!("Messages in <#{}> will no longer be starred.", channel_id))
        }
        ["unignore", channel] => {
            let channel_id = helper::parse_channel(channel)
                .ok_or(format!("`{}` is not a channel.", channel))?
                .to_string();
            let before = board.ignored_channels.len();
            board.ignored_channels.retain(|c| *c != channel_id);
            if board.ignored_channels.len() == before {
                return Err(format!("<#{}> is not ignored.", channel_id));
            }
            Ok(format!("Messages in <#{}> can be starred again.", channel_id))
        }
        _ => Err("Invalid starboard command.".to_owned()),
    }
}

fn parse_threshold(arg: &str) -> Result<u64, String> {
    arg.parse::<u64>()
        .ok()
        .filter(|n| (1..=MAX_THRESHOLD).contains(n))
        .ok_or(format!("The threshold must be between 1 and {}.", MAX_THRESHOLD))
}

/// Renders a stored emoji key back into message text.
fn emoji_display(key: &str) -> String {
    if key.parse::<u64>().is_ok() {
        format!("<:star:{}>", key)
    } else {
        key.to_owned()
    }
}

fn describe(board: &records::Starboard) -> String {
    let channel = board
        .channel_id
        .as_deref()
        .map_or("not set".to_owned(), |id| format!("<#{}>", id));
    let ignored = if board.ignored_channels.is_empty() {
        "none".to_owned()
    } else {
        board
            .ignored_channels
            .iter()
            .map(|id| format!("<#{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "**Starboard**\nEnabled: {}\nChannel: {}\nThreshold: {}\nEmoji: {}\nIgnored channels: {}\nStarred messages: {}",
        if board.enabled { "yes" } else { "no" },
        channel,
        board.threshold,
        emoji_display(&board.emoji),
        ignored,
        board.starred_messages.len()
    )
}

async fn configure(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<String> {
    let Some(guild_id) = msg.guild_id else {
        return Ok("This only works in a server.".to_owned());
    };
    if let ["settings"] = args {
        return Ok(describe(&peek_board(ctx, guild_id).await?));
    }
    if !msg.has_permissions(ctx, Permissions::MANAGE_GUILD).await? {
        return Ok("Only server admins can change the starboard.".to_owned());
    }

    let changed = ctx
        .store
        .write()
        .await
        .update_record(&guild_id.to_string(), |guild: &mut GuildRecord| {
            let mut board = guild.starboard.clone();
            let reply = apply_setting(&mut board, args);
            if reply.is_ok() {
                guild.starboard = board;
            }
            reply
        })
        .await?;
    Ok(match changed {
        Ok(reply) => reply,
        Err(reply) => format!("{}  See `{}help`", reply, cmd_prefix(ctx).await),
    })
}

async fn peek_board(ctx: &Context<'_>, guild_id: GuildId) -> Result<records::Starboard> {
    Ok(ctx
        .store
        .read()
        .await
        .peek_record::<GuildRecord>(&guild_id.to_string())?
        .unwrap_or_default()
        .starboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> records::Starboard {
        let mut board = records::Starboard::default();
        apply_setting(&mut board, &["setup", "<#10>", "2"]).unwrap();
        board
    }

    #[test]
    fn setup_is_required_before_tuning() {
        let mut board = records::Starboard::default();
        assert!(apply_setting(&mut board, &["threshold", "5"]).is_err());
        assert!(apply_setting(&mut board, &["setup", "general"]).is_err());
        assert!(apply_setting(&mut board, &["setup", "<#10>", "26"]).is_err());
        assert!(!board.enabled);

        apply_setting(&mut board, &["setup", "<#10>", "4", "<:gold:77>"]).unwrap();
        assert!(board.enabled);
        assert_eq!(board.channel_id.as_deref(), Some("10"));
        assert_eq!(board.threshold, 4);
        assert_eq!(board.emoji, "77");

        assert!(apply_setting(&mut board, &["threshold", "0"]).is_err());
        assert_eq!(board.threshold, 4);
    }

    #[test]
    fn ignored_channels_toggle() {
        let mut board = board();
        apply_setting(&mut board, &["ignore", "<#20>"]).unwrap();
        assert!(apply_setting(&mut board, &["ignore", "20"]).is_err());
        assert_eq!(board.ignored_channels, vec!["20".to_owned()]);
        assert!(describe(&board).contains("Ignored channels: <#20>"));

        apply_setting(&mut board, &["unignore", "<#20>"]).unwrap();
        assert!(apply_setting(&mut board, &["unignore", "<#20>"]).is_err());
        assert!(board.ignored_channels.is_empty());
    }

    #[test]
    fn posts_once_then_tracks_the_count() {
        let mut board = board();
        assert_eq!(star_action(&board, "⭐", "30", false, "1", 1), StarAction::Nothing);
        assert_eq!(star_action(&board, "⭐", "30", false, "1", 2), StarAction::Post);

        board.starred_messages.insert(
            "1".to_owned(),
            StarredMessage {
                starboard_message_id: "99".to_owned(),
                count: 2,
                ..Default::default()
            },
        );
        assert_eq!(star_action(&board, "⭐", "30", false, "1", 2), StarAction::Nothing);
        assert_eq!(
            star_action(&board, "⭐", "30", false, "1", 3),
            StarAction::Update("99".to_owned())
        );
    }

    #[test]
    fn skipped_reactions() {
        let mut board = board();
        apply_setting(&mut board, &["ignore", "<#20>"]).unwrap();

        assert_eq!(star_action(&board, "👍", "30", false, "1", 5), StarAction::Nothing);
        assert_eq!(star_action(&board, "⭐", "30", true, "1", 5), StarAction::Nothing);
        assert_eq!(star_action(&board, "⭐", "10", false, "1", 5), StarAction::Nothing);
        assert_eq!(star_action(&board, "⭐", "20", false, "1", 5), StarAction::Nothing);

        apply_setting(&mut board, &["disable"]).unwrap();
        assert_eq!(star_action(&board, "⭐", "30", false, "1", 5), StarAction::Nothing);
    }

    #[test]
    fn header_names_count_and_channel() {
        assert_eq!(star_header("⭐", 4, ChannelId::new(30)), "⭐ **4** <#30>");
    }
}
