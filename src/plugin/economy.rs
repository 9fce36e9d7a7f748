use crate::{
    event::*,
    helper::{self, human_duration, now_millis, UserHelper},
    plugin::*,
    records::UserRecord,
};
use anyhow::Result;
use rand::{seq::SliceRandom, Rng};
use serenity::all::{Message, UserId};

const LEADERBOARD_SIZE: usize = 10;

const JOBS: [&str; 10] = [
    "You worked as a programmer and fixed a critical bug",
    "You helped an old lady cross the street",
    "You delivered some packages",
    "You worked as a cashier at a local store",
    "You wrote an article for a blog",
    "You walked someone's dog",
    "You mowed your neighbor's lawn",
    "You worked as a babysitter",
    "You washed cars in your neighborhood",
    "You helped clean up the local park",
];

/// Coin balances, timed rewards and transfers between users.
pub struct Economy;

#[serenity::async_trait]
impl Plugin for Economy {
    fn name(&self) -> &'static str {
        "economy"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}balance [@user] - show coin balance\n\
             {prefix}daily - claim 100-500 coins once a day\n\
             {prefix}work - earn 50-250 coins every 30 minutes\n\
             {prefix}pay <@user> <amount> - give coins to someone\n\
             {prefix}leaderboard - richest users",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        for cmd in ["balance", "daily", "work", "pay", "leaderboard"] {
            let Some((msg, args)) = event.is_bot_cmd(ctx, cmd).await else {
                continue;
            };
            match cmd {
                "balance" => balance(ctx, msg, &args).await?,
                "daily" => daily(ctx, msg).await?,
                "work" => work(ctx, msg).await?,
                "pay" => pay(ctx, msg, &args).await?,
                _ => leaderboard(ctx, msg).await?,
            }
            return Ok(EventHandled::Yes);
        }
        Ok(EventHandled::No)
    }
}

async fn balance(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let user_id = match args.first() {
        Some(arg) => match helper::parse_user(arg) {
            Some(id) => id,
            None => {
                msg.reply(ctx.cache_http, format!("`{}` is not a user.", arg))
                    .await?;
                return Ok(());
            }
        },
        None => msg.author.id,
    };

    let user: UserRecord = ctx.store.write().await.record(&user_id.to_string()).await?;
    let name = user_id.nick_in_guild(ctx, msg.guild_id).await;
    msg.reply(
        ctx.cache_http,
        format!("{}'s wallet: {} coins", name, user.economy.balance),
    )
    .await?;
    Ok(())
}

async fn daily(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let reward = rand::thread_rng().gen_range(100..=500);
    let claimed = ctx
        .store
        .write()
        .await
        .update_record(&msg.author.id.to_string(), |user: &mut UserRecord| {
            user.economy.claim_daily(now_millis(), reward)
        })
        .await?;

    let reply = match claimed {
        Ok(balance) => format!(
            "You've claimed your daily reward of {} coins!  New balance: {} coins",
            reward, balance
        ),
        Err(remaining) => format!(
            "You've already claimed your daily reward.  Come back in {}.",
            human_duration(remaining)
        ),
    };
    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn work(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let (wage, job) = {
        let mut rng = rand::thread_rng();
        let job = JOBS.choose(&mut rng).copied().unwrap_or(JOBS[0]);
        (rng.gen_range(50..=250), job)
    };
    let claimed = ctx
        .store
        .write()
        .await
        .update_record(&msg.author.id.to_string(), |user: &mut UserRecord| {
            user.economy.claim_work(now_millis(), wage)
        })
        .await?;

    let reply = match claimed {
        Ok((earned, balance)) => format!(
            "{} and earned {} coins!  New balance: {} coins",
            job, earned, balance
        ),
        Err(remaining) => format!(
            "You're still on cooldown.  You can work again in {}.",
            human_duration(remaining)
        ),
    };
    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

async fn pay(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<()> {
    let prefix = cmd_prefix(ctx).await;
    let (recipient_id, amount) = match parse_payment(args, msg.author.id) {
        Ok(payment) => payment,
        Err(PaymentError::Usage) => {
            msg.reply(ctx.cache_http, format!("Usage: {}pay <@user> <amount>", prefix))
                .await?;
            return Ok(());
        }
        Err(err) => {
            msg.reply(ctx.cache_http, err.to_string()).await?;
            return Ok(());
        }
    };
    if recipient_id.to_user(ctx.cache_http).await?.bot {
        msg.reply(ctx.cache_http, "You can't pay a bot!").await?;
        return Ok(());
    }

    let outcome = ctx
        .store
        .write()
        .await
        .update_pair(
            &msg.author.id.to_string(),
            &recipient_id.to_string(),
            |sender: &mut UserRecord, recipient: &mut UserRecord| {
                sender
                    .economy
                    .transfer_to(&mut recipient.economy, amount)
                    .map(|()| (sender.economy.balance, recipient.economy.balance))
            },
        )
        .await?;

    let reply = match outcome {
        Ok((sender_balance, recipient_balance)) => format!(
            "<@{}> paid <@{}> {} coins.  Balances: {} / {} coins",
            msg.author.id, recipient_id, amount, sender_balance, recipient_balance
        ),
        Err(balance) => format!("You don't have enough coins!  You have {} coins.", balance),
    };
    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum PaymentError {
    Usage,
    NotPositive,
    ToSelf,
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PaymentError::Usage => write!(f, "Usage: pay <@user> <amount>"),
            PaymentError::NotPositive => write!(f, "You have to pay at least 1 coin."),
            PaymentError::ToSelf => write!(f, "You can't pay yourself!"),
        }
    }
}

/// Recipient and amount of a `pay` command sent by `sender`.
fn parse_payment(args: &[&str], sender: UserId) -> Result<(UserId, i64), PaymentError> {
    let (Some(recipient), Some(amount)) = (
        args.first().and_then(|arg| helper::parse_user(arg)),
        args.get(1).and_then(|arg| arg.parse::<i64>().ok()),
    ) else {
        return Err(PaymentError::Usage);
    };
    if amount < 1 {
        return Err(PaymentError::NotPositive);
    }
    if recipient == sender {
        return Err(PaymentError::ToSelf);
    }
    Ok((recipient, amount))
}

async fn leaderboard(ctx: &Context<'_>, msg: &Message) -> Result<()> {
    let top = top_balances(ctx.store.read().await.records::<UserRecord>(), LEADERBOARD_SIZE);
    if top.is_empty() {
        msg.reply(ctx.cache_http, "Nobody has any coins yet.").await?;
        return Ok(());
    }

    let mut reply = String::from("**Richest users:**\n");
    for (rank, (user_id, balance)) in top.iter().enumerate() {
        let name = match helper::parse_user(user_id) {
            Some(id) => id.nick_in_guild(ctx, msg.guild_id).await,
            None => "Unknown User".to_owned(),
        };
        reply.push_str(&format!("{}. {} - {} coins\n", rank + 1, name, balance));
    }
    msg.reply(ctx.cache_http, reply).await?;
    Ok(())
}

/// Highest balances first, ties broken by id for a stable order.
fn top_balances(users: Vec<(String, UserRecord)>, limit: usize) -> Vec<(String, i64)> {
    let mut balances: Vec<(String, i64)> = users
        .into_iter()
        .map(|(id, user)| (id, user.economy.balance))
        .collect();
    balances.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    balances.truncate(limit);
    balances
}
