use crate::{
    event::*,
    helper::{self, now_millis, MessageHelper},
    log_error,
    plugin::*,
    records::{Economy, GuildRecord, UserRecord, DOUBLE_COINS},
};
use anyhow::Result;
use rand::Rng;
use serenity::all::{GuildId, Message, Permissions, RoleId};

#[derive(Debug, Clone, Copy, PartialEq)]
enum ItemKind {
    /// A role the guild configures with `shop role`
    Role,
    Lootbox,
    Buff { buff: &'static str, duration_ms: i64 },
}

struct Item {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    price: i64,
    kind: ItemKind,
}

static ITEMS: [Item; 4] = [
    Item {
        id: "vip_role",
        name: "VIP Role",
        description: "Get the VIP role in the server",
        price: 5000,
        kind: ItemKind::Role,
    },
    Item {
        id: "custom_color",
        name: "Custom Color Role",
        description: "Get a custom colored role",
        price: 2500,
        kind: ItemKind::Role,
    },
    Item {
        id: "lootbox",
        name: "Lootbox",
        description: "Open a lootbox for 500 to 2500 coins",
        price: 1000,
        kind: ItemKind::Lootbox,
    },
    Item {
        id: "double_coins",
        name: "Double Coins (1 day)",
        description: "Earn double coins from work for 1 day",
        price: 3000,
        kind: ItemKind::Buff {
            buff: DOUBLE_COINS,
            duration_ms: 24 * 60 * 60 * 1000,
        },
    },
];

/// Items bought with coins: roles, lootboxes and timed buffs.
pub struct Shop;

#[serenity::async_trait]
impl Plugin for Shop {
    fn name(&self) -> &'static str {
        "shop"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = cmd_prefix(ctx).await;
        Some(format!(
            "{prefix}shop - list items for sale\n\
             {prefix}shop buy <item> - buy an item\n\
             {prefix}shop role <item> <@role|off> - role a role item grants (admins)",
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        let reply = match args.as_slice() {
            [] | ["view"] => catalogue(),
            ["buy", item] => buy(ctx, msg, item).await?,
            ["role", item, role] => configure_role(ctx, msg, item, role).await?,
            _ => format!("Invalid command.  See `{}help`", cmd_prefix(ctx).await),
        };
        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

fn find_item(id: &str) -> Option<&'static Item> {
    let id = id.to_lowercase();
    ITEMS.iter().find(|item| item.id == id)
}

fn catalogue() -> String {
    let lines: Vec<String> = ITEMS
        .iter()
        .map(|item| {
            format!(
                "`{}` **{}** - {} coins\n{}",
                item.id, item.name, item.price, item.description
            )
        })
        .collect();
    format!("**Shop**\n{}", lines.join("\n"))
}

#[derive(Debug, PartialEq)]
struct Purchase {
    balance: i64,
    /// Coins found in a lootbox
    reward: Option<i64>,
}

/// Charge for `item` and apply its effect to the buyer's wallet.  `Err` carries the balance
/// if it is too low, and nothing changes.
fn purchase(economy: &mut Economy, item: &Item, now: i64, lootbox_reward: i64) -> Result<Purchase, i64> {
    economy.spend(item.price)?;
    let reward = match item.kind {
        ItemKind::Role => None,
        ItemKind::Lootbox => {
            economy.balance = economy.balance.saturating_add(lootbox_reward);
            Some(lootbox_reward)
        }
        ItemKind::Buff { buff, duration_ms } => {
            economy.grant_buff(buff, now.saturating_add(duration_ms));
            None
        }
    };
    Ok(Purchase {
        balance: economy.balance,
        reward,
    })
}

async fn buy(ctx: &Context<'_>, msg: &Message, item_id: &str) -> Result<String> {
    let Some(item) = find_item(item_id) else {
        return Ok("That item doesn't exist!".to_owned());
    };

    let role_id = match item.kind {
        ItemKind::Role => {
            let Some(guild_id) = msg.guild_id else {
                return Ok("Roles can only be bought in a server.".to_owned());
            };
            match shop_role(ctx, guild_id, item).await? {
                Some(role_id) => Some((guild_id, role_id)),
                None => return Ok(format!("{} is not available in this server.", item.name)),
            }
        }
        _ => None,
    };

    let user_key = msg.author.id.to_string();
    let reward = rand::thread_rng().gen_range(500..=2500);
    let bought = ctx
        .store
        .write()
        .await
        .update_record(&user_key, |user: &mut UserRecord| {
            purchase(&mut user.economy, item, now_millis(), reward)
        })
        .await?;
    let purchase = match bought {
        Ok(purchase) => purchase,
        Err(balance) => {
            return Ok(format!(
                "You don't have enough coins to buy this item!  You have {} coins, but the item costs {} coins.",
                balance, item.price
            ))
        }
    };

    if let Some((guild_id, role_id)) = role_id {
        let granted = ctx
            .http
            .add_member_role(guild_id, msg.author.id, role_id, Some("shop purchase"))
            .await;
        if let Err(e) = granted {
            log_error!("Failed to give shop role {} to {}: {}", role_id, msg.author.id, e);
            ctx.store
                .write()
                .await
                .update_record(&user_key, |user: &mut UserRecord| {
                    user.economy.balance = user.economy.balance.saturating_add(item.price)
                })
                .await?;
            return Ok(
                "There was an error giving you the role.  You have not been charged.".to_owned(),
            );
        }
    }

    Ok(match purchase.reward {
        Some(reward) => format!(
            "You opened a lootbox and found **{} coins**!  New balance: {} coins",
            reward, purchase.balance
        ),
        None => format!(
            "You bought **{}** for {} coins.  New balance: {} coins",
            item.name, item.price, purchase.balance
        ),
    })
}

async fn shop_role(ctx: &Context<'_>, guild_id: GuildId, item: &Item) -> Result<Option<RoleId>> {
    Ok(ctx
        .store
        .read()
        .await
        .peek_record::<GuildRecord>(&guild_id.to_string())?
        .and_then(|guild| guild.shop_roles.get(item.id).and_then(|id| helper::parse_role(id))))
}

async fn configure_role(ctx: &Context<'_>, msg: &Message, item_id: &str, role: &str) -> Result<String> {
    let Some(guild_id) = msg.guild_id else {
        return Ok("This only works in a server.".to_owned());
    };
    if !msg.has_permissions(ctx, Permissions::MANAGE_GUILD).await? {
        return Ok("Only server admins can configure the shop.".to_owned());
    }
    let Some(item) = find_item(item_id).filter(|item| item.kind == ItemKind::Role) else {
        return Ok(format!("`{}` is not a role item.", item_id));
    };
    let role_id = if role == "off" {
        None
    } else {
        match helper::parse_role(role) {
            Some(role_id) => Some(role_id),
            None => return Ok(format!("`{}` is not a role.", role)),
        }
    };

    ctx.store
        .write()
        .await
        .update_record(&guild_id.to_string(), |guild: &mut GuildRecord| match role_id {
            Some(role_id) => {
                guild.shop_roles.insert(item.id.to_owned(), role_id.to_string());
            }
            None => {
                guild.shop_roles.remove(item.id);
            }
        })
        .await?;
    Ok(match role_id {
        Some(role_id) => format!("{} now grants <@&{}>.", item.name, role_id),
        None => format!("{} is no longer for sale here.", item.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: i64) -> Economy {
        Economy {
            balance,
            ..Default::default()
        }
    }

    #[test]
    fn items_are_found_by_id() {
        assert_eq!(find_item("LOOTBOX").map(|item| item.price), Some(1000));
        assert!(find_item("Lootbox (1)").is_none());
        assert!(catalogue().contains("`double_coins` **Double Coins (1 day)** - 3000 coins"));
    }

    #[test]
    fn short_wallets_buy_nothing() {
        let mut economy = wallet(999);
        let lootbox = find_item("lootbox").unwrap();
        assert_eq!(purchase(&mut economy, lootbox, 0, 2500), Err(999));
        assert_eq!(economy, wallet(999));
    }

    #[test]
    fn lootbox_pays_out_after_the_price() {
        let mut economy = wallet(1000);
        let lootbox = find_item("lootbox").unwrap();
        assert_eq!(
            purchase(&mut economy, lootbox, 0, 600),
            Ok(Purchase {
                balance: 600,
                reward: Some(600)
            })
        );
    }

    #[test]
    fn double_coins_lasts_a_day() {
        let mut economy = wallet(3500);
        let buff = find_item("double_coins").unwrap();
        let bought = purchase(&mut economy, buff, 1_000, 0).unwrap();
        assert_eq!(bought.balance, 500);

        let day = 24 * 60 * 60 * 1000;
        assert!(economy.has_buff(DOUBLE_COINS, 1_000 + day - 1));
        assert!(!economy.has_buff(DOUBLE_COINS, 1_000 + day));
    }

    #[test]
    fn role_items_only_charge() {
        let mut economy = wallet(6000);
        let vip = find_item("vip_role").unwrap();
        assert_eq!(
            purchase(&mut economy, vip, 0, 2500),
            Ok(Purchase {
                balance: 1000,
                reward: None
            })
        );
        assert!(economy.buffs.is_empty());
    }
}
