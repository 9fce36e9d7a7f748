//! Typed views over store documents.
//!
//! The store itself is schema-agnostic.  Each feature reads its documents through one of the
//! record types here, which fills in missing fields with defaults and carries unknown fields
//! through untouched so features never clobber each other's data.

use crate::{
    log_error,
    store::{DocumentStore, StoreError},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DAILY_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;
pub const WORK_COOLDOWN_MS: i64 = 30 * 60 * 1000;
pub const XP_COOLDOWN_MS: i64 = 60 * 1000;

/// Top-level collection mapping a message id to its reaction role bindings.
pub const REACTION_ROLES: &str = "reactionRoles";

/// A document shape stored in a fixed collection.
pub trait Record: Serialize + DeserializeOwned + Default {
    const COLLECTION: &'static str;
}

impl DocumentStore {
    /// Fetch (creating with defaults if needed) and parse the record for `id`.
    pub async fn record<T: Record>(&mut self, id: &str) -> Result<T, StoreError> {
        let document = self.record_document::<T>(id).await?;
        parse(T::COLLECTION, id, document.clone())
    }

    /// Parse the record for `id` if it exists, without creating it.
    pub fn peek_record<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.get(T::COLLECTION, id)
            .map(|document| parse(T::COLLECTION, id, document.clone()))
            .transpose()
    }

    /// Every record in the collection that parses.  Malformed documents are logged and skipped.
    pub fn records<T: Record>(&self) -> Vec<(String, T)> {
        let Some(collection) = self.collection(T::COLLECTION) else {
            return Vec::new();
        };

        collection
            .iter()
            .filter_map(|(id, document)| match parse(T::COLLECTION, id, document.clone()) {
                Ok(record) => Some((id.clone(), record)),
                Err(err) => {
                    log_error!("Skipping record: {}", err);
                    None
                }
            })
            .collect()
    }

    /// Apply `f` to the record for `id`, write the result back into the same document, then
    /// save.
    pub async fn update_record<T, F, R>(&mut self, id: &str, f: F) -> Result<R, StoreError>
    where
        T: Record,
        F: FnOnce(&mut T) -> R,
    {
        let document = self.record_document::<T>(id).await?;
        let mut record: T = parse(T::COLLECTION, id, document.clone())?;
        let result = f(&mut record);
        *document = serde_json::to_value(&record).map_err(StoreError::Serialize)?;
        self.save().await;
        Ok(result)
    }

    /// Apply `f` to two distinct records together.  Both are parsed before `f` runs and both are
    /// written back before the single save, so a malformed document leaves neither changed.
    pub async fn update_pair<T, F, R>(&mut self, first: &str, second: &str, f: F) -> Result<R, StoreError>
    where
        T: Record,
        F: FnOnce(&mut T, &mut T) -> R,
    {
        if first == second {
            return Err(StoreError::CallerMisuse {
                collection: T::COLLECTION.to_owned(),
                id: second.to_owned(),
            });
        }

        let mut a: T = self.record(first).await?;
        let mut b: T = self.record(second).await?;
        let result = f(&mut a, &mut b);
        let a = serde_json::to_value(&a).map_err(StoreError::Serialize)?;
        let b = serde_json::to_value(&b).map_err(StoreError::Serialize)?;

        *self.record_document::<T>(first).await? = a;
        *self.record_document::<T>(second).await? = b;
        self.save().await;
        Ok(result)
    }

    async fn record_document<T: Record>(&mut self, id: &str) -> Result<&mut Value, StoreError> {
        let defaults = serde_json::to_value(T::default()).map_err(StoreError::Serialize)?;
        self.get_or_create(T::COLLECTION, id, defaults)
            .await
            .ok_or_else(|| StoreError::CallerMisuse {
                collection: T::COLLECTION.to_owned(),
                id: id.to_owned(),
            })
    }
}

fn parse<T: DeserializeOwned>(collection: &str, id: &str, document: Value) -> Result<T, StoreError> {
    serde_json::from_value(document).map_err(|source| StoreError::InvalidDocument {
        collection: collection.to_owned(),
        id: id.to_owned(),
        source,
    })
}

/// Milliseconds left on a cooldown that started at `last`, if it has not yet expired.  A `last`
/// in the future counts as just started.
pub fn cooldown_remaining(last: Option<i64>, now: i64, cooldown: i64) -> Option<i64> {
    let elapsed = now.saturating_sub(last?).max(0);
    (elapsed < cooldown).then(|| cooldown - elapsed)
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    pub lastfm: Option<String>,
    pub economy: Economy,
    pub xp: Experience,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afk: Option<Afk>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for UserRecord {
    const COLLECTION: &'static str = "users";
}

/// Buff key in [`Economy::buffs`]: work pays double until the stored timestamp.
pub const DOUBLE_COINS: &str = "doubleCoins";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Economy {
    pub balance: i64,
    pub last_daily: Option<i64>,
    pub last_work: Option<i64>,
    /// Buff name to the Unix millisecond timestamp it expires at
    pub buffs: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Economy {
    /// Credit the daily reward.  `Err` carries the milliseconds until it may be claimed again.
    pub fn claim_daily(&mut self, now: i64, reward: i64) -> Result<i64, i64> {
        if let Some(remaining) = cooldown_remaining(self.last_daily, now, DAILY_COOLDOWN_MS) {
            return Err(remaining);
        }
        self.balance = self.balance.saturating_add(reward);
        self.last_daily = Some(now);
        Ok(self.balance)
    }

    /// Credit wages for a shift, doubled while [`DOUBLE_COINS`] is active.  Returns the amount
    /// paid and the new balance; `Err` carries the milliseconds until the next shift.
    pub fn claim_work(&mut self, now: i64, earnings: i64) -> Result<(i64, i64), i64> {
        if let Some(remaining) = cooldown_remaining(self.last_work, now, WORK_COOLDOWN_MS) {
            return Err(remaining);
        }
        let paid = if self.has_buff(DOUBLE_COINS, now) {
            earnings.saturating_mul(2)
        } else {
            earnings
        };
        self.balance = self.balance.saturating_add(paid);
        self.last_work = Some(now);
        Ok((paid, self.balance))
    }

    pub fn has_buff(&self, buff: &str, now: i64) -> bool {
        self.buffs
            .get(buff)
            .and_then(Value::as_i64)
            .is_some_and(|until| until > now)
    }

    pub fn grant_buff(&mut self, buff: &str, until: i64) {
        self.buffs.insert(buff.to_owned(), Value::from(until));
    }

    /// Take `price` from the balance.  `Err` carries the balance if it is too low.
    pub fn spend(&mut self, price: i64) -> Result<i64, i64> {
        if self.balance < price {
            return Err(self.balance);
        }
        self.balance = self.balance.saturating_sub(price);
        Ok(self.balance)
    }

    /// Move `amount` coins to `recipient`.  Nothing changes unless the whole amount is
    /// available; `Err` carries the sender's balance in that case.
    pub fn transfer_to(&mut self, recipient: &mut Economy, amount: i64) -> Result<(), i64> {
        self.spend(amount)?;
        recipient.balance = recipient.balance.saturating_add(amount);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub level: u32,
    /// Progress towards the next level
    pub xp: u64,
    pub total_xp: u64,
    pub last_message_time: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Experience {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            total_xp: 0,
            last_message_time: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum XpAward {
    OnCooldown,
    Gained,
    LevelUp(u32),
}

impl Experience {
    pub fn needed_for_next_level(&self) -> u64 {
        u64::from(self.level) * 100
    }

    /// Award `earned` XP for a message sent at `now`.  At most one level is gained per message;
    /// surplus XP carries into the next level.
    pub fn award(&mut self, earned: u64, now: i64) -> XpAward {
        if cooldown_remaining(self.last_message_time, now, XP_COOLDOWN_MS).is_some() {
            return XpAward::OnCooldown;
        }

        self.xp = self.xp.saturating_add(earned);
        self.total_xp = self.total_xp.saturating_add(earned);
        self.last_message_time = Some(now);

        let needed = self.needed_for_next_level();
        if self.xp >= needed && self.level < u32::MAX {
            self.xp -= needed;
            self.level += 1;
            XpAward::LevelUp(self.level)
        } else {
            XpAward::Gained
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Afk {
    pub status: bool,
    pub reason: String,
    pub since: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuildRecord {
    /// Prefix for custom commands
    pub prefix: String,
    pub welcome_channel: Option<String>,
    pub auto_role: Option<String>,
    pub mod_log_channel: Option<String>,
    pub level_system: LevelSystem,
    pub custom_commands: BTreeMap<String, CustomCommand>,
    pub tags: BTreeMap<String, Tag>,
    pub starboard: Starboard,
    pub auto_responders: AutoResponders,
    /// Shop item id to the role it grants in this guild
    pub shop_roles: BTreeMap<String, String>,
    /// User id to the warnings they have received here, oldest first
    pub warnings: BTreeMap<String, Vec<Warning>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GuildRecord {
    fn default() -> Self {
        Self {
            prefix: "!".to_owned(),
            welcome_channel: None,
            auto_role: None,
            mod_log_channel: None,
            level_system: LevelSystem::default(),
            custom_commands: BTreeMap::new(),
            tags: BTreeMap::new(),
            starboard: Starboard::default(),
            auto_responders: AutoResponders::default(),
            shop_roles: BTreeMap::new(),
            warnings: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

impl Record for GuildRecord {
    const COLLECTION: &'static str = "guilds";
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelSystem {
    pub enabled: bool,
    pub announce_channel: Option<String>,
    /// Level reached (as a string, matching the JSON key) to role id awarded
    pub roles: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LevelSystem {
    pub fn role_for_level(&self, level: u32) -> Option<&str> {
        self.roles.get(&level.to_string()).map(String::as_str)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCommand {
    pub response: String,
    pub created_by: String,
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub content: String,
    pub created_by: String,
    pub created_at: i64,
    #[serde(default)]
    pub uses: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Starboard {
    pub enabled: bool,
    pub channel_id: Option<String>,
    pub threshold: u64,
    /// Emoji key as produced by [`crate::helper::emoji_key`]
    pub emoji: String,
    pub ignored_channels: Vec<String>,
    /// Source message id to its starboard post
    pub starred_messages: BTreeMap<String, StarredMessage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Starboard {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_id: None,
            threshold: 3,
            emoji: "⭐".to_owned(),
            ignored_channels: Vec::new(),
            starred_messages: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredMessage {
    pub starboard_message_id: String,
    pub count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoResponders {
    pub enabled: bool,
    /// Checked in order; the first match wins
    pub responses: Vec<AutoResponder>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoResponder {
    pub trigger: String,
    pub response: String,
    #[serde(default)]
    pub exact: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    pub created_by: String,
    pub created_at: i64,
    #[serde(default)]
    pub uses: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AutoResponder {
    /// Whether `content` fires this responder: equal to the trigger when `exact`, containing it
    /// otherwise.
    pub fn matches(&self, content: &str) -> bool {
        if self.case_sensitive {
            if self.exact {
                content == self.trigger
            } else {
                content.contains(&self.trigger)
            }
        } else {
            let (content, trigger) = (content.to_lowercase(), self.trigger.to_lowercase());
            if self.exact {
                content == trigger
            } else {
                content.contains(&trigger)
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub reason: String,
    pub moderator: String,
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRole {
    pub role_id: String,
    pub emoji: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn open_store(dir: &tempfile::TempDir) -> DocumentStore {
        DocumentStore::open(dir.path().join("database.json"), 0).await
    }

    #[tokio::test]
    async fn new_user_gets_default_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;

        let user: UserRecord = store.record("42").await.unwrap();
        assert_eq!(user, UserRecord::default());
        assert_eq!(user.xp.level, 1);

        assert_eq!(
            store.get("users", "42"),
            Some(&json!({
                "lastfm": null,
                "economy": { "balance": 0, "lastDaily": null, "lastWork": null, "buffs": {} },
                "xp": { "level": 1, "xp": 0, "totalXp": 0, "lastMessageTime": null },
            }))
        );
    }

    #[tokio::test]
    async fn update_keeps_fields_owned_by_other_features() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;
        store
            .get_or_create("guilds", "7", json!({ "voiceMaster": { "enabled": true } }))
            .await
            .unwrap();

        store
            .update_record("7", |guild: &mut GuildRecord| guild.prefix = "?".to_owned())
            .await
            .unwrap();

        let document = store.get("guilds", "7").unwrap();
        assert_eq!(document["voiceMaster"], json!({ "enabled": true }));
        assert_eq!(document["prefix"], "?");
    }

    #[tokio::test]
    async fn peek_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert_eq!(store.peek_record::<GuildRecord>("7").unwrap(), None);
        assert!(store.get("guilds", "7").is_none());
    }

    #[tokio::test]
    async fn mismatched_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;
        store
            .get_or_create("users", "1", json!({ "economy": { "balance": "lots" } }))
            .await
            .unwrap();
        store.get_or_create("users", "2", json!({})).await.unwrap();

        assert!(matches!(
            store.record::<UserRecord>("1").await,
            Err(StoreError::InvalidDocument { .. })
        ));
        let records = store.records::<UserRecord>();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "2");
    }

    #[tokio::test]
    async fn level_roles_are_keyed_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;

        store
            .update_record("7", |guild: &mut GuildRecord| {
                guild
                    .level_system
                    .roles
                    .insert("5".to_owned(), "555".to_owned());
            })
            .await
            .unwrap();

        assert_eq!(
            store.get("guilds", "7").unwrap()["levelSystem"]["roles"],
            json!({ "5": "555" })
        );
        let guild: GuildRecord = store.record("7").await.unwrap();
        assert_eq!(guild.level_system.role_for_level(5), Some("555"));
        assert_eq!(guild.level_system.role_for_level(6), None);
    }

    #[test]
    fn daily_respects_cooldown() {
        let mut economy = Economy::default();
        assert_eq!(economy.claim_daily(1_000, 200), Ok(200));
        assert_eq!(
            economy.claim_daily(1_000 + 60_000, 200),
            Err(DAILY_COOLDOWN_MS - 60_000)
        );
        assert_eq!(economy.claim_daily(1_000 + DAILY_COOLDOWN_MS, 100), Ok(300));
    }

    #[test]
    fn work_respects_cooldown() {
        let mut economy = Economy::default();
        assert_eq!(economy.claim_work(0, 50), Ok((50, 50)));
        assert!(economy.claim_work(WORK_COOLDOWN_MS - 1, 50).is_err());
        assert_eq!(economy.claim_work(WORK_COOLDOWN_MS, 70), Ok((70, 120)));
    }

    #[test]
    fn double_coins_doubles_work_until_it_expires() {
        let mut economy = Economy::default();
        economy.grant_buff(DOUBLE_COINS, WORK_COOLDOWN_MS);

        assert_eq!(economy.claim_work(0, 50), Ok((100, 100)));
        assert!(!economy.has_buff(DOUBLE_COINS, WORK_COOLDOWN_MS));
        assert_eq!(economy.claim_work(WORK_COOLDOWN_MS, 50), Ok((50, 150)));
    }

    #[test]
    fn hostile_stored_values_do_not_overflow() {
        let mut economy = Economy {
            balance: i64::MAX - 10,
            last_daily: Some(i64::MIN),
            last_work: Some(i64::MAX),
            ..Economy::default()
        };
        assert_eq!(economy.claim_daily(0, 500), Ok(i64::MAX));
        // A timestamp in the future reads as a freshly started cooldown.
        assert_eq!(economy.claim_work(0, 50), Err(WORK_COOLDOWN_MS));

        let mut xp = Experience {
            xp: u64::MAX - 1,
            total_xp: u64::MAX,
            ..Experience::default()
        };
        assert_eq!(xp.award(25, 0), XpAward::LevelUp(2));
        assert_eq!(xp.total_xp, u64::MAX);

        assert_eq!(cooldown_remaining(Some(i64::MAX), i64::MIN, 1_000), Some(1_000));
    }

    #[test]
    fn transfer_is_all_or_nothing() {
        let mut sender = Economy {
            balance: 100,
            ..Economy::default()
        };
        let mut recipient = Economy::default();

        assert_eq!(sender.transfer_to(&mut recipient, 150), Err(100));
        assert_eq!((sender.balance, recipient.balance), (100, 0));

        assert_eq!(sender.transfer_to(&mut recipient, 100), Ok(()));
        assert_eq!((sender.balance, recipient.balance), (0, 100));
    }

    #[tokio::test]
    async fn nested_unknown_fields_survive_updates() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;
        store
            .get_or_create(
                "guilds",
                "7",
                json!({
                    "tags": { "rules": {
                        "content": "x", "createdBy": "1", "createdAt": 0,
                        "editedBy": "2", "pinned": true,
                    } },
                    "levelSystem": { "enabled": true, "stackRoles": true },
                    "starboard": { "selfStar": false },
                }),
            )
            .await
            .unwrap();

        store
            .update_record("7", |guild: &mut GuildRecord| guild.prefix = "?".to_owned())
            .await
            .unwrap();

        let document = store.get("guilds", "7").unwrap();
        assert_eq!(document["tags"]["rules"]["editedBy"], "2");
        assert_eq!(document["tags"]["rules"]["pinned"], true);
        assert_eq!(document["levelSystem"]["stackRoles"], true);
        assert_eq!(document["levelSystem"]["enabled"], true);
        assert_eq!(document["starboard"]["selfStar"], false);
        assert_eq!(document["starboard"]["threshold"], 3);
    }

    #[tokio::test]
    async fn pair_update_leaves_both_untouched_on_bad_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;
        store
            .update_record("1", |user: &mut UserRecord| user.economy.balance = 100)
            .await
            .unwrap();
        store
            .get_or_create("users", "2", json!({ "economy": { "balance": "lots" } }))
            .await
            .unwrap();

        let result = store
            .update_pair("1", "2", |sender: &mut UserRecord, recipient: &mut UserRecord| {
                sender.economy.transfer_to(&mut recipient.economy, 40)
            })
            .await;
        assert!(matches!(result, Err(StoreError::InvalidDocument { .. })));

        let reopened = open_store(&dir).await;
        let sender: UserRecord = reopened.peek_record("1").unwrap().unwrap();
        assert_eq!(sender.economy.balance, 100);
        assert_eq!(
            reopened.get("users", "2").unwrap()["economy"]["balance"],
            "lots"
        );
    }

    #[tokio::test]
    async fn pair_update_saves_both() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir).await;
        store
            .update_record("1", |user: &mut UserRecord| user.economy.balance = 100)
            .await
            .unwrap();

        let moved = store
            .update_pair("1", "2", |sender: &mut UserRecord, recipient: &mut UserRecord| {
                sender.economy.transfer_to(&mut recipient.economy, 40)
            })
            .await
            .unwrap();
        assert_eq!(moved, Ok(()));
        assert!(store
            .update_pair("1", "1", |_: &mut UserRecord, _: &mut UserRecord| ())
            .await
            .is_err());

        let reopened = open_store(&dir).await;
        let balance = |id: &str| {
            reopened
                .peek_record::<UserRecord>(id)
                .unwrap()
                .unwrap()
                .economy
                .balance
        };
        assert_eq!((balance("1"), balance("2")), (60, 40));
    }

    #[test]
    fn auto_responders_match_by_mode() {
        let responder = |trigger: &str, exact: bool, case_sensitive: bool| AutoResponder {
            trigger: trigger.to_owned(),
            exact,
            case_sensitive,
            ..AutoResponder::default()
        };

        assert!(responder("hello", false, false).matches("Well HELLO there"));
        assert!(!responder("hello", true, false).matches("hello there"));
        assert!(responder("hello", true, false).matches("Hello"));
        assert!(!responder("Hello", false, true).matches("hello"));
        assert!(responder("Hello", true, true).matches("Hello"));
    }

    #[test]
    fn xp_levels_up_and_carries_surplus() {
        let mut xp = Experience::default();
        assert_eq!(xp.award(25, 0), XpAward::Gained);
        assert_eq!(xp.award(25, 30_000), XpAward::OnCooldown);
        assert_eq!(xp.xp, 25);

        xp.xp = 90;
        assert_eq!(xp.award(20, XP_COOLDOWN_MS), XpAward::LevelUp(2));
        assert_eq!(xp.xp, 10);
        assert_eq!(xp.total_xp, 45);
        assert_eq!(xp.needed_for_next_level(), 200);
    }
}
