use crate::{config::Config, context::Context, event::Event, store::DocumentStore};
use serenity::all::{Member, Message, Reaction, Ready};
use tokio::sync::RwLock;

/// Discord event handler
pub struct Handler {
    cfg: RwLock<Config>,
    store: RwLock<DocumentStore>,
}

impl<'a> Handler {
    pub fn new(cfg: Config, store: DocumentStore) -> Self {
        Self {
            cfg: RwLock::new(cfg),
            store: RwLock::new(store),
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            store: &self.store,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }

    async fn reaction_add(&self, discord_ctx: serenity::all::Context, reaction: Reaction) {
        Event::ReactionAdd(reaction)
            .handle(self.ctx(&discord_ctx))
            .await;
    }

    async fn reaction_remove(&self, discord_ctx: serenity::all::Context, reaction: Reaction) {
        Event::ReactionRemove(reaction)
            .handle(self.ctx(&discord_ctx))
            .await;
    }

    async fn guild_member_addition(&self, discord_ctx: serenity::all::Context, new_member: Member) {
        Event::MemberJoin(new_member)
            .handle(self.ctx(&discord_ctx))
            .await;
    }
}
