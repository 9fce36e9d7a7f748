mod config;
mod context;
mod event;
mod handler;
mod helper;
mod logging;
mod plugin;
mod records;
mod store;

use serenity::{all::GatewayIntents, Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();
    // Fully loaded before the client starts, so no handler can observe a half-open store.
    let store = crate::store::DocumentStore::open(&cfg.store.path, cfg.store.backups).await;
    crate::log_internal!("Using store at `{}`", store.path().display());
    let handler = handler::Handler::new(cfg, store);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}
