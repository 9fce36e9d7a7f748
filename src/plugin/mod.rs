use crate::event::EventHandled;
use anyhow::Result;

pub use crate::context::Context;
pub use crate::event::Event;

mod afk;
mod auto_responders;
mod custom_commands;
mod debug;
mod economy;
mod help;
mod ignore_bots;
mod lastfm;
mod leveling;
mod reaction_roles;
mod ready;
mod reload;
mod settings;
mod shop;
mod starboard;
mod tags;
mod warnings;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used for debug
    fn name(&self) -> &'static str;
    /// Help message line(s).  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ignore_bots::IgnoreBots),
        Box::new(ready::Ready),
        Box::new(help::Help),
        Box::new(reload::Reload),
        // Passive message handling.  These see every message and never consume it, except
        // for their own commands.
        Box::new(afk::Afk),
        Box::new(leveling::Leveling),
        // Commands
        Box::new(economy::Economy),
        Box::new(shop::Shop),
        Box::new(lastfm::LastFm),
        Box::new(settings::Settings),
        Box::new(warnings::Warnings),
        Box::new(reaction_roles::ReactionRoles),
        Box::new(starboard::Starboard),
        Box::new(tags::Tags),
        // Guild-defined triggers, checked last so they can't shadow built-in commands.
        Box::new(custom_commands::CustomCommands),
        Box::new(auto_responders::AutoResponders),
    ]
}

/// Prefix shared by all usage lines.
pub(crate) async fn cmd_prefix(ctx: &Context<'_>) -> String {
    ctx.cfg.read().await.general.command_prefix.clone()
}
