use crate::{event::*, log_error, log_internal, plugin::*};
use anyhow::Result;

/// Reports store state once the connection to Discord is ready.
pub struct Ready;

#[serenity::async_trait]
impl Plugin for Ready {
    fn name(&self) -> &'static str {
        "ready"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Ready(_) = event else {
            return Ok(EventHandled::No);
        };

        let store = ctx.store.read().await;
        if store.root().is_empty() {
            log_error!(
                "Store at `{}` has no collections; it may have been recovered from a corrupt file",
                store.path().display()
            );
        }
        for name in store.root().collection_names() {
            let count = store.collection(name).map_or(0, |c| c.len());
            log_internal!("Store collection \"{}\": {} document(s)", name, count);
        }

        Ok(EventHandled::Yes)
    }
}
