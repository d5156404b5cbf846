use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use servitor_core::{commands::CommandRouter, messaging::port::MessagingPort};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<CommandRouter>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Long-poll Telegram until the dispatcher shuts down (Ctrl-C).
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "telegram bot started"),
        Err(e) => warn!(error = %e, "get_me failed; polling anyway"),
    }

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
