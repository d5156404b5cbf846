use std::sync::Arc;

use teloxide::{prelude::*, types::Chat};
use tracing::{debug, warn};

use servitor_core::domain::{ChatId, ChatIdentity};

use crate::router::AppState;

fn chat_identity(chat: &Chat) -> ChatIdentity {
    ChatIdentity {
        chat_id: ChatId(chat.id.0),
        username: chat.username().map(str::to_string),
        first_name: chat.first_name().map(str::to_string),
        last_name: chat.last_name().map(str::to_string),
    }
}

pub async fn handle_command(msg: &Message, text: &str, state: Arc<AppState>) -> ResponseResult<()> {
    let identity = chat_identity(&msg.chat);
    let Some(reply) = state.commands.on_command(&identity, text).await else {
        return Ok(());
    };
    debug!(chat_id = identity.chat_id.0, "replying to command");

    if let Err(e) = state.messenger.send_text(identity.chat_id, &reply).await {
        warn!(chat_id = identity.chat_id.0, error = %e, "failed to send reply");
    }
    Ok(())
}
