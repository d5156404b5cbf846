//! Telegram update handlers.
//!
//! Only text commands are handled; everything else is ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;

fn is_command(text: Option<&str>) -> bool {
    text.is_some_and(|t| t.trim_start().starts_with('/'))
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    match msg.text() {
        Some(text) if is_command(Some(text)) => commands::handle_command(&msg, text, state).await,
        _ => Ok(()),
    }
}
