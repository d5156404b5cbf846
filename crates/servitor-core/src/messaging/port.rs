use async_trait::async_trait;

use crate::{
    domain::ChatId,
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the only implementation; replies and authorization notices are
/// plain text.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
