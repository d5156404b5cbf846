//! Bot command routing, independent of the messenger.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    domain::ChatIdentity,
    engine::{CorrelationEngine, StartOutcome},
    ports::CalendarWatcher,
    session::Session,
};

/// User-facing texts.
pub mod replies {
    pub const ALREADY_AUTHORIZED: &str = "you're already authorized";
    pub const AUTHORIZED: &str = "you are successfully authorized";
    pub const UNKNOWN_COMMAND: &str = "Sorry, unknown command";
    pub const TRY_AGAIN: &str = "Something went wrong, please try /start again later";
}

/// Split `/cmd@botname args` into a lower-cased command and its arguments.
/// Returns `None` for text that is not a command.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some((cmd, rest))
}

pub struct CommandRouter {
    engine: Arc<CorrelationEngine>,
    watcher: Option<Arc<dyn CalendarWatcher>>,
}

impl CommandRouter {
    pub fn new(engine: Arc<CorrelationEngine>) -> Self {
        Self {
            engine,
            watcher: None,
        }
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn CalendarWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn engine(&self) -> &Arc<CorrelationEngine> {
        &self.engine
    }

    /// Handle one command message and return the reply text, or `None` when
    /// the message is not a command.
    pub async fn on_command(&self, identity: &ChatIdentity, text: &str) -> Option<String> {
        let (cmd, _args) = parse_command(text)?;
        let reply = match cmd.as_str() {
            "start" => self.start(identity).await,
            _ => replies::UNKNOWN_COMMAND.to_string(),
        };
        Some(reply)
    }

    async fn start(&self, identity: &ChatIdentity) -> String {
        match self.engine.create_pending_session(identity).await {
            Ok(StartOutcome::AlreadyAuthorized(session)) => {
                self.watch_calendar(&session).await;
                replies::ALREADY_AUTHORIZED.to_string()
            }
            Ok(StartOutcome::Pending {
                authorization_url, ..
            }) => authorization_url,
            Err(e) => {
                warn!(
                    chat_id = identity.chat_id.0,
                    kind = e.kind(),
                    error = %e,
                    "start failed"
                );
                replies::TRY_AGAIN.to_string()
            }
        }
    }

    /// Best effort: failures are logged and never change the reply.
    async fn watch_calendar(&self, session: &Session) {
        let (Some(watcher), Some(credential)) = (&self.watcher, &session.credential) else {
            return;
        };
        match watcher.watch_primary(credential).await {
            Ok(channel) => info!(
                session_id = session.id.0,
                channel_id = %channel.id,
                "calendar watch registered"
            ),
            Err(e) => warn!(session_id = session.id.0, error = %e, "calendar watch failed"),
        }
    }
}
