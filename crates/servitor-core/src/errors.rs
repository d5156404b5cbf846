use std::path::PathBuf;

use crate::domain::{ChatId, SessionId};

/// Core error type for servitor.
///
/// Adapter crates map their specific errors into this type so the command router
/// and the callback endpoint can handle failures consistently (user-facing
/// message vs retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid correlation token: {0}")]
    InvalidToken(String),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} is already bound")]
    AlreadyBound(SessionId),

    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid chat identity: {0}")]
    InvalidChat(i64),

    #[error("chat {0} already has a session")]
    DuplicateChat(ChatId),

    #[error("session {0} cannot move to another chat")]
    ChatMismatch(SessionId),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Only store contention/I-O is worth retrying; everything else is a
    /// permanent property of the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidToken(_) => "invalid_token",
            Error::SessionNotFound(_) => "session_not_found",
            Error::AlreadyBound(_) => "already_bound",
            Error::ExchangeFailed(_) => "exchange_failed",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::InvalidChat(_) => "invalid_chat",
            Error::DuplicateChat(_) => "duplicate_chat",
            Error::ChatMismatch(_) => "chat_mismatch",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::InvalidPath { .. } => "invalid_path",
            Error::External(_) => "external",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
