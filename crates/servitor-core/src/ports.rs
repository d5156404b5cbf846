use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{session::Credential, Result};

/// Hexagonal port for the OAuth2 provider (Google today).
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Authorization URL with `state` embedded verbatim.
    fn authorization_url(&self, state: &str) -> Result<String>;

    /// Exchange a one-time authorization code for a credential.
    ///
    /// Provider rejections (expired/used/revoked code) and transport failures
    /// are both reported as `Error::ExchangeFailed`.
    async fn exchange_code(&self, code: &str) -> Result<Credential>;
}

/// A push-notification channel registered on a calendar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchChannel {
    pub id: String,
    pub resource_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Hexagonal port for calendar change subscriptions.
#[async_trait]
pub trait CalendarWatcher: Send + Sync {
    async fn watch_primary(&self, credential: &Credential) -> Result<WatchChannel>;
}
