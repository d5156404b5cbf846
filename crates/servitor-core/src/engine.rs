//! Correlation engine: joins a chat's `/start` with the OAuth redirect that
//! arrives later over HTTP, using the session id as the `state` token.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    domain::{ChatId, ChatIdentity},
    errors::Error,
    ports::OAuthProvider,
    session::{NewSession, Session},
    store::SessionStore,
    token, Result,
};

pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of asking for a new authorization flow.
#[derive(Clone, Debug)]
pub enum StartOutcome {
    /// The chat is already linked; nothing was written.
    AlreadyAuthorized(Session),
    /// The chat has a pending session; send the user to `authorization_url`.
    Pending {
        session: Session,
        token: String,
        authorization_url: String,
    },
}

enum Found {
    Authorized(Session),
    Pending(Session),
}

pub struct CorrelationEngine {
    store: Arc<dyn SessionStore>,
    oauth: Arc<dyn OAuthProvider>,
    exchange_timeout: Duration,
}

impl CorrelationEngine {
    pub fn new(store: Arc<dyn SessionStore>, oauth: Arc<dyn OAuthProvider>) -> Self {
        Self {
            store,
            oauth,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    pub async fn find_session_by_chat(&self, chat_id: ChatId) -> Result<Option<Session>> {
        self.store.find_by_chat(chat_id).await
    }

    /// Find or create the pending session for a chat and build its
    /// authorization URL.
    ///
    /// A chat has at most one session: a second call before the callback
    /// arrives returns the same session (and therefore the same token).
    pub async fn create_pending_session(&self, identity: &ChatIdentity) -> Result<StartOutcome> {
        if identity.chat_id.0 == 0 {
            return Err(Error::InvalidChat(0));
        }

        let mut found = None;
        self.store
            .run_transaction(&mut |tx| {
                found = None;
                let now = Utc::now();
                match tx.find_by_chat(identity.chat_id)? {
                    Some(s) if s.authorized => {
                        found = Some(Found::Authorized(s));
                    }
                    Some(mut s) => {
                        s.refresh_identity(identity, now);
                        tx.put(s.clone())?;
                        found = Some(Found::Pending(s));
                    }
                    None => {
                        let id = tx.insert(NewSession::pending(identity, now))?;
                        let s = tx.get(id)?.ok_or(Error::SessionNotFound(id))?;
                        found = Some(Found::Pending(s));
                    }
                }
                Ok(())
            })
            .await?;

        match found {
            Some(Found::Authorized(session)) => {
                debug!(
                    chat_id = session.chat_id.0,
                    session_id = session.id.0,
                    "chat already authorized"
                );
                Ok(StartOutcome::AlreadyAuthorized(session))
            }
            Some(Found::Pending(session)) => {
                let token = token::mint(session.id);
                let authorization_url = self.oauth.authorization_url(&token)?;
                info!(
                    chat_id = session.chat_id.0,
                    session_id = session.id.0,
                    "issued authorization url"
                );
                Ok(StartOutcome::Pending {
                    session,
                    token,
                    authorization_url,
                })
            }
            None => Err(Error::StoreUnavailable(
                "transaction committed without a result".to_string(),
            )),
        }
    }

    /// Exchange `code` and bind the credential to the session named by
    /// `token`.
    ///
    /// The exchange runs before the store transaction; the transaction
    /// re-reads the session and only binds it if it is still pending. On any
    /// error nothing is written and the session stays pending.
    pub async fn complete_session(&self, token: &str, code: &str) -> Result<Session> {
        let id = token::parse(token)?;
        if code.trim().is_empty() {
            return Err(Error::ExchangeFailed("empty authorization code".to_string()));
        }

        // Unknown or already-bound tokens must not spend the code.
        match self.store.get(id).await? {
            None => return Err(Error::SessionNotFound(id)),
            Some(s) if s.authorized => return Err(Error::AlreadyBound(id)),
            Some(_) => {}
        }

        let credential =
            match tokio::time::timeout(self.exchange_timeout, self.oauth.exchange_code(code)).await
            {
                Ok(Ok(c)) => c,
                Ok(Err(Error::ExchangeFailed(msg))) => return Err(Error::ExchangeFailed(msg)),
                Ok(Err(e)) => return Err(Error::ExchangeFailed(e.to_string())),
                Err(_) => {
                    return Err(Error::ExchangeFailed(format!(
                        "timed out after {}ms",
                        self.exchange_timeout.as_millis()
                    )))
                }
            };
        if credential.is_empty() {
            return Err(Error::ExchangeFailed(
                "provider returned an empty access token".to_string(),
            ));
        }

        let mut bound = None;
        self.store
            .run_transaction(&mut |tx| {
                bound = None;
                let mut s = tx.get(id)?.ok_or(Error::SessionNotFound(id))?;
                if s.authorized {
                    return Err(Error::AlreadyBound(id));
                }
                s.bind(credential.clone(), Utc::now());
                tx.put(s.clone())?;
                bound = Some(s);
                Ok(())
            })
            .await?;

        let session = bound.ok_or_else(|| {
            Error::StoreUnavailable("transaction committed without a result".to_string())
        })?;
        info!(
            chat_id = session.chat_id.0,
            session_id = session.id.0,
            "session bound"
        );
        Ok(session)
    }
}
