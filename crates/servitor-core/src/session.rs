use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChatId, ChatIdentity, SessionId};

/// OAuth token material obtained from the calendar provider.
///
/// Opaque to the core: it is stored and handed back to adapters, never
/// interpreted beyond the emptiness check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Credential {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: None,
            scope: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.trim().is_empty()
    }
}

/// One chat's linkage state as persisted in the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub chat_id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    pub authorized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// `pending` until a credential has been bound.
    pub fn is_pending(&self) -> bool {
        !self.authorized
    }

    /// Attach a credential and flip to authorized in one step, so the record
    /// can never be observed authorized without a credential.
    pub fn bind(&mut self, credential: Credential, now: DateTime<Utc>) {
        self.credential = Some(credential);
        self.authorized = true;
        self.updated_at = now;
    }

    pub fn refresh_identity(&mut self, identity: &ChatIdentity, now: DateTime<Utc>) {
        self.username = identity.username.clone();
        self.first_name = identity.first_name.clone();
        self.last_name = identity.last_name.clone();
        self.updated_at = now;
    }

    /// Checks `authorized ⇒ credential present and non-empty`.
    pub fn is_consistent(&self) -> bool {
        !self.authorized || self.credential.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// A session that has not been assigned an id yet.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewSession {
    pub fn pending(identity: &ChatIdentity, now: DateTime<Utc>) -> Self {
        Self {
            chat_id: identity.chat_id,
            username: identity.username.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            created_at: now,
        }
    }

    pub fn into_session(self, id: SessionId) -> Session {
        Session {
            id,
            chat_id: self.chat_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            credential: None,
            authorized: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ChatIdentity {
        ChatIdentity {
            chat_id: ChatId(42),
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
            last_name: None,
        }
    }

    #[test]
    fn new_session_starts_pending_without_credential() {
        let now = Utc::now();
        let s = NewSession::pending(&identity(), now).into_session(SessionId(7));
        assert_eq!(s.id, SessionId(7));
        assert_eq!(s.chat_id, ChatId(42));
        assert!(s.is_pending());
        assert!(s.credential.is_none());
        assert_eq!(s.created_at, s.updated_at);
        assert!(s.is_consistent());
    }

    #[test]
    fn bind_sets_credential_and_authorized_together() {
        let now = Utc::now();
        let mut s = NewSession::pending(&identity(), now).into_session(SessionId(7));
        let later = now + chrono::Duration::seconds(5);
        s.bind(Credential::bearer("tok123"), later);
        assert!(s.authorized);
        assert_eq!(s.credential.as_ref().unwrap().access_token, "tok123");
        assert_eq!(s.updated_at, later);
        assert!(s.is_consistent());
    }

    #[test]
    fn authorized_without_credential_is_inconsistent() {
        let now = Utc::now();
        let mut s = NewSession::pending(&identity(), now).into_session(SessionId(1));
        s.authorized = true;
        assert!(!s.is_consistent());
        s.credential = Some(Credential::bearer("  "));
        assert!(!s.is_consistent());
    }

    #[test]
    fn serializes_without_absent_fields() {
        let now = Utc::now();
        let s = NewSession::pending(&ChatIdentity::new(ChatId(5)), now).into_session(SessionId(3));
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["id"], 3);
        assert_eq!(v["chat_id"], 5);
        assert!(v.get("credential").is_none());
        assert!(v.get("username").is_none());

        let back: Session = serde_json::from_value(v).unwrap();
        assert_eq!(back, s);
    }
}
