//! Credential store port.
//!
//! The store is the only place cross-request coordination happens: the
//! command router and the callback endpoint never share in-process state,
//! they meet inside a store transaction.

use async_trait::async_trait;

use crate::{
    domain::{ChatId, SessionId},
    session::{NewSession, Session},
    Result,
};

mod local;

pub use local::LocalStore;

/// Closure run inside a transaction. It may be invoked more than once when the
/// store detects a conflicting commit; every invocation gets a fresh view, so
/// it must not carry state read in a previous attempt.
pub type TransactionFn<'a> = dyn FnMut(&mut dyn Transaction) -> Result<()> + Send + 'a;

/// Read/write handle valid for one transaction attempt.
///
/// Writes are buffered and only become visible when the attempt commits.
pub trait Transaction {
    fn get(&mut self, id: SessionId) -> Result<Option<Session>>;
    fn find_by_chat(&mut self, chat_id: ChatId) -> Result<Option<Session>>;
    /// Allocate an id and stage a new record. Fails with `DuplicateChat` if
    /// the chat already has a session.
    fn insert(&mut self, draft: NewSession) -> Result<SessionId>;
    fn put(&mut self, session: Session) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: SessionId) -> Result<Option<Session>>;

    async fn find_by_chat(&self, chat_id: ChatId) -> Result<Option<Session>>;

    /// Overwrite an existing record (no read validation).
    async fn put(&self, session: &Session) -> Result<()>;

    /// Run `f` atomically. If `f` returns an error nothing is written and the
    /// error is returned as-is. Conflicting commits are retried by re-running
    /// `f` from scratch; persistent contention surfaces as `StoreUnavailable`.
    async fn run_transaction(&self, f: &mut TransactionFn<'_>) -> Result<()>;
}
