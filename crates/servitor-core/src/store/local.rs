use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SessionStore, Transaction, TransactionFn};
use crate::{
    domain::{ChatId, SessionId},
    errors::Error,
    session::{NewSession, Session},
    Result,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug)]
struct Entry {
    session: Session,
    version: u64,
}

#[derive(Debug, Default)]
struct Tables {
    sessions: BTreeMap<SessionId, Entry>,
    by_chat: HashMap<ChatId, SessionId>,
}

impl Tables {
    // 0 means "absent"; committed records start at 1.
    fn version(&self, id: SessionId) -> u64 {
        self.sessions.get(&id).map(|e| e.version).unwrap_or(0)
    }
}

/// On-disk layout: `{ "next_id": .., "sessions": [..] }`.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    sessions: Vec<Session>,
}

/// Session store with optimistic-concurrency transactions.
///
/// Records live in memory; when opened with a path every committed write is
/// also flushed to a JSON snapshot (temp file, fsync, rename) before it
/// becomes visible. The snapshot is written synchronously under the table
/// lock, so this backend suits the small session counts of one bot.
pub struct LocalStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
    snapshot_path: Option<PathBuf>,
    max_attempts: u32,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
            snapshot_path: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Open (or create) a store backed by a JSON snapshot file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self::in_memory();
        if let Some(snapshot) = load_snapshot(&path)? {
            store.restore(snapshot);
        }
        store.snapshot_path = Some(path);
        Ok(store)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.tables.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn restore(&mut self, snapshot: Snapshot) {
        let tables = self.tables.get_mut();
        let mut max_id = 0;

        for session in snapshot.sessions {
            max_id = max_id.max(session.id.0);

            if let Some(&prev) = tables.by_chat.get(&session.chat_id) {
                let keep_prev = tables
                    .sessions
                    .get(&prev)
                    .is_some_and(|e| outranks(&e.session, &session));
                warn!(
                    chat_id = session.chat_id.0,
                    kept = if keep_prev { prev.0 } else { session.id.0 },
                    "duplicate sessions for chat in snapshot"
                );
                if keep_prev {
                    continue;
                }
                tables.sessions.remove(&prev);
            }

            tables.by_chat.insert(session.chat_id, session.id);
            tables.sessions.insert(
                session.id,
                Entry {
                    session,
                    version: 1,
                },
            );
        }

        let next = snapshot.next_id.max(max_id + 1).max(1);
        self.next_id = AtomicU64::new(next);
    }
}

// Authorized beats pending; otherwise the most recently updated wins.
fn outranks(a: &Session, b: &Session) -> bool {
    match (a.authorized, b.authorized) {
        (true, false) => true,
        (false, true) => false,
        _ => a.updated_at >= b.updated_at,
    }
}

#[async_trait]
impl SessionStore for LocalStore {
    async fn get(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self
            .tables
            .read()
            .sessions
            .get(&id)
            .map(|e| e.session.clone()))
    }

    async fn find_by_chat(&self, chat_id: ChatId) -> Result<Option<Session>> {
        let tables = self.tables.read();
        Ok(tables
            .by_chat
            .get(&chat_id)
            .and_then(|id| tables.sessions.get(id))
            .map(|e| e.session.clone()))
    }

    async fn put(&self, session: &Session) -> Result<()> {
        let session = session.clone();
        self.run_transaction(&mut |tx| tx.put(session.clone()))
            .await
    }

    async fn run_transaction(&self, f: &mut TransactionFn<'_>) -> Result<()> {
        for attempt in 1..=self.max_attempts {
            let mut tx = LocalTx::new(&self.tables, &self.next_id);
            f(&mut tx)?;
            match tx.commit(self.snapshot_path.as_deref())? {
                Commit::Applied => return Ok(()),
                Commit::Conflict => {
                    debug!(attempt, "transaction conflict, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(
            attempts = self.max_attempts,
            "transaction gave up after repeated conflicts"
        );
        Err(Error::StoreUnavailable(format!(
            "transaction aborted after {} conflicting attempts",
            self.max_attempts
        )))
    }
}

enum Commit {
    Applied,
    Conflict,
}

/// One transaction attempt: records what it read, buffers what it writes.
struct LocalTx<'a> {
    tables: &'a RwLock<Tables>,
    next_id: &'a AtomicU64,
    // First observation of each record/index entry; later reads in the same
    // attempt are served from here so the closure sees one consistent view.
    reads: HashMap<SessionId, (u64, Option<Session>)>,
    chat_reads: HashMap<ChatId, Option<SessionId>>,
    writes: BTreeMap<SessionId, Session>,
    inserts: Vec<Session>,
}

impl<'a> LocalTx<'a> {
    fn new(tables: &'a RwLock<Tables>, next_id: &'a AtomicU64) -> Self {
        Self {
            tables,
            next_id,
            reads: HashMap::new(),
            chat_reads: HashMap::new(),
            writes: BTreeMap::new(),
            inserts: Vec::new(),
        }
    }

    fn commit(self, snapshot_path: Option<&Path>) -> Result<Commit> {
        let mut tables = self.tables.write();

        let stale_read = self
            .reads
            .iter()
            .any(|(id, (seen, _))| tables.version(*id) != *seen);
        let stale_index = self
            .chat_reads
            .iter()
            .any(|(chat, seen)| tables.by_chat.get(chat).copied() != *seen);
        let chat_taken = self
            .inserts
            .iter()
            .any(|s| tables.by_chat.contains_key(&s.chat_id));
        if stale_read || stale_index || chat_taken {
            return Ok(Commit::Conflict);
        }

        for s in self.writes.values() {
            match tables.sessions.get(&s.id) {
                None => return Err(Error::SessionNotFound(s.id)),
                Some(e) if e.session.chat_id != s.chat_id => {
                    return Err(Error::ChatMismatch(s.id))
                }
                Some(_) => {}
            }
        }

        if self.writes.is_empty() && self.inserts.is_empty() {
            return Ok(Commit::Applied);
        }

        if let Some(path) = snapshot_path {
            let snapshot = Snapshot {
                next_id: self.next_id.load(Ordering::SeqCst),
                sessions: tables
                    .sessions
                    .values()
                    .map(|e| self.writes.get(&e.session.id).unwrap_or(&e.session).clone())
                    .chain(self.inserts.iter().cloned())
                    .collect(),
            };
            write_snapshot(path, &snapshot)?;
        }

        for (id, session) in self.writes {
            if let Some(entry) = tables.sessions.get_mut(&id) {
                entry.session = session;
                entry.version += 1;
            }
        }
        for session in self.inserts {
            tables.by_chat.insert(session.chat_id, session.id);
            tables.sessions.insert(
                session.id,
                Entry {
                    session,
                    version: 1,
                },
            );
        }

        Ok(Commit::Applied)
    }
}

impl Transaction for LocalTx<'_> {
    fn get(&mut self, id: SessionId) -> Result<Option<Session>> {
        if let Some(s) = self.writes.get(&id) {
            return Ok(Some(s.clone()));
        }
        if let Some(s) = self.inserts.iter().find(|s| s.id == id) {
            return Ok(Some(s.clone()));
        }

        if let Some((_, seen)) = self.reads.get(&id) {
            return Ok(seen.clone());
        }

        let observed = {
            let guard = self.tables.read();
            let entry = guard.sessions.get(&id);
            (
                entry.map(|e| e.version).unwrap_or(0),
                entry.map(|e| e.session.clone()),
            )
        };
        let session = observed.1.clone();
        self.reads.insert(id, observed);
        Ok(session)
    }

    fn find_by_chat(&mut self, chat_id: ChatId) -> Result<Option<Session>> {
        if let Some(s) = self.inserts.iter().find(|s| s.chat_id == chat_id) {
            return Ok(Some(s.clone()));
        }

        let indexed = match self.chat_reads.get(&chat_id) {
            Some(seen) => *seen,
            None => {
                let live = self.tables.read().by_chat.get(&chat_id).copied();
                self.chat_reads.insert(chat_id, live);
                live
            }
        };
        match indexed {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    fn insert(&mut self, draft: NewSession) -> Result<SessionId> {
        if self.find_by_chat(draft.chat_id)?.is_some() {
            return Err(Error::DuplicateChat(draft.chat_id));
        }
        // Ids burned by aborted attempts are never handed out again.
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.inserts.push(draft.into_session(id));
        Ok(id)
    }

    fn put(&mut self, session: Session) -> Result<()> {
        if let Some(slot) = self.inserts.iter_mut().find(|s| s.id == session.id) {
            if slot.chat_id != session.chat_id {
                return Err(Error::ChatMismatch(session.id));
            }
            *slot = session;
            return Ok(());
        }
        self.writes.insert(session.id, session);
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = fs::read_to_string(path).map_err(|e| store_io(path, e))?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&txt)?))
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let txt = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp).map_err(|e| store_io(&tmp, e))?;
        file.write_all(&txt).map_err(|e| store_io(&tmp, e))?;
        // Data must be durable before the rename publishes it.
        file.sync_all().map_err(|e| store_io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| store_io(path, e))?;
    Ok(())
}

fn store_io(path: &Path, e: std::io::Error) -> Error {
    Error::StoreUnavailable(format!("{}: {e}", path.display()))
}
