//! Session stores.
//!
//! Both stores serialize mutations and apply each one to a draft copy of the
//! record, so a failing mutation never leaves a partial write behind.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{CandidateId, NewSession, Session, SessionId};
use crate::traits::{SessionKey, SessionMutation, SessionStore};

/// Shared state of both store implementations.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    next_id: SessionId,
    sessions: BTreeMap<SessionId, Session>,
    #[serde(skip)]
    tokens: HashMap<String, SessionId>,
}

impl StoreState {
    fn reindex(&mut self) {
        self.tokens = self
            .sessions
            .values()
            .map(|s| (s.access_token.clone(), s.id))
            .collect();
        let max_id = self.sessions.keys().next_back().copied().unwrap_or(0);
        self.next_id = self.next_id.max(max_id);
    }

    fn resolve(&self, key: &SessionKey) -> Result<SessionId, SessionError> {
        let id = match key {
            SessionKey::Id(id) => Some(*id).filter(|id| self.sessions.contains_key(id)),
            SessionKey::Token(token) => self.tokens.get(token).copied(),
        };
        id.ok_or_else(|| SessionError::NotFound(key.to_string()))
    }

    fn insert(&mut self, new: NewSession) -> Result<Session, SessionError> {
        if self.tokens.contains_key(&new.access_token) {
            return Err(SessionError::Storage("duplicate access token".into()));
        }
        self.next_id += 1;
        let session = new.into_session(self.next_id);
        self.tokens.insert(session.access_token.clone(), session.id);
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn get(&self, key: &SessionKey) -> Result<Session, SessionError> {
        let id = self.resolve(key)?;
        Ok(self.sessions[&id].clone())
    }

    /// Apply `mutation` to a draft. Returns the previous and updated records
    /// when the mutation succeeded; the stored record is replaced only then.
    fn modify(
        &mut self,
        key: &SessionKey,
        mutation: &mut SessionMutation<'_>,
    ) -> Result<(Session, Session), SessionError> {
        let id = self.resolve(key)?;
        let previous = self.sessions[&id].clone();
        let mut draft = previous.clone();
        mutation(&mut draft)?;
        self.sessions.insert(id, draft.clone());
        Ok((previous, draft))
    }

    fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        sessions
    }
}

fn lock_state(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn storage_error(what: &str, path: &Path, e: impl std::fmt::Display) -> SessionError {
    SessionError::Storage(format!("failed to {what} {}: {e}", path.display()))
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. Used by tests and embedded deployments.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    state: Mutex<StoreState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, new: NewSession) -> Result<Session, SessionError> {
        lock_state(&self.state).insert(new)
    }

    async fn get(&self, key: &SessionKey) -> Result<Session, SessionError> {
        lock_state(&self.state).get(key)
    }

    async fn modify(
        &self,
        key: &SessionKey,
        mutation: &mut SessionMutation<'_>,
    ) -> Result<Session, SessionError> {
        let (_, updated) = lock_state(&self.state).modify(key, mutation)?;
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<Session>, SessionError> {
        Ok(lock_state(&self.state).list())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Store persisted as a single pretty-printed JSON document.
///
/// The file is the only copy of the state: every operation re-reads it
/// under an advisory lock on a sibling `<file>.lock`, shared for reads and
/// exclusive for writes. Any number of processes may open the same path.
/// Commits rewrite the file through a temporary sibling and a rename, so a
/// reader never observes a half-written document.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileSessionStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// existing one must parse.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("sessions"));
        lock_name.push(".lock");
        let store = Self {
            lock_path: path.with_file_name(lock_name),
            path,
        };
        let _lock = store.lock(false)?;
        store.load()?;
        Ok(store)
    }

    /// Block until the store lock is held. Released when the file drops.
    fn lock(&self, exclusive: bool) -> Result<File, SessionError> {
        let lock_path = &self.lock_path;
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| storage_error("create directory for", lock_path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| storage_error("open", lock_path, e))?;
        let locked = if exclusive {
            fs2::FileExt::lock_exclusive(&file)
        } else {
            fs2::FileExt::lock_shared(&file)
        };
        locked.map_err(|e| storage_error("lock", lock_path, e))?;
        Ok(file)
    }

    /// Claim `candidate_id` across every process sharing this store.
    ///
    /// Fails with [`SessionError::Conflict`] while another holder has the
    /// claim. Released when the returned value drops or the process exits.
    pub fn claim_candidate(
        &self,
        candidate_id: CandidateId,
    ) -> Result<CandidateClaim, SessionError> {
        let mut name = self.lock_path.as_os_str().to_owned();
        name.push(format!(".candidate-{candidate_id}"));
        let path = PathBuf::from(name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| storage_error("open", &path, e))?;
        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(CandidateClaim { _file: file }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                tracing::warn!(candidate_id, "generation already in progress in another process");
                Err(SessionError::Conflict { candidate_id })
            }
            Err(e) => Err(storage_error("lock", &path, e)),
        }
    }

    fn load(&self) -> Result<StoreState, SessionError> {
        let path = &self.path;
        let mut state = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<StoreState>(&content)
                .map_err(|e| storage_error("parse", path, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(storage_error("read", path, e)),
        };
        state.reindex();
        Ok(state)
    }

    fn persist(&self, state: &StoreState) -> Result<(), SessionError> {
        let path = &self.path;
        let json =
            serde_json::to_string_pretty(state).map_err(|e| storage_error("serialize", path, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| storage_error("write", path, e))?;
        std::fs::rename(&tmp, path).map_err(|e| storage_error("replace", path, e))?;
        Ok(())
    }
}

/// Cross-process candidate claim from [`JsonFileSessionStore::claim_candidate`].
#[derive(Debug)]
#[must_use = "the claim is released as soon as it is dropped"]
pub struct CandidateClaim {
    _file: File,
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn insert(&self, new: NewSession) -> Result<Session, SessionError> {
        let _lock = self.lock(true)?;
        let mut state = self.load()?;
        let session = state.insert(new)?;
        self.persist(&state)?;
        Ok(session)
    }

    async fn get(&self, key: &SessionKey) -> Result<Session, SessionError> {
        let _lock = self.lock(false)?;
        self.load()?.get(key)
    }

    async fn modify(
        &self,
        key: &SessionKey,
        mutation: &mut SessionMutation<'_>,
    ) -> Result<Session, SessionError> {
        let _lock = self.lock(true)?;
        let mut state = self.load()?;
        let (previous, updated) = state.modify(key, mutation)?;
        if previous != updated {
            self.persist(&state)?;
        }
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<Session>, SessionError> {
        let _lock = self.lock(false)?;
        Ok(self.load()?.list())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::SessionStatus;

    fn new_session(candidate_id: u64, token: &str) -> NewSession {
        NewSession {
            candidate_id,
            access_token: token.into(),
            duration_hours: 2,
            allowed_break_seconds: 900,
            max_single_break_seconds: 900,
            created_at: Utc::now(),
            questions: Default::default(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = InMemorySessionStore::new();
        let a = store.insert(new_session(1, "a")).await.unwrap();
        let b = store.insert(new_session(2, "b")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.status, SessionStatus::Pending);

        let by_token = store.get(&SessionKey::token("b")).await.unwrap();
        assert_eq!(by_token.candidate_id, 2);
    }

    #[tokio::test]
    async fn duplicate_token_rejected() {
        let store = InMemorySessionStore::new();
        store.insert(new_session(1, "same")).await.unwrap();
        let err = store.insert(new_session(2, "same")).await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let store = InMemorySessionStore::new();
        let err = store.get(&SessionKey::Id(99)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
        let err = store.get(&SessionKey::token("nope")).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_mutation_commits_nothing() {
        let store = InMemorySessionStore::new();
        let session = store.insert(new_session(1, "tok")).await.unwrap();

        let err = store
            .modify(&SessionKey::Id(session.id), &mut |s| {
                s.break_count = 99;
                Err(SessionError::Validation("nope".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        let stored = store.get(&SessionKey::Id(session.id)).await.unwrap();
        assert_eq!(stored.break_count, 0);
    }

    #[tokio::test]
    async fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        {
            let store = JsonFileSessionStore::open(&path).unwrap();
            let session = store.insert(new_session(7, "tok-7")).await.unwrap();
            store
                .modify(&SessionKey::Id(session.id), &mut |s| {
                    s.status = SessionStatus::InProgress;
                    Ok(())
                })
                .await
                .unwrap();
        }

        let reopened = JsonFileSessionStore::open(&path).unwrap();
        let session = reopened.get(&SessionKey::token("tok-7")).await.unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);

        let next = reopened.insert(new_session(8, "tok-8")).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn json_store_instances_share_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let a = JsonFileSessionStore::open(&path).unwrap();
        let b = JsonFileSessionStore::open(&path).unwrap();

        assert_eq!(a.insert(new_session(1, "tok-a")).await.unwrap().id, 1);
        assert_eq!(b.insert(new_session(2, "tok-b")).await.unwrap().id, 2);

        a.modify(&SessionKey::token("tok-b"), &mut |s| {
            s.status = SessionStatus::InProgress;
            Ok(())
        })
        .await
        .unwrap();
        let seen = b.get(&SessionKey::Id(2)).await.unwrap();
        assert_eq!(seen.status, SessionStatus::InProgress);

        let err = b.insert(new_session(3, "tok-a")).await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(a.list().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn json_store_concurrent_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        JsonFileSessionStore::open(&path)
            .unwrap()
            .insert(new_session(1, "shared"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16u64)
            .map(|n| {
                let path = path.clone();
                tokio::spawn(async move {
                    let store = JsonFileSessionStore::open(&path).unwrap();
                    store
                        .insert(new_session(100 + n, &format!("tok-{n}")))
                        .await
                        .unwrap();
                    store
                        .modify(&SessionKey::token("shared"), &mut |s| {
                            s.break_count += 1;
                            Ok(())
                        })
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let store = JsonFileSessionStore::open(&path).unwrap();
        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 17);
        let mut ids: Vec<SessionId> = sessions.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=17).collect::<Vec<_>>());
        let shared = store.get(&SessionKey::token("shared")).await.unwrap();
        assert_eq!(shared.break_count, 16);
    }

    #[test]
    fn candidate_claim_is_exclusive_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let a = JsonFileSessionStore::open(&path).unwrap();
        let b = JsonFileSessionStore::open(&path).unwrap();

        let claim = a.claim_candidate(7).unwrap();
        let err = b.claim_candidate(7).unwrap_err();
        assert!(matches!(err, SessionError::Conflict { candidate_id: 7 }));
        let _other = b.claim_candidate(8).unwrap();

        drop(claim);
        assert!(b.claim_candidate(7).is_ok());
    }

    #[test]
    fn json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileSessionStore::open(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemorySessionStore::new();
        let mut older = new_session(1, "old");
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        store.insert(older).await.unwrap();
        store.insert(new_session(2, "new")).await.unwrap();

        let listed = store.list().await.unwrap();
        let tokens: Vec<&str> = listed.iter().map(|s| s.access_token.as_str()).collect();
        assert_eq!(tokens, vec!["new", "old"]);
    }
}
