use crate::error::StoreError;
use crate::session::SessionState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// A session record plus the revision it was stored at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub revision: u64,
    pub state: SessionState,
}

/// Persistence contract for session state.
///
/// Saves are revision-checked: `save` succeeds only when `expected_revision`
/// matches the stored revision (0 for a session that was never saved), so two
/// writers holding the same stale copy cannot both land an update.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: Uuid) -> Result<Option<StoredSession>, StoreError>;

    /// Store `state` and return its new revision.
    async fn save(&self, state: &SessionState, expected_revision: u64) -> Result<u64, StoreError>;

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError>;
}

// ── MemorySessionStore ──

/// In-memory SessionStore for testing and embedding.
pub struct MemorySessionStore {
    inner: RwLock<HashMap<Uuid, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: Uuid) -> Result<Option<StoredSession>, StoreError> {
        let store = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(store.get(&session_id).cloned())
    }

    async fn save(&self, state: &SessionState, expected_revision: u64) -> Result<u64, StoreError> {
        let mut store = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let actual = store.get(&state.session_id).map(|s| s.revision).unwrap_or(0);
        if actual != expected_revision {
            tracing::warn!(
                session_id = %state.session_id,
                expected_revision,
                actual,
                "Rejected stale session save"
            );
            return Err(StoreError::Conflict {
                session_id: state.session_id,
                expected: expected_revision,
                actual,
            });
        }
        let revision = actual + 1;
        store.insert(
            state.session_id,
            StoredSession {
                revision,
                state: state.clone(),
            },
        );
        Ok(revision)
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let mut store = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(store.remove(&session_id).is_some())
    }
}
