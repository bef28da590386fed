//! Process-local session store.
//!
//! Each session sits behind its own async mutex. Holding that lock for the
//! whole handling of an event serializes events per session, while events of
//! different sessions proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lectern_core::types::{Session, SessionId};

use crate::error::ChatError;

/// Shared handle to one session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Keyed storage of live sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `id`, creating an idle session on first use.
    pub fn handle(&self, id: SessionId) -> Result<SessionHandle, ChatError> {
        let mut sessions = self.lock()?;
        let handle = sessions.entry(id).or_insert_with(|| {
            tracing::debug!(session_id = %id, "Session created");
            Arc::new(tokio::sync::Mutex::new(Session::new(id)))
        });
        Ok(Arc::clone(handle))
    }

    /// Return the handle for `id` without creating one.
    pub fn get(&self, id: SessionId) -> Result<Option<SessionHandle>, ChatError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove(&self, id: SessionId) -> Result<bool, ChatError> {
        Ok(self.lock()?.remove(&id).is_some())
    }

    /// Copy of the current state of `id`, if it exists.
    pub async fn snapshot(&self, id: SessionId) -> Result<Option<Session>, ChatError> {
        let Some(handle) = self.get(id)? else {
            return Ok(None);
        };
        let session = handle.lock().await;
        Ok(Some(session.clone()))
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, SessionHandle>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::Store(format!("session map lock poisoned: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::types::Stage;

    #[test]
    fn test_handle_creates_once() {
        let store = SessionStore::new();
        let a = store.handle(SessionId(1)).unwrap();
        let b = store.handle(SessionId(1)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        {
            let handle = store.handle(SessionId(1)).unwrap();
            let mut session = handle.lock().await;
            session.stage = Stage::CollectingMaterials;
            session.requirements = Some("Explain recursion".to_string());
        }
        let other = store.handle(SessionId(2)).unwrap();
        let other = other.lock().await;
        assert_eq!(other.stage, Stage::Idle);
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_and_remove() {
        let store = SessionStore::new();
        assert!(store.snapshot(SessionId(7)).await.unwrap().is_none());

        store.handle(SessionId(7)).unwrap();
        let snapshot = store.snapshot(SessionId(7)).await.unwrap().unwrap();
        assert_eq!(snapshot.id, SessionId(7));

        assert!(store.remove(SessionId(7)).unwrap());
        assert!(!store.remove(SessionId(7)).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_does_not_create() {
        let store = SessionStore::new();
        assert!(store.get(SessionId(3)).unwrap().is_none());
        assert!(store.is_empty());
    }
}
