//! Authoritative id → session mapping.
//!
//! The map lock is its own short-held lock, separate from the per-session
//! locks: sessions are created and removed far less often than they are
//! ticked, and no caller holds both at once in map-then-session order except
//! through the `Arc` handed out here.

use crate::session::Session;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Resolves the session, creating it lazily on first reference.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(session) = self.get(id).await {
            return session;
        }
        let mut sessions = self.sessions.write().await;
        // A racing creator may have won between the read and the write lock.
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!("session {}: created", id);
                Arc::new(Mutex::new(Session::new(id.to_string())))
            })
            .clone()
    }

    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = SessionStore::new();

        let first = store.get_or_create("m1").await;
        let second = store.get_or_create("m1").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let store = SessionStore::new();
        assert!(store.get("nope").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_session() {
        let store = SessionStore::new();
        store.get_or_create("m1").await;

        assert!(store.remove("m1").await.is_some());
        assert!(store.remove("m1").await.is_none());
        assert!(store.get("m1").await.is_none());
    }
}
