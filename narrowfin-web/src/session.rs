//! In-memory session storage keyed by an opaque cookie value.
//!
//! Sessions hold the upstream credential for the logged-in user and live
//! only as long as the process. Unauthenticated requests never reach the
//! relay; they are redirected (pages) or answered 401 (streams) here.

use std::collections::HashMap;
use std::sync::Arc;

use narrowfin_core::AuthSession;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "narrowfin_session";

/// Shared map of session id to authenticated upstream session.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, AuthSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session and returns its opaque id for the cookie.
    pub async fn insert(&self, session: AuthSession) -> String {
        let id = Uuid::new_v4().to_string();
        self.inner.write().await.insert(id.clone(), session);
        id
    }

    pub async fn get(&self, id: &str) -> Option<AuthSession> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) {
        self.inner.write().await.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use narrowfin_core::Credential;

    use super::*;

    fn session() -> AuthSession {
        AuthSession {
            user_id: "u1".to_string(),
            access_token: Credential::new("tok"),
        }
    }

    #[tokio::test]
    async fn test_insert_then_get_round_trips() {
        let store = SessionStore::new();
        let id = store.insert(session()).await;
        let found = store.get(&id).await.unwrap();
        assert_eq!(found.user_id, "u1");
    }

    #[tokio::test]
    async fn test_ids_are_unique_per_insert() {
        let store = SessionStore::new();
        let first = store.insert(session()).await;
        let second = store.insert(session()).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_remove_invalidates_session() {
        let store = SessionStore::new();
        let id = store.insert(session()).await;
        store.remove(&id).await;
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_id_yields_none() {
        let store = SessionStore::new();
        assert!(store.get("nope").await.is_none());
    }
}
