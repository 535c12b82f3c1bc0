use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::gate::DEFAULT_PENDING_TTL_SECS;
use crate::{AccessToken, Consumer, Result};

/// Per-user authentication state. No entry at all means unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the provider. The consumer holds a request token once
    /// one was issued.
    Pending(PendingAuthorization),
    Authorized(AccessToken),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub consumer: Consumer,
    /// Path that triggered the sign-in.
    pub forward_path: String,
    pub started_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub fn new<P: Into<String>>(consumer: Consumer, forward_path: P) -> Self {
        PendingAuthorization {
            consumer,
            forward_path: forward_path.into(),
            started_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.started_at > ttl
    }
}

/// Where session states live between requests, keyed by session id.
///
/// Isolation between users is the store's job; the middleware only ever
/// touches the entry of the current session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionState>>;

    async fn store(&self, id: &str, state: SessionState) -> Result<()>;

    async fn remove(&self, id: &str) -> Result<()>;
}

/// In-process store. Clones share the same map.
///
/// Storing a new pending sign-in first drops pending entries older than the
/// store's TTL (15 minutes unless built with [`MemorySessionStore::with_pending_ttl`]),
/// so abandoned sign-ins do not pile up. Authorized entries stay until removed.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionState>>>,
    pending_ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_pending_ttl(Duration::seconds(DEFAULT_PENDING_TTL_SECS))
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_ttl(pending_ttl: Duration) -> Self {
        MemorySessionStore {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            pending_ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops pending entries older than `ttl` and returns how many went.
    pub async fn purge_expired(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        retain_live(&mut sessions, ttl);
        before - sessions.len()
    }
}

fn retain_live(sessions: &mut HashMap<String, SessionState>, ttl: Duration) {
    let now = Utc::now();
    sessions.retain(|_, state| match state {
        SessionState::Pending(pending) => !pending.is_expired(ttl, now),
        SessionState::Authorized(_) => true,
    });
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionState>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn store(&self, id: &str, state: SessionState) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if matches!(state, SessionState::Pending(_)) {
            retain_live(&mut sessions, self.pending_ttl);
        }
        sessions.insert(id.to_string(), state);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConsumerCredentials;

    fn pending() -> PendingAuthorization {
        let consumer = Consumer::new(ConsumerCredentials::new("K", "S").unwrap());
        PendingAuthorization::new(consumer, "/")
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_id() {
        let store = MemorySessionStore::new();
        store
            .store("a", SessionState::Authorized(AccessToken::new("t", "s")))
            .await
            .unwrap();
        store.store("b", SessionState::Pending(pending())).await.unwrap();

        assert!(matches!(
            store.load("a").await.unwrap(),
            Some(SessionState::Authorized(_))
        ));
        assert!(matches!(
            store.load("b").await.unwrap(),
            Some(SessionState::Pending(_))
        ));
        assert!(store.load("c").await.unwrap().is_none());

        store.remove("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn purge_keeps_authorized_sessions() {
        let store = MemorySessionStore::with_pending_ttl(Duration::days(1));
        let mut stale = pending();
        stale.started_at = Utc::now() - Duration::hours(2);
        store.store("stale", SessionState::Pending(stale)).await.unwrap();
        store.store("fresh", SessionState::Pending(pending())).await.unwrap();
        store
            .store("done", SessionState::Authorized(AccessToken::new("t", "s")))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(Duration::minutes(15)).await, 1);
        assert!(store.load("stale").await.unwrap().is_none());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn new_sign_ins_sweep_abandoned_ones() {
        let store = MemorySessionStore::with_pending_ttl(Duration::minutes(15));
        let mut stale = pending();
        stale.started_at = Utc::now() - Duration::hours(2);
        store.store("stale", SessionState::Pending(stale)).await.unwrap();
        store
            .store("done", SessionState::Authorized(AccessToken::new("t", "s")))
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);

        store.store("fresh", SessionState::Pending(pending())).await.unwrap();
        assert!(store.load("stale").await.unwrap().is_none());
        assert!(store.load("done").await.unwrap().is_some());
        assert!(store.load("fresh").await.unwrap().is_some());
    }

    #[test]
    fn state_serializes_with_a_tag() {
        let state = SessionState::Authorized(AccessToken::new("t", "s"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "authorized");
        assert_eq!(json["access_token"], "t");
        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
