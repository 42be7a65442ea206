//! The Session Store's data types and storage contract (§3, §4.1).
//!
//! `Session` is durable, connection-independent conversational state. It is
//! distinct from a live connection: a connection opens and closes a live
//! socket; a session survives across many connections, up to its idle TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::conversation::Exchange;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub history: Vec<Exchange>,
    pub variables: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            history: Vec::new(),
            variables: HashMap::new(),
            created_at: now,
            last_access_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_access_at = Utc::now();
    }

    pub fn is_expired(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.last_access_at > ttl
    }

    /// Appends an exchange, trimming history down to `cap` most-recent
    /// entries. Invariant (§3): history never exceeds the cap.
    pub fn append_exchange(&mut self, exchange: Exchange, cap: usize) {
        self.history.push(exchange);
        if self.history.len() > cap {
            let excess = self.history.len() - cap;
            self.history.drain(0..excess);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage contract for the Session Store (§4.1). Implementations may back
/// this with an in-memory map, an external TTL-keyed datastore, or both (the
/// external store as primary, the in-memory map as a write-through cache —
/// see DESIGN.md). Every mutating operation must be atomic: a crash must
/// never leave a half-written session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the session for `id`, or creates a fresh one if `id` is `None`
    /// or refers to an absent/expired session. Refreshes `last_access_at` on
    /// a hit. Returns the (possibly newly generated) session id.
    async fn get_or_create(&self, id: Option<&str>) -> Result<(String, Session)>;

    /// Appends one exchange to the named session's history, trimming to the
    /// configured cap, and persists the result atomically.
    async fn append_exchange(&self, id: &str, user_text: &str, assistant_text: &str)
        -> Result<()>;

    /// Persists a full session snapshot atomically.
    async fn save(&self, id: &str, session: Session) -> Result<()>;
}

/// A pure in-memory `SessionStore`, keyed by a random UUID per session.
/// Used as the whole store when persistence is disabled (§6
/// "Configuration"), and as the write-through cache layer inside
/// `voice-agent-persistence::ScyllaSessionStore`.
pub struct InMemorySessionStore {
    sessions: dashmap::DashMap<String, Session>,
    ttl: chrono::Duration,
    history_cap: usize,
}

impl InMemorySessionStore {
    pub fn new(ttl: chrono::Duration, history_cap: usize) -> Self {
        Self { sessions: dashmap::DashMap::new(), ttl, history_cap }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, id: Option<&str>) -> Result<(String, Session)> {
        if let Some(id) = id {
            if let Some(mut entry) = self.sessions.get_mut(id) {
                if !entry.is_expired(self.ttl) {
                    entry.touch();
                    return Ok((id.to_string(), entry.clone()));
                }
            }
        }

        let fresh_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new();
        self.sessions.insert(fresh_id.clone(), session.clone());
        Ok((fresh_id, session))
    }

    async fn append_exchange(&self, id: &str, user_text: &str, assistant_text: &str) -> Result<()> {
        let (_, mut session) = self.get_or_create(Some(id)).await?;
        session.append_exchange(Exchange::new(user_text, assistant_text), self.history_cap);
        self.sessions.insert(id.to_string(), session);
        Ok(())
    }

    async fn save(&self, id: &str, session: Session) -> Result<()> {
        self.sessions.insert(id.to_string(), session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_creates_and_refreshes() {
        let store = InMemorySessionStore::new(chrono::Duration::hours(24), 5);
        let (id, _) = store.get_or_create(None).await.unwrap();
        let (same_id, session) = store.get_or_create(Some(&id)).await.unwrap();
        assert_eq!(id, same_id);
        let first_access = session.last_access_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (_, refreshed) = store.get_or_create(Some(&id)).await.unwrap();
        assert!(refreshed.last_access_at >= first_access);
    }

    #[tokio::test]
    async fn in_memory_store_caps_history_on_append() {
        let store = InMemorySessionStore::new(chrono::Duration::hours(24), 2);
        let (id, _) = store.get_or_create(None).await.unwrap();
        for i in 0..4 {
            store.append_exchange(&id, &format!("u{i}"), &format!("a{i}")).await.unwrap();
        }
        let (_, session) = store.get_or_create(Some(&id)).await.unwrap();
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].user_text, "u2");
    }

    #[test]
    fn append_exchange_trims_to_cap() {
        let mut session = Session::new();
        for i in 0..5 {
            session.append_exchange(Exchange::new(format!("u{i}"), format!("a{i}")), 3);
        }
        assert_eq!(session.history.len(), 3);
        assert_eq!(session.history[0].user_text, "u2");
        assert_eq!(session.history[2].user_text, "u4");
    }

    #[test]
    fn expiry_is_relative_to_last_access() {
        let mut session = Session::new();
        session.last_access_at = Utc::now() - chrono::Duration::hours(25);
        assert!(session.is_expired(chrono::Duration::hours(24)));
        session.touch();
        assert!(!session.is_expired(chrono::Duration::hours(24)));
    }
}
