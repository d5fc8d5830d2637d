// Per-browser session store
//
// Values live server-side in a DashMap keyed by an opaque id; the browser
// only ever sees the id, in the `coho.session` cookie.

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "coho.session";

/// Session key for the in-flight request token
pub const REQUEST_TOKEN: &str = "request_token";

/// Session key for the access token
pub const ACCESS_TOKEN: &str = "access_token";

struct SessionEntry {
    values: BTreeMap<String, Value>,
    last_access: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            last_access: Instant::now(),
        }
    }
}

/// Thread-safe store of all live sessions with idle expiry
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store whose sessions expire after `ttl_secs` of inactivity
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Look up a live session and mark it as used
    pub fn load(&self, id: &str) -> Option<SessionHandle> {
        let expired = {
            let mut entry = self.sessions.get_mut(id)?;
            if entry.last_access.elapsed() > self.ttl {
                true
            } else {
                entry.last_access = Instant::now();
                false
            }
        };

        if expired {
            tracing::debug!(session = %id, "Session expired");
            self.sessions.remove(id);
            return None;
        }

        Some(self.handle(id.to_string()))
    }

    /// Start a new empty session
    pub fn create(&self) -> SessionHandle {
        self.purge_expired();

        let id = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.insert(id.clone(), SessionEntry::new());
        tracing::debug!(session = %id, "Created session");
        self.handle(id)
    }

    /// Drop every session idle for longer than the TTL
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions
            .retain(|_, entry| entry.last_access.elapsed() <= ttl);
        before.saturating_sub(self.sessions.len())
    }

    /// Purge expired sessions every `every` on a background task
    pub fn spawn_purge_task(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = store.len(), "Purged expired sessions");
                }
            }
        })
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn handle(&self, id: String) -> SessionHandle {
        SessionHandle {
            id,
            store: self.clone(),
        }
    }
}

/// One browser's session, as seen by a request handler
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    store: SessionStore,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read and deserialize a value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.store.sessions.get(&self.id)?;
        let value = entry.values.get(key)?.clone();
        drop(entry);

        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable session value");
                None
            }
        }
    }

    /// Whether a key holds anything other than null
    pub fn contains(&self, key: &str) -> bool {
        self.store
            .sessions
            .get(&self.id)
            .is_some_and(|entry| entry.values.get(key).is_some_and(|v| !v.is_null()))
    }

    /// Serialize and store a value
    pub fn insert<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize session value {}", key))?;

        self.store
            .sessions
            .entry(self.id.clone())
            .or_insert_with(SessionEntry::new)
            .values
            .insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a key, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        self.store
            .sessions
            .get_mut(&self.id)
            .is_some_and(|mut entry| entry.values.remove(key).is_some())
    }

    /// Copy of every key and value, for rendering
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.store
            .sessions
            .get(&self.id)
            .map(|entry| entry.values.clone())
            .unwrap_or_default()
    }
}
