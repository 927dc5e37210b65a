//! In-Memory Session Store
//!
//! Sessions live in a `HashMap` behind a tokio `RwLock`, so every map operation
//! is atomic across connections. Each entry remembers the monotonic instant it
//! was created; `get` compares against it and evicts lazily.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::{DEFAULT_SESSION_TTL, Result, Session, SessionStore, SharedSession};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Absolute session lifetime from creation
    pub ttl: Duration,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SESSION_TTL,
        }
    }
}

#[derive(Debug)]
struct StoredSession {
    session: SharedSession,
    created: Instant,
}

/// Process-local session store
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    config: InMemoryConfig,
}

impl InMemorySessionStore {
    /// Create a store with the default TTL
    pub fn new() -> Self {
        Self::with_config(InMemoryConfig::default())
    }

    /// Create a store with a custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_config(InMemoryConfig { ttl })
    }

    pub fn with_config(config: InMemoryConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "InMemory"
    }

    fn ttl(&self) -> Duration {
        self.config.ttl
    }

    async fn create(&self) -> Result<SharedSession> {
        let session = Session::new();
        let session_id = session.id.clone();
        let shared = Arc::new(Mutex::new(session));

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id.clone(),
            StoredSession {
                session: Arc::clone(&shared),
                created: Instant::now(),
            },
        );

        debug!(session_id = %session_id, "Created session");
        Ok(shared)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SharedSession>> {
        let mut sessions = self.sessions.write().await;

        let expired = match sessions.get(session_id) {
            None => return Ok(None),
            Some(stored) => stored.created.elapsed() >= self.config.ttl,
        };

        if expired {
            sessions.remove(session_id);
            debug!(session_id = %session_id, "Evicted expired session");
            return Ok(None);
        }

        Ok(sessions
            .get(session_id)
            .map(|stored| Arc::clone(&stored.session)))
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(session_id).is_some())
    }

    async fn session_count(&self) -> Result<usize> {
        let sessions = self.sessions.read().await;
        Ok(sessions.len())
    }
}
