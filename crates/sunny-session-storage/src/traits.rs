//! Session store trait

use std::time::Duration;

use async_trait::async_trait;

use crate::{Result, SharedSession};

/// Storage backend for conversation sessions.
///
/// Every operation on the underlying map is atomic with respect to other
/// connections; implementations must lock or use a concurrent map.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Human readable backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Fixed lifetime of every session, measured from creation
    fn ttl(&self) -> Duration;

    /// Mint a new session with a unique id and empty history
    async fn create(&self) -> Result<SharedSession>;

    /// Look up a live session.
    ///
    /// An expired session is removed as a side effect and reported as `None`.
    async fn get(&self, session_id: &str) -> Result<Option<SharedSession>>;

    /// Remove a session, returning whether it existed
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Number of sessions currently held, including expired ones not yet looked up
    async fn session_count(&self) -> Result<usize>;
}

/// Trait object form used for dependency injection
pub type BoxedSessionStore = dyn SessionStore;
