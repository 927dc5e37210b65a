//! # Session Storage
//!
//! Conversation sessions for the Sunny chat server.
//!
//! A session is minted on first contact from a client without a valid session
//! cookie and lives for a fixed time-to-live measured from creation. Expiry is
//! lazy: an expired session is only removed when it is looked up again, there is
//! no background sweeper.
//!
//! The [`SessionStore`] trait is the seam the HTTP layer depends on; the
//! [`InMemorySessionStore`] is the only backend and keeps everything in process
//! memory, so sessions do not survive a restart.

mod session;
mod traits;

pub mod in_memory;

pub use in_memory::{InMemoryConfig, InMemorySessionStore};
pub use session::{ChatTurn, Role, Session, SharedSession};
pub use traits::{BoxedSessionStore, SessionStore};

use std::time::Duration;

/// Default session lifetime: four hours from creation.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 4);

/// Result type for session storage operations
pub type Result<T> = std::result::Result<T, SessionStorageError>;

/// Session storage errors
///
/// A missing or expired session is not an error; lookups report it as `None`.
#[derive(Debug, thiserror::Error)]
pub enum SessionStorageError {
    /// The backing store could not complete the operation
    #[error("Storage backend error: {0}")]
    Backend(String),
}
