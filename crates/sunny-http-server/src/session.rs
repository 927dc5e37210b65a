//! Session middleware
//!
//! Reads the session cookie, attaches the live session to the request, and
//! mints a new one (with a `Set-Cookie`) when the cookie is missing, unknown
//! or expired. The cookie's `Max-Age` is the store's TTL; sessions are never
//! renewed by activity.

use std::sync::Arc;

use async_trait::async_trait;
use sunny_session_storage::BoxedSessionStore;
use tracing::debug;

use crate::cookie::{CookieOptions, SameSite};
use crate::{HttpError, Middleware, Next, Request, Response};

/// Default session cookie name
pub const DEFAULT_SESSION_COOKIE: &str = "sunny_session";

/// Session cookie configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Mark the cookie `Secure` (production deployments behind TLS)
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            secure: false,
        }
    }
}

/// Attaches a session from the injected store to every request
#[derive(Clone)]
pub struct SessionLayer {
    store: Arc<BoxedSessionStore>,
    config: SessionConfig,
}

impl SessionLayer {
    pub fn new(store: Arc<BoxedSessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<BoxedSessionStore> {
        &self.store
    }

    fn cookie_options(&self) -> CookieOptions {
        CookieOptions::default()
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure)
            .max_age(self.store.ttl())
            .path("/")
    }
}

#[async_trait]
impl Middleware for SessionLayer {
    async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Next, HttpError> {
        let existing = match req.cookies.get(&self.config.cookie_name) {
            Some(session_id) => self.store.get(session_id).await?,
            None => None,
        };

        let session = match existing {
            Some(session) => session,
            None => {
                let session = self.store.create().await?;
                let session_id = session.lock().await.id.clone();
                debug!(session_id = %session_id, "Issuing session cookie");
                res.cookie(&self.config.cookie_name, &session_id, &self.cookie_options());
                session
            }
        };

        req.session = Some(session);
        Ok(Next::Continue)
    }
}
