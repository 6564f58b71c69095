//! # Session Guard
//!
//! Owns the one authenticated [`Session`] and serializes every use of it.
//!
//! Each proxied request holds the lock for its entire lifetime, including
//! backend round trips and any re-authentication, so at most one
//! backend-facing request and at most one login are in flight at a time.
//!
//! ## Retry policy
//!
//! - attempt 1 with the current session
//! - on [`Error::SessionInvalid`] only: discard the session, log in again
//!   and retry exactly once
//! - any other error is returned unchanged
//!
//! Having no session at all is treated like an invalidated one, so the
//! first request after startup (or after a logout) performs the login.

use super::authenticator::{Authenticate, LoginAuthenticator};
use super::forwarder::Forwarder;
use super::network::Session;
use crate::config::Settings;
use crate::otp::CodeProvider;
use crate::types::{ProxyRequest, ProxyResponse};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Serialized access to the single backend session
pub struct SessionGuard {
    authenticator: Arc<dyn Authenticate>,
    forwarder: Forwarder,
    current: Mutex<Option<Session>>,
    active: AtomicBool,
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("forwarder", &self.forwarder)
            .finish_non_exhaustive()
    }
}

impl SessionGuard {
    /// Create a guard with no session; the first request logs in
    pub fn new(authenticator: Arc<dyn Authenticate>, forwarder: Forwarder) -> Self {
        Self {
            authenticator,
            forwarder,
            current: Mutex::new(None),
            active: AtomicBool::new(false),
        }
    }

    /// Create a guard using the form login for `settings`
    pub fn from_settings(settings: Arc<Settings>, codes: Arc<dyn CodeProvider>) -> Result<Self> {
        let authenticator = LoginAuthenticator::new(settings.clone(), codes)?;
        Ok(Self::new(Arc::new(authenticator), Forwarder::new(settings)))
    }

    /// Proxy one request, re-authenticating at most once
    pub async fn proxy(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        let mut current = self.current.lock().await;

        let first_attempt = match current.as_ref() {
            Some(session) => Some(self.forwarder.forward(session, request).await),
            None => None,
        };

        match first_attempt {
            Some(Err(e)) if e.is_session_invalid() => {
                let age = current
                    .take()
                    .map(|session| (Utc::now() - session.established_at()).num_seconds())
                    .unwrap_or_default();
                tracing::warn!(
                    "Session no longer valid after {}s ({}), logging in again",
                    age,
                    e
                );
                self.active.store(false, Ordering::SeqCst);
            }
            Some(result) => return result,
            None => tracing::info!("No active session, logging in"),
        }

        let session = match self.authenticator.authenticate().await {
            Ok(session) => {
                self.active.store(true, Ordering::SeqCst);
                current.insert(session)
            }
            Err(e) => {
                tracing::error!("Login failed: {}", e);
                return Err(Error::reauth_failed(e));
            }
        };

        self.forwarder.forward(session, request).await.map_err(|e| {
            tracing::error!("Request failed on a fresh session: {}", e);
            Error::proxy_after_reauth(e)
        })
    }

    /// Log in now unless a session is already held
    pub async fn ensure_session(&self) -> Result<()> {
        let mut current = self.current.lock().await;
        if current.is_none() {
            *current = Some(self.authenticator.authenticate().await?);
            self.active.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Discard the current session; returns whether one was held
    pub async fn invalidate(&self) -> bool {
        let discarded = self.current.lock().await.take().is_some();
        self.active.store(false, Ordering::SeqCst);
        if discarded {
            tracing::info!("Session discarded");
        }
        discarded
    }

    /// Whether a session is held, without waiting for in-flight requests
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
