//! Session guard: the single authority on whether an administrator is
//! present.
//!
//! State starts `unknown` (loading) and resolves to `authenticated` or
//! `anonymous`. Mutation happens only through [`SessionGuard::check_session`],
//! [`SessionGuard::sign_in`] and [`SessionGuard::sign_out`]; everything else
//! consumes the read-only projection published through a watch channel.

mod cache;

pub use cache::SessionCache;

use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::{AuthError, AuthProvider};
use crate::models::{Session, User};

/// The published authentication state.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl AuthState {
    fn unknown() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }

    fn authenticated(user: User, session: Session) -> Self {
        Self {
            user: Some(user),
            session: Some(session),
            loading: false,
        }
    }

    fn anonymous() -> Self {
        Self {
            user: None,
            session: None,
            loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Gates administrative views on a cached authentication session.
pub struct SessionGuard {
    provider: Arc<dyn AuthProvider>,
    cache: SessionCache,
    tx: watch::Sender<AuthState>,
}

impl SessionGuard {
    pub fn new(provider: Arc<dyn AuthProvider>, cache: SessionCache) -> Self {
        let (tx, _) = watch::channel(AuthState::unknown());
        Self {
            provider,
            cache,
            tx,
        }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// The current state.
    pub fn state(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Restore the cached session and ask the provider whether it still
    /// stands. Any outcome other than a session with a valid user resolves
    /// to anonymous; the cache is advisory, the provider authoritative.
    ///
    /// Safe to call redundantly; always ends with `loading = false`.
    pub async fn check_session(&self) {
        self.tx.send_modify(|state| state.loading = true);

        let session = self.state().session.or_else(|| self.cache.load());
        let next = match session {
            Some(session) => match self.provider.get_user(&session).await {
                Ok(Some(user)) => AuthState::authenticated(user, session),
                Ok(None) => {
                    tracing::debug!("cached session no longer recognized by the provider");
                    if let Err(err) = self.cache.clear() {
                        tracing::warn!(%err, "failed to clear stale session cache");
                    }
                    AuthState::anonymous()
                }
                Err(err) => {
                    tracing::warn!(%err, "session check failed");
                    AuthState::anonymous()
                }
            },
            None => AuthState::anonymous(),
        };
        self.tx.send_replace(next);
    }

    /// Verify credentials with the provider.
    ///
    /// Success transitions to authenticated and persists the session;
    /// [`AuthError::InvalidCredentials`] is an expected outcome returned as a
    /// value, leaving the state anonymous.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        match self.provider.sign_in_with_password(email, password).await {
            Ok((user, session)) => {
                if let Err(err) = self.cache.store(&session) {
                    tracing::warn!(%err, "failed to persist session cache");
                }
                self.tx
                    .send_replace(AuthState::authenticated(user.clone(), session));
                Ok(user)
            }
            Err(err) => {
                self.tx.send_modify(|state| state.loading = false);
                Err(err)
            }
        }
    }

    /// Revoke the session with the provider, then transition to anonymous
    /// unconditionally, clearing the cache. Provider failure is logged, not
    /// propagated; locally the administrator is signed out either way.
    pub async fn sign_out(&self) {
        let session = self.state().session.or_else(|| self.cache.load());
        if let Some(session) = session {
            if let Err(err) = self.provider.sign_out(&session).await {
                tracing::warn!(%err, "sign-out request failed");
            }
        }
        if let Err(err) = self.cache.clear() {
            tracing::warn!(%err, "failed to clear session cache");
        }
        self.tx.send_replace(AuthState::anonymous());
    }
}
