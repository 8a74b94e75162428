//! Authenticated session state
//!
//! A [`SessionStore`] is owned by one client and shared by reference count.
//! Readers clone the current `Arc<Session>`; logins are serialized by a
//! separate mutex so concurrent callers never log in twice.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Result of a successful `authenticate` call
#[derive(Clone)]
pub struct Session {
    uid: i64,
    secret: String,
    authenticated_at: DateTime<Utc>,
    server_version: Option<String>,
}

impl Session {
    pub fn new(uid: i64, secret: impl Into<String>, server_version: Option<String>) -> Self {
        Self {
            uid,
            secret: secret.into(),
            authenticated_at: Utc::now(),
            server_version,
        }
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("authenticated_at", &self.authenticated_at)
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

/// Whether a usable session exists
#[derive(Debug, Clone)]
pub enum SessionState {
    Missing,
    Active(Arc<Session>),
}

#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Arc<Session>>>,
    login: Mutex<()>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a session
    pub fn with_session(session: Session) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(session))),
            login: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> SessionState {
        match self.current.read().await.as_ref() {
            Some(session) => SessionState::Active(Arc::clone(session)),
            None => SessionState::Missing,
        }
    }

    pub async fn current(&self) -> Option<Arc<Session>> {
        self.current.read().await.clone()
    }

    /// Install a new session, dropping the previous one
    pub async fn replace(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        *self.current.write().await = Some(Arc::clone(&session));
        session
    }

    /// Drop `stale` if it is still the current session.
    ///
    /// Returns false when another task already replaced it.
    pub async fn invalidate(&self, stale: &Arc<Session>) -> bool {
        let mut current = self.current.write().await;
        match current.as_ref() {
            Some(session) if Arc::ptr_eq(session, stale) => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    /// Hold this while logging in
    pub async fn login_guard(&self) -> MutexGuard<'_, ()> {
        self.login.lock().await
    }
}
