//! # Session State
//!
//! Each CLI invocation is a short-lived process, so sessions live in a JSON
//! file between runs. The `--session` flag picks which one a command acts on,
//! letting several shoppers share one back-office machine.
//!
//! ## File Layout
//! ```json
//! {
//!   "default": {
//!     "key": "default",
//!     "customer_id": "6f1c…",
//!     "cart": { "lines": { "a3e0…": 2 } },
//!     "last_activity": "2026-10-19T12:00:00Z"
//!   }
//! }
//! ```
//!
//! ## Write Path
//! ```text
//! lock sessions.json.lock ─► read ─► idle rule + mutation ─► write tmp ─► rename
//! ```
//! The lock is an exclusive OS file lock, so it serializes every reader and
//! writer of the file: threads of one process and concurrent `mercado`
//! processes alike. It is released when the lock handle closes, including
//! when a process dies. The rename replaces the file atomically, so a crash
//! mid-write leaves the previous contents intact.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use mercado_core::session::apply_to_map;
use mercado_core::{Session, SessionContext, SessionError, SessionStore};

use crate::error::ApiError;

type SessionMap = HashMap<String, Session>;

// =============================================================================
// File Store
// =============================================================================

fn backend(e: std::io::Error) -> SessionError {
    SessionError::Backend(e.to_string())
}

/// Session store persisted as one JSON document.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    idle_timeout: Duration,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>, idle_timeout: Duration) -> Self {
        FileSessionStore {
            path: path.into(),
            idle_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file holding the lock; the sessions file itself is replaced
    /// on every write, so it cannot carry one.
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn ensure_parent(&self) -> Result<(), SessionError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(backend)
            }
            _ => Ok(()),
        }
    }

    /// Blocks until this handle holds the exclusive lock.
    ///
    /// The lock is released when the returned file is dropped.
    fn lock(&self) -> Result<File, SessionError> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .map_err(backend)?;
        file.lock().map_err(backend)?;
        Ok(file)
    }

    fn read_all(&self) -> Result<SessionMap, SessionError> {
        if !self.path.exists() {
            return Ok(SessionMap::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(backend)?;
        if contents.trim().is_empty() {
            return Ok(SessionMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| SessionError::Corrupt(e.to_string()))
    }

    fn write_all(&self, sessions: &SessionMap) -> Result<(), SessionError> {
        let contents = serde_json::to_string_pretty(sessions)
            .map_err(|e| SessionError::Corrupt(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(backend)?;
        std::fs::rename(&tmp, &self.path).map_err(backend)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn modify_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
        f: &mut dyn FnMut(&mut Session),
    ) -> Result<Session, SessionError> {
        let _lock = self.lock()?;
        let mut sessions = self.read_all()?;
        let session = apply_to_map(&mut sessions, key, now, self.idle_timeout, f);
        self.write_all(&sessions)?;
        Ok(session)
    }

    fn destroy(&self, key: &str) -> Result<(), SessionError> {
        let _lock = self.lock()?;
        let mut sessions = self.read_all()?;
        if sessions.remove(key).is_some() {
            self.write_all(&sessions)?;
        }
        Ok(())
    }

    fn evict_idle(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let _lock = self.lock()?;
        let mut sessions = self.read_all()?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_idle(now, self.idle_timeout));
        let removed = before - sessions.len();
        if removed > 0 {
            self.write_all(&sessions)?;
        }
        debug!(removed, "Evicted idle sessions");
        Ok(removed)
    }
}

// =============================================================================
// Session State
// =============================================================================

/// The store plus the key of the session this invocation acts for.
#[derive(Clone)]
pub struct SessionState {
    store: Arc<dyn SessionStore>,
    key: String,
}

impl SessionState {
    pub fn new(store: Arc<dyn SessionStore>, key: impl Into<String>) -> Self {
        SessionState {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Loads the session, resetting it first if it went idle.
    pub fn load(&self) -> Result<Session, ApiError> {
        Ok(self.store.load(&self.key)?)
    }

    /// The explicit context for checkout and "my orders".
    pub fn context(&self) -> Result<SessionContext, ApiError> {
        Ok(self.load()?.context())
    }

    /// Runs `f` against the session under the store's lock.
    pub fn modify(&self, f: &mut dyn FnMut(&mut Session)) -> Result<Session, ApiError> {
        Ok(self.store.modify(&self.key, f)?)
    }

    /// The logged-in customer, or `Unauthorized`.
    pub fn require_customer(&self) -> Result<String, ApiError> {
        self.context()?
            .customer_id()
            .map(str::to_string)
            .ok_or_else(|| ApiError::unauthorized("Login required"))
    }

    /// Ends the session and drops its cart.
    pub fn destroy(&self) -> Result<(), ApiError> {
        Ok(self.store.destroy(&self.key)?)
    }

    /// Drops every idle session in the store, not only this one.
    pub fn evict_idle(&self) -> Result<usize, ApiError> {
        Ok(self.store.evict_idle(Utc::now())?)
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
