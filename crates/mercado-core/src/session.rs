//! # Sessions
//!
//! A session carries who is logged in and their cart. Stores are injected
//! behind [`SessionStore`] so checkout can be tested with the in-memory
//! implementation and the CLI can persist sessions between invocations.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  first use ──► Session { customer: None, cart: {} }                     │
//! │      │                                                                  │
//! │      ├── login ──────► customer = Some(id)                              │
//! │      ├── cart ops ───► cart mutated under the store's lock              │
//! │      ├── checkout ───► cart cleared after commit                        │
//! │      ├── logout ─────► customer = None, cart = {}                       │
//! │      └── idle > timeout ─► same as logout on next access                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Thread Safety
//! `modify_at` is the only write path. Implementations must run the closure
//! while holding whatever lock guards the session so two requests of the
//! same session never interleave a read-modify-write.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::cart::Cart;
use crate::DEFAULT_SESSION_IDLE_SECS;

// =============================================================================
// Session
// =============================================================================

/// Stored session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    pub customer_id: Option<String>,
    pub cart: Cart,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Session {
            key: key.into(),
            customer_id: None,
            cart: Cart::new(),
            last_activity: now,
        }
    }

    /// True when no activity happened for longer than `timeout`.
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity > timeout
    }

    pub fn login(&mut self, customer_id: impl Into<String>) {
        self.customer_id = Some(customer_id.into());
    }

    /// Ends the login and discards the cart.
    pub fn logout(&mut self) {
        self.customer_id = None;
        self.cart.clear();
    }

    /// The explicit context passed to checkout.
    pub fn context(&self) -> SessionContext {
        SessionContext {
            session_key: self.key.clone(),
            customer_id: self.customer_id.clone(),
            authenticated: self.customer_id.is_some(),
        }
    }
}

/// Who is calling, passed explicitly instead of read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_key: String,
    pub customer_id: Option<String>,
    pub authenticated: bool,
}

impl SessionContext {
    pub fn anonymous(session_key: impl Into<String>) -> Self {
        SessionContext {
            session_key: session_key.into(),
            customer_id: None,
            authenticated: false,
        }
    }

    pub fn for_customer(session_key: impl Into<String>, customer_id: impl Into<String>) -> Self {
        SessionContext {
            session_key: session_key.into(),
            customer_id: Some(customer_id.into()),
            authenticated: true,
        }
    }

    /// The logged-in customer, if any.
    pub fn customer_id(&self) -> Option<&str> {
        if self.authenticated {
            self.customer_id.as_deref()
        } else {
            None
        }
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Session store failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The store's lock was poisoned by a panicking writer.
    #[error("Session store lock poisoned")]
    Poisoned,

    /// Backend I/O failed (file store, etc.).
    #[error("Session backend error: {0}")]
    Backend(String),

    /// Stored data could not be (de)serialized.
    #[error("Session data corrupt: {0}")]
    Corrupt(String),
}

/// Key-value store of sessions.
pub trait SessionStore: Send + Sync {
    /// Loads or creates the session `key`, expiring it first if it has been
    /// idle too long, applies `f` atomically and records activity at `now`.
    ///
    /// Returns the session as stored after `f`.
    fn modify_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
        f: &mut dyn FnMut(&mut Session),
    ) -> Result<Session, SessionError>;

    /// Deletes a session. Deleting an unknown key is a no-op.
    fn destroy(&self, key: &str) -> Result<(), SessionError>;

    /// Drops every session idle at `now`. Returns how many were removed.
    fn evict_idle(&self, now: DateTime<Utc>) -> Result<usize, SessionError>;

    /// [`SessionStore::modify_at`] with the current time.
    fn modify(&self, key: &str, f: &mut dyn FnMut(&mut Session)) -> Result<Session, SessionError> {
        self.modify_at(key, Utc::now(), f)
    }

    /// Loads the session, touching its activity time.
    fn load(&self, key: &str) -> Result<Session, SessionError> {
        self.modify(key, &mut |_| {})
    }
}

/// Applies the idle rule and the mutation to an entry of a session map.
///
/// Shared by every map-backed store.
pub fn apply_to_map(
    sessions: &mut HashMap<String, Session>,
    key: &str,
    now: DateTime<Utc>,
    idle_timeout: Duration,
    f: &mut dyn FnMut(&mut Session),
) -> Session {
    let session = sessions
        .entry(key.to_string())
        .or_insert_with(|| Session::new(key, now));
    if session.is_idle(now, idle_timeout) {
        *session = Session::new(key, now);
    }
    f(session);
    session.last_activity = now;
    session.clone()
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Process-local session store.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        MemorySessionStore {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Number of live sessions (including idle ones not yet evicted).
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_IDLE_SECS))
    }
}

impl SessionStore for MemorySessionStore {
    fn modify_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
        f: &mut dyn FnMut(&mut Session),
    ) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(apply_to_map(&mut sessions, key, now, self.idle_timeout, f))
    }

    fn destroy(&self, key: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().map_err(|_| SessionError::Poisoned)?;
        sessions.remove(key);
        Ok(())
    }

    fn evict_idle(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.lock().map_err(|_| SessionError::Poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_idle(now, self.idle_timeout));
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_load_creates_empty_session() {
        let store = MemorySessionStore::default();
        let session = store.load("abc").unwrap();
        assert_eq!(session.key, "abc");
        assert!(session.cart.is_empty());
        assert!(!session.context().authenticated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_modify_persists_changes() {
        let store = MemorySessionStore::default();
        store
            .modify("abc", &mut |s| {
                s.login("cust-1");
                s.cart = Cart::from_lines([("p1", 2)]);
            })
            .unwrap();

        let session = store.load("abc").unwrap();
        assert_eq!(session.context(), SessionContext::for_customer("abc", "cust-1"));
        assert_eq!(session.cart.quantity_of("p1"), 2);
    }

    #[test]
    fn test_idle_session_is_reset_on_access() {
        let store = MemorySessionStore::new(Duration::seconds(600));
        let t0 = Utc::now();
        store
            .modify_at("abc", t0, &mut |s| {
                s.login("cust-1");
                s.cart = Cart::from_lines([("p1", 1)]);
            })
            .unwrap();

        let fresh = store
            .modify_at("abc", t0 + Duration::seconds(599), &mut |_| {})
            .unwrap();
        assert!(fresh.customer_id.is_some());

        let expired = store
            .modify_at("abc", t0 + Duration::seconds(599 + 601), &mut |_| {})
            .unwrap();
        assert!(expired.customer_id.is_none());
        assert!(expired.cart.is_empty());
    }

    #[test]
    fn test_evict_idle_and_destroy() {
        let store = MemorySessionStore::new(Duration::seconds(10));
        let t0 = Utc::now();
        store.modify_at("old", t0, &mut |_| {}).unwrap();
        store
            .modify_at("new", t0 + Duration::seconds(8), &mut |_| {})
            .unwrap();

        assert_eq!(store.evict_idle(t0 + Duration::seconds(15)).unwrap(), 1);
        assert_eq!(store.len(), 1);

        store.destroy("new").unwrap();
        store.destroy("never-existed").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_logout_clears_cart() {
        let mut session = Session::new("k", Utc::now());
        session.login("c");
        session.cart = Cart::from_lines([("p", 3)]);
        session.logout();
        assert!(session.customer_id.is_none());
        assert!(session.cart.is_empty());
    }

    #[test]
    fn test_concurrent_modifications_do_not_lose_updates() {
        let store = Arc::new(MemorySessionStore::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .modify("shared", &mut |s| {
                                let qty = s.cart.quantity_of("p1");
                                s.cart = Cart::from_lines([("p1", qty + 1)]);
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.load("shared").unwrap().cart.quantity_of("p1"), 200);
    }

    #[test]
    fn test_anonymous_context_has_no_customer() {
        let ctx = SessionContext {
            session_key: "k".into(),
            customer_id: Some("c".into()),
            authenticated: false,
        };
        assert_eq!(ctx.customer_id(), None);
        assert_eq!(SessionContext::anonymous("k").customer_id(), None);
    }
}
