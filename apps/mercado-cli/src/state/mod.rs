//! # State Module
//!
//! Application state handed to commands.
//!
//! Instead of a single `AppState` struct, each concern has its own type and
//! commands declare exactly what they need.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐          │
//! │  │   DbState    │  │  SessionState    │  │   AppConfig      │          │
//! │  │              │  │                  │  │                  │          │
//! │  │  Database    │  │  SessionStore    │  │  shortage policy │          │
//! │  │  (SQLite     │  │  + session key   │  │  default payment │          │
//! │  │   pool)      │  │  (--session)     │  │  idle timeout    │          │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘          │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • DbState: Database has internal connection pool (thread-safe)        │
//! │  • SessionState: the store serializes read-modify-write per call       │
//! │  • AppConfig: Read-only after loading                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod db;
mod session;

pub use db::DbState;
pub use session::{FileSessionStore, SessionState};
