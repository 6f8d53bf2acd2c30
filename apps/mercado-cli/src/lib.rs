//! # Mercado CLI Library
//!
//! Storefront and back-office operations over `mercado-core` and
//! `mercado-db`. The `mercado` binary parses arguments and calls into here.
//!
//! ## Module Organization
//! ```text
//! mercado_cli/
//! ├── lib.rs          ◄─── You are here (startup helpers)
//! ├── config.rs       ◄─── AppConfig: defaults, mercado.toml, MERCADO_* env
//! ├── error.rs        ◄─── ApiError + exit codes
//! ├── state/
//! │   ├── db.rs       ◄─── Database state wrapper
//! │   └── session.rs  ◄─── JSON file session store
//! └── commands/
//!     ├── catalog.rs  ◄─── Product search/CRUD
//!     ├── customer.rs ◄─── Registration, login, profile
//!     ├── cart.rs     ◄─── Session cart
//!     ├── checkout.rs ◄─── Order placement
//!     └── order.rs    ◄─── Order history and direct creation
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod state;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mercado_db::{Database, DbConfig};

use config::AppConfig;
use error::ApiError;
use state::{DbState, FileSessionStore, SessionState};

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so stdout stays clean JSON.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=mercado=trace` - Show trace for mercado crates only
/// - Default: `info,mercado=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mercado=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the database named by `config`.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  1. Resolve path: --db ⇒ MERCADO_DB_PATH ⇒ config ⇒ data dir           │
/// │  2. Connect: SQLite, WAL, foreign keys on                              │
/// │  3. Run pending migrations                                             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn open_database(config: &AppConfig) -> Result<DbState, ApiError> {
    let path = config.resolved_database_path()?;
    info!(?path, "Database path determined");

    let db = Database::new(DbConfig::new(path).max_connections(config.max_connections)).await?;
    Ok(DbState::new(db))
}

/// Opens the session file and binds it to `session_key`.
pub fn open_sessions(config: &AppConfig, session_key: &str) -> Result<SessionState, ApiError> {
    let path = config.resolved_sessions_path()?;
    let store = FileSessionStore::new(path, config.session_idle_timeout());
    Ok(SessionState::new(Arc::new(store), session_key))
}
