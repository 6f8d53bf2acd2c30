//! # Database State
//!
//! Wraps the `Database` connection for use in commands.

use mercado_db::{CheckoutEngine, Database};

use crate::config::AppConfig;

/// Wrapper around `Database` handed to commands.
#[derive(Debug, Clone)]
pub struct DbState {
    db: Database,
}

impl DbState {
    /// Creates a new DbState wrapping the database connection.
    pub fn new(db: Database) -> Self {
        DbState { db }
    }

    /// Returns a reference to the inner Database.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let products = db_state.inner().products().list("arroz").await?;
    /// ```
    pub fn inner(&self) -> &Database {
        &self.db
    }

    /// A checkout engine configured from `config`.
    pub fn checkout(&self, config: &AppConfig) -> CheckoutEngine {
        self.db
            .checkout(config.shortage_policy, config.default_payment_method)
    }
}
