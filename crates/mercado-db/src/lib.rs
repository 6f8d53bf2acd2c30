//! # mercado-db: Database Layer for Mercado
//!
//! SQLite storage for the catalog, customers and orders, and the checkout
//! transaction that ties them together.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Data Flow                                │
//! │                                                                         │
//! │  CLI command (checkout)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   mercado-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌────────────────┐  ┌──────────────────┐  │   │
//! │  │   │   Database    │  │  Repositories  │  │  CheckoutEngine  │  │   │
//! │  │   │   (pool.rs)   │◄─│  product       │◄─│  one transaction │  │   │
//! │  │   │  SqlitePool   │  │  customer      │  │  per order       │  │   │
//! │  │   │  migrations   │  │  order         │  │                  │  │   │
//! │  │   └───────────────┘  └────────────────┘  └──────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (mercado.db in the platform data dir)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and checkout error types
//! - [`repository`] - Product, customer and order repositories
//! - [`checkout`] - The order finalization transaction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mercado_db::{Database, DbConfig};
//! use mercado_core::{PaymentMethod, ShortagePolicy};
//!
//! let db = Database::new(DbConfig::new("mercado.db")).await?;
//! let products = db.products().list("arroz").await?;
//!
//! let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);
//! let receipt = engine.finalize(&sessions, &ctx, Some("pix")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutEngine, Receipt};
pub use error::{CheckoutError, CheckoutResult, DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::customer::CustomerRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
