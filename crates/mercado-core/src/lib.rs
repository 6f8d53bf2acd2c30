//! # mercado-core: Pure Business Logic for Mercado
//!
//! Everything the storefront decides without touching a database lives here:
//! CPF validation, money, the session cart, the shortage policy applied at
//! checkout, and the session store abstraction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    mercado-cli (commands)                       │   │
//! │  │    catalog, customer, cart, checkout, order                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ mercado-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────┐ ┌────────┐ ┌────────┐ ┌──────────┐ ┌─────────┐   │   │
//! │  │   │  cpf   │ │ money  │ │  cart  │ │ checkout │ │ session │   │   │
//! │  │   └────────┘ └────────┘ └────────┘ └──────────┘ └─────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          mercado-db (SQLite, repositories, checkout tx)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cpf`] - CPF check-digit validation and formatting
//! - [`money`] - Integer centavos with BRL formatting
//! - [`types`] - Domain entities (Product, Customer, Order, OrderItem)
//! - [`validation`] - Input validation rules
//! - [`cart`] - Session cart (product id → quantity)
//! - [`checkout`] - Shortage policy and order drafting
//! - [`session`] - Session store trait and the in-memory store
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mercado_core::cpf;
//! use mercado_core::money::Money;
//!
//! assert!(cpf::validate("529.982.247-25"));
//! assert_eq!(Money::from_cents(123456).to_string(), "R$ 1.234,56");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod cpf;
pub mod error;
pub mod money;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartAdjustment};
pub use checkout::{LineDecision, OrderDraft, ShortagePolicy};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use session::{MemorySessionStore, Session, SessionContext, SessionError, SessionStore};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct products allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product in a cart.
///
/// ## Business Reason
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest unit price accepted for a product, in centavos (R$ 1 bilhão).
///
/// Keeps `price × quantity` and order totals far from `i64` overflow.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Seconds of inactivity after which a session is logged out and its cart
/// discarded.
pub const DEFAULT_SESSION_IDLE_SECS: i64 = 600;

/// Minimum customer age, checked only when a birth date is supplied.
pub const MIN_CUSTOMER_AGE_YEARS: u32 = 16;
