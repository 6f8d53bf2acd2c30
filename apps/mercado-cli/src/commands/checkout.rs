//! # Checkout Command
//!
//! Turns the logged-in customer's cart into an order.
//!
//! ```text
//! mercado --session balcao-1 checkout --payment pix
//!      │
//!      ▼
//! SessionContext { session_key, customer_id, authenticated }
//!      │
//!      ▼
//! CheckoutEngine::finalize (one transaction, policy from config)
//!      │
//!      ├── Ok(receipt) ──► order JSON + backorder warnings, cart cleared
//!      └── Err(e) ──────► nothing written, cart untouched
//! ```

use tracing::info;

use crate::commands::order::ReceiptResponse;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::state::{DbState, SessionState};

/// Places the order for the current session.
///
/// An unknown `payment` falls back to the customer's preferred method and
/// then to `default_payment_method`.
pub async fn checkout(
    db: &DbState,
    sessions: &SessionState,
    config: &AppConfig,
    payment: Option<&str>,
) -> Result<ReceiptResponse, ApiError> {
    let ctx = sessions.context()?;
    let engine = db.checkout(config);

    let receipt = engine.finalize(sessions.store(), &ctx, payment).await?;

    info!(
        order_id = %receipt.order.order.id,
        session = %ctx.session_key,
        backordered = receipt.backordered.len(),
        "Checkout completed"
    );
    Ok(receipt.into())
}
