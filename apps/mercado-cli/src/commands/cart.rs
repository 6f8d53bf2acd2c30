//! # Cart Commands
//!
//! The cart belongs to the session picked with `--session`; anonymous
//! shoppers have one too and keep it when they log in.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌──────────┐     ┌──────────┐     ┌──────────┐                        │
//! │  │  Empty   │────►│ In Cart  │────►│ Checkout │──► order committed     │
//! │  │  Cart    │     │          │     │          │    cart cleared        │
//! │  └──────────┘     └──────────┘     └──────────┘                        │
//! │                        │                                                │
//! │                   cart add / update / remove                            │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                   cart clear ─────────────────► (back to empty)        │
//! │                                                                         │
//! │  Quantities above stock are clamped to stock, with a warning.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use mercado_core::cart::{CartView, CartViewLine};
use mercado_core::error::CoreResult;
use mercado_core::{Cart, CartAdjustment, Money, Product};

use crate::error::ApiError;
use crate::state::{DbState, SessionState};

/// Cart contents resolved against the catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub session: String,
    pub items: Vec<CartItemDto>,
    pub item_count: i64,
    pub total: String,
    pub total_cents: i64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: String,
    pub subtotal: String,
    pub available: i64,
}

impl From<CartViewLine> for CartItemDto {
    fn from(line: CartViewLine) -> Self {
        CartItemDto {
            unit_price: Money::from_cents(line.unit_price_cents).to_string(),
            subtotal: Money::from_cents(line.subtotal_cents).to_string(),
            product_id: line.product_id,
            name: line.name,
            quantity: line.quantity,
            available: line.available,
        }
    }
}

/// Builds the response, loading the products the cart refers to.
async fn respond(
    db: &DbState,
    sessions: &SessionState,
    cart: &Cart,
    mut warnings: Vec<String>,
) -> Result<CartResponse, ApiError> {
    let mut products: HashMap<String, Product> = HashMap::new();
    for (id, _) in cart.lines() {
        if let Some(p) = db.inner().products().get_by_id(id).await? {
            products.insert(id.to_string(), p);
        }
    }

    let view: CartView = cart.view(|id| products.get(id));
    for id in &view.missing {
        warnings.push(format!("Product {} is no longer available and will be skipped", id));
    }
    for line in &view.lines {
        if line.quantity > line.available {
            warnings.push(format!(
                "Only {} unit(s) of {} left; checkout may backorder",
                line.available, line.name
            ));
        }
    }

    Ok(CartResponse {
        session: sessions.key().to_string(),
        item_count: cart.total_quantity(),
        total: view.total().to_string(),
        total_cents: view.total_cents,
        items: view.lines.into_iter().map(CartItemDto::from).collect(),
        warnings,
    })
}

/// Applies `op` to the session cart and reports any clamp.
async fn mutate<F>(
    db: &DbState,
    sessions: &SessionState,
    product: &Product,
    mut op: F,
) -> Result<CartResponse, ApiError>
where
    F: FnMut(&mut Cart, &Product) -> CoreResult<CartAdjustment>,
{
    let mut outcome: Option<CoreResult<CartAdjustment>> = None;
    let session = sessions.modify(&mut |s| outcome = Some(op(&mut s.cart, product)))?;

    let adjustment = outcome.ok_or_else(|| ApiError::internal("Cart was not updated"))??;
    let warnings: Vec<String> = adjustment.warning(&product.name).into_iter().collect();
    if !warnings.is_empty() {
        warn!(product_id = %product.id, ?adjustment, "Cart quantity clamped to stock");
    }

    respond(db, sessions, &session.cart, warnings).await
}

pub async fn get_cart(db: &DbState, sessions: &SessionState) -> Result<CartResponse, ApiError> {
    debug!(session = %sessions.key(), "get_cart command");
    let session = sessions.load()?;
    respond(db, sessions, &session.cart, Vec::new()).await
}

/// Adds units of a product; the quantity grows if it is already in the cart.
pub async fn add_to_cart(
    db: &DbState,
    sessions: &SessionState,
    product_id: &str,
    quantity: i64,
) -> Result<CartResponse, ApiError> {
    let product = db.inner().products().require(product_id).await?;
    mutate(db, sessions, &product, |cart, p| cart.add(p, quantity)).await
}

/// Sets the quantity of a line; zero or less removes it.
pub async fn update_cart_item(
    db: &DbState,
    sessions: &SessionState,
    product_id: &str,
    quantity: i64,
) -> Result<CartResponse, ApiError> {
    let Some(product) = db.inner().products().get_by_id(product_id).await? else {
        // Vanished from the catalog: the only sensible update is removal.
        let session = sessions.modify(&mut |s| {
            s.cart.remove(product_id);
        })?;
        return respond(
            db,
            sessions,
            &session.cart,
            vec![format!("Product {} no longer exists; line removed", product_id)],
        )
        .await;
    };
    mutate(db, sessions, &product, |cart, p| cart.update(p, quantity)).await
}

/// Removes a line. Removing an absent line is a no-op.
pub async fn remove_from_cart(
    db: &DbState,
    sessions: &SessionState,
    product_id: &str,
) -> Result<CartResponse, ApiError> {
    let session = sessions.modify(&mut |s| {
        s.cart.remove(product_id);
    })?;
    respond(db, sessions, &session.cart, Vec::new()).await
}

pub async fn clear_cart(db: &DbState, sessions: &SessionState) -> Result<CartResponse, ApiError> {
    let session = sessions.modify(&mut |s| s.cart.clear())?;
    respond(db, sessions, &session.cart, Vec::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_add_accumulates_and_totals() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        let arroz = test_support::product(&db, "Arroz", 1000, 10).await;
        let feijao = test_support::product(&db, "Feijão", 550, 10).await;

        add_to_cart(&db, &sessions, &arroz, 2).await.unwrap();
        add_to_cart(&db, &sessions, &arroz, 1).await.unwrap();
        let cart = add_to_cart(&db, &sessions, &feijao, 2).await.unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.item_count, 5);
        assert_eq!(cart.total_cents, 3 * 1000 + 2 * 550);
        assert_eq!(cart.total, "R$ 41,00");
        assert!(cart.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_add_beyond_stock_is_clamped_with_warning() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        let id = test_support::product(&db, "Azeite", 3990, 2).await;

        let cart = add_to_cart(&db, &sessions, &id, 5).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.warnings.len(), 1);
        assert!(cart.warnings[0].contains("Azeite"));

        // Nothing left to add
        let err = add_to_cart(&db, &sessions, &id, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_invalid_quantity_and_unknown_product() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        let id = test_support::product(&db, "Sal", 299, 5).await;

        let err = add_to_cart(&db, &sessions, &id, 0).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = add_to_cart(&db, &sessions, "missing", 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(get_cart(&db, &sessions).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_update_remove_clear() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        let id = test_support::product(&db, "Café", 1890, 4).await;

        add_to_cart(&db, &sessions, &id, 1).await.unwrap();
        let cart = update_cart_item(&db, &sessions, &id, 9).await.unwrap();
        assert_eq!(cart.items[0].quantity, 4);
        assert_eq!(cart.warnings.len(), 1);

        let cart = update_cart_item(&db, &sessions, &id, 0).await.unwrap();
        assert!(cart.items.is_empty());

        // Absent line and empty cart are no-ops
        assert!(remove_from_cart(&db, &sessions, &id).await.unwrap().items.is_empty());
        assert_eq!(clear_cart(&db, &sessions).await.unwrap().item_count, 0);
    }

    #[tokio::test]
    async fn test_deleted_product_is_reported_not_totalled() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        let keep = test_support::product(&db, "Leite", 500, 5).await;
        let gone = test_support::product(&db, "Iogurte", 300, 5).await;

        add_to_cart(&db, &sessions, &keep, 1).await.unwrap();
        add_to_cart(&db, &sessions, &gone, 1).await.unwrap();
        db.inner().products().delete(&gone).await.unwrap();

        let cart = get_cart(&db, &sessions).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_cents, 500);
        assert_eq!(cart.warnings.len(), 1);

        let cart = update_cart_item(&db, &sessions, &gone, 3).await.unwrap();
        assert!(cart.warnings[0].contains("line removed"));
        assert_eq!(sessions.load().unwrap().cart.len(), 1);
    }

    #[tokio::test]
    async fn test_carts_are_per_session() {
        let db = test_support::db().await;
        let store = std::sync::Arc::new(mercado_core::MemorySessionStore::default());
        let a = SessionState::new(store.clone(), "a");
        let b = SessionState::new(store, "b");
        let id = test_support::product(&db, "Pão", 80, 50).await;

        add_to_cart(&db, &a, &id, 3).await.unwrap();
        assert!(get_cart(&db, &b).await.unwrap().items.is_empty());
        assert_eq!(get_cart(&db, &a).await.unwrap().item_count, 3);
    }
}
