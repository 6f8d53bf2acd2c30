//! # Order Commands
//!
//! Order history and detail, plus direct order creation from an explicit
//! item list for integrations that do not keep a session cart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use mercado_core::{Order, OrderItem, OrderWithItems};
use mercado_db::Receipt;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::state::{DbState, SessionState};

// =============================================================================
// DTOs
// =============================================================================

/// Order header as listed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: String,
    pub customer_id: String,
    pub payment_method: String,
    pub total: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummary {
    fn from(o: Order) -> Self {
        OrderSummary {
            payment_method: o.payment_method.to_string(),
            total: o.total().to_string(),
            total_cents: o.total_cents,
            id: o.id,
            customer_id: o.customer_id,
            created_at: o.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: String,
    pub line_total: String,
    pub backorder: bool,
}

impl From<OrderItem> for OrderItemDto {
    fn from(item: OrderItem) -> Self {
        OrderItemDto {
            unit_price: mercado_core::Money::from_cents(item.unit_price_cents).to_string(),
            line_total: item.line_total().to_string(),
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            backorder: item.backorder,
        }
    }
}

/// Order with its items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub items: Vec<OrderItemDto>,
}

impl From<OrderWithItems> for OrderDetail {
    fn from(o: OrderWithItems) -> Self {
        OrderDetail {
            summary: o.order.into(),
            items: o.items.into_iter().map(OrderItemDto::from).collect(),
        }
    }
}

/// A freshly placed order plus backorder warnings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub order_id: String,
    pub payment_method: String,
    pub total: String,
    pub total_cents: i64,
    pub items: Vec<OrderItemDto>,
    pub warnings: Vec<String>,
}

impl From<Receipt> for ReceiptResponse {
    fn from(receipt: Receipt) -> Self {
        let warnings = receipt.warnings();
        let OrderWithItems { order, items } = receipt.order;
        ReceiptResponse {
            order_id: order.id.clone(),
            payment_method: order.payment_method.to_string(),
            total: order.total().to_string(),
            total_cents: order.total_cents,
            items: items.into_iter().map(OrderItemDto::from).collect(),
            warnings,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Lists orders newest first.
///
/// `customer_id` filters to one customer; `mine` uses the session's login.
pub async fn list_orders(
    db: &DbState,
    sessions: &SessionState,
    customer_id: Option<&str>,
    mine: bool,
) -> Result<Vec<OrderSummary>, ApiError> {
    let repo = db.inner().orders();
    let orders = if mine {
        let id = sessions.require_customer()?;
        repo.list_for_customer(&id).await?
    } else if let Some(id) = customer_id {
        repo.list_for_customer(id).await?
    } else {
        repo.list().await?
    };
    debug!(count = orders.len(), "list_orders command");
    Ok(orders.into_iter().map(OrderSummary::from).collect())
}

pub async fn get_order(db: &DbState, id: &str) -> Result<OrderDetail, ApiError> {
    db.inner()
        .orders()
        .get_with_items(id)
        .await?
        .map(OrderDetail::from)
        .ok_or_else(|| ApiError::not_found("Order", id))
}

/// Creates an order for `customer_id` from `PRODUCT_ID[:QTY]` arguments.
pub async fn create_order(
    db: &DbState,
    config: &AppConfig,
    customer_id: &str,
    items: &[String],
    payment: Option<&str>,
) -> Result<ReceiptResponse, ApiError> {
    let items = items
        .iter()
        .map(|arg| parse_item_arg(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let receipt = db
        .checkout(config)
        .create_order(customer_id, &items, payment)
        .await?;
    Ok(receipt.into())
}

/// `abc` → (abc, 1); `abc:3` → (abc, 3).
fn parse_item_arg(arg: &str) -> Result<(String, i64), ApiError> {
    let (id, qty) = match arg.rsplit_once(':') {
        Some((id, qty)) => {
            let qty = qty
                .trim()
                .parse::<i64>()
                .map_err(|_| ApiError::validation(format!("Bad quantity in item '{}'", arg)))?;
            (id, qty)
        }
        None => (arg, 1),
    };
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation(format!("Missing product id in item '{}'", arg)));
    }
    Ok((id.to_string(), qty))
}
