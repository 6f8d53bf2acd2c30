//! # Domain Types
//!
//! Core domain types used throughout Mercado.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │   OrderItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  order_id (FK)  │       │
//! │  │  name           │◄──┤  customer_id    │◄──┤  product_id     │       │
//! │  │  price_cents    │   │  payment_method │   │  quantity > 0   │       │
//! │  │  stock >= 0     │   │  total_cents    │   │  unit_price     │       │
//! │  └─────────────────┘   └────────┬────────┘   │  backorder      │       │
//! │                                 │            └─────────────────┘       │
//! │                        ┌────────┴────────┐                             │
//! │                        │    Customer     │                             │
//! │                        │  cpf (unique)   │                             │
//! │                        │  profile        │                             │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Order items freeze the product name and unit price at the moment of sale,
//! so later catalog edits never rewrite history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Free-form description, may be empty.
    pub description: String,

    /// Unit price in centavos.
    pub price_cents: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    /// Optional image reference (URL or relative path).
    pub image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units are on hand.
    pub fn has_stock_for(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

/// Fields accepted when creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
    pub image_url: Option<String>,
}

/// Partial update of a product. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub image_url: Option<Option<String>>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How an order was paid. A closed set; the tag is stored on the order.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    DebitCard,
    Boleto,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Pix,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Boleto,
    ];

    /// Wire/storage tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Boleto => "boleto",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Pix
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pix" => Ok(PaymentMethod::Pix),
            "credit_card" | "credito" | "cartao_credito" => Ok(PaymentMethod::CreditCard),
            "debit_card" | "debito" | "cartao_debito" => Ok(PaymentMethod::DebitCard),
            "boleto" => Ok(PaymentMethod::Boleto),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Contact Preference
// =============================================================================

/// Preferred channel for order notifications.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPreference {
    Email,
    #[default]
    Whatsapp,
    Sms,
}

impl FromStr for ContactPreference {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(ContactPreference::Email),
            "whatsapp" => Ok(ContactPreference::Whatsapp),
            "sms" => Ok(ContactPreference::Sms),
            _ => Err(ValidationError::NotAllowed {
                field: "contact_preference".to_string(),
                allowed: vec!["email".into(), "whatsapp".into(), "sms".into()],
            }),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer. The password hash is never part of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// 11 digits, validated, immutable after registration.
    pub cpf: String,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub profile: CustomerProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional personal data, required in part before checkout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CustomerProfile {
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub mobile_phone: Option<String>,
    /// 8-digit postal code.
    pub cep: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    /// Two-letter state code (UF).
    pub state: Option<String>,
    pub contact_preference: ContactPreference,
    pub preferred_payment: Option<PaymentMethod>,
}

impl CustomerProfile {
    /// Names of the fields checkout needs that are still blank.
    pub fn missing_for_checkout(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        [
            ("mobile_phone", &self.mobile_phone),
            ("cep", &self.cep),
            ("street", &self.street),
            ("number", &self.number),
            ("city", &self.city),
            ("state", &self.state),
        ]
        .into_iter()
        .filter(|(_, v)| blank(v))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_for_checkout().is_empty()
    }
}

/// Registration input. `cpf` may carry punctuation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub cpf: String,
    pub password: String,
    pub profile: CustomerProfile,
}

/// Profile edit. There is deliberately no `cpf` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub profile: Option<CustomerProfile>,
}

// =============================================================================
// Order
// =============================================================================

/// A placed order. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    /// Σ quantity × unit_price_cents over the items.
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of an order with frozen name and price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Units sold. Always > 0.
    pub quantity: i64,
    /// Unit price in centavos at time of sale (frozen).
    pub unit_price_cents: i64,
    /// True when fewer units were sold than requested.
    pub backorder: bool,
}

impl OrderItem {
    /// Returns quantity × unit price.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    /// Recomputes the total from the items.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}
