//! # Cart
//!
//! The per-session shopping cart: a mapping from product id to requested
//! quantity. Prices are *not* frozen here; checkout reads the current catalog.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation            Effect                                            │
//! │  ─────────            ──────                                            │
//! │  add(p, n)            lines[p] += n, clamped to p.stock                 │
//! │                       refused when lines[p] already >= p.stock          │
//! │  update(p, n)         n <= 0        → remove line                       │
//! │                       n >  stock    → lines[p] = stock  (warning)       │
//! │                       otherwise     → lines[p] = n                      │
//! │  remove(p)            delete line; no-op when absent                    │
//! │  clear()              delete every line; no-op when empty               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock observed here is advisory. The checkout transaction re-reads stock
//! and applies the shortage policy; the cart never reserves units.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Product;
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// What a cart mutation actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartAdjustment {
    /// The line now holds exactly the requested quantity.
    Applied { quantity: i64 },
    /// Fewer units than requested were kept because stock is short.
    /// `quantity == 0` means the line was dropped.
    Clamped {
        requested: i64,
        quantity: i64,
        available: i64,
    },
    /// The line was removed.
    Removed,
    /// Nothing changed (removing an absent line).
    Unchanged,
}

impl CartAdjustment {
    /// Operator-facing warning for clamped lines.
    pub fn warning(&self, product_name: &str) -> Option<String> {
        match self {
            CartAdjustment::Clamped {
                requested,
                available,
                ..
            } => Some(format!(
                "Only {available} unit(s) of {product_name} available; requested {requested}"
            )),
            _ => None,
        }
    }
}

/// The session cart.
///
/// ## Invariants
/// - Every stored quantity is > 0
/// - At most MAX_CART_ITEMS distinct products
/// - No line above MAX_ITEM_QUANTITY
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: BTreeMap<String, i64>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from explicit lines, merging duplicates.
    ///
    /// Lines with a non-positive quantity are dropped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut cart = Cart::new();
        for (id, qty) in lines {
            if qty > 0 {
                *cart.lines.entry(id.into()).or_insert(0) += qty;
            }
        }
        cart
    }

    /// Adds `qty` units of `product`.
    ///
    /// ## Errors
    /// - `Validation` when `qty` is not in 1..=999
    /// - `OutOfStock` when the line already holds every unit on hand
    /// - `CartTooLarge` when a new line would exceed MAX_CART_ITEMS
    /// - `QuantityTooLarge` when the line would exceed MAX_ITEM_QUANTITY
    pub fn add(&mut self, product: &Product, qty: i64) -> CoreResult<CartAdjustment> {
        validate_quantity(qty)?;

        let current = self.quantity_of(&product.id);
        if current >= product.stock {
            return Err(CoreError::OutOfStock {
                product: product.name.clone(),
            });
        }
        if current == 0 && self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        let requested = current + qty;
        if requested > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested,
                max: MAX_ITEM_QUANTITY,
            });
        }

        if requested > product.stock {
            self.lines.insert(product.id.clone(), product.stock);
            return Ok(CartAdjustment::Clamped {
                requested,
                quantity: product.stock,
                available: product.stock,
            });
        }

        self.lines.insert(product.id.clone(), requested);
        Ok(CartAdjustment::Applied {
            quantity: requested,
        })
    }

    /// Sets the quantity of `product`, inserting the line if absent.
    pub fn update(&mut self, product: &Product, qty: i64) -> CoreResult<CartAdjustment> {
        if qty <= 0 {
            return Ok(match self.lines.remove(&product.id) {
                Some(_) => CartAdjustment::Removed,
                None => CartAdjustment::Unchanged,
            });
        }
        if qty > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: qty,
                max: MAX_ITEM_QUANTITY,
            });
        }
        if !self.lines.contains_key(&product.id) && self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        let available = product.stock.max(0);
        if qty > available {
            if available == 0 {
                self.lines.remove(&product.id);
            } else {
                self.lines.insert(product.id.clone(), available);
            }
            return Ok(CartAdjustment::Clamped {
                requested: qty,
                quantity: available,
                available,
            });
        }

        self.lines.insert(product.id.clone(), qty);
        Ok(CartAdjustment::Applied { quantity: qty })
    }

    /// Removes a line. Removing an absent line is a no-op.
    pub fn remove(&mut self, product_id: &str) -> CartAdjustment {
        match self.lines.remove(product_id) {
            Some(_) => CartAdjustment::Removed,
            None => CartAdjustment::Unchanged,
        }
    }

    /// Clears all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Requested quantity for a product, 0 when absent.
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.lines.get(product_id).copied().unwrap_or(0)
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.values().sum()
    }

    /// Lines in product-id order.
    pub fn lines(&self) -> impl Iterator<Item = (&str, i64)> {
        self.lines.iter().map(|(id, qty)| (id.as_str(), *qty))
    }

    /// Resolves the cart against current catalog data.
    ///
    /// Products that no longer exist are reported in `missing` and contribute
    /// nothing to the total.
    pub fn view<'a, F>(&self, mut lookup: F) -> CartView
    where
        F: FnMut(&str) -> Option<&'a Product>,
    {
        let mut view = CartView::default();
        for (id, qty) in self.lines() {
            match lookup(id) {
                Some(product) => {
                    let subtotal = product.price().multiply_quantity(qty);
                    view.total_cents += subtotal.cents();
                    view.lines.push(CartViewLine {
                        product_id: id.to_string(),
                        name: product.name.clone(),
                        unit_price_cents: product.price_cents,
                        quantity: qty,
                        available: product.stock,
                        subtotal_cents: subtotal.cents(),
                    });
                }
                None => view.missing.push(id.to_string()),
            }
        }
        view
    }
}

/// Cart resolved against the catalog, for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartViewLine>,
    pub total_cents: i64,
    /// Ids of products that vanished from the catalog.
    pub missing: Vec<String>,
}

impl CartView {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartViewLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Current stock; may be below `quantity` if others bought meanwhile.
    pub available: i64,
    pub subtotal_cents: i64,
}
