//! # Checkout Rules
//!
//! The pure half of order finalization: what to do with one cart line given
//! the stock observed inside the transaction, and how the order total is
//! accumulated. The transactional half lives in `mercado-db::checkout`.
//!
//! ## Shortage Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  requested = 5, available = 2                                           │
//! │                                                                         │
//! │  STRICT                              BACKORDER                          │
//! │  ──────                              ─────────                          │
//! │  abort the whole checkout            sell 2, flag backorder = true      │
//! │  InsufficientStock {5, 2}            warn, drop the other 3             │
//! │  nothing written                     stock becomes 0                    │
//! │                                                                         │
//! │  requested = 5, available = 0                                           │
//! │  abort                               no item, warn, line dropped        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::validation::ValidationResult;
use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// Shortage Policy
// =============================================================================

/// How checkout treats a line whose request exceeds stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortagePolicy {
    /// Abort the checkout on the first short line.
    Strict,
    /// Sell what is available and flag the line.
    #[default]
    Backorder,
}

impl fmt::Display for ShortagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortagePolicy::Strict => write!(f, "strict"),
            ShortagePolicy::Backorder => write!(f, "backorder"),
        }
    }
}

impl FromStr for ShortagePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(ShortagePolicy::Strict),
            "backorder" | "partial" => Ok(ShortagePolicy::Backorder),
            _ => Err(ValidationError::NotAllowed {
                field: "shortage_policy".to_string(),
                allowed: vec!["strict".into(), "backorder".into()],
            }),
        }
    }
}

// =============================================================================
// Line Decision
// =============================================================================

/// Outcome for a single cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDecision {
    /// Non-positive request; ignore the line.
    Skip,
    /// Sell exactly what was requested.
    Fulfil { quantity: i64 },
    /// Sell `quantity` (possibly 0) of `requested`.
    Backorder { quantity: i64, requested: i64 },
    /// Abort: the strict policy met a short line.
    Reject { requested: i64, available: i64 },
}

impl LineDecision {
    /// Units that leave the shelf.
    pub fn sold(&self) -> i64 {
        match self {
            LineDecision::Fulfil { quantity } | LineDecision::Backorder { quantity, .. } => {
                *quantity
            }
            LineDecision::Skip | LineDecision::Reject { .. } => 0,
        }
    }
}

/// Decides what to sell for one line.
///
/// Negative stock is treated as zero so the result never drives stock
/// further below zero.
pub fn decide_line(policy: ShortagePolicy, requested: i64, available: i64) -> LineDecision {
    if requested <= 0 {
        return LineDecision::Skip;
    }
    let available = available.max(0);
    if available >= requested {
        return LineDecision::Fulfil {
            quantity: requested,
        };
    }
    match policy {
        ShortagePolicy::Strict => LineDecision::Reject {
            requested,
            available,
        },
        ShortagePolicy::Backorder => LineDecision::Backorder {
            quantity: available,
            requested,
        },
    }
}

// =============================================================================
// Order Draft
// =============================================================================

/// An order line computed inside the checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub backorder: bool,
}

impl DraftLine {
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// Accumulates lines and the running total.
///
/// `total` always equals the sum of `quantity × unit_price` over `lines`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    lines: Vec<DraftLine>,
    total: Money,
    backordered: Vec<String>,
}

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision for one product.
    ///
    /// Backorders are remembered by name even when nothing was sold; only
    /// lines with units sold become order items.
    ///
    /// Fails without changing the draft when the line or the running total
    /// would overflow.
    pub fn record(
        &mut self,
        product_id: &str,
        product_name: &str,
        unit_price_cents: i64,
        decision: LineDecision,
    ) -> ValidationResult<()> {
        let backorder = matches!(decision, LineDecision::Backorder { .. });
        let quantity = decision.sold();
        if quantity <= 0 {
            if backorder {
                self.backordered.push(product_name.to_string());
            }
            return Ok(());
        }

        let total = Money::from_cents(unit_price_cents)
            .checked_multiply_quantity(quantity)
            .and_then(|subtotal| self.total.checked_add(subtotal))
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "order total".to_string(),
                min: 0,
                max: i64::MAX,
            })?;

        if backorder {
            self.backordered.push(product_name.to_string());
        }
        self.total = total;
        self.lines.push(DraftLine {
            product_id: product_id.to_string(),
            product_name: product_name.to_string(),
            quantity,
            unit_price_cents,
            backorder,
        });
        Ok(())
    }

    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// Names of products sold short (including those sold zero).
    pub fn backordered(&self) -> &[String] {
        &self.backordered
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Payment Method Resolution
// =============================================================================

/// Picks the payment method for an order.
///
/// Order of preference: a valid submitted value, then the customer's stored
/// preference, then the configured default. An invalid submission falls
/// through rather than failing.
pub fn resolve_payment_method(
    submitted: Option<&str>,
    customer_preference: Option<PaymentMethod>,
    default: PaymentMethod,
) -> PaymentMethod {
    submitted
        .and_then(|s| s.parse::<PaymentMethod>().ok())
        .or(customer_preference)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_line_sufficient_stock() {
        for policy in [ShortagePolicy::Strict, ShortagePolicy::Backorder] {
            assert_eq!(
                decide_line(policy, 3, 5),
                LineDecision::Fulfil { quantity: 3 }
            );
            assert_eq!(
                decide_line(policy, 5, 5),
                LineDecision::Fulfil { quantity: 5 }
            );
        }
    }

    #[test]
    fn test_decide_line_shortage() {
        assert_eq!(
            decide_line(ShortagePolicy::Strict, 5, 2),
            LineDecision::Reject {
                requested: 5,
                available: 2
            }
        );
        assert_eq!(
            decide_line(ShortagePolicy::Backorder, 5, 2),
            LineDecision::Backorder {
                quantity: 2,
                requested: 5
            }
        );
        assert_eq!(
            decide_line(ShortagePolicy::Backorder, 5, 0).sold(),
            0
        );
        assert_eq!(decide_line(ShortagePolicy::Backorder, 5, -3).sold(), 0);
    }

    #[test]
    fn test_decide_line_skips_non_positive() {
        assert_eq!(decide_line(ShortagePolicy::Strict, 0, 10), LineDecision::Skip);
        assert_eq!(decide_line(ShortagePolicy::Backorder, -1, 10), LineDecision::Skip);
    }

    #[test]
    fn test_draft_total_matches_lines() {
        let mut draft = OrderDraft::new();
        draft
            .record("p1", "Arroz", 1000, decide_line(ShortagePolicy::Backorder, 3, 5))
            .unwrap();
        draft
            .record("p2", "Feijão", 500, decide_line(ShortagePolicy::Backorder, 5, 2))
            .unwrap();
        draft
            .record("p3", "Açúcar", 450, decide_line(ShortagePolicy::Backorder, 4, 0))
            .unwrap();

        assert_eq!(draft.lines().len(), 2);
        assert_eq!(draft.total().cents(), 3000 + 1000);
        let sum: Money = draft.lines().iter().map(DraftLine::subtotal).sum();
        assert_eq!(sum, draft.total());
        assert_eq!(draft.backordered(), ["Feijão".to_string(), "Açúcar".to_string()]);
        assert!(draft.lines()[1].backorder);
        assert!(!draft.lines()[0].backorder);
    }

    #[test]
    fn test_draft_rejects_overflowing_total() {
        let mut draft = OrderDraft::new();
        draft
            .record("p1", "Arroz", 1000, decide_line(ShortagePolicy::Strict, 1, 5))
            .unwrap();

        let huge = i64::MAX / 2;
        assert!(draft
            .record("p2", "Ouro", huge, decide_line(ShortagePolicy::Strict, 3, 10))
            .is_err());
        // One line fits on its own but not on top of the running total
        draft
            .record("p3", "Prata", huge, decide_line(ShortagePolicy::Strict, 1, 10))
            .unwrap();
        assert!(draft
            .record("p4", "Prata", huge, decide_line(ShortagePolicy::Strict, 2, 10))
            .is_err());

        assert_eq!(draft.lines().len(), 2);
        assert_eq!(draft.total().cents(), 1000 + huge);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("strict".parse::<ShortagePolicy>().unwrap(), ShortagePolicy::Strict);
        assert_eq!(
            "BACKORDER".parse::<ShortagePolicy>().unwrap(),
            ShortagePolicy::Backorder
        );
        assert!("lenient".parse::<ShortagePolicy>().is_err());
        assert_eq!(ShortagePolicy::default(), ShortagePolicy::Backorder);
    }

    #[test]
    fn test_resolve_payment_method_fallbacks() {
        use PaymentMethod::*;
        assert_eq!(resolve_payment_method(Some("boleto"), Some(CreditCard), Pix), Boleto);
        assert_eq!(resolve_payment_method(Some("cash"), Some(CreditCard), Pix), CreditCard);
        assert_eq!(resolve_payment_method(None, Some(DebitCard), Pix), DebitCard);
        assert_eq!(resolve_payment_method(Some(""), None, Pix), Pix);
        assert_eq!(resolve_payment_method(None, None, Boleto), Boleto);
    }
}
