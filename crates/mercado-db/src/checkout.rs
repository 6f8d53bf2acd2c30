//! # Checkout Engine
//!
//! Turns a session cart into an order in one SQLite transaction.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  finalize(store, ctx, payment)                                          │
//! │       │                                                                 │
//! │       ├── ctx not authenticated ──────────────► NotAuthenticated        │
//! │       ├── load session (expired ⇒ logged out) ► NotAuthenticated        │
//! │       ▼                                                                 │
//! │  place_order(customer, lines, payment)                                  │
//! │       ├── no positive lines ──────────────────► EmptyCart               │
//! │       ├── customer missing ───────────────────► CustomerNotFound        │
//! │       ├── profile incomplete ─────────────────► IncompleteProfile       │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE           (writers queue here on busy_timeout)         │
//! │   for each line:                                                        │
//! │       SELECT product            (missing ⇒ skip)                        │
//! │       decide_line(policy, requested, stock)                             │
//! │          Reject ──────────────────────────────► InsufficientStock       │
//! │       UPDATE stock WHERE stock = observed                               │
//! │          0 rows ──────────────────────────────► PersistenceFailure      │
//! │   nothing sold ───────────────────────────────► OutOfStock / EmptyCart  │
//! │   INSERT order, INSERT items                                            │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  clear cart ──► Receipt { order, backordered }                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error before COMMIT drops the transaction, which rolls back every
//! write. Nothing is retried.
//!
//! Concurrent checkouts take the write lock one at a time, so a later one
//! reads the stock the earlier one left and applies the shortage policy to
//! it. The compare-and-set on stock still guards writes that bypass
//! [`Database::begin_write`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mercado_core::checkout::{decide_line, resolve_payment_method};
use mercado_core::validation::{validate_cart_size, validate_quantity};
use mercado_core::{
    LineDecision, Order, OrderDraft, OrderItem, OrderWithItems, PaymentMethod, SessionContext,
    SessionStore, ShortagePolicy,
};

use crate::error::{CheckoutError, CheckoutResult};
use crate::pool::Database;
use crate::repository::{order, product};

/// A committed order plus the products that were sold short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub order: OrderWithItems,
    pub backordered: Vec<String>,
}

impl Receipt {
    /// One user-facing line per backordered product.
    pub fn warnings(&self) -> Vec<String> {
        self.backordered
            .iter()
            .map(|name| format!("Backorder: {name} was not fully available"))
            .collect()
    }
}

/// Places orders against a database under a fixed shortage policy.
#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    db: Database,
    policy: ShortagePolicy,
    default_payment: PaymentMethod,
}

impl CheckoutEngine {
    pub fn new(db: Database, policy: ShortagePolicy, default_payment: PaymentMethod) -> Self {
        CheckoutEngine {
            db,
            policy,
            default_payment,
        }
    }

    pub fn policy(&self) -> ShortagePolicy {
        self.policy
    }

    /// Checks out the cart of the session described by `ctx`.
    ///
    /// The cart is cleared only after the order is committed. On any error
    /// the cart is left as it was.
    pub async fn finalize(
        &self,
        store: &dyn SessionStore,
        ctx: &SessionContext,
        payment: Option<&str>,
    ) -> CheckoutResult<Receipt> {
        let customer_id = ctx.customer_id().ok_or(CheckoutError::NotAuthenticated)?;

        let session = store.load(&ctx.session_key)?;
        if session.customer_id.as_deref() != Some(customer_id) {
            // Expired or logged out since the context was built.
            return Err(CheckoutError::NotAuthenticated);
        }

        let lines: Vec<(String, i64)> = session
            .cart
            .lines()
            .map(|(id, qty)| (id.to_string(), qty))
            .collect();

        let receipt = self.place_order(customer_id, &lines, payment).await?;

        if let Err(e) = store.modify(&ctx.session_key, &mut |s| s.cart.clear()) {
            // The order is committed; a stale cart is the lesser problem.
            warn!(error = %e, order_id = %receipt.order.order.id, "Could not clear cart");
        }

        Ok(receipt)
    }

    /// Creates an order from an explicit item list, bypassing the session.
    ///
    /// Quantities must be valid cart quantities; duplicate product ids are
    /// merged. The same transaction and policy as [`finalize`](Self::finalize)
    /// apply.
    pub async fn create_order(
        &self,
        customer_id: &str,
        items: &[(String, i64)],
        payment: Option<&str>,
    ) -> CheckoutResult<Receipt> {
        let mut merged: Vec<(String, i64)> = Vec::with_capacity(items.len());
        for (product_id, qty) in items {
            validate_quantity(*qty)?;
            match merged.iter_mut().find(|(id, _)| id == product_id) {
                Some((_, existing)) => *existing += qty,
                None => merged.push((product_id.clone(), *qty)),
            }
        }
        for (_, qty) in &merged {
            validate_quantity(*qty)?;
        }
        validate_cart_size(merged.len())?;

        self.place_order(customer_id, &merged, payment).await
    }

    async fn place_order(
        &self,
        customer_id: &str,
        lines: &[(String, i64)],
        payment: Option<&str>,
    ) -> CheckoutResult<Receipt> {
        if lines.iter().all(|(_, qty)| *qty <= 0) {
            return Err(CheckoutError::EmptyCart);
        }

        let customer = self
            .db
            .customers()
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| CheckoutError::CustomerNotFound(customer_id.to_string()))?;

        let missing = customer.profile.missing_for_checkout();
        if !missing.is_empty() {
            return Err(CheckoutError::IncompleteProfile {
                missing: missing.into_iter().map(String::from).collect(),
            });
        }

        let payment_method = resolve_payment_method(
            payment,
            customer.profile.preferred_payment,
            self.default_payment,
        );

        debug!(
            customer_id = %customer_id,
            lines = lines.len(),
            policy = %self.policy,
            "Starting checkout"
        );

        let mut tx = self.db.begin_write().await?;
        let mut draft = OrderDraft::new();

        for (product_id, requested) in lines {
            let Some(product) = product::fetch_in_tx(&mut *tx, product_id).await? else {
                debug!(product_id = %product_id, "Skipping vanished product");
                continue;
            };

            let decision = decide_line(self.policy, *requested, product.stock);
            match decision {
                LineDecision::Skip => continue,
                LineDecision::Reject {
                    requested,
                    available,
                } => {
                    info!(
                        product = %product.name,
                        requested,
                        available,
                        "Checkout rejected by strict policy"
                    );
                    return Err(CheckoutError::InsufficientStock {
                        product: product.name,
                        requested,
                        available,
                    });
                }
                LineDecision::Backorder {
                    quantity,
                    requested,
                } => {
                    warn!(
                        product = %product.name,
                        requested,
                        sold = quantity,
                        "Backordering line"
                    );
                }
                LineDecision::Fulfil { .. } => {}
            }

            let sold = decision.sold();
            if sold > 0 {
                product::decrement_stock_cas(&mut *tx, &product.id, product.stock, sold)
                    .await
                    .map_err(|e| {
                        error!(error = %e, product_id = %product.id, "Stock update failed");
                        CheckoutError::PersistenceFailure(e)
                    })?;
            }
            draft.record(&product.id, &product.name, product.price_cents, decision)?;
        }

        if draft.is_empty() {
            return Err(if draft.backordered().is_empty() {
                CheckoutError::EmptyCart
            } else {
                CheckoutError::OutOfStock {
                    products: draft.backordered().to_vec(),
                }
            });
        }

        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            payment_method,
            total_cents: draft.total().cents(),
            created_at: Utc::now(),
        };
        order::insert_order(&mut *tx, &order).await?;

        let mut items = Vec::with_capacity(draft.lines().len());
        for line in draft.lines() {
            let item = OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                backorder: line.backorder,
            };
            order::insert_item(&mut *tx, &item).await?;
            items.push(item);
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            customer_id = %customer_id,
            total = %draft.total(),
            items = items.len(),
            payment = %payment_method,
            "Order created"
        );

        Ok(Receipt {
            order: OrderWithItems { order, items },
            backordered: draft.backordered().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::DbConfig;
    use std::path::PathBuf;
    use mercado_core::{
        Cart, CustomerProfile, MemorySessionStore, NewCustomer, NewProduct, Product, Session,
    };

    // =========================================================================
    // Fixtures
    // =========================================================================

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn complete_profile() -> CustomerProfile {
        CustomerProfile {
            mobile_phone: Some("11987654321".into()),
            cep: Some("01310100".into()),
            street: Some("Av. Paulista".into()),
            number: Some("1000".into()),
            city: Some("São Paulo".into()),
            state: Some("SP".into()),
            ..Default::default()
        }
    }

    async fn customer(db: &Database, cpf: &str, profile: CustomerProfile) -> String {
        db.customers()
            .register(&NewCustomer {
                name: format!("Cliente {cpf}"),
                cpf: cpf.into(),
                password: "senha123".into(),
                profile,
            })
            .await
            .unwrap()
            .id
    }

    async fn product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        db.products()
            .create(&NewProduct {
                name: name.into(),
                price_cents,
                stock,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn stock_of(db: &Database, id: &str) -> i64 {
        db.products().require(id).await.unwrap().stock
    }

    /// Logs `customer_id` into session `key` with the given cart.
    fn session_with(store: &MemorySessionStore, key: &str, customer_id: &str, cart: Cart) -> SessionContext {
        store
            .modify(key, &mut |s: &mut Session| {
                s.login(customer_id);
                s.cart = cart.clone();
            })
            .unwrap()
            .context()
    }

    async fn order_count(db: &Database) -> i64 {
        db.orders().count().await.unwrap()
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[tokio::test]
    async fn test_full_stock_line() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p1 = product(&db, "P1", 1000, 5).await;
        let store = MemorySessionStore::default();
        let ctx = session_with(&store, "s1", &buyer, Cart::from_lines([(p1.id.as_str(), 3)]));

        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);
        let receipt = engine.finalize(&store, &ctx, None).await.unwrap();

        assert_eq!(stock_of(&db, &p1.id).await, 2);
        assert_eq!(receipt.order.order.total_cents, 3000);
        assert_eq!(receipt.order.items.len(), 1);
        assert_eq!(receipt.order.items[0].quantity, 3);
        assert!(!receipt.order.items[0].backorder);
        assert!(receipt.backordered.is_empty());
        assert!(store.load("s1").unwrap().cart.is_empty());

        let stored = db.orders().get_with_items(&receipt.order.order.id).await.unwrap().unwrap();
        assert_eq!(stored, receipt.order);
    }

    #[tokio::test]
    async fn test_backorder_sells_what_is_available() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p2 = product(&db, "P2", 500, 2).await;
        let store = MemorySessionStore::default();
        let ctx = session_with(&store, "s1", &buyer, Cart::from_lines([(p2.id.as_str(), 5)]));

        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);
        let receipt = engine.finalize(&store, &ctx, None).await.unwrap();

        let item = &receipt.order.items[0];
        assert_eq!(item.quantity, 2);
        assert!(item.backorder);
        assert_eq!(stock_of(&db, &p2.id).await, 0);
        assert_eq!(receipt.order.order.total_cents, 1000);
        assert_eq!(receipt.backordered, vec!["P2".to_string()]);
        assert!(receipt.warnings()[0].contains("P2"));
    }

    #[tokio::test]
    async fn test_strict_policy_aborts_without_writes() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let ok = product(&db, "Arroz", 1000, 10).await;
        let p2 = product(&db, "P2", 500, 2).await;
        let store = MemorySessionStore::default();
        let cart = Cart::from_lines([(ok.id.as_str(), 1), (p2.id.as_str(), 5)]);
        let ctx = session_with(&store, "s1", &buyer, cart.clone());

        let engine = db.checkout(ShortagePolicy::Strict, PaymentMethod::Pix);
        let err = engine.finalize(&store, &ctx, None).await.unwrap_err();

        match err {
            CheckoutError::InsufficientStock {
                product,
                requested,
                available,
            } => {
                assert_eq!(product, "P2");
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(order_count(&db).await, 0);
        assert_eq!(stock_of(&db, &p2.id).await, 2);
        // A line decremented before the abort is rolled back as well.
        assert_eq!(stock_of(&db, &ok.id).await, 10);
        assert_eq!(store.load("s1").unwrap().cart, cart);
    }

    #[tokio::test]
    async fn test_deleted_product_is_skipped() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let kept = product(&db, "Kept", 250, 4).await;
        let gone = product(&db, "Gone", 999, 4).await;
        let store = MemorySessionStore::default();
        let ctx = session_with(
            &store,
            "s1",
            &buyer,
            Cart::from_lines([(kept.id.as_str(), 2), (gone.id.as_str(), 1)]),
        );
        db.products().delete(&gone.id).await.unwrap();

        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);
        let receipt = engine.finalize(&store, &ctx, None).await.unwrap();

        assert_eq!(receipt.order.items.len(), 1);
        assert_eq!(receipt.order.items[0].product_id, kept.id);
        assert_eq!(receipt.order.order.total_cents, 500);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p = product(&db, "P", 100, 1).await;
        let store = MemorySessionStore::default();
        let ctx = session_with(&store, "s1", &buyer, Cart::new());

        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);
        assert!(matches!(
            engine.finalize(&store, &ctx, None).await,
            Err(CheckoutError::EmptyCart)
        ));

        // Only vanished products left: also empty.
        let ghost = Cart::from_lines([("no-such-product", 2)]);
        let ctx = session_with(&store, "s1", &buyer, ghost);
        assert!(matches!(
            engine.finalize(&store, &ctx, None).await,
            Err(CheckoutError::EmptyCart)
        ));

        assert_eq!(order_count(&db).await, 0);
        assert_eq!(stock_of(&db, &p.id).await, 1);
    }

    // =========================================================================
    // Preconditions
    // =========================================================================

    #[tokio::test]
    async fn test_requires_login_and_complete_profile() {
        let db = setup().await;
        let incomplete = customer(&db, "11144477735", CustomerProfile::default()).await;
        let p = product(&db, "P", 100, 5).await;
        let store = MemorySessionStore::default();
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);

        let anonymous = SessionContext::anonymous("s0");
        assert!(matches!(
            engine.finalize(&store, &anonymous, None).await,
            Err(CheckoutError::NotAuthenticated)
        ));

        let ctx = session_with(&store, "s1", &incomplete, Cart::from_lines([(p.id.as_str(), 1)]));
        match engine.finalize(&store, &ctx, None).await {
            Err(CheckoutError::IncompleteProfile { missing }) => {
                assert!(missing.contains(&"cep".to_string()));
                assert!(missing.contains(&"mobile_phone".to_string()));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(stock_of(&db, &p.id).await, 5);
        assert_eq!(store.load("s1").unwrap().cart.quantity_of(&p.id), 1);
    }

    #[tokio::test]
    async fn test_logged_out_session_cannot_check_out() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p = product(&db, "P", 100, 5).await;
        let store = MemorySessionStore::default();
        let ctx = session_with(&store, "s1", &buyer, Cart::from_lines([(p.id.as_str(), 1)]));

        store.modify("s1", &mut |s| s.logout()).unwrap();

        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);
        assert!(matches!(
            engine.finalize(&store, &ctx, None).await,
            Err(CheckoutError::NotAuthenticated)
        ));
        assert_eq!(stock_of(&db, &p.id).await, 5);
    }

    #[tokio::test]
    async fn test_all_lines_out_of_stock() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p = product(&db, "Feijão", 899, 0).await;
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);

        match engine.create_order(&buyer, &[(p.id.clone(), 3)], None).await {
            Err(CheckoutError::OutOfStock { products }) => assert_eq!(products, vec!["Feijão"]),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(order_count(&db).await, 0);
    }

    // =========================================================================
    // Payment & Direct Orders
    // =========================================================================

    #[tokio::test]
    async fn test_payment_method_fallback() {
        let db = setup().await;
        let plain = customer(&db, "52998224725", complete_profile()).await;
        let prefers_card = customer(
            &db,
            "11144477735",
            CustomerProfile {
                preferred_payment: Some(PaymentMethod::CreditCard),
                ..complete_profile()
            },
        )
        .await;
        let p = product(&db, "P", 100, 50).await;
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Boleto);
        let line = [(p.id.clone(), 1)];

        let method = |r: Receipt| r.order.order.payment_method;
        assert_eq!(
            method(engine.create_order(&plain, &line, Some("pix")).await.unwrap()),
            PaymentMethod::Pix
        );
        assert_eq!(
            method(engine.create_order(&plain, &line, Some("cheque")).await.unwrap()),
            PaymentMethod::Boleto
        );
        assert_eq!(
            method(engine.create_order(&prefers_card, &line, None).await.unwrap()),
            PaymentMethod::CreditCard
        );
        assert_eq!(
            method(engine.create_order(&prefers_card, &line, Some("debito")).await.unwrap()),
            PaymentMethod::DebitCard
        );
    }

    #[tokio::test]
    async fn test_create_order_validates_and_merges() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p = product(&db, "P", 150, 10).await;
        let engine = db.checkout(ShortagePolicy::Strict, PaymentMethod::Pix);

        assert!(matches!(
            engine.create_order(&buyer, &[(p.id.clone(), 0)], None).await,
            Err(CheckoutError::Validation(_))
        ));
        assert!(matches!(
            engine.create_order("ghost", &[(p.id.clone(), 1)], None).await,
            Err(CheckoutError::CustomerNotFound(_))
        ));

        let receipt = engine
            .create_order(&buyer, &[(p.id.clone(), 2), (p.id.clone(), 3)], None)
            .await
            .unwrap();
        assert_eq!(receipt.order.items.len(), 1);
        assert_eq!(receipt.order.items[0].quantity, 5);
        assert_eq!(receipt.order.order.total_cents, 750);
        assert_eq!(stock_of(&db, &p.id).await, 5);
    }

    #[tokio::test]
    async fn test_merged_quantity_above_line_limit_is_rejected() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p = product(&db, "Água 500ml", 199, 5000).await;
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);

        // Each line is within the limit; together they are not.
        let lines = [(p.id.clone(), 999), (p.id.clone(), 999)];
        assert!(matches!(
            engine.create_order(&buyer, &lines, None).await,
            Err(CheckoutError::Validation(_))
        ));
        assert_eq!(order_count(&db).await, 0);
        assert_eq!(stock_of(&db, &p.id).await, 5000);
    }

    #[tokio::test]
    async fn test_price_snapshot_survives_catalog_edit() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let p = product(&db, "Café", 1890, 10).await;
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);
        let receipt = engine.create_order(&buyer, &[(p.id.clone(), 2)], None).await.unwrap();

        db.products()
            .update(
                &p.id,
                &mercado_core::ProductPatch {
                    name: Some("Café Premium".into()),
                    price_cents: Some(2590),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = db.orders().get_with_items(&receipt.order.order.id).await.unwrap().unwrap();
        assert_eq!(stored.items[0].product_name, "Café");
        assert_eq!(stored.items[0].unit_price_cents, 1890);
        assert_eq!(stored.items_total().cents(), stored.order.total_cents);
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// A file database with the default pool size, so checkouts run on
    /// separate connections and their transactions really overlap.
    async fn file_setup() -> (Database, PathBuf) {
        let path = std::env::temp_dir().join(format!("mercado-checkout-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(path.clone())).await.unwrap();
        (db, path)
    }

    async fn remove_file_db(db: Database, path: PathBuf) {
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            std::fs::remove_file(file).ok();
        }
    }

    /// Runs one `create_order` per line on its own task.
    async fn run_parallel(
        engine: &CheckoutEngine,
        buyer: &str,
        lines: Vec<(String, i64)>,
    ) -> Vec<CheckoutResult<Receipt>> {
        let handles: Vec<_> = lines
            .into_iter()
            .map(|line| {
                let engine = engine.clone();
                let buyer = buyer.to_string();
                tokio::spawn(async move { engine.create_order(&buyer, &[line], None).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_checkouts_with_plenty_of_stock_all_succeed() {
        let (db, path) = file_setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let arroz = product(&db, "Arroz", 2599, 1000).await;
        let feijao = product(&db, "Feijão", 899, 1000).await;
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);

        let lines = (0..8)
            .map(|i| {
                let id = if i % 2 == 0 { &arroz.id } else { &feijao.id };
                (id.clone(), 1)
            })
            .collect();
        for result in run_parallel(&engine, &buyer, lines).await {
            let receipt = result.unwrap();
            assert!(receipt.backordered.is_empty());
        }

        assert_eq!(stock_of(&db, &arroz.id).await, 996);
        assert_eq!(stock_of(&db, &feijao.id).await, 996);
        assert_eq!(order_count(&db).await, 8);
        remove_file_db(db, path).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_strict_checkouts_for_last_unit() {
        let (db, path) = file_setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let last = product(&db, "Última unidade", 4990, 1).await;
        let engine = db.checkout(ShortagePolicy::Strict, PaymentMethod::Pix);

        let lines = (0..4).map(|_| (last.id.clone(), 1)).collect();
        let results = run_parallel(&engine, &buyer, lines).await;

        let mut sold = 0;
        for result in results {
            match result {
                Ok(_) => sold += 1,
                Err(CheckoutError::InsufficientStock {
                    requested,
                    available,
                    ..
                }) => {
                    assert_eq!(requested, 1);
                    assert_eq!(available, 0);
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(sold, 1);
        assert_eq!(stock_of(&db, &last.id).await, 0);
        assert_eq!(order_count(&db).await, 1);
        remove_file_db(db, path).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_backorders_split_remaining_stock() {
        let (db, path) = file_setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let cafe = product(&db, "Café", 1890, 3).await;
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);

        let lines = (0..4).map(|_| (cafe.id.clone(), 2)).collect();
        let results = run_parallel(&engine, &buyer, lines).await;

        let mut units = 0;
        for result in results {
            match result {
                Ok(receipt) => {
                    let item = &receipt.order.items[0];
                    units += item.quantity;
                    assert_eq!(receipt.order.order.total_cents, item.quantity * 1890);
                }
                Err(CheckoutError::OutOfStock { products }) => {
                    assert_eq!(products, vec!["Café"]);
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(units, 3);
        assert_eq!(stock_of(&db, &cafe.id).await, 0);
        remove_file_db(db, path).await;
    }

    #[tokio::test]
    async fn test_stock_never_negative_and_totals_consistent() {
        let db = setup().await;
        let buyer = customer(&db, "52998224725", complete_profile()).await;
        let a = product(&db, "A", 333, 7).await;
        let b = product(&db, "B", 1250, 3).await;
        let engine = db.checkout(ShortagePolicy::Backorder, PaymentMethod::Pix);

        for round in 1..=6 {
            let lines = [(a.id.clone(), round), (b.id.clone(), 2)];
            match engine.create_order(&buyer, &lines, None).await {
                Ok(receipt) => {
                    assert_eq!(
                        receipt.order.items_total().cents(),
                        receipt.order.order.total_cents
                    );
                }
                Err(CheckoutError::OutOfStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
            assert!(stock_of(&db, &a.id).await >= 0);
            assert!(stock_of(&db, &b.id).await >= 0);
        }

        assert_eq!(stock_of(&db, &a.id).await, 0);
        assert_eq!(stock_of(&db, &b.id).await, 0);

        let sold: i64 = {
            let mut total = 0;
            for o in db.orders().list().await.unwrap() {
                let detail = db.orders().get_with_items(&o.id).await.unwrap().unwrap();
                assert_eq!(detail.items_total().cents(), detail.order.total_cents);
                total += detail.items.iter().map(|i| i.quantity).sum::<i64>();
            }
            total
        };
        assert_eq!(sold, 7 + 3);
    }

    #[tokio::test]
    async fn test_conflicting_decrement_is_persistence_failure() {
        let db = setup().await;
        let p = product(&db, "P", 100, 3).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = product::decrement_stock_cas(&mut conn, &p.id, 2, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
        let mapped = CheckoutError::from(err);
        assert!(matches!(mapped, CheckoutError::PersistenceFailure(_)));
    }
}
