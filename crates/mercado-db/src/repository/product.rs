//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - Listing with a case-insensitive name filter
//! - CRUD with a deletion guard for products already sold
//! - Stock reads and compare-and-set decrements inside a checkout transaction
//!
//! ## Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Admin edit (stock given)   UPDATE ... stock = ?        (absolute)      │
//! │  Admin edit (no stock)      stock column untouched                      │
//! │  Checkout                   UPDATE ... stock = ?new                     │
//! │                              WHERE id = ? AND stock = ?observed         │
//! │                                                                         │
//! │  A checkout that lost a race updates 0 rows and aborts its transaction. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::like_pattern;
use crate::error::{DbError, DbResult};
use mercado_core::validation::{
    validate_new_product, validate_price_cents, validate_product_name, validate_search_query,
    validate_stock,
};
use mercado_core::{NewProduct, Product, ProductPatch, ValidationError};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price_cents, stock, image_url, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let results = repo.list("arroz").await?;
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products ordered by name.
    ///
    /// An empty query lists everything; otherwise only products whose name
    /// contains `query` (ASCII case-insensitive) are returned.
    pub async fn list(&self, query: &str) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, "Listing products");

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE (?1 = '' OR name LIKE ?2 ESCAPE '\\') \
             ORDER BY name COLLATE NOCASE, id"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&query)
            .bind(like_pattern(&query))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listing returned products");
        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Like [`get_by_id`](Self::get_by_id) but a missing product is an error.
    pub async fn require(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Creates a product and returns it.
    pub async fn create(&self, new: &NewProduct) -> DbResult<Product> {
        validate_new_product(new)?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: new.name.trim().to_string(),
            description: new.description.trim().to_string(),
            price_cents: new.price_cents,
            stock: new.stock,
            image_url: clean_image_url(new.image_url.clone()),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price_cents, stock, image_url,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(&product.image_url)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Applies a partial update and returns the product as stored.
    ///
    /// Fields left `None` in the patch are not written, so an edit that
    /// doesn't touch stock can't overwrite a concurrent checkout decrement.
    pub async fn update(&self, id: &str, patch: &ProductPatch) -> DbResult<Product> {
        if let Some(ref name) = patch.name {
            validate_product_name(name)?;
        }
        if let Some(ref description) = patch.description {
            if description.chars().count() > 2000 {
                return Err(ValidationError::TooLong {
                    field: "description".to_string(),
                    max: 2000,
                }
                .into());
            }
        }
        if let Some(price) = patch.price_cents {
            validate_price_cents(price)?;
        }
        if let Some(stock) = patch.stock {
            validate_stock(stock)?;
        }

        debug!(id = %id, "Updating product");

        let image_url = patch.image_url.clone().map(clean_image_url);
        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                price_cents = COALESCE(?4, price_cents),
                stock = COALESCE(?5, stock),
                image_url = CASE WHEN ?6 THEN ?7 ELSE image_url END,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(patch.description.as_deref().map(str::trim))
        .bind(patch.price_cents)
        .bind(patch.stock)
        .bind(image_url.is_some())
        .bind(image_url.flatten())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product updated");
        self.require(id).await
    }

    /// Deletes a product.
    ///
    /// ## Errors
    /// * `ReferencedByOrder` - an order item points at the product
    /// * `NotFound` - no such product
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE product_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if references > 0 {
            warn!(id = %id, references, "Refusing to delete product with orders");
            return Err(DbError::ReferencedByOrder(id.to_string()));
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                // An order committed between the count and the delete.
                DbError::ForeignKeyViolation { .. } => DbError::ReferencedByOrder(id.to_string()),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deleted");
        Ok(())
    }

    /// Sets stock to zero on every listed product. Unknown ids are ignored.
    ///
    /// ## Returns
    /// Number of products updated.
    pub async fn zero_stock(&self, ids: &[String]) -> DbResult<u64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for id in ids {
            let result = sqlx::query("UPDATE products SET stock = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;

        info!(requested = ids.len(), updated, "Stock zeroed");
        Ok(updated)
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Reads a product on the checkout transaction's connection.
pub(crate) async fn fetch_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Decrements stock only if it still holds the value read earlier in the
/// same transaction.
///
/// ## Errors
/// * `Conflict` - stock changed since `observed` was read
pub(crate) async fn decrement_stock_cas(
    conn: &mut SqliteConnection,
    id: &str,
    observed: i64,
    sold: i64,
) -> DbResult<()> {
    let remaining = (observed - sold).max(0);
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = ?3, updated_at = ?4
        WHERE id = ?1 AND stock = ?2
        "#,
    )
    .bind(id)
    .bind(observed)
    .bind(remaining)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        warn!(id = %id, observed, "Stock changed during checkout");
        return Err(DbError::conflict("Product", id));
    }

    debug!(id = %id, observed, remaining, "Stock decremented");
    Ok(())
}

fn clean_image_url(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn new_product(name: &str, price_cents: i64, stock: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price_cents,
            stock,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = db.products();

        let created = repo
            .create(&NewProduct {
                image_url: Some("  ".into()),
                ..new_product("  Feijão Carioca 1kg ", 899, 40)
            })
            .await
            .unwrap();
        assert_eq!(created.name, "Feijão Carioca 1kg");
        assert_eq!(created.image_url, None);

        let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.price_cents, 899);
        assert_eq!(fetched.stock, 40);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
        assert!(matches!(
            repo.require("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let db = setup().await;
        let repo = db.products();

        assert!(matches!(
            repo.create(&new_product("Arroz", 100, -1)).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            repo.create(&new_product("", 100, 1)).await,
            Err(DbError::Validation(_))
        ));
        // Prices whose line totals could overflow never reach the catalog
        assert!(matches!(
            repo.create(&new_product("Barra de ouro", i64::MAX / 2, 1)).await,
            Err(DbError::Validation(_))
        ));
        assert_eq!(repo.count().await.unwrap(), 0);

        let p = repo.create(&new_product("Arroz", 100, 1)).await.unwrap();
        assert!(matches!(
            repo.update(
                &p.id,
                &ProductPatch {
                    price_cents: Some(mercado_core::MAX_PRICE_CENTS + 1),
                    ..Default::default()
                }
            )
            .await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_name_case_insensitively() {
        let db = setup().await;
        let repo = db.products();
        repo.create(&new_product("Arroz Branco", 2599, 10)).await.unwrap();
        repo.create(&new_product("arroz integral", 2899, 5)).await.unwrap();
        repo.create(&new_product("Café 100%", 1890, 7)).await.unwrap();

        assert_eq!(repo.list("").await.unwrap().len(), 3);

        let arroz = repo.list("ARROZ").await.unwrap();
        assert_eq!(arroz.len(), 2);
        assert_eq!(arroz[0].name, "Arroz Branco");

        // Wildcards in the query are literal.
        let percent = repo.list("%").await.unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].name, "Café 100%");
        assert!(repo.list("_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_applies_only_given_fields() {
        let db = setup().await;
        let repo = db.products();
        let p = repo
            .create(&NewProduct {
                image_url: Some("img/leite.png".into()),
                ..new_product("Leite", 499, 12)
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                &p.id,
                &ProductPatch {
                    price_cents: Some(549),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 549);
        assert_eq!(updated.stock, 12);
        assert_eq!(updated.name, "Leite");
        assert_eq!(updated.image_url.as_deref(), Some("img/leite.png"));

        let cleared = repo
            .update(
                &p.id,
                &ProductPatch {
                    stock: Some(0),
                    image_url: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.stock, 0);
        assert_eq!(cleared.image_url, None);

        assert!(repo
            .update(
                &p.id,
                &ProductPatch {
                    stock: Some(-3),
                    ..Default::default()
                }
            )
            .await
            .is_err());
        assert!(matches!(
            repo.update("missing", &ProductPatch::default()).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_and_zero_stock() {
        let db = setup().await;
        let repo = db.products();
        let a = repo.create(&new_product("A", 100, 3)).await.unwrap();
        let b = repo.create(&new_product("B", 100, 4)).await.unwrap();

        let zeroed = repo
            .zero_stock(&[a.id.clone(), b.id.clone(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(zeroed, 2);
        assert_eq!(repo.require(&b.id).await.unwrap().stock, 0);

        repo.delete(&a.id).await.unwrap();
        assert!(repo.get_by_id(&a.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&a.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stock_check_constraint() {
        let db = setup().await;
        let p = db.products().create(&new_product("A", 100, 1)).await.unwrap();

        let err = sqlx::query("UPDATE products SET stock = -1 WHERE id = ?1")
            .bind(&p.id)
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(matches!(DbError::from(err), DbError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_decrement_stock_cas() {
        let db = setup().await;
        let p = db.products().create(&new_product("A", 100, 5)).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        decrement_stock_cas(&mut conn, &p.id, 5, 2).await.unwrap();
        let stale = decrement_stock_cas(&mut conn, &p.id, 5, 1).await;
        assert!(matches!(stale, Err(DbError::Conflict { .. })));

        let now = fetch_in_tx(&mut conn, &p.id).await.unwrap().unwrap();
        assert_eq!(now.stock, 3);
    }
}
