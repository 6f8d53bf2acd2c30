//! # Catalog Commands
//!
//! Product search and back-office product maintenance.
//!
//! Prices are typed the way an operator writes them (`7,99`, `R$ 1.234,56`)
//! and stored as integer centavos.

use serde::Serialize;
use tracing::debug;

use mercado_core::{Money, NewProduct, Product, ProductPatch};

use crate::commands::Ack;
use crate::error::ApiError;
use crate::state::DbState;

/// Product as shown to the operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub price_cents: i64,
    pub stock: i64,
    pub in_stock: bool,
    pub image_url: Option<String>,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        ProductDto {
            price: p.price().to_string(),
            in_stock: p.stock > 0,
            id: p.id,
            name: p.name,
            description: p.description,
            price_cents: p.price_cents,
            stock: p.stock,
            image_url: p.image_url,
        }
    }
}

/// Fields for a new product.
#[derive(Debug, Clone, Default)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub stock: i64,
    pub image_url: Option<String>,
}

/// Fields to change; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
    pub clear_image: bool,
}

impl ProductChanges {
    fn into_patch(self) -> Result<ProductPatch, ApiError> {
        let price_cents = self
            .price
            .map(|p| p.parse::<Money>().map(|m| m.cents()))
            .transpose()?;

        let image_url = if self.clear_image {
            Some(None)
        } else {
            self.image_url.map(Some)
        };

        Ok(ProductPatch {
            name: self.name,
            description: self.description,
            price_cents,
            stock: self.stock,
            image_url,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZeroStockResponse {
    pub requested: usize,
    pub updated: u64,
}

/// Lists products whose name contains `query` (case-insensitive).
pub async fn list_products(db: &DbState, query: &str) -> Result<Vec<ProductDto>, ApiError> {
    debug!(query = %query, "list_products command");
    let products = db.inner().products().list(query).await?;
    Ok(products.into_iter().map(ProductDto::from).collect())
}

pub async fn get_product(db: &DbState, id: &str) -> Result<ProductDto, ApiError> {
    debug!(id = %id, "get_product command");
    db.inner()
        .products()
        .get_by_id(id)
        .await?
        .map(ProductDto::from)
        .ok_or_else(|| ApiError::not_found("Product", id))
}

pub async fn create_product(db: &DbState, input: ProductInput) -> Result<ProductDto, ApiError> {
    let price: Money = input.price.parse()?;
    let product = db
        .inner()
        .products()
        .create(&NewProduct {
            name: input.name,
            description: input.description.unwrap_or_default(),
            price_cents: price.cents(),
            stock: input.stock,
            image_url: input.image_url,
        })
        .await?;
    Ok(product.into())
}

pub async fn update_product(
    db: &DbState,
    id: &str,
    changes: ProductChanges,
) -> Result<ProductDto, ApiError> {
    let patch = changes.into_patch()?;
    let product = db.inner().products().update(id, &patch).await?;
    Ok(product.into())
}

/// Deletes a product unless an order references it.
pub async fn delete_product(db: &DbState, id: &str) -> Result<Ack, ApiError> {
    db.inner().products().delete(id).await?;
    Ok(Ack::new(format!("Product {} deleted", id)))
}

/// Marks the selected products as sold out.
pub async fn zero_stock(db: &DbState, ids: &[String]) -> Result<ZeroStockResponse, ApiError> {
    if ids.is_empty() {
        return Err(ApiError::validation("At least one product id is required"));
    }
    let updated = db.inner().products().zero_stock(ids).await?;
    Ok(ZeroStockResponse {
        requested: ids.len(),
        updated,
    })
}
