//! # Commands Module
//!
//! Every command is an async function taking the state it needs and
//! returning a serializable response or an [`ApiError`](crate::error::ApiError).
//! `main` prints the response as JSON on stdout and errors on stderr.
//!
//! ```text
//! commands/
//! ├── catalog.rs   ◄─── product list/show/add/update/delete/zero-stock
//! ├── customer.rs  ◄─── register, login/logout, profile, admin CRUD
//! ├── cart.rs      ◄─── session cart
//! ├── checkout.rs  ◄─── place the order for the logged-in customer
//! └── order.rs     ◄─── order history, detail, direct creation
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod customer;
pub mod order;

use serde::Serialize;

/// Response for commands that only confirm something happened.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Ack {
            message: message.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use mercado_core::{CustomerProfile, MemorySessionStore, NewCustomer, NewProduct, PaymentMethod};
    use mercado_db::{Database, DbConfig};

    use crate::state::{DbState, SessionState};

    pub async fn db() -> DbState {
        DbState::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    pub fn sessions(key: &str) -> SessionState {
        SessionState::new(Arc::new(MemorySessionStore::default()), key)
    }

    pub async fn product(db: &DbState, name: &str, price_cents: i64, stock: i64) -> String {
        db.inner()
            .products()
            .create(&NewProduct {
                name: name.into(),
                price_cents,
                stock,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    /// A customer whose profile is complete enough to check out.
    pub fn shopper(cpf: &str) -> NewCustomer {
        NewCustomer {
            name: "Ana Souza".into(),
            cpf: cpf.into(),
            password: "senha123".into(),
            profile: CustomerProfile {
                mobile_phone: Some("11987654321".into()),
                cep: Some("01310-100".into()),
                street: Some("Avenida Paulista".into()),
                number: Some("1000".into()),
                city: Some("São Paulo".into()),
                state: Some("sp".into()),
                preferred_payment: Some(PaymentMethod::CreditCard),
                ..Default::default()
            },
        }
    }
}
