//! # Customer Repository
//!
//! Registration, login and profile maintenance.
//!
//! ## Credentials
//! ```text
//! register("529.982.247-25", "segredo")
//!      │
//!      ├── cpf::parse → "52998224725"   (check digits, no punctuation)
//!      ├── argon2 hash → "$argon2id$v=19$m=19456,t=2,p=1$..."
//!      ▼
//! customers.password_hash (never leaves this module)
//!
//! authenticate(cpf, password)
//!      ├── unknown cpf      ─┐
//!      ├── wrong password   ─┼──► InvalidCredentials (same error for both)
//!      └── ok ──► Customer
//! ```
//!
//! CPF is set once. `update` has no path to it and a trigger rejects any
//! other attempt.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::like_pattern;
use crate::error::{DbError, DbResult};
use mercado_core::validation::{
    normalize_profile, validate_customer_name, validate_password, validate_search_query,
};
use mercado_core::{cpf, Customer, CustomerPatch, NewCustomer};

const CUSTOMER_COLUMNS: &str = "id, name, cpf, email, birth_date, mobile_phone, cep, street, \
     number, complement, district, city, state, contact_preference, preferred_payment, \
     created_at, updated_at";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Registers a customer.
    ///
    /// ## Errors
    /// * `Validation` - bad name, CPF, password or profile field
    /// * `UniqueViolation` - CPF already registered
    pub async fn register(&self, new: &NewCustomer) -> DbResult<Customer> {
        validate_customer_name(&new.name)?;
        let cpf = cpf::parse(&new.cpf)?;
        validate_password(&new.password)?;

        let now = Utc::now();
        let profile = normalize_profile(new.profile.clone(), now.date_naive())?;

        if self.get_by_cpf(&cpf).await?.is_some() {
            warn!(cpf = %cpf::format(&cpf), "CPF already registered");
            return Err(DbError::duplicate("cpf", cpf::format(&cpf)));
        }

        let password_hash = hash_password(&new.password)?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            cpf,
            profile,
            created_at: now,
            updated_at: now,
        };
        let p = &customer.profile;

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, cpf, password_hash, email, birth_date, mobile_phone,
                cep, street, number, complement, district, city, state,
                contact_preference, preferred_payment, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.cpf)
        .bind(&password_hash)
        .bind(&p.email)
        .bind(p.birth_date)
        .bind(&p.mobile_phone)
        .bind(&p.cep)
        .bind(&p.street)
        .bind(&p.number)
        .bind(&p.complement)
        .bind(&p.district)
        .bind(&p.city)
        .bind(&p.state)
        .bind(p.contact_preference)
        .bind(p.preferred_payment)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            // Lost a race with another registration of the same CPF.
            DbError::UniqueViolation { .. } => DbError::duplicate("cpf", cpf::format(&customer.cpf)),
            other => other,
        })?;

        info!(id = %customer.id, "Customer registered");
        Ok(customer)
    }

    /// Verifies a CPF/password pair.
    ///
    /// ## Errors
    /// * `InvalidCredentials` - unknown CPF or wrong password
    pub async fn authenticate(&self, cpf_input: &str, password: &str) -> DbResult<Customer> {
        let cpf = cpf::normalize(cpf_input);

        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, password_hash FROM customers WHERE cpf = ?1")
                .bind(&cpf)
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, password_hash)) = row else {
            debug!("Login with unknown CPF");
            return Err(DbError::InvalidCredentials);
        };

        if !verify_password(password, &password_hash) {
            warn!(id = %id, "Login with wrong password");
            return Err(DbError::InvalidCredentials);
        }

        self.get_by_id(&id)
            .await?
            .ok_or(DbError::InvalidCredentials)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Gets a customer by CPF (any punctuation).
    pub async fn get_by_cpf(&self, cpf_input: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE cpf = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(cpf::normalize(cpf_input))
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn require(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Lists customers by name. A non-empty `query` matches a name substring
    /// or, using only its digits, a CPF substring.
    pub async fn list(&self, query: &str) -> DbResult<Vec<Customer>> {
        let query = validate_search_query(query)?;
        let digits = cpf::normalize(&query);

        debug!(query = %query, "Listing customers");

        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE ?1 = '' \
                OR name LIKE ?2 ESCAPE '\\' \
                OR (?3 <> '' AND cpf LIKE '%' || ?3 || '%') \
             ORDER BY name COLLATE NOCASE, id"
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(&query)
            .bind(like_pattern(&query))
            .bind(&digits)
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    /// Updates name and/or profile. The CPF cannot be changed.
    pub async fn update(&self, id: &str, patch: &CustomerPatch) -> DbResult<Customer> {
        let mut customer = self.require(id).await?;

        if let Some(ref name) = patch.name {
            validate_customer_name(name)?;
            customer.name = name.trim().to_string();
        }
        let now = Utc::now();
        if let Some(ref profile) = patch.profile {
            customer.profile = normalize_profile(profile.clone(), now.date_naive())?;
        }
        customer.updated_at = now;
        let p = &customer.profile;

        sqlx::query(
            r#"
            UPDATE customers
            SET
                name = ?2, email = ?3, birth_date = ?4, mobile_phone = ?5,
                cep = ?6, street = ?7, number = ?8, complement = ?9,
                district = ?10, city = ?11, state = ?12,
                contact_preference = ?13, preferred_payment = ?14,
                updated_at = ?15
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&customer.name)
        .bind(&p.email)
        .bind(p.birth_date)
        .bind(&p.mobile_phone)
        .bind(&p.cep)
        .bind(&p.street)
        .bind(&p.number)
        .bind(&p.complement)
        .bind(&p.district)
        .bind(&p.city)
        .bind(&p.state)
        .bind(p.contact_preference)
        .bind(p.preferred_payment)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %id, "Customer updated");
        Ok(customer)
    }

    /// Replaces the password after checking the current one.
    pub async fn change_password(&self, id: &str, current: &str, new: &str) -> DbResult<()> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM customers WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let stored = stored.ok_or_else(|| DbError::not_found("Customer", id))?;

        if !verify_password(current, &stored) {
            return Err(DbError::InvalidCredentials);
        }
        validate_password(new)?;

        sqlx::query("UPDATE customers SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(hash_password(new)?)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        info!(id = %id, "Password changed");
        Ok(())
    }

    /// Deletes a customer.
    ///
    /// ## Errors
    /// * `HasOrders` - the customer owns at least one order
    /// * `NotFound` - no such customer
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if orders > 0 {
            warn!(id = %id, orders, "Refusing to delete customer with orders");
            return Err(DbError::HasOrders(id.to_string()));
        }

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::ForeignKeyViolation { .. } => DbError::HasOrders(id.to_string()),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        info!(id = %id, "Customer deleted");
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC string. Malformed hashes fail.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
