//! # Customer Commands
//!
//! ## Login Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  mercado customer login --cpf 529.982.247-25 --password ******         │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │  CustomerRepository::authenticate (argon2 verify)                      │
//! │       │                         │                                       │
//! │    success                 InvalidCredentials ──► exit 5                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  session.login(customer_id)                                            │
//! │  (anonymous cart kept; another customer's cart dropped)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use tracing::{debug, info};

use mercado_core::{cpf, Customer, CustomerPatch, CustomerProfile, NewCustomer};

use crate::commands::Ack;
use crate::error::ApiError;
use crate::state::{DbState, SessionState};

// =============================================================================
// DTOs
// =============================================================================

/// Customer as shown to the operator. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub id: String,
    pub name: String,
    /// Formatted `000.000.000-00`.
    pub cpf: String,
    pub profile: CustomerProfile,
    pub ready_for_checkout: bool,
    pub missing_for_checkout: Vec<&'static str>,
}

impl From<Customer> for CustomerDto {
    fn from(c: Customer) -> Self {
        let missing = c.profile.missing_for_checkout();
        CustomerDto {
            id: c.id,
            name: c.name,
            cpf: cpf::format(&c.cpf),
            ready_for_checkout: missing.is_empty(),
            missing_for_checkout: missing,
            profile: c.profile,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session: String,
    pub customer: CustomerDto,
    pub cart_lines: usize,
}

/// Profile flags shared by `register` and `update`.
///
/// Every flag is optional; on update only the given ones change.
#[derive(Debug, Clone, Default, Args)]
pub struct ProfileInput {
    #[arg(long)]
    pub email: Option<String>,

    /// Birth date as YYYY-MM-DD
    #[arg(long)]
    pub birth_date: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    /// Postal code, with or without the dash
    #[arg(long)]
    pub cep: Option<String>,

    #[arg(long)]
    pub street: Option<String>,

    #[arg(long)]
    pub number: Option<String>,

    #[arg(long)]
    pub complement: Option<String>,

    #[arg(long)]
    pub district: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    /// Two-letter state code (UF)
    #[arg(long)]
    pub state: Option<String>,

    /// email | whatsapp | sms
    #[arg(long)]
    pub contact: Option<String>,

    /// pix | credit_card | debit_card | boleto
    #[arg(long)]
    pub payment: Option<String>,
}

impl ProfileInput {
    /// Writes the given flags onto `profile`.
    ///
    /// Enumerations and the birth date are parsed here; the remaining
    /// checks (CEP, UF, email, minimum age) run in the repository.
    pub fn apply_to(self, profile: &mut CustomerProfile) -> Result<(), ApiError> {
        if let Some(raw) = self.birth_date {
            let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| ApiError::validation("birth_date must be YYYY-MM-DD"))?;
            profile.birth_date = Some(date);
        }
        if let Some(contact) = self.contact {
            profile.contact_preference = contact.parse()?;
        }
        if let Some(payment) = self.payment {
            profile.preferred_payment = Some(payment.parse()?);
        }

        let fields = [
            (self.email, &mut profile.email),
            (self.phone, &mut profile.mobile_phone),
            (self.cep, &mut profile.cep),
            (self.street, &mut profile.street),
            (self.number, &mut profile.number),
            (self.complement, &mut profile.complement),
            (self.district, &mut profile.district),
            (self.city, &mut profile.city),
            (self.state, &mut profile.state),
        ];
        for (value, slot) in fields {
            if let Some(v) = value {
                *slot = Some(v);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Storefront
// =============================================================================

pub async fn register(
    db: &DbState,
    name: String,
    cpf: String,
    password: String,
    profile: ProfileInput,
) -> Result<CustomerDto, ApiError> {
    let mut new = NewCustomer {
        name,
        cpf,
        password,
        profile: CustomerProfile::default(),
    };
    profile.apply_to(&mut new.profile)?;

    let customer = db.inner().customers().register(&new).await?;
    Ok(customer.into())
}

/// Authenticates and binds the customer to the current session.
pub async fn login(
    db: &DbState,
    sessions: &SessionState,
    cpf: &str,
    password: &str,
) -> Result<LoginResponse, ApiError> {
    let customer = db.inner().customers().authenticate(cpf, password).await?;

    let id = customer.id.clone();
    let session = sessions.modify(&mut |s| {
        if s.customer_id.as_deref().is_some_and(|current| current != id) {
            s.logout();
        }
        s.login(id.clone());
    })?;

    info!(customer_id = %customer.id, session = %sessions.key(), "Customer logged in");
    Ok(LoginResponse {
        session: sessions.key().to_string(),
        cart_lines: session.cart.len(),
        customer: customer.into(),
    })
}

/// Ends the session and drops its cart.
pub async fn logout(sessions: &SessionState) -> Result<Ack, ApiError> {
    sessions.destroy()?;
    info!(session = %sessions.key(), "Session ended");
    Ok(Ack::new("Logged out"))
}

/// The logged-in customer.
pub async fn whoami(db: &DbState, sessions: &SessionState) -> Result<CustomerDto, ApiError> {
    let id = sessions.require_customer()?;
    get_customer(db, &id).await
}

/// Changes the logged-in customer's password.
pub async fn change_password(
    db: &DbState,
    sessions: &SessionState,
    current: &str,
    new: &str,
) -> Result<Ack, ApiError> {
    let id = sessions.require_customer()?;
    db.inner()
        .customers()
        .change_password(&id, current, new)
        .await?;
    Ok(Ack::new("Password changed"))
}

// =============================================================================
// Back Office
// =============================================================================

pub async fn get_customer(db: &DbState, id: &str) -> Result<CustomerDto, ApiError> {
    debug!(id = %id, "get_customer command");
    db.inner()
        .customers()
        .get_by_id(id)
        .await?
        .map(CustomerDto::from)
        .ok_or_else(|| ApiError::not_found("Customer", id))
}

/// Searches by name or CPF fragment.
pub async fn list_customers(db: &DbState, query: &str) -> Result<Vec<CustomerDto>, ApiError> {
    let customers = db.inner().customers().list(query).await?;
    Ok(customers.into_iter().map(CustomerDto::from).collect())
}

/// Changes name and profile fields. The CPF is immutable.
pub async fn update_customer(
    db: &DbState,
    id: &str,
    name: Option<String>,
    changes: ProfileInput,
) -> Result<CustomerDto, ApiError> {
    let repo = db.inner().customers();
    let mut profile = repo.require(id).await?.profile;
    changes.apply_to(&mut profile)?;

    let customer = repo
        .update(
            id,
            &CustomerPatch {
                name,
                profile: Some(profile),
            },
        )
        .await?;
    Ok(customer.into())
}

/// Deletes a customer without orders.
pub async fn delete_customer(db: &DbState, id: &str) -> Result<Ack, ApiError> {
    db.inner().customers().delete(id).await?;
    Ok(Ack::new(format!("Customer {} deleted", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use crate::error::ErrorCode;
    use mercado_core::{ContactPreference, PaymentMethod};

    #[tokio::test]
    async fn test_register_login_whoami_logout() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("balcao-1");

        let created = register(
            &db,
            "Ana Souza".into(),
            "529.982.247-25".into(),
            "senha123".into(),
            ProfileInput {
                cep: Some("01310-100".into()),
                contact: Some("sms".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(created.cpf, "529.982.247-25");
        assert_eq!(created.profile.cep.as_deref(), Some("01310100"));
        assert_eq!(created.profile.contact_preference, ContactPreference::Sms);
        assert!(!created.ready_for_checkout);

        let res = login(&db, &sessions, "52998224725", "senha123").await.unwrap();
        assert_eq!(res.customer.id, created.id);
        assert_eq!(whoami(&db, &sessions).await.unwrap().id, created.id);

        logout(&sessions).await.unwrap();
        let err = whoami(&db, &sessions).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_bad_login_and_duplicate_cpf() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        db.inner()
            .customers()
            .register(&test_support::shopper("11144477735"))
            .await
            .unwrap();

        let err = login(&db, &sessions, "111.444.777-35", "errada")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert!(sessions.context().unwrap().customer_id().is_none());

        let err = register(
            &db,
            "Outra Pessoa".into(),
            "111.444.777-35".into(),
            "senha456".into(),
            ProfileInput::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);
    }

    #[tokio::test]
    async fn test_switching_customer_drops_previous_cart() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        let customers = db.inner().customers();
        customers.register(&test_support::shopper("52998224725")).await.unwrap();
        customers.register(&test_support::shopper("11144477735")).await.unwrap();
        let product = db
            .inner()
            .products()
            .require(&test_support::product(&db, "Arroz", 1000, 5).await)
            .await
            .unwrap();

        login(&db, &sessions, "52998224725", "senha123").await.unwrap();
        sessions
            .modify(&mut |s| {
                let _ = s.cart.add(&product, 2);
            })
            .unwrap();

        // Same customer again keeps the cart
        let res = login(&db, &sessions, "52998224725", "senha123").await.unwrap();
        assert_eq!(res.cart_lines, 1);

        let res = login(&db, &sessions, "11144477735", "senha123").await.unwrap();
        assert_eq!(res.cart_lines, 0);
    }

    #[tokio::test]
    async fn test_update_merges_profile_and_validates() {
        let db = test_support::db().await;
        let customer = db
            .inner()
            .customers()
            .register(&test_support::shopper("39053344705"))
            .await
            .unwrap();

        let updated = update_customer(
            &db,
            &customer.id,
            Some("Ana S. Lima".into()),
            ProfileInput {
                payment: Some("boleto".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Ana S. Lima");
        assert_eq!(updated.profile.preferred_payment, Some(PaymentMethod::Boleto));
        assert_eq!(updated.profile.city.as_deref(), Some("São Paulo"));
        assert!(updated.ready_for_checkout);

        let err = update_customer(
            &db,
            &customer.id,
            None,
            ProfileInput {
                state: Some("São Paulo".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = update_customer(
            &db,
            &customer.id,
            None,
            ProfileInput {
                birth_date: Some("19/05/1990".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_search_and_delete() {
        let db = test_support::db().await;
        let customer = db
            .inner()
            .customers()
            .register(&test_support::shopper("52998224725"))
            .await
            .unwrap();

        assert_eq!(list_customers(&db, "souza").await.unwrap().len(), 1);
        assert_eq!(list_customers(&db, "529.982").await.unwrap().len(), 1);
        assert!(list_customers(&db, "Pedro").await.unwrap().is_empty());

        delete_customer(&db, &customer.id).await.unwrap();
        let err = get_customer(&db, &customer.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_change_password_requires_login_and_current_password() {
        let db = test_support::db().await;
        let sessions = test_support::sessions("s");
        db.inner()
            .customers()
            .register(&test_support::shopper("52998224725"))
            .await
            .unwrap();

        let err = change_password(&db, &sessions, "senha123", "nova-senha")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        login(&db, &sessions, "52998224725", "senha123").await.unwrap();
        let err = change_password(&db, &sessions, "errada", "nova-senha")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        change_password(&db, &sessions, "senha123", "nova-senha")
            .await
            .unwrap();
        login(&db, &sessions, "52998224725", "nova-senha").await.unwrap();
    }
}
