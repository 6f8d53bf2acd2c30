//! # Validation Module
//!
//! Input validation for catalog and customer write paths.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: CLI argument parsing (clap)                                   │
//! │  ├── Type validation (integers, enums)                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                        │
//! │  ├── names, prices, stock, quantities                                   │
//! │  └── CPF, CEP, UF, birth date, password                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── CHECK (stock >= 0), CHECK (quantity > 0)                           │
//! │  ├── UNIQUE (cpf)                                                       │
//! │  └── Foreign keys, cpf immutability trigger                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Datelike, NaiveDate};

use crate::error::ValidationError;
use crate::types::{CustomerProfile, NewProduct};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS, MIN_CUSTOMER_AGE_YEARS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum password length for customer accounts.
pub const MIN_PASSWORD_LEN: usize = 6;

// =============================================================================
// String Validators
// =============================================================================

fn required_trimmed<'a>(field: &str, value: &'a str, max: usize) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value)
}

/// Validates a product name (1-150 characters after trimming).
///
/// ```rust
/// use mercado_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Arroz Tipo 1 5kg").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required_trimmed("name", name, 150).map(|_| ())
}

/// Validates a customer's full name (1-120 characters after trimming).
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    required_trimmed("name", name, 120).map(|_| ())
}

/// Validates a search query. Empty is allowed and means "everything".
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a password before hashing.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price in centavos. Zero is allowed (free samples).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a stock level. Stock is never negative.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates the number of distinct lines a cart would hold.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}

/// Validates every field of a product about to be created.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    if product.description.chars().count() > 2000 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 2000,
        });
    }
    validate_price_cents(product.price_cents)?;
    validate_stock(product.stock)?;
    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use mercado_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Address & Profile Validators
// =============================================================================

/// Validates a CEP and returns its 8-digit form (`01310-100` → `01310100`).
pub fn normalize_cep(cep: &str) -> ValidationResult<String> {
    let digits: String = cep.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 8 {
        return Err(ValidationError::invalid("cep", "must have 8 digits"));
    }
    Ok(digits)
}

/// Validates a two-letter state code and returns it uppercased.
pub fn normalize_state(uf: &str) -> ValidationResult<String> {
    let uf = uf.trim();
    if uf.len() != 2 || !uf.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid("state", "must be a 2-letter UF"));
    }
    Ok(uf.to_ascii_uppercase())
}

/// Full years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Rejects birth dates in the future or younger than the minimum age.
pub fn validate_birth_date(birth: NaiveDate, today: NaiveDate) -> ValidationResult<()> {
    if birth > today {
        return Err(ValidationError::invalid("birth_date", "cannot be in the future"));
    }
    if age_on(birth, today) < MIN_CUSTOMER_AGE_YEARS as i32 {
        return Err(ValidationError::OutOfRange {
            field: "age".to_string(),
            min: i64::from(MIN_CUSTOMER_AGE_YEARS),
            max: 150,
        });
    }
    Ok(())
}

/// Loose email shape check: one `@` with a dotted domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::invalid("email", "not an email address"));
    }
    Ok(())
}

/// Validates and normalizes a profile. Blank strings become `None`.
pub fn normalize_profile(
    profile: CustomerProfile,
    today: NaiveDate,
) -> ValidationResult<CustomerProfile> {
    fn clean(v: Option<String>) -> Option<String> {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    let email = clean(profile.email);
    if let Some(ref e) = email {
        validate_email(e)?;
    }
    if let Some(birth) = profile.birth_date {
        validate_birth_date(birth, today)?;
    }
    let cep = clean(profile.cep).map(|c| normalize_cep(&c)).transpose()?;
    let state = clean(profile.state)
        .map(|s| normalize_state(&s))
        .transpose()?;

    Ok(CustomerProfile {
        email,
        birth_date: profile.birth_date,
        mobile_phone: clean(profile.mobile_phone),
        cep,
        street: clean(profile.street),
        number: clean(profile.number),
        complement: clean(profile.complement),
        district: clean(profile.district),
        city: clean(profile.city),
        state,
        contact_preference: profile.contact_preference,
        preferred_payment: profile.preferred_payment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_and_stock() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX / 2).is_err());
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-5).is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let mut p = NewProduct {
            name: "Café Torrado 500g".into(),
            description: String::new(),
            price_cents: 1890,
            stock: 10,
            image_url: None,
        };
        assert!(validate_new_product(&p).is_ok());

        p.stock = -1;
        assert!(validate_new_product(&p).is_err());

        p.stock = 1;
        p.name = " ".into();
        assert!(matches!(
            validate_new_product(&p),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_cep_and_state() {
        assert_eq!(normalize_cep("01310-100").unwrap(), "01310100");
        assert!(normalize_cep("1234").is_err());
        assert_eq!(normalize_state("sp").unwrap(), "SP");
        assert!(normalize_state("São").is_err());
        assert!(normalize_state("S1").is_err());
    }

    #[test]
    fn test_age_and_birth_date() {
        let today = date(2026, 3, 10);
        assert_eq!(age_on(date(2010, 3, 10), today), 16);
        assert_eq!(age_on(date(2010, 3, 11), today), 15);
        assert!(validate_birth_date(date(2010, 3, 10), today).is_ok());
        assert!(validate_birth_date(date(2010, 3, 11), today).is_err());
        assert!(validate_birth_date(date(2027, 1, 1), today).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("maria@exemplo.com.br").is_ok());
        assert!(validate_email("maria@localhost").is_err());
        assert!(validate_email("@exemplo.com").is_err());
        assert!(validate_email("maria.exemplo.com").is_err());
    }

    #[test]
    fn test_normalize_profile_blanks_and_formats() {
        let profile = CustomerProfile {
            email: Some("  ".into()),
            cep: Some("01310-100".into()),
            state: Some("rj".into()),
            city: Some(" Rio de Janeiro ".into()),
            ..Default::default()
        };
        let clean = normalize_profile(profile, date(2026, 1, 1)).unwrap();
        assert_eq!(clean.email, None);
        assert_eq!(clean.cep.as_deref(), Some("01310100"));
        assert_eq!(clean.state.as_deref(), Some("RJ"));
        assert_eq!(clean.city.as_deref(), Some("Rio de Janeiro"));
    }

    #[test]
    fn test_validate_password_and_uuid() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
