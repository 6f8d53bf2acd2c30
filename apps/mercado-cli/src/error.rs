//! # API Error Type
//!
//! Unified error type for CLI commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Mercado                                │
//! │                                                                         │
//! │  Operator                    Rust Backend                               │
//! │  ────────                    ────────────                               │
//! │                                                                         │
//! │  mercado cart add <id>                                                  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Database Error? ─── DbError::NotFound{..} ────────┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Checkout Error? ─── CheckoutError::EmptyCart ─── ApiError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  stderr: {"code": "NOT_FOUND", "message": "Product not found: ..."}     │
//! │  exit status: ErrorCode::exit_code()                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use mercado_core::{CoreError, SessionError, ValidationError};
use mercado_db::{CheckoutError, DbError};

/// API error returned from CLI commands.
///
/// ## Serialization
/// This is what the operator sees when a command fails:
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for Feijão Preto: requested 5, available 2"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for scripts
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for command failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed
    ValidationError,

    /// Resource not found
    NotFound,

    /// Unique value already taken (CPF)
    Duplicate,

    /// Deletion blocked by existing orders
    InUse,

    /// Login missing or credentials rejected
    Unauthorized,

    /// Cart operation failed
    CartError,

    /// Insufficient stock
    InsufficientStock,

    /// Customer profile lacks checkout data
    IncompleteProfile,

    /// Configuration could not be loaded
    ConfigError,

    /// Database operation failed
    DatabaseError,

    /// Internal error
    Internal,
}

impl ErrorCode {
    /// Process exit status for this code.
    ///
    /// ```text
    /// 0  success            5  unauthorized
    /// 1  database/internal  6  cart / stock / profile
    /// 2  validation         7  configuration
    /// 3  not found
    /// 4  duplicate / in use
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::DatabaseError | ErrorCode::Internal => 1,
            ErrorCode::ValidationError => 2,
            ErrorCode::NotFound => 3,
            ErrorCode::Duplicate | ErrorCode::InUse => 4,
            ErrorCode::Unauthorized => 5,
            ErrorCode::CartError | ErrorCode::InsufficientStock | ErrorCode::IncompleteProfile => 6,
            ErrorCode::ConfigError => 7,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Duplicate,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ReferencedByOrder(name) => {
                tracing::warn!(product = %name, "Deletion blocked by existing orders");
                ApiError::new(
                    ErrorCode::InUse,
                    format!("Product {} is referenced by existing orders", name),
                )
            }
            DbError::HasOrders(name) => {
                tracing::warn!(customer = %name, "Deletion blocked by existing orders");
                ApiError::new(ErrorCode::InUse, format!("Customer {} has orders", name))
            }
            DbError::InvalidCredentials => ApiError::unauthorized("Invalid CPF or password"),
            DbError::Validation(e) => ApiError::validation(e.to_string()),
            DbError::ConstraintViolation(msg) => {
                tracing::error!("Constraint violation: {}", msg);
                ApiError::validation("Value rejected by a database constraint")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::Conflict { entity, id } => {
                tracing::error!(%entity, %id, "Concurrent update conflict");
                ApiError::new(
                    ErrorCode::DatabaseError,
                    format!("{} {} was changed concurrently, try again", entity, id),
                )
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Hashing(e) => {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal("Password could not be processed")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OutOfStock { product } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!("{} is out of stock", product),
            ),
            CoreError::CartTooLarge { max } => ApiError::new(
                ErrorCode::CartError,
                format!("Cart cannot have more than {} items", max),
            ),
            CoreError::QuantityTooLarge { requested, max } => ApiError::new(
                ErrorCode::ValidationError,
                format!("Quantity {} exceeds maximum allowed ({})", requested, max),
            ),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        tracing::error!("Session store failed: {}", err);
        ApiError::internal(err.to_string())
    }
}

/// Converts checkout errors to API errors.
impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::NotAuthenticated => {
                ApiError::unauthorized("Login required to check out")
            }
            CheckoutError::EmptyCart => ApiError::new(ErrorCode::CartError, "Cart is empty"),
            CheckoutError::CustomerNotFound(id) => ApiError::not_found("Customer", &id),
            e @ CheckoutError::IncompleteProfile { .. } => {
                ApiError::new(ErrorCode::IncompleteProfile, e.to_string())
            }
            e @ (CheckoutError::InsufficientStock { .. } | CheckoutError::OutOfStock { .. }) => {
                ApiError::new(ErrorCode::InsufficientStock, e.to_string())
            }
            CheckoutError::Validation(e) => ApiError::validation(e.to_string()),
            CheckoutError::Session(e) => e.into(),
            CheckoutError::PersistenceFailure(e) => {
                tracing::error!("Checkout rolled back: {}", e);
                ApiError::new(
                    ErrorCode::DatabaseError,
                    "Order could not be saved; nothing was charged or reserved",
                )
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Config Errors
// =============================================================================

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not write config file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No config or data directory available on this platform")]
    NoDirectory,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
