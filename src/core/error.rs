//! Typed error handling for the order engine
//!
//! Two layers:
//!
//! - [`OrderError`]: the classified, user-facing outcome of a service operation.
//!   Messages of validation, not-found, permission and conflict errors are
//!   surfaced verbatim; transient errors carry only a generic message.
//! - [`StoreError`]: infrastructure failures raised by store backends. They are
//!   inspected exactly once, where they occur, and translated into an
//!   [`OrderError`] by the calling operation.
//!
//! # Example
//!
//! ```rust,ignore
//! match service.cancel_order(&user_id, payload).await {
//!     Ok(order) => println!("cancelled {}", order.id),
//!     Err(e) if e.kind() == ErrorKind::NotFound => println!("{}", e),
//!     Err(e) => eprintln!("{}: {}", e.error_code(), e),
//! }
//! ```

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The error taxonomy of service operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Permission,
    Conflict,
    Transient,
}

/// The error type returned by every service operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Malformed or out-of-range input
    Validation(String),

    /// The referenced record does not exist or is not visible to the caller
    NotFound(String),

    /// The caller lacks the role required by the operation
    Permission(String),

    /// The record is in a state that forbids the operation
    Conflict(String),

    /// Infrastructure failure; the message is generic and safe to show
    Transient(String),
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for OrderError {}

/// Error response body for a transport to serialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl OrderError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrderError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        OrderError::NotFound(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        OrderError::Permission(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        OrderError::Conflict(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        OrderError::Transient(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Validation(_) => ErrorKind::Validation,
            OrderError::NotFound(_) => ErrorKind::NotFound,
            OrderError::Permission(_) => ErrorKind::Permission,
            OrderError::Conflict(_) => ErrorKind::Conflict,
            OrderError::Transient(_) => ErrorKind::Transient,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            OrderError::Validation(m)
            | OrderError::NotFound(m)
            | OrderError::Permission(m)
            | OrderError::Conflict(m)
            | OrderError::Transient(m) => m,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "VALIDATION_ERROR",
            OrderError::NotFound(_) => "NOT_FOUND",
            OrderError::Permission(_) => "PERMISSION_DENIED",
            OrderError::Conflict(_) => "CONFLICT",
            OrderError::Transient(_) => "TRANSIENT_ERROR",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, OrderError::Transient(_))
    }

    /// Convert to a serializable response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

/// Log an infrastructure failure and replace it with `message`
///
/// ```rust,ignore
/// store.count(&clause).await.map_err(infra("orders", "count", LIST_FAILED))?;
/// ```
pub fn infra(
    operation: &'static str,
    step: &'static str,
    message: &'static str,
) -> impl FnOnce(StoreError) -> OrderError {
    move |err| {
        tracing::error!(operation, step, error = %err, "store call failed");
        OrderError::transient(message)
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by store backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row matched the lookup
    #[error("record not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    /// The backend cannot evaluate the request (e.g. raw SQL in memory)
    #[error("unsupported by backend: {0}")]
    Unsupported(String),

    #[error("store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
