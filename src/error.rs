use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised by a storage backend.
///
/// `DuplicateKey` and `PredicateFailed` are distinct from generic backend
/// failures so callers can resolve races (re-fetch, reload and retry) instead
/// of reporting an error.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("predicate failed: {0}")]
    PredicateFailed(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Coarse classification of a [`PaymentError`], used by callers to map
/// failures onto user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    Conflict,
    BusinessRuleViolation,
    ServerError,
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("invalid or inactive device")]
    InvalidDevice,
    #[error("route {0} not found")]
    RouteNotFound(String),
    #[error("stop {stop_id} is not on route {route_id}")]
    StopNotFound { route_id: String, stop_id: String },
    #[error("invalid PIN")]
    InvalidPin,
    #[error("account is not active")]
    AccountSuspended,
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("claimed origin is {distance_meters} m from the GPS fix (max {max_meters} m)")]
    OriginMismatch {
        distance_meters: u32,
        max_meters: u32,
    },
    #[error("GPS unavailable: {0}")]
    GpsUnavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("store call timed out after {0} ms")]
    Timeout(u64),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::InvalidAmount(_)
            | PaymentError::InvalidCoordinate(_)
            | PaymentError::InvalidInput(_) => ErrorKind::InvalidInput,
            PaymentError::UserNotFound(_)
            | PaymentError::InvalidDevice
            | PaymentError::RouteNotFound(_)
            | PaymentError::StopNotFound { .. } => ErrorKind::NotFound,
            PaymentError::InvalidPin => ErrorKind::Unauthorized,
            PaymentError::Conflict(_) => ErrorKind::Conflict,
            PaymentError::AccountSuspended
            | PaymentError::InsufficientBalance { .. }
            | PaymentError::OriginMismatch { .. }
            | PaymentError::GpsUnavailable(_) => ErrorKind::BusinessRuleViolation,
            PaymentError::Store(_) | PaymentError::Timeout(_) | PaymentError::Internal(_) => {
                ErrorKind::ServerError
            }
        }
    }

    /// Short machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::InvalidAmount(_) => "invalid_amount",
            PaymentError::InvalidCoordinate(_) => "invalid_coordinate",
            PaymentError::InvalidInput(_) => "invalid_input",
            PaymentError::UserNotFound(_) => "user_not_found",
            PaymentError::InvalidDevice => "invalid_device",
            PaymentError::RouteNotFound(_) => "route_not_found",
            PaymentError::StopNotFound { .. } => "stop_not_found",
            PaymentError::InvalidPin => "invalid_pin",
            PaymentError::AccountSuspended => "account_suspended",
            PaymentError::InsufficientBalance { .. } => "insufficient_balance",
            PaymentError::OriginMismatch { .. } => "origin_mismatch",
            PaymentError::GpsUnavailable(_) => "gps_unavailable",
            PaymentError::Conflict(_) => "conflict",
            PaymentError::Store(_) => "store_error",
            PaymentError::Timeout(_) => "timeout",
            PaymentError::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PaymentError::InvalidPin.kind(), ErrorKind::Unauthorized);
        assert_eq!(PaymentError::InvalidDevice.kind(), ErrorKind::NotFound);
        assert_eq!(
            PaymentError::OriginMismatch {
                distance_meters: 600,
                max_meters: 500
            }
            .kind(),
            ErrorKind::BusinessRuleViolation
        );
        assert_eq!(PaymentError::Timeout(10).kind(), ErrorKind::ServerError);
        assert_eq!(
            PaymentError::from(StoreError::DuplicateKey("R1".into())).kind(),
            ErrorKind::ServerError
        );
    }
}
