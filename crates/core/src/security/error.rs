//! Security and collaborator error types.

use thiserror::Error;
use uplink_shared::AppError;
use uplink_shared::types::ProviderTokenId;

/// Which rate limit blocked a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// Per-user limit.
    User,
    /// Per-IP limit.
    Ip,
}

impl RateLimitScope {
    /// Returns the string representation of the scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ip => "ip",
        }
    }
}

/// Failures of a token persistence or counter collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or failed.
    #[error("token store unavailable: {0}")]
    Unavailable(String),

    /// The record could not be encoded or decoded.
    #[error("invalid token record: {0}")]
    InvalidRecord(String),
}

/// Token refresh security errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Too many refresh attempts in the current window.
    #[error("too many token refresh attempts for {} (limit {limit}, retry after window reset)", .scope.as_str())]
    RateLimited {
        /// Limit that was hit.
        scope: RateLimitScope,
        /// Ceiling of that limit.
        limit: u32,
    },

    /// No token record with this id.
    #[error("token record {0} not found")]
    TokenNotFound(ProviderTokenId),

    /// The token store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SecurityError {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "TOKEN_REFRESH_RATE_LIMITED",
            Self::TokenNotFound(_) => "TOKEN_NOT_FOUND",
            Self::Store(_) => "TOKEN_STORE_ERROR",
        }
    }
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::RateLimited { .. } => AppError::RateLimited(err.to_string()),
            SecurityError::TokenNotFound(_) => AppError::NotFound(err.to_string()),
            SecurityError::Store(store) => store.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Audit sink failures. Logged by the coordinator, never propagated.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The event could not be serialized.
    #[error("failed to serialize audit event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink rejected the event.
    #[error("audit sink unavailable: {0}")]
    Sink(String),
}

impl AuditError {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "AUDIT_SERIALIZATION_ERROR",
            Self::Sink(_) => "AUDIT_SINK_ERROR",
        }
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        AppError::Internal(err.to_string())
    }
}
