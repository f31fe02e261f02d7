//! Provider operation errors.

use thiserror::Error;
use uplink_shared::AppError;

use crate::taxonomy::{ErrorClassifier, ErrorType, ProviderKind, RawProviderError};

/// A failed provider operation, already classified.
#[derive(Debug, Clone, Error)]
#[error("{error_type}: {raw}")]
pub struct ProviderError {
    error_type: ErrorType,
    raw: RawProviderError,
}

impl ProviderError {
    /// Classifies a raw provider error.
    #[must_use]
    pub fn new(raw: RawProviderError) -> Self {
        Self {
            error_type: ErrorClassifier::classify(&raw),
            raw,
        }
    }

    /// Wraps an OpenDAL error.
    #[must_use]
    pub fn from_opendal(provider: ProviderKind, err: &opendal::Error) -> Self {
        Self::new(RawProviderError::from_opendal(provider, err))
    }

    /// The provider is missing settings or has no backend.
    #[must_use]
    pub fn not_configured(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::ProviderNotConfigured,
            raw: RawProviderError::new(provider, message),
        }
    }

    /// The provider client could not be built.
    #[must_use]
    pub fn initialization(provider: ProviderKind, err: &opendal::Error) -> Self {
        Self {
            error_type: ErrorType::ProviderInitializationFailed,
            raw: RawProviderError::from_opendal(provider, err),
        }
    }

    /// An upload exceeds the configured size limit.
    #[must_use]
    pub fn file_too_large(provider: ProviderKind, size: u64, max: u64) -> Self {
        Self {
            error_type: ErrorType::FileTooLarge,
            raw: RawProviderError::new(
                provider,
                format!("file size {size} bytes exceeds maximum allowed {max} bytes"),
            )
            .with_status(413),
        }
    }

    /// Classification of the failure.
    #[must_use]
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// The raw provider error.
    #[must_use]
    pub fn raw(&self) -> &RawProviderError {
        &self.raw
    }

    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        self.error_type.as_str()
    }
}

impl From<ProviderError> for RawProviderError {
    fn from(err: ProviderError) -> Self {
        err.raw
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err.error_type {
            ErrorType::FileNotFound => AppError::NotFound(err.raw.message),
            ErrorType::FileTooLarge
            | ErrorType::InvalidFileType
            | ErrorType::InvalidFileContent
            | ErrorType::InvalidParameter => AppError::Validation(err.raw.message),
            ErrorType::ApiQuotaExceeded => AppError::RateLimited(err.raw.message),
            ErrorType::TokenExpired
            | ErrorType::InvalidCredentials
            | ErrorType::InvalidAccessKey
            | ErrorType::SignatureMismatch => AppError::Unauthorized(err.raw.message),
            ErrorType::InsufficientPermissions
            | ErrorType::FolderAccessDenied
            | ErrorType::BucketAccessDenied
            | ErrorType::AccountDisabled => AppError::Forbidden(err.raw.message),
            ErrorType::NetworkError | ErrorType::Timeout | ErrorType::ServiceUnavailable => {
                AppError::ExternalService(err.to_string())
            }
            _ => AppError::StorageProvider(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(opendal::ErrorKind::NotFound, ErrorType::FileNotFound, "NOT_FOUND")]
    #[case(opendal::ErrorKind::PermissionDenied, ErrorType::InsufficientPermissions, "FORBIDDEN")]
    #[case(opendal::ErrorKind::RateLimited, ErrorType::ApiQuotaExceeded, "RATE_LIMITED")]
    fn test_opendal_errors_are_classified(
        #[case] kind: opendal::ErrorKind,
        #[case] expected: ErrorType,
        #[case] app_code: &str,
    ) {
        let err = ProviderError::from_opendal(ProviderKind::LocalFs, &opendal::Error::new(kind, "boom"));
        assert_eq!(err.error_type(), expected);
        assert_eq!(AppError::from(err).error_code(), app_code);
    }

    #[test]
    fn test_file_too_large() {
        let err = ProviderError::file_too_large(ProviderKind::S3, 2048, 1024);
        assert_eq!(err.error_type(), ErrorType::FileTooLarge);
        assert_eq!(err.raw().http_status, Some(413));
        assert_eq!(err.error_code(), "file_too_large");
        assert_eq!(AppError::from(err).status_code(), 400);
    }

    #[test]
    fn test_converts_back_to_raw() {
        let err = ProviderError::not_configured(ProviderKind::Other, "missing");
        let raw: RawProviderError = err.into();
        assert_eq!(raw.message, "missing");
    }
}
