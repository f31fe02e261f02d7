//! Provider error classification.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. provider-specific error codes and reasons,
//! 2. authentication and token messages (including HTTP 401),
//! 3. quota and permission messages,
//! 4. network, timeout and transfer messages,
//! 5. file and request messages,
//! 6. HTTP status,
//! 7. `UnknownError`.
//!
//! Classification is pure: no I/O, no logging, no state.

use serde::{Deserialize, Serialize};

use super::error_type::{ErrorType, Severity};
use super::raw::{ProviderKind, RawProviderError};

/// Ordered `(code, type)` pairs for S3-compatible providers.
const S3_CODES: &[(&str, ErrorType)] = &[
    ("ExpiredToken", ErrorType::TokenExpired),
    ("TokenRefreshRequired", ErrorType::TokenExpired),
    ("InvalidAccessKeyId", ErrorType::InvalidAccessKey),
    ("SignatureDoesNotMatch", ErrorType::SignatureMismatch),
    ("AccountProblem", ErrorType::AccountDisabled),
    ("AllAccessDisabled", ErrorType::AccountDisabled),
    ("NoSuchBucket", ErrorType::BucketNotFound),
    ("InvalidBucketName", ErrorType::InvalidBucketName),
    ("AuthorizationHeaderMalformed", ErrorType::InvalidRegion),
    ("PermanentRedirect", ErrorType::InvalidRegion),
    ("IllegalLocationConstraintException", ErrorType::InvalidRegion),
    ("AccessDenied", ErrorType::BucketAccessDenied),
    ("SlowDown", ErrorType::ApiQuotaExceeded),
    ("RequestLimitExceeded", ErrorType::ApiQuotaExceeded),
    ("Throttling", ErrorType::ApiQuotaExceeded),
    ("EntityTooLarge", ErrorType::FileTooLarge),
    ("BadDigest", ErrorType::ChecksumMismatch),
    ("InvalidDigest", ErrorType::ChecksumMismatch),
    ("XAmzContentSHA256Mismatch", ErrorType::ChecksumMismatch),
    ("IncompleteBody", ErrorType::UploadInterrupted),
    ("RequestTimeout", ErrorType::Timeout),
    ("NoSuchKey", ErrorType::FileNotFound),
    ("NoSuchUpload", ErrorType::FileNotFound),
    ("NotImplemented", ErrorType::FeatureNotSupported),
    ("InvalidArgument", ErrorType::InvalidParameter),
    ("InvalidRequest", ErrorType::InvalidParameter),
    ("InternalError", ErrorType::ServiceUnavailable),
    ("ServiceUnavailable", ErrorType::ServiceUnavailable),
];

/// Ordered `(code, type)` pairs for Azure Blob Storage.
const AZURE_CODES: &[(&str, ErrorType)] = &[
    ("AuthenticationFailed", ErrorType::InvalidCredentials),
    ("InvalidAuthenticationInfo", ErrorType::InvalidCredentials),
    ("AccountIsDisabled", ErrorType::AccountDisabled),
    ("ContainerNotFound", ErrorType::ContainerNotFound),
    ("ContainerBeingDeleted", ErrorType::ContainerNotFound),
    ("InvalidResourceName", ErrorType::InvalidBucketName),
    ("AuthorizationPermissionMismatch", ErrorType::InsufficientPermissions),
    ("AuthorizationFailure", ErrorType::InsufficientPermissions),
    ("InsufficientAccountPermissions", ErrorType::InsufficientPermissions),
    ("ServerBusy", ErrorType::ServiceUnavailable),
    ("InternalError", ErrorType::ServiceUnavailable),
    ("OperationTimedOut", ErrorType::Timeout),
    ("RequestBodyTooLarge", ErrorType::FileTooLarge),
    ("Md5Mismatch", ErrorType::ChecksumMismatch),
    ("BlobNotFound", ErrorType::FileNotFound),
    ("ResourceNotFound", ErrorType::FileNotFound),
    ("InvalidQueryParameterValue", ErrorType::InvalidParameter),
    ("InvalidHeaderValue", ErrorType::InvalidParameter),
    ("FeatureVersionMismatch", ErrorType::FeatureNotSupported),
];

/// Ordered `(reason, type)` pairs for Drive-like providers.
const DRIVE_REASONS: &[(&str, ErrorType)] = &[
    ("storageQuotaExceeded", ErrorType::StorageQuotaExceeded),
    ("teamDriveFileLimitExceeded", ErrorType::StorageQuotaExceeded),
    ("userRateLimitExceeded", ErrorType::ApiQuotaExceeded),
    ("rateLimitExceeded", ErrorType::ApiQuotaExceeded),
    ("dailyLimitExceeded", ErrorType::ApiQuotaExceeded),
    ("sharingRateLimitExceeded", ErrorType::ApiQuotaExceeded),
    ("insufficientFilePermissions", ErrorType::InsufficientPermissions),
    ("insufficientPermissions", ErrorType::InsufficientPermissions),
    ("appNotAuthorizedToFile", ErrorType::InsufficientPermissions),
    ("domainPolicy", ErrorType::InsufficientPermissions),
    ("backendError", ErrorType::ServiceUnavailable),
    ("internalError", ErrorType::ServiceUnavailable),
];

/// Ordered message rules shared by every provider.
const MESSAGE_RULES: &[(&[&str], ErrorType)] = &[
    // Authentication and token
    (
        &["invalid_client", "invalid credentials", "unauthenticated", "authentication failed"],
        ErrorType::InvalidCredentials,
    ),
    (
        &[
            "invalid_grant",
            "token expired",
            "token has expired",
            "token has been expired",
            "expired token",
            "token_expired",
        ],
        ErrorType::TokenExpired,
    ),
    (&["account disabled", "account suspended"], ErrorType::AccountDisabled),
    (&["not configured", "no provider"], ErrorType::ProviderNotConfigured),
    (
        &["configinvalid", "failed to initialize", "initialization failed"],
        ErrorType::ProviderInitializationFailed,
    ),
    // Quota and permissions
    (
        &["storage quota", "insufficient storage", "no space left", "disk full"],
        ErrorType::StorageQuotaExceeded,
    ),
    (
        &["rate limit", "ratelimited", "too many requests", "quota exceeded", "throttl", "slow down"],
        ErrorType::ApiQuotaExceeded,
    ),
    (&["bucket not found", "no such bucket"], ErrorType::BucketNotFound),
    (&["container not found"], ErrorType::ContainerNotFound),
    (&["folder not found", "folder access"], ErrorType::FolderAccessDenied),
    (
        &["permission denied", "permissiondenied", "access denied", "forbidden", "insufficient permissions"],
        ErrorType::InsufficientPermissions,
    ),
    // Network, timeout and transfer
    (&["timed out", "timeout", "deadline exceeded"], ErrorType::Timeout),
    (
        &[
            "connection refused",
            "connection reset",
            "connection closed",
            "could not resolve",
            "dns error",
            "name resolution",
            "network unreachable",
            "network error",
            "tls handshake",
            "error sending request",
        ],
        ErrorType::NetworkError,
    ),
    (
        &["broken pipe", "unexpected eof", "interrupted", "incomplete body"],
        ErrorType::UploadInterrupted,
    ),
    (&["checksum", "md5 mismatch", "digest mismatch"], ErrorType::ChecksumMismatch),
    (
        &["service unavailable", "bad gateway", "temporarily unavailable", "backend error", "internal server error"],
        ErrorType::ServiceUnavailable,
    ),
    // File and request
    (
        &["file too large", "payload too large", "entity too large", "exceeds the maximum"],
        ErrorType::FileTooLarge,
    ),
    (
        &["unsupported file type", "invalid mime", "file type not allowed"],
        ErrorType::InvalidFileType,
    ),
    (&["invalid file content", "corrupt"], ErrorType::InvalidFileContent),
    (&["not supported", "unsupported operation"], ErrorType::FeatureNotSupported),
    (&["not found", "no such file"], ErrorType::FileNotFound),
    (
        &["invalid parameter", "invalid argument", "bad request"],
        ErrorType::InvalidParameter,
    ),
];

/// Full classification result for callers that need more than the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    /// Classified error type.
    pub error_type: ErrorType,
    /// Severity of the error type.
    pub severity: Severity,
    /// Whether retrying may succeed.
    pub recoverable: bool,
    /// Whether the connection owner has to act.
    pub requires_user_intervention: bool,
    /// Message suitable for the connection owner.
    pub user_message: String,
    /// Provider that produced the error.
    pub provider: ProviderKind,
    /// Original provider message.
    pub technical_message: String,
}

/// Stateless classifier mapping raw provider errors to [`ErrorType`].
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classifies a raw provider error.
    ///
    /// Total: every input maps to a type, `UnknownError` when nothing matches.
    #[must_use]
    pub fn classify(error: &RawProviderError) -> ErrorType {
        let provider_specific = match error.provider {
            ProviderKind::GoogleDrive => Self::classify_drive(error),
            ProviderKind::S3 => Self::match_codes(error, S3_CODES),
            ProviderKind::AzureBlob => Self::match_codes(error, AZURE_CODES),
            ProviderKind::LocalFs | ProviderKind::Other => None,
        };

        provider_specific
            .or_else(|| Self::classify_auth_status(error))
            .or_else(|| Self::classify_message(error))
            .or_else(|| error.http_status.and_then(Self::classify_status))
            .unwrap_or(ErrorType::UnknownError)
    }

    /// Classifies a raw provider error and bundles the type's metadata.
    #[must_use]
    pub fn classify_detailed(error: &RawProviderError) -> ErrorClassification {
        let error_type = Self::classify(error);
        ErrorClassification {
            error_type,
            severity: error_type.severity(),
            recoverable: error_type.is_recoverable(),
            requires_user_intervention: error_type.requires_user_intervention(),
            user_message: error_type.user_message().to_string(),
            provider: error.provider,
            technical_message: error.message.clone(),
        }
    }

    /// Drive-like providers: reasons first, then folder and file hints.
    fn classify_drive(error: &RawProviderError) -> Option<ErrorType> {
        if let Some(error_type) = Self::match_codes(error, DRIVE_REASONS) {
            return Some(error_type);
        }

        let text = error.haystack();
        if text.contains("invalid_client") {
            return Some(ErrorType::InvalidCredentials);
        }
        // Drive answers 401 "Invalid Credentials" for an expired access token.
        if error.http_status == Some(401) || text.contains("invalid_grant") {
            return Some(ErrorType::TokenExpired);
        }
        if matches!(error.http_status, Some(403 | 404)) && text.contains("folder") {
            return Some(ErrorType::FolderAccessDenied);
        }
        if error.http_status == Some(404) {
            return Some(ErrorType::FileNotFound);
        }
        None
    }

    /// HTTP 401 is a token problem for OAuth providers and a credential problem otherwise.
    fn classify_auth_status(error: &RawProviderError) -> Option<ErrorType> {
        if error.http_status != Some(401) {
            return None;
        }
        let text = error.haystack();
        if text.contains("invalid_client") || (!error.provider.uses_oauth() && !text.contains("expired")) {
            return Some(ErrorType::InvalidCredentials);
        }
        Some(ErrorType::TokenExpired)
    }

    fn classify_message(error: &RawProviderError) -> Option<ErrorType> {
        let text = error.haystack();
        MESSAGE_RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| text.contains(n)))
            .map(|(_, error_type)| *error_type)
    }

    /// Maps a bare HTTP status to an error type.
    #[must_use]
    pub fn classify_status(status: u16) -> Option<ErrorType> {
        match status {
            400 | 409 | 412 | 416 | 422 => Some(ErrorType::InvalidParameter),
            401 => Some(ErrorType::InvalidCredentials),
            403 => Some(ErrorType::InsufficientPermissions),
            404 | 410 => Some(ErrorType::FileNotFound),
            408 => Some(ErrorType::Timeout),
            413 => Some(ErrorType::FileTooLarge),
            415 => Some(ErrorType::InvalidFileType),
            429 => Some(ErrorType::ApiQuotaExceeded),
            501 => Some(ErrorType::FeatureNotSupported),
            507 => Some(ErrorType::StorageQuotaExceeded),
            500..=599 => Some(ErrorType::ServiceUnavailable),
            _ => None,
        }
    }

    fn match_codes(error: &RawProviderError, table: &[(&str, ErrorType)]) -> Option<ErrorType> {
        table
            .iter()
            .find(|(code, _)| error.mentions_code(code))
            .map(|(_, error_type)| *error_type)
    }
}
