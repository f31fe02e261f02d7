//! Universal cloud storage error categories.
//!
//! Every provider failure is reduced to one [`ErrorType`]. The metadata
//! attached to each variant (severity, recoverability, whether the user has to
//! act) is defined by exhaustive `match` tables, so adding a variant without
//! classifying it does not compile.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Affects a single operation; the connection is fine.
    Low,
    /// Degrades the connection temporarily.
    Medium,
    /// Breaks the connection until something changes.
    High,
}

impl Severity {
    /// Returns the string representation of the severity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Universal error category for generic cloud storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Access token expired; a refresh should fix it.
    TokenExpired,
    /// Credentials rejected outright.
    InvalidCredentials,
    /// Authenticated but not allowed to perform the operation.
    InsufficientPermissions,
    /// Provider API request quota exhausted.
    ApiQuotaExceeded,
    /// Account storage space exhausted.
    StorageQuotaExceeded,
    /// Connection-level failure (DNS, refused, reset).
    NetworkError,
    /// Request did not complete in time.
    Timeout,
    /// Provider returned a 5xx or reported itself unavailable.
    ServiceUnavailable,
    /// Transfer aborted mid-stream.
    UploadInterrupted,
    /// Uploaded content did not match its checksum.
    ChecksumMismatch,
    /// Target file does not exist.
    FileNotFound,
    /// Destination folder missing or not accessible.
    FolderAccessDenied,
    /// File type rejected by the provider.
    InvalidFileType,
    /// File exceeds the provider's size limit.
    FileTooLarge,
    /// File content rejected by the provider.
    InvalidFileContent,
    /// Configured bucket does not exist.
    BucketNotFound,
    /// Configured bucket exists but denies access.
    BucketAccessDenied,
    /// Configured bucket name is invalid.
    InvalidBucketName,
    /// Configured region is invalid for the bucket.
    InvalidRegion,
    /// Configured blob container does not exist.
    ContainerNotFound,
    /// Access key id unknown to the provider.
    InvalidAccessKey,
    /// Request signature rejected (wrong secret key).
    SignatureMismatch,
    /// Provider account suspended or disabled.
    AccountDisabled,
    /// No provider has been configured for the user.
    ProviderNotConfigured,
    /// Provider client could not be built from its configuration.
    ProviderInitializationFailed,
    /// Operation not supported by this provider.
    FeatureNotSupported,
    /// Request parameter rejected by the provider.
    InvalidParameter,
    /// Nothing more specific matched.
    UnknownError,
}

impl ErrorType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 28] = [
        Self::TokenExpired,
        Self::InvalidCredentials,
        Self::InsufficientPermissions,
        Self::ApiQuotaExceeded,
        Self::StorageQuotaExceeded,
        Self::NetworkError,
        Self::Timeout,
        Self::ServiceUnavailable,
        Self::UploadInterrupted,
        Self::ChecksumMismatch,
        Self::FileNotFound,
        Self::FolderAccessDenied,
        Self::InvalidFileType,
        Self::FileTooLarge,
        Self::InvalidFileContent,
        Self::BucketNotFound,
        Self::BucketAccessDenied,
        Self::InvalidBucketName,
        Self::InvalidRegion,
        Self::ContainerNotFound,
        Self::InvalidAccessKey,
        Self::SignatureMismatch,
        Self::AccountDisabled,
        Self::ProviderNotConfigured,
        Self::ProviderInitializationFailed,
        Self::FeatureNotSupported,
        Self::InvalidParameter,
        Self::UnknownError,
    ];

    /// Returns the string representation of the error type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenExpired => "token_expired",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::ApiQuotaExceeded => "api_quota_exceeded",
            Self::StorageQuotaExceeded => "storage_quota_exceeded",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::ServiceUnavailable => "service_unavailable",
            Self::UploadInterrupted => "upload_interrupted",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::FileNotFound => "file_not_found",
            Self::FolderAccessDenied => "folder_access_denied",
            Self::InvalidFileType => "invalid_file_type",
            Self::FileTooLarge => "file_too_large",
            Self::InvalidFileContent => "invalid_file_content",
            Self::BucketNotFound => "bucket_not_found",
            Self::BucketAccessDenied => "bucket_access_denied",
            Self::InvalidBucketName => "invalid_bucket_name",
            Self::InvalidRegion => "invalid_region",
            Self::ContainerNotFound => "container_not_found",
            Self::InvalidAccessKey => "invalid_access_key",
            Self::SignatureMismatch => "signature_mismatch",
            Self::AccountDisabled => "account_disabled",
            Self::ProviderNotConfigured => "provider_not_configured",
            Self::ProviderInitializationFailed => "provider_initialization_failed",
            Self::FeatureNotSupported => "feature_not_supported",
            Self::InvalidParameter => "invalid_parameter",
            Self::UnknownError => "unknown_error",
        }
    }

    /// Parses an error type from its string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == needle)
    }

    /// Returns the severity of this error type.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidFileType
            | Self::FileTooLarge
            | Self::InvalidFileContent
            | Self::Timeout
            | Self::UploadInterrupted
            | Self::FileNotFound => Severity::Low,

            Self::TokenExpired
            | Self::ApiQuotaExceeded
            | Self::NetworkError
            | Self::ServiceUnavailable
            | Self::ChecksumMismatch
            | Self::FeatureNotSupported
            | Self::InvalidParameter
            | Self::UnknownError => Severity::Medium,

            Self::InvalidCredentials
            | Self::InsufficientPermissions
            | Self::StorageQuotaExceeded
            | Self::FolderAccessDenied
            | Self::BucketNotFound
            | Self::BucketAccessDenied
            | Self::InvalidBucketName
            | Self::InvalidRegion
            | Self::ContainerNotFound
            | Self::InvalidAccessKey
            | Self::SignatureMismatch
            | Self::AccountDisabled
            | Self::ProviderNotConfigured
            | Self::ProviderInitializationFailed => Severity::High,
        }
    }

    /// Returns true if the operation may succeed when attempted again.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::TokenExpired
            | Self::ApiQuotaExceeded
            | Self::NetworkError
            | Self::Timeout
            | Self::ServiceUnavailable
            | Self::UploadInterrupted
            | Self::ChecksumMismatch
            | Self::UnknownError => true,

            Self::InvalidCredentials
            | Self::InsufficientPermissions
            | Self::StorageQuotaExceeded
            | Self::FileNotFound
            | Self::FolderAccessDenied
            | Self::InvalidFileType
            | Self::FileTooLarge
            | Self::InvalidFileContent
            | Self::BucketNotFound
            | Self::BucketAccessDenied
            | Self::InvalidBucketName
            | Self::InvalidRegion
            | Self::ContainerNotFound
            | Self::InvalidAccessKey
            | Self::SignatureMismatch
            | Self::AccountDisabled
            | Self::ProviderNotConfigured
            | Self::ProviderInitializationFailed
            | Self::FeatureNotSupported
            | Self::InvalidParameter => false,
        }
    }

    /// Returns true if only the connection owner can resolve the error.
    ///
    /// `TokenExpired` is not in this set: it is recovered automatically by
    /// refreshing the token.
    #[must_use]
    pub fn requires_user_intervention(&self) -> bool {
        match self {
            Self::InvalidCredentials
            | Self::InsufficientPermissions
            | Self::StorageQuotaExceeded
            | Self::FolderAccessDenied
            | Self::BucketNotFound
            | Self::BucketAccessDenied
            | Self::InvalidBucketName
            | Self::InvalidRegion
            | Self::ContainerNotFound
            | Self::InvalidAccessKey
            | Self::SignatureMismatch
            | Self::AccountDisabled
            | Self::ProviderNotConfigured
            | Self::ProviderInitializationFailed => true,

            Self::TokenExpired
            | Self::ApiQuotaExceeded
            | Self::NetworkError
            | Self::Timeout
            | Self::ServiceUnavailable
            | Self::UploadInterrupted
            | Self::ChecksumMismatch
            | Self::FileNotFound
            | Self::InvalidFileType
            | Self::FileTooLarge
            | Self::InvalidFileContent
            | Self::FeatureNotSupported
            | Self::InvalidParameter
            | Self::UnknownError => false,
        }
    }

    /// Returns true for authentication failures that end the connection.
    #[must_use]
    pub fn is_terminal_auth_failure(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::AccountDisabled)
    }

    /// Returns true for errors that concern the access token itself.
    #[must_use]
    pub fn is_token_related(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::InvalidCredentials)
    }

    /// Returns a message suitable for showing to the connection owner.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TokenExpired => "Your storage connection needs to be refreshed. This usually happens automatically.",
            Self::InvalidCredentials => "Your storage credentials were rejected. Please reconnect your account.",
            Self::InsufficientPermissions => "The storage account does not grant the permissions needed to upload files.",
            Self::ApiQuotaExceeded => "The storage provider is limiting requests. Uploads will resume automatically.",
            Self::StorageQuotaExceeded => "Your storage account is full. Free up space or upgrade your plan.",
            Self::NetworkError => "A network problem interrupted the connection. Retrying automatically.",
            Self::Timeout => "The storage provider took too long to respond. Retrying automatically.",
            Self::ServiceUnavailable => "The storage provider is temporarily unavailable. Retrying automatically.",
            Self::UploadInterrupted => "The upload was interrupted. Retrying automatically.",
            Self::ChecksumMismatch => "The uploaded file was corrupted in transit. Retrying automatically.",
            Self::FileNotFound => "The file could not be found in storage.",
            Self::FolderAccessDenied => "The destination folder is not accessible. Check the folder's sharing settings.",
            Self::InvalidFileType => "This file type is not accepted by the storage provider.",
            Self::FileTooLarge => "The file exceeds the storage provider's size limit.",
            Self::InvalidFileContent => "The file content was rejected by the storage provider.",
            Self::BucketNotFound => "The configured bucket does not exist. Check your storage settings.",
            Self::BucketAccessDenied => "Access to the configured bucket was denied. Check its access policy.",
            Self::InvalidBucketName => "The configured bucket name is invalid.",
            Self::InvalidRegion => "The configured region does not match the bucket.",
            Self::ContainerNotFound => "The configured container does not exist. Check your storage settings.",
            Self::InvalidAccessKey => "The configured access key is not recognized by the provider.",
            Self::SignatureMismatch => "The configured secret key is incorrect.",
            Self::AccountDisabled => "The storage account has been disabled by the provider.",
            Self::ProviderNotConfigured => "No storage provider has been configured yet.",
            Self::ProviderInitializationFailed => "The storage provider could not be initialized. Check your storage settings.",
            Self::FeatureNotSupported => "This operation is not supported by the storage provider.",
            Self::InvalidParameter => "The storage provider rejected the request.",
            Self::UnknownError => "An unexpected storage error occurred.",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
