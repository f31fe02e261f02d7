//! Raw provider errors as produced by the provider I/O layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider family, used to select classification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OAuth-based hierarchical store (Google Drive and similar).
    GoogleDrive,
    /// S3-compatible key-based store: AWS S3, Cloudflare R2, Supabase, DigitalOcean Spaces.
    S3,
    /// Azure Blob Storage.
    AzureBlob,
    /// Local filesystem (development only).
    LocalFs,
    /// Any other provider; only generic rules apply.
    Other,
}

impl ProviderKind {
    /// Returns the string representation of the provider kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleDrive => "google_drive",
            Self::S3 => "s3",
            Self::AzureBlob => "azure_blob",
            Self::LocalFs => "local",
            Self::Other => "other",
        }
    }

    /// Parses a provider kind from a string. Unknown names map to `Other`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "google_drive" | "google-drive" | "gdrive" => Self::GoogleDrive,
            "s3" | "amazon_s3" | "r2" => Self::S3,
            "azure_blob" | "azblob" | "azure" => Self::AzureBlob,
            "local" | "local_fs" | "fs" => Self::LocalFs,
            _ => Self::Other,
        }
    }

    /// Returns true for providers authenticated with expiring OAuth tokens.
    #[must_use]
    pub fn uses_oauth(&self) -> bool {
        matches!(self, Self::GoogleDrive)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An unclassified failure reported by a provider.
///
/// Only `message` is mandatory. `http_status`, `code` (SDK or wire error
/// code such as `NoSuchBucket` or `invalid_grant`) and `reason` (Drive-style
/// error reason such as `userRateLimitExceeded`) are filled in when the
/// provider exposes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProviderError {
    /// Provider that produced the error.
    pub provider: ProviderKind,
    /// Error message.
    pub message: String,
    /// HTTP status code, if any.
    pub http_status: Option<u16>,
    /// Provider or SDK error code, if any.
    pub code: Option<String>,
    /// Provider-specific reason, if any.
    pub reason: Option<String>,
}

impl RawProviderError {
    /// Creates a raw error with only a message.
    #[must_use]
    pub fn new(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
            http_status: None,
            code: None,
            reason: None,
        }
    }

    /// Sets the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Sets the provider error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the provider-specific reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Builds a raw error from an OpenDAL error.
    ///
    /// OpenDAL normalizes provider failures into error kinds; the kind is
    /// mapped back to the equivalent HTTP status so that the status rules of
    /// the classifier apply, and the full message (which embeds the provider's
    /// own error code) is kept for the message rules.
    #[must_use]
    pub fn from_opendal(provider: ProviderKind, err: &opendal::Error) -> Self {
        use opendal::ErrorKind;

        let raw = Self::new(provider, err.to_string()).with_code(err.kind().to_string());
        match err.kind() {
            ErrorKind::NotFound => raw.with_status(404),
            ErrorKind::PermissionDenied => raw.with_status(403),
            ErrorKind::RateLimited => raw.with_status(429),
            ErrorKind::AlreadyExists => raw.with_status(409),
            ErrorKind::ConditionNotMatch => raw.with_status(412),
            ErrorKind::RangeNotSatisfied => raw.with_status(416),
            ErrorKind::Unsupported => raw.with_status(501),
            ErrorKind::Unexpected if err.is_temporary() => raw.with_status(503),
            _ => raw,
        }
    }

    /// Returns the lowercased message, code and reason joined for substring matching.
    pub(crate) fn haystack(&self) -> String {
        let mut text = self.message.to_lowercase();
        for extra in [&self.code, &self.reason].into_iter().flatten() {
            text.push(' ');
            text.push_str(&extra.to_lowercase());
        }
        text
    }

    /// Returns true if the code or message mentions `code`, compared case-insensitively.
    pub(crate) fn mentions_code(&self, code: &str) -> bool {
        let code = code.to_lowercase();
        self.code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(&code))
            || self.reason
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(&code))
            || self.message.to_lowercase().contains(&code)
    }
}

impl fmt::Display for RawProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.provider)?;
        if let Some(status) = self.http_status {
            write!(f, " {status}")?;
        }
        if let Some(code) = &self.code {
            write!(f, " {code}")?;
        }
        write!(f, ": {}", self.message)
    }
}
