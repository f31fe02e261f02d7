//! Failure taxonomy for the token refresh path.

use serde::{Deserialize, Serialize};
use std::fmt;
use uplink_shared::RetryConfig;

use super::raw::RawProviderError;
use crate::recovery::retry::{self, NotificationUrgency, RetryRule, Retryable};

/// Why a token refresh failed.
///
/// Disjoint from [`ErrorType`](super::ErrorType): the refresh path has its own
/// retry budget and never reports file-level conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRefreshErrorType {
    /// The token endpoint could not be reached in time.
    NetworkTimeout,
    /// The refresh token was rejected.
    InvalidRefreshToken,
    /// The refresh token expired or was revoked.
    ExpiredRefreshToken,
    /// Too many refresh requests against the provider.
    ApiQuotaExceeded,
    /// The token endpoint is down.
    ServiceUnavailable,
    /// Anything else.
    UnknownError,
}

impl TokenRefreshErrorType {
    /// Every variant.
    pub const ALL: [Self; 6] = [
        Self::NetworkTimeout,
        Self::InvalidRefreshToken,
        Self::ExpiredRefreshToken,
        Self::ApiQuotaExceeded,
        Self::ServiceUnavailable,
        Self::UnknownError,
    ];

    /// Returns the string representation of the refresh error type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network_timeout",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::ExpiredRefreshToken => "expired_refresh_token",
            Self::ApiQuotaExceeded => "api_quota_exceeded",
            Self::ServiceUnavailable => "service_unavailable",
            Self::UnknownError => "unknown_error",
        }
    }

    /// Parses a refresh error type from its code.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let code = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == code)
    }

    /// Whether a later refresh attempt may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !self.requires_user_intervention()
    }

    /// Whether the user has to reconnect the provider.
    #[must_use]
    pub fn requires_user_intervention(&self) -> bool {
        matches!(self, Self::InvalidRefreshToken | Self::ExpiredRefreshToken)
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Network timeout while contacting the token endpoint",
            Self::InvalidRefreshToken => "Refresh token is invalid; the account must be reconnected",
            Self::ExpiredRefreshToken => {
                "Refresh token has expired or was revoked; the account must be reconnected"
            }
            Self::ApiQuotaExceeded => "Provider API quota exceeded; refresh will be retried later",
            Self::ServiceUnavailable => "Token service is temporarily unavailable",
            Self::UnknownError => "Unexpected error during token refresh",
        }
    }

    /// Classifies a failed refresh call.
    ///
    /// OAuth error codes win over HTTP status, so a `400 invalid_grant` is a
    /// token problem rather than a bad request.
    #[must_use]
    pub fn from_raw(error: &RawProviderError) -> Self {
        let text = error.haystack();

        if text.contains("invalid_grant") {
            if text.contains("expired") || text.contains("revoked") {
                return Self::ExpiredRefreshToken;
            }
            return Self::InvalidRefreshToken;
        }
        if text.contains("invalid_client") || text.contains("unauthorized_client") {
            return Self::InvalidRefreshToken;
        }
        if text.contains("timeout")
            || text.contains("timed out")
            || text.contains("connection")
            || text.contains("dns")
        {
            return Self::NetworkTimeout;
        }
        if text.contains("quota") || text.contains("rate limit") || text.contains("ratelimit") {
            return Self::ApiQuotaExceeded;
        }

        match error.http_status {
            Some(401) => Self::InvalidRefreshToken,
            Some(408 | 504) => Self::NetworkTimeout,
            Some(429) => Self::ApiQuotaExceeded,
            Some(500..=599) => Self::ServiceUnavailable,
            _ if text.contains("unavailable") => Self::ServiceUnavailable,
            _ => Self::UnknownError,
        }
    }
}

impl Retryable for TokenRefreshErrorType {
    fn is_recoverable(&self) -> bool {
        TokenRefreshErrorType::is_recoverable(self)
    }

    fn requires_user_intervention(&self) -> bool {
        TokenRefreshErrorType::requires_user_intervention(self)
    }

    fn retry_rule(&self, config: &RetryConfig) -> RetryRule {
        match self {
            Self::NetworkTimeout => RetryRule {
                backoff: retry::exponential(config),
                max_attempts: config.network_max_attempts,
            },
            Self::InvalidRefreshToken | Self::ExpiredRefreshToken => RetryRule::NEVER,
            Self::ApiQuotaExceeded => RetryRule {
                backoff: retry::Backoff::Fixed {
                    secs: config.quota_delay_secs,
                },
                max_attempts: config.quota_max_attempts,
            },
            Self::ServiceUnavailable => RetryRule {
                backoff: retry::linear(config),
                max_attempts: config.service_max_attempts,
            },
            Self::UnknownError => RetryRule {
                backoff: retry::exponential(config),
                max_attempts: config.unknown_max_attempts,
            },
        }
    }

    fn notification_urgency(&self) -> NotificationUrgency {
        if self.requires_user_intervention() {
            NotificationUrgency::Immediate
        } else {
            NotificationUrgency::AfterRetriesExhausted
        }
    }

    fn code(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for TokenRefreshErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
