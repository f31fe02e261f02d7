//! Point-in-time connection health snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uplink_shared::types::UserId;

use crate::taxonomy::{ErrorType, ProviderKind};

/// Health of a user's connection to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// The last operation succeeded.
    Healthy,
    /// Recent failures, still below the unhealthy threshold.
    Degraded,
    /// Failures at or above the threshold.
    Unhealthy,
    /// Credentials are gone; the user must reconnect.
    Disconnected,
}

impl HealthState {
    /// Returns the string representation of the health state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Disconnected => "disconnected",
        }
    }

    /// Parses a health state from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "healthy" => Some(Self::Healthy),
            "degraded" => Some(Self::Degraded),
            "unhealthy" => Some(Self::Unhealthy),
            "disconnected" => Some(Self::Disconnected),
            _ => None,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of one connection's health at `checked_at`.
///
/// Snapshots are values: transitions build a new snapshot instead of
/// mutating the old one (see [`HealthTracker`](super::HealthTracker)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudStorageHealthStatus {
    /// Connection owner, when known.
    pub user_id: Option<UserId>,
    /// Provider the connection points at.
    pub provider: ProviderKind,
    /// Current state.
    pub status: HealthState,
    /// Failed operations since the last success.
    pub consecutive_failures: u32,
    /// Message of the most recent failure.
    pub last_error_message: Option<String>,
    /// Classification of the most recent failure.
    pub last_error_type: Option<ErrorType>,
    /// Time of the most recent successful operation.
    pub last_successful_operation_at: Option<DateTime<Utc>>,
    /// Expiry of the current access token, if the provider uses tokens.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// When this snapshot was taken.
    pub checked_at: DateTime<Utc>,
}

impl CloudStorageHealthStatus {
    fn base(provider: ProviderKind, status: HealthState) -> Self {
        Self {
            user_id: None,
            provider,
            status,
            consecutive_failures: 0,
            last_error_message: None,
            last_error_type: None,
            last_successful_operation_at: None,
            token_expires_at: None,
            checked_at: Utc::now(),
        }
    }

    /// A healthy connection whose last success was at `last_success`.
    #[must_use]
    pub fn healthy(provider: ProviderKind, last_success: DateTime<Utc>) -> Self {
        Self {
            last_successful_operation_at: Some(last_success),
            ..Self::base(provider, HealthState::Healthy)
        }
    }

    /// A connection with failures below the unhealthy threshold.
    #[must_use]
    pub fn degraded(provider: ProviderKind, failures: u32, message: impl Into<String>) -> Self {
        Self {
            consecutive_failures: failures,
            last_error_message: Some(message.into()),
            ..Self::base(provider, HealthState::Degraded)
        }
    }

    /// A connection with `failures` consecutive failures.
    #[must_use]
    pub fn unhealthy(provider: ProviderKind, failures: u32, message: impl Into<String>) -> Self {
        Self {
            consecutive_failures: failures,
            last_error_message: Some(message.into()),
            ..Self::base(provider, HealthState::Unhealthy)
        }
    }

    /// A connection without usable credentials.
    #[must_use]
    pub fn disconnected(provider: ProviderKind) -> Self {
        Self::base(provider, HealthState::Disconnected)
    }

    /// Sets the connection owner.
    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the access token expiry.
    #[must_use]
    pub fn with_token_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.token_expires_at = Some(expires_at);
        self
    }

    /// Sets the classification of the last failure.
    #[must_use]
    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.last_error_type = Some(error_type);
        self
    }

    /// Sets the time of the last successful operation.
    #[must_use]
    pub fn with_last_success(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_successful_operation_at = at;
        self
    }

    /// Overrides the snapshot time.
    #[must_use]
    pub fn with_checked_at(mut self, at: DateTime<Utc>) -> Self {
        self.checked_at = at;
        self
    }

    /// Returns true if the connection is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }

    /// Returns true if the connection is degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.status == HealthState::Degraded
    }

    /// Returns true if the connection is unhealthy.
    #[must_use]
    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthState::Unhealthy
    }

    /// Returns true if the connection has no usable credentials.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.status == HealthState::Disconnected
    }

    /// Returns true if the token expires within `window` of `now`, or already has.
    #[must_use]
    pub fn is_token_expiring_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|expires_at| {
            now.checked_add_signed(window)
                .is_none_or(|limit| expires_at <= limit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_state() {
        let now = Utc::now();

        let healthy = CloudStorageHealthStatus::healthy(ProviderKind::S3, now);
        assert!(healthy.is_healthy());
        assert_eq!(healthy.consecutive_failures, 0);
        assert_eq!(healthy.last_successful_operation_at, Some(now));

        let unhealthy = CloudStorageHealthStatus::unhealthy(ProviderKind::S3, 4, "timeout");
        assert!(unhealthy.is_unhealthy());
        assert!(!unhealthy.is_healthy());
        assert_eq!(unhealthy.consecutive_failures, 4);
        assert_eq!(unhealthy.last_error_message.as_deref(), Some("timeout"));

        let degraded = CloudStorageHealthStatus::degraded(ProviderKind::AzureBlob, 1, "busy");
        assert!(degraded.is_degraded());

        let disconnected = CloudStorageHealthStatus::disconnected(ProviderKind::GoogleDrive);
        assert!(disconnected.is_disconnected());
        assert!(disconnected.last_error_message.is_none());
    }

    #[test]
    fn test_token_expiry_window() {
        let now = Utc::now();
        let status = CloudStorageHealthStatus::healthy(ProviderKind::GoogleDrive, now)
            .with_token_expiry(now + Duration::minutes(30));

        assert!(status.is_token_expiring_within(Duration::hours(1), now));
        assert!(!status.is_token_expiring_within(Duration::minutes(10), now));

        let no_token = CloudStorageHealthStatus::healthy(ProviderKind::S3, now);
        assert!(!no_token.is_token_expiring_within(Duration::hours(1), now));
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(HealthState::parse("Degraded"), Some(HealthState::Degraded));
        assert_eq!(HealthState::parse("sick"), None);
        assert_eq!(HealthState::Disconnected.to_string(), "disconnected");
    }
}
