//! Recovery strategy selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use uplink_shared::HealthConfig;

use crate::health::{CloudStorageHealthStatus, HealthState};
use crate::taxonomy::ErrorType;

/// Recommended remedial action for a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Refresh the access token and retry.
    TokenRefresh,
    /// Retry with exponential backoff.
    NetworkRetry,
    /// Wait for the provider quota to reset.
    QuotaWait,
    /// Retry with linear backoff while the provider recovers.
    ServiceRetry,
    /// Probe the connection before retrying.
    HealthCheckRetry,
    /// The connection owner has to act.
    UserInterventionRequired,
    /// The connection is fine; nothing to recover.
    NoActionNeeded,
    /// No known remedy.
    Unknown,
}

impl RecoveryStrategy {
    /// Every variant, in priority order.
    pub const ALL: [Self; 8] = [
        Self::TokenRefresh,
        Self::NetworkRetry,
        Self::ServiceRetry,
        Self::QuotaWait,
        Self::HealthCheckRetry,
        Self::UserInterventionRequired,
        Self::NoActionNeeded,
        Self::Unknown,
    ];

    /// Returns the string representation of the strategy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenRefresh => "token_refresh",
            Self::NetworkRetry => "network_retry",
            Self::QuotaWait => "quota_wait",
            Self::ServiceRetry => "service_retry",
            Self::HealthCheckRetry => "health_check_retry",
            Self::UserInterventionRequired => "user_intervention_required",
            Self::NoActionNeeded => "no_action_needed",
            Self::Unknown => "unknown",
        }
    }

    /// Execution priority; 1 acts first.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::TokenRefresh => 1,
            Self::NetworkRetry => 2,
            Self::ServiceRetry => 3,
            Self::QuotaWait => 4,
            Self::HealthCheckRetry => 5,
            Self::UserInterventionRequired => 6,
            Self::NoActionNeeded => 7,
            Self::Unknown => 8,
        }
    }

    /// Expected time to recovery in seconds. `-1` means indefinite, `0` immediate.
    #[must_use]
    pub fn expected_recovery_time_secs(&self) -> i64 {
        match self {
            Self::TokenRefresh => 30,
            Self::NetworkRetry => 60,
            Self::ServiceRetry => 300,
            Self::QuotaWait => 3600,
            Self::HealthCheckRetry => 120,
            Self::UserInterventionRequired | Self::Unknown => -1,
            Self::NoActionNeeded => 0,
        }
    }

    /// Whether the system can carry out the strategy on its own.
    #[must_use]
    pub fn is_automated(&self) -> bool {
        !matches!(self, Self::UserInterventionRequired | Self::Unknown)
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the selector knows about the connection besides the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryContext {
    /// Current health state of the connection.
    pub health: HealthState,
    /// Consecutive failed operations so far.
    pub consecutive_failures: u32,
    /// Whether a refresh token is on file.
    pub has_refresh_token: bool,
}

impl RecoveryContext {
    /// Creates a context for a connection in the given state.
    #[must_use]
    pub fn new(health: HealthState) -> Self {
        Self {
            health,
            consecutive_failures: 0,
            has_refresh_token: false,
        }
    }

    /// Builds a context from a health snapshot.
    #[must_use]
    pub fn from_status(status: &CloudStorageHealthStatus, has_refresh_token: bool) -> Self {
        Self {
            health: status.status,
            consecutive_failures: status.consecutive_failures,
            has_refresh_token,
        }
    }

    /// Sets the consecutive failure count.
    #[must_use]
    pub fn with_failures(mut self, consecutive_failures: u32) -> Self {
        self.consecutive_failures = consecutive_failures;
        self
    }

    /// Sets whether a refresh token is on file.
    #[must_use]
    pub fn with_refresh_token(mut self, has_refresh_token: bool) -> Self {
        self.has_refresh_token = has_refresh_token;
        self
    }
}

/// Maps classified errors to recovery strategies.
///
/// Every error type yields one or more candidate strategies. When several
/// apply, the automated candidate with the lowest priority number wins; when
/// none is automated, the first candidate is returned.
#[derive(Debug, Clone, Copy)]
pub struct RecoverySelector {
    failure_threshold: u32,
}

impl Default for RecoverySelector {
    fn default() -> Self {
        Self::new(&HealthConfig::default())
    }
}

impl RecoverySelector {
    /// Creates a selector using the configured failure threshold.
    #[must_use]
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
        }
    }

    /// Selects the strategy for `error_type` in `context`. Total and pure.
    #[must_use]
    pub fn select_strategy(&self, error_type: ErrorType, context: &RecoveryContext) -> RecoveryStrategy {
        let candidates = self.candidates(error_type, context);

        candidates
            .iter()
            .copied()
            .filter(RecoveryStrategy::is_automated)
            .min_by_key(RecoveryStrategy::priority)
            .or_else(|| candidates.first().copied())
            .unwrap_or(RecoveryStrategy::Unknown)
    }

    fn candidates(&self, error_type: ErrorType, context: &RecoveryContext) -> Vec<RecoveryStrategy> {
        let mut candidates = Vec::with_capacity(3);

        if error_type.requires_user_intervention() {
            // Neither a refresh nor another probe can fix rejected credentials,
            // configuration or account problems.
            return vec![RecoveryStrategy::UserInterventionRequired];
        }

        if error_type.is_token_related() {
            candidates.push(if context.has_refresh_token {
                RecoveryStrategy::TokenRefresh
            } else {
                RecoveryStrategy::UserInterventionRequired
            });
        } else {
            candidates.push(match error_type {
                ErrorType::NetworkError
                | ErrorType::Timeout
                | ErrorType::UploadInterrupted
                | ErrorType::ChecksumMismatch => RecoveryStrategy::NetworkRetry,
                ErrorType::ApiQuotaExceeded => RecoveryStrategy::QuotaWait,
                ErrorType::ServiceUnavailable => RecoveryStrategy::ServiceRetry,
                ErrorType::UnknownError => RecoveryStrategy::Unknown,
                // Request-level failures: the connection itself may be fine.
                _ if context.health == HealthState::Healthy => RecoveryStrategy::NoActionNeeded,
                _ => RecoveryStrategy::HealthCheckRetry,
            });
        }

        if context.consecutive_failures >= self.failure_threshold
            && !candidates.contains(&RecoveryStrategy::HealthCheckRetry)
        {
            candidates.push(RecoveryStrategy::HealthCheckRetry);
        }

        candidates
    }
}
