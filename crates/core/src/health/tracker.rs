//! Connection health transitions.

use chrono::{DateTime, Utc};
use tracing::info;
use uplink_shared::HealthConfig;

use super::status::{CloudStorageHealthStatus, HealthState};
use crate::taxonomy::ErrorType;

/// Applies operation outcomes to health snapshots.
///
/// Transitions:
/// - success: healthy, failures reset;
/// - failure: failures + 1, degraded below the threshold, unhealthy at or above it;
/// - terminal auth failure or explicit disconnect: disconnected.
///
/// A disconnected connection ignores later outcomes until
/// [`record_reauthenticated`](Self::record_reauthenticated).
#[derive(Debug, Clone, Copy)]
pub struct HealthTracker {
    failure_threshold: u32,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(&HealthConfig::default())
    }
}

impl HealthTracker {
    /// Creates a tracker using the configured failure threshold.
    #[must_use]
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
        }
    }

    /// Consecutive failures at which a connection becomes unhealthy.
    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Applies a successful operation.
    #[must_use]
    pub fn record_success(
        &self,
        current: &CloudStorageHealthStatus,
        at: DateTime<Utc>,
    ) -> CloudStorageHealthStatus {
        if current.is_disconnected() {
            return current.clone().with_checked_at(at);
        }

        let next = CloudStorageHealthStatus {
            status: HealthState::Healthy,
            consecutive_failures: 0,
            last_error_message: None,
            last_error_type: None,
            last_successful_operation_at: Some(at),
            checked_at: at,
            ..current.clone()
        };
        log_transition(current, &next);
        next
    }

    /// Applies a failed operation.
    #[must_use]
    pub fn record_failure(
        &self,
        current: &CloudStorageHealthStatus,
        error_type: ErrorType,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> CloudStorageHealthStatus {
        if current.is_disconnected() {
            return current.clone().with_checked_at(at);
        }

        let failures = current.consecutive_failures.saturating_add(1);
        let status = if error_type.is_terminal_auth_failure() {
            HealthState::Disconnected
        } else if failures >= self.failure_threshold {
            HealthState::Unhealthy
        } else {
            HealthState::Degraded
        };

        let next = CloudStorageHealthStatus {
            status,
            consecutive_failures: failures,
            last_error_message: Some(message.into()),
            last_error_type: Some(error_type),
            checked_at: at,
            ..current.clone()
        };
        log_transition(current, &next);
        next
    }

    /// Marks the connection as disconnected, e.g. after the user revoked access.
    #[must_use]
    pub fn record_disconnect(
        &self,
        current: &CloudStorageHealthStatus,
        at: DateTime<Utc>,
    ) -> CloudStorageHealthStatus {
        let next = CloudStorageHealthStatus {
            status: HealthState::Disconnected,
            checked_at: at,
            ..current.clone()
        };
        log_transition(current, &next);
        next
    }

    /// Applies a fresh authorization: healthy again with a clean failure count.
    #[must_use]
    pub fn record_reauthenticated(
        &self,
        current: &CloudStorageHealthStatus,
        token_expires_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> CloudStorageHealthStatus {
        let next = CloudStorageHealthStatus {
            status: HealthState::Healthy,
            consecutive_failures: 0,
            last_error_message: None,
            last_error_type: None,
            last_successful_operation_at: Some(at),
            token_expires_at: token_expires_at.or(current.token_expires_at),
            checked_at: at,
            ..current.clone()
        };
        log_transition(current, &next);
        next
    }
}

fn log_transition(previous: &CloudStorageHealthStatus, next: &CloudStorageHealthStatus) {
    if previous.status != next.status {
        info!(
            user_id = ?next.user_id,
            provider = %next.provider,
            from = %previous.status,
            to = %next.status,
            consecutive_failures = next.consecutive_failures,
            "Connection health changed"
        );
    }
}
