//! Retry policy engine.
//!
//! The engine separates the policy decision (`should_retry`) from the timing
//! (`retry_delay`), so callers can pre-compute a schedule without running it.
//! It never sleeps: blocking callers sleep themselves, job schedulers defer by
//! the returned delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uplink_shared::RetryConfig;

use crate::taxonomy::ErrorType;

/// Delay function for one error family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// No delay.
    None,
    /// The same delay for every attempt.
    Fixed {
        /// Delay in seconds.
        secs: u64,
    },
    /// `step * attempt`, capped.
    Linear {
        /// Step in seconds.
        step_secs: u64,
        /// Cap in seconds.
        max_secs: u64,
    },
    /// `base * 2^(attempt - 1)`, capped.
    Exponential {
        /// First delay in seconds.
        base_secs: u64,
        /// Cap in seconds.
        max_secs: u64,
    },
}

impl Backoff {
    /// Returns the delay in seconds before the given 1-based attempt.
    #[must_use]
    pub fn delay_secs(&self, attempt: u32) -> u64 {
        let attempt = attempt.max(1);
        match *self {
            Self::None => 0,
            Self::Fixed { secs } => secs,
            Self::Linear { step_secs, max_secs } => {
                step_secs.saturating_mul(u64::from(attempt)).min(max_secs)
            }
            Self::Exponential {
                base_secs,
                max_secs,
            } => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                base_secs.saturating_mul(factor).min(max_secs)
            }
        }
    }
}

/// Delay function and attempt budget for one error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRule {
    /// Delay function.
    pub backoff: Backoff,
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
}

impl RetryRule {
    /// A rule that never retries.
    pub const NEVER: Self = Self {
        backoff: Backoff::None,
        max_attempts: 0,
    };
}

/// When a failure should become visible to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationUrgency {
    /// Notify right away; retrying cannot help.
    Immediate,
    /// Stay silent while retries remain; notify once they are exhausted.
    AfterRetriesExhausted,
}

/// An error taxonomy the retry engine can reason about.
///
/// Implemented by [`ErrorType`] for generic cloud operations and by
/// [`TokenRefreshErrorType`](crate::taxonomy::TokenRefreshErrorType) for the
/// token refresh path.
pub trait Retryable: Copy {
    /// Whether retrying may succeed at all.
    fn is_recoverable(&self) -> bool;

    /// Whether only the connection owner can resolve it.
    fn requires_user_intervention(&self) -> bool;

    /// Delay function and attempt budget under the given timing configuration.
    fn retry_rule(&self, config: &RetryConfig) -> RetryRule;

    /// When a failure of this type should reach the user.
    fn notification_urgency(&self) -> NotificationUrgency;

    /// Stable code for logs.
    fn code(&self) -> &'static str;
}

impl Retryable for ErrorType {
    fn is_recoverable(&self) -> bool {
        ErrorType::is_recoverable(self)
    }

    fn requires_user_intervention(&self) -> bool {
        ErrorType::requires_user_intervention(self)
    }

    fn retry_rule(&self, config: &RetryConfig) -> RetryRule {
        if !ErrorType::is_recoverable(self) {
            return RetryRule::NEVER;
        }
        match self {
            Self::NetworkError | Self::Timeout | Self::UploadInterrupted | Self::ChecksumMismatch => {
                RetryRule {
                    backoff: exponential(config),
                    max_attempts: config.network_max_attempts,
                }
            }
            Self::ApiQuotaExceeded => RetryRule {
                backoff: Backoff::Fixed {
                    secs: config.quota_delay_secs,
                },
                max_attempts: config.quota_max_attempts,
            },
            Self::ServiceUnavailable => RetryRule {
                backoff: linear(config),
                max_attempts: config.service_max_attempts,
            },
            // One immediate retry once the token has been refreshed.
            Self::TokenExpired => RetryRule {
                backoff: Backoff::None,
                max_attempts: 1,
            },
            _ => RetryRule {
                backoff: exponential(config),
                max_attempts: config.unknown_max_attempts,
            },
        }
    }

    fn notification_urgency(&self) -> NotificationUrgency {
        if ErrorType::requires_user_intervention(self) || !ErrorType::is_recoverable(self) {
            NotificationUrgency::Immediate
        } else {
            NotificationUrgency::AfterRetriesExhausted
        }
    }

    fn code(&self) -> &'static str {
        self.as_str()
    }
}

pub(crate) fn exponential(config: &RetryConfig) -> Backoff {
    Backoff::Exponential {
        base_secs: config.exponential_base_secs,
        max_secs: config.exponential_max_secs,
    }
}

pub(crate) fn linear(config: &RetryConfig) -> Backoff {
    Backoff::Linear {
        step_secs: config.service_step_secs,
        max_secs: config.service_max_secs,
    }
}

/// Why a failure is surfaced instead of retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceReason {
    /// Only the connection owner can fix it.
    UserInterventionRequired,
    /// Retrying cannot succeed.
    NotRecoverable,
    /// Every allowed attempt has been used.
    AttemptsExhausted,
}

/// Outcome of consulting the engine after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// The attempt about to be made (1-based).
        attempt: u32,
        /// How long to wait first.
        delay: Duration,
    },
    /// Stop and surface the failure.
    Surface {
        /// Why retrying stopped.
        reason: SurfaceReason,
        /// How urgently to notify.
        urgency: NotificationUrgency,
    },
}

impl RetryDecision {
    /// Returns true if the caller should try again.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

/// Retry policy engine configured once at construction.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from timing configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the timing configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the rule applied to `error_type`.
    #[must_use]
    pub fn rule<T: Retryable>(&self, error_type: T) -> RetryRule {
        error_type.retry_rule(&self.config)
    }

    /// Maximum number of retry attempts for `error_type`.
    #[must_use]
    pub fn max_attempts<T: Retryable>(&self, error_type: T) -> u32 {
        self.rule(error_type).max_attempts
    }

    /// Delay before the given 1-based retry attempt.
    ///
    /// Computed even when `should_retry` would refuse the attempt.
    #[must_use]
    pub fn retry_delay<T: Retryable>(&self, error_type: T, attempt: u32) -> Duration {
        Duration::from_secs(self.rule(error_type).backoff.delay_secs(attempt))
    }

    /// Whether the given 1-based retry attempt may be made.
    #[must_use]
    pub fn should_retry<T: Retryable>(&self, error_type: T, attempt: u32) -> bool {
        error_type.is_recoverable() && attempt >= 1 && attempt <= self.max_attempts(error_type)
    }

    /// The full delay schedule: one entry per allowed attempt.
    #[must_use]
    pub fn schedule<T: Retryable>(&self, error_type: T) -> Vec<Duration> {
        if !error_type.is_recoverable() {
            return Vec::new();
        }
        (1..=self.max_attempts(error_type))
            .map(|attempt| self.retry_delay(error_type, attempt))
            .collect()
    }

    /// Decides what to do before the given 1-based retry attempt.
    #[must_use]
    pub fn decide<T: Retryable>(&self, error_type: T, attempt: u32) -> RetryDecision {
        if self.should_retry(error_type, attempt) {
            return RetryDecision::Retry {
                attempt,
                delay: self.retry_delay(error_type, attempt),
            };
        }

        let reason = if error_type.requires_user_intervention() {
            SurfaceReason::UserInterventionRequired
        } else if !error_type.is_recoverable() {
            SurfaceReason::NotRecoverable
        } else {
            SurfaceReason::AttemptsExhausted
        };

        RetryDecision::Surface {
            reason,
            urgency: error_type.notification_urgency(),
        }
    }
}
