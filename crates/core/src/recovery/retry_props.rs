//! Property-based tests for the retry policy engine.

use proptest::prelude::*;
use std::time::Duration;

use super::retry::{Backoff, RetryDecision, RetryPolicy, Retryable};
use crate::taxonomy::{ErrorType, TokenRefreshErrorType};

fn error_type_strategy() -> impl Strategy<Value = ErrorType> {
    proptest::sample::select(ErrorType::ALL.to_vec())
}

fn refresh_type_strategy() -> impl Strategy<Value = TokenRefreshErrorType> {
    proptest::sample::select(TokenRefreshErrorType::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Attempt 0 and attempts past the budget are never retried.
    #[test]
    fn prop_should_retry_bounds(error_type in error_type_strategy(), attempt in 0u32..50) {
        let policy = RetryPolicy::default();
        let max = policy.max_attempts(error_type);
        let expected = error_type.is_recoverable() && attempt >= 1 && attempt <= max;

        prop_assert_eq!(policy.should_retry(error_type, attempt), expected);
        prop_assert_eq!(policy.decide(error_type, attempt).is_retry(), expected);
    }

    /// Non-recoverable types have no retry budget.
    #[test]
    fn prop_non_recoverable_never_retries(error_type in error_type_strategy()) {
        let policy = RetryPolicy::default();
        if !Retryable::is_recoverable(&error_type) {
            prop_assert_eq!(policy.max_attempts(error_type), 0);
            prop_assert!(policy.schedule(error_type).is_empty());
        }
    }

    /// Delays never exceed the family's cap and never shrink.
    #[test]
    fn prop_delays_are_monotonic_and_capped(error_type in refresh_type_strategy(), attempt in 1u32..40) {
        let policy = RetryPolicy::default();
        let current = policy.retry_delay(error_type, attempt);
        let next = policy.retry_delay(error_type, attempt + 1);

        prop_assert!(next >= current);
        prop_assert!(current <= Duration::from_secs(3600));
    }

    /// Exponential backoff doubles until the cap.
    #[test]
    fn prop_exponential_doubles(base in 1u64..10, max in 10u64..1000, attempt in 1u32..20) {
        let backoff = Backoff::Exponential { base_secs: base, max_secs: max };
        let current = backoff.delay_secs(attempt);
        let next = backoff.delay_secs(attempt + 1);

        prop_assert_eq!(next, (current * 2).min(max));
    }

    /// A retry decision always carries the policy's delay.
    #[test]
    fn prop_decision_delay_matches_policy(error_type in error_type_strategy(), attempt in 1u32..10) {
        let policy = RetryPolicy::default();
        if let RetryDecision::Retry { delay, .. } = policy.decide(error_type, attempt) {
            prop_assert_eq!(delay, policy.retry_delay(error_type, attempt));
        }
    }
}
