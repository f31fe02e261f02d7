//! Recovery decisions for classified provider failures.
//!
//! # Modules
//!
//! - `strategy` - Recommended remedial action per error type and context
//! - `retry` - Backoff families and the retry policy engine
//! - `executor` - Runs async operations under the retry policy

pub mod executor;
pub mod retry;
pub mod strategy;

#[cfg(test)]
mod retry_props;

pub use executor::{RetryExecutor, RetryFailure, Scheduler, TokioScheduler};
pub use retry::{
    Backoff, NotificationUrgency, RetryDecision, RetryPolicy, RetryRule, Retryable, SurfaceReason,
};
pub use strategy::{RecoveryContext, RecoverySelector, RecoveryStrategy};
