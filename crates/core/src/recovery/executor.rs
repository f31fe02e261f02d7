//! Runs provider operations under the retry policy.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use uplink_shared::AppError;

use super::retry::{NotificationUrgency, RetryDecision, RetryPolicy, Retryable, SurfaceReason};
use crate::taxonomy::{ErrorClassifier, ErrorType, RawProviderError, TokenRefreshErrorType};

/// Waits out retry delays.
///
/// Abstracted so job runners can plug in their own deferral and tests can
/// observe delays without sleeping.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Waits for `delay` before the next attempt.
    async fn sleep(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// A failure surfaced after the retry policy gave up.
#[derive(Debug, Error)]
#[error("{operation} failed with {error_type} after {attempts} attempt(s): {raw}")]
pub struct RetryFailure<E: Retryable + std::fmt::Display + std::fmt::Debug> {
    /// Name of the operation that failed.
    pub operation: String,
    /// Classification of the last failure.
    pub error_type: E,
    /// The last raw provider error.
    pub raw: RawProviderError,
    /// Total attempts made, including the first.
    pub attempts: u32,
    /// Why retrying stopped.
    pub reason: SurfaceReason,
    /// How urgently the user should be told.
    pub urgency: NotificationUrgency,
}

impl<E: Retryable + std::fmt::Display + std::fmt::Debug> RetryFailure<E> {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        self.error_type.code()
    }
}

impl<E: Retryable + std::fmt::Display + std::fmt::Debug> From<RetryFailure<E>> for AppError {
    fn from(err: RetryFailure<E>) -> Self {
        if err.reason == SurfaceReason::UserInterventionRequired {
            AppError::StorageProvider(format!(
                "{} requires reconnecting the provider: {}",
                err.operation, err.error_type
            ))
        } else {
            AppError::StorageProvider(err.to_string())
        }
    }
}

/// Runs an async operation, retrying classified failures per the policy.
///
/// The operation receives the 0-based attempt number. Dropping the returned
/// future abandons the remaining attempts.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor<S = TokioScheduler> {
    policy: RetryPolicy,
    scheduler: S,
}

impl RetryExecutor<TokioScheduler> {
    /// Creates an executor sleeping on the tokio timer.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_scheduler(policy, TokioScheduler)
    }
}

impl<S: Scheduler> RetryExecutor<S> {
    /// Creates an executor with a custom scheduler.
    #[must_use]
    pub fn with_scheduler(policy: RetryPolicy, scheduler: S) -> Self {
        Self { policy, scheduler }
    }

    /// Returns the policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs a storage operation, classifying failures as [`ErrorType`].
    ///
    /// # Errors
    ///
    /// Returns a [`RetryFailure`] once the policy stops retrying.
    pub async fn run<T, Err, F, Fut>(
        &self,
        operation: &str,
        op: F,
    ) -> Result<T, RetryFailure<ErrorType>>
    where
        Err: Into<RawProviderError>,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Err>>,
    {
        self.run_classified(operation, ErrorClassifier::classify, op).await
    }

    /// Runs a token refresh call, classifying failures as [`TokenRefreshErrorType`].
    ///
    /// # Errors
    ///
    /// Returns a [`RetryFailure`] once the policy stops retrying.
    pub async fn run_refresh<T, Err, F, Fut>(
        &self,
        op: F,
    ) -> Result<T, RetryFailure<TokenRefreshErrorType>>
    where
        Err: Into<RawProviderError>,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Err>>,
    {
        self.run_classified("token_refresh", TokenRefreshErrorType::from_raw, op)
            .await
    }

    /// Runs an operation with a caller-supplied classifier.
    ///
    /// # Errors
    ///
    /// Returns a [`RetryFailure`] once the policy stops retrying.
    pub async fn run_classified<T, E, C, Err, F, Fut>(
        &self,
        operation: &str,
        classify: C,
        mut op: F,
    ) -> Result<T, RetryFailure<E>>
    where
        E: Retryable + std::fmt::Display + std::fmt::Debug,
        C: Fn(&RawProviderError) -> E,
        Err: Into<RawProviderError>,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Err>>,
    {
        let mut attempt = 0u32;
        loop {
            let raw = match op(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, retries = attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err.into(),
            };

            let error_type = classify(&raw);
            let retry_number = attempt + 1;

            match self.policy.decide(error_type, retry_number) {
                RetryDecision::Retry { delay, .. } => {
                    warn!(
                        operation,
                        error_type = error_type.code(),
                        retry = retry_number,
                        delay_secs = delay.as_secs(),
                        error = %raw,
                        "Operation failed, retrying"
                    );
                    self.scheduler.sleep(delay).await;
                    attempt = retry_number;
                }
                RetryDecision::Surface { reason, urgency } => {
                    warn!(
                        operation,
                        error_type = error_type.code(),
                        attempts = retry_number,
                        ?reason,
                        "Operation failed, giving up"
                    );
                    return Err(RetryFailure {
                        operation: operation.to_string(),
                        error_type,
                        raw,
                        attempts: retry_number,
                        reason,
                        urgency,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ProviderKind;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingScheduler {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Scheduler for RecordingScheduler {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    fn executor() -> RetryExecutor<RecordingScheduler> {
        RetryExecutor::with_scheduler(RetryPolicy::default(), RecordingScheduler::default())
    }

    fn s3(message: &str) -> RawProviderError {
        RawProviderError::new(ProviderKind::S3, message)
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let executor = executor();
        let calls = AtomicU32::new(0);

        let result = executor
            .run("upload", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(s3("connection reset by peer"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *executor.scheduler.delays.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let executor = executor();

        let failure = executor
            .run("upload", |_| async { Err::<(), _>(s3("request timed out")) })
            .await
            .unwrap_err();

        assert_eq!(failure.error_type, ErrorType::Timeout);
        assert_eq!(failure.reason, SurfaceReason::AttemptsExhausted);
        assert_eq!(failure.attempts, 6);
        assert_eq!(failure.urgency, NotificationUrgency::AfterRetriesExhausted);
        assert_eq!(executor.scheduler.delays.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_user_intervention_fails_without_sleeping() {
        let executor = executor();

        let failure = executor
            .run("upload", |_| async {
                Err::<(), _>(s3("The specified bucket does not exist").with_code("NoSuchBucket"))
            })
            .await
            .unwrap_err();

        assert_eq!(failure.error_type, ErrorType::BucketNotFound);
        assert_eq!(failure.reason, SurfaceReason::UserInterventionRequired);
        assert_eq!(failure.urgency, NotificationUrgency::Immediate);
        assert_eq!(failure.attempts, 1);
        assert!(executor.scheduler.delays.lock().unwrap().is_empty());

        let app_error: AppError = failure.into();
        assert_eq!(app_error.error_code(), "STORAGE_PROVIDER_ERROR");
    }

    #[tokio::test]
    async fn test_refresh_path_uses_refresh_taxonomy() {
        let executor = executor();

        let failure = executor
            .run_refresh(|_| async {
                Err::<(), _>(
                    RawProviderError::new(ProviderKind::GoogleDrive, "Token has been expired or revoked.")
                        .with_status(400)
                        .with_code("invalid_grant"),
                )
            })
            .await
            .unwrap_err();

        assert_eq!(failure.error_type, TokenRefreshErrorType::ExpiredRefreshToken);
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.error_code(), "expired_refresh_token");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_waits_out_the_delay() {
        let executor = RetryExecutor::new(RetryPolicy::default());
        let started = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);

        let result = executor
            .run("probe", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(s3("Service Unavailable").with_status(503))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(60));
    }
}
