//! End-to-end refresh scenarios across the taxonomy, recovery and security layers.

use chrono::Utc;
use std::sync::Arc;
use uplink_shared::RateLimitConfig;
use uplink_shared::types::UserId;

use super::{
    MemoryTokenStore, MokaCounterStore, NewTokenData, TokenRecord, TokenSecurityCoordinator,
    TokenStore, TracingAuditSink,
};
use crate::health::HealthState;
use crate::recovery::{
    NotificationUrgency, RecoveryContext, RecoverySelector, RecoveryStrategy, RetryPolicy,
    Retryable,
};
use crate::taxonomy::{ErrorClassifier, ErrorType, ProviderKind, RawProviderError, TokenRefreshErrorType};

fn coordinator() -> TokenSecurityCoordinator {
    TokenSecurityCoordinator::new(
        Arc::new(MokaCounterStore::default()),
        Arc::new(TracingAuditSink),
        RateLimitConfig::default(),
    )
}

fn drive_401_invalid_grant() -> RawProviderError {
    RawProviderError::new(ProviderKind::GoogleDrive, "Request had invalid authentication credentials")
        .with_status(401)
        .with_code("invalid_grant")
}

#[test]
fn test_drive_invalid_grant_across_both_taxonomies() {
    let raw = drive_401_invalid_grant();

    // Upload path: the access token is stale, a refresh fixes it.
    let error_type = ErrorClassifier::classify(&raw);
    assert_eq!(error_type, ErrorType::TokenExpired);
    assert!(!error_type.requires_user_intervention());
    assert_eq!(error_type.notification_urgency(), NotificationUrgency::AfterRetriesExhausted);

    let context = RecoveryContext::new(HealthState::Degraded)
        .with_failures(1)
        .with_refresh_token(true);
    assert_eq!(
        RecoverySelector::default().select_strategy(error_type, &context),
        RecoveryStrategy::TokenRefresh
    );

    // Refresh path: the refresh token itself is rejected.
    let refresh_type = TokenRefreshErrorType::from_raw(&raw);
    assert_eq!(refresh_type, TokenRefreshErrorType::InvalidRefreshToken);
    assert!(refresh_type.requires_user_intervention());
    assert_eq!(refresh_type.notification_urgency(), NotificationUrgency::Immediate);
    assert!(!RetryPolicy::default().should_retry(refresh_type, 1));
}

#[tokio::test]
async fn test_refresh_flow_rotates_after_rate_limit_check() {
    let coordinator = coordinator();
    let store = MemoryTokenStore::new();
    let user = UserId::new();
    let record = TokenRecord::new(
        user,
        ProviderKind::GoogleDrive,
        NewTokenData::from_expires_in("stale", Some("refresh".into()), -60, Utc::now()),
    );
    store.save(&record).await.unwrap();
    assert!(record.is_expired(Utc::now()));

    coordinator.ensure_refresh_allowed(user, None).unwrap();
    coordinator.record_refresh_attempt(user, None);

    let rotated = coordinator
        .rotate_and_persist(
            &store,
            record.id,
            NewTokenData::from_expires_in("fresh", None, 3600, Utc::now()),
        )
        .await
        .unwrap();

    assert!(!rotated.is_expired(Utc::now()));
    assert_eq!(rotated.access_token, "fresh");
    assert_eq!(rotated.refresh_token.as_deref(), Some("refresh"));
    assert_eq!(coordinator.remaining_user_attempts(user), 4);
}

#[tokio::test]
async fn test_failed_refreshes_exhaust_then_block() {
    let coordinator = coordinator();
    let store = MemoryTokenStore::new();
    let user = UserId::new();
    let record = TokenRecord::new(
        user,
        ProviderKind::GoogleDrive,
        NewTokenData::from_expires_in("stale", Some("refresh".into()), 0, Utc::now()),
    );
    store.save(&record).await.unwrap();

    let raw = RawProviderError::new(ProviderKind::GoogleDrive, "Backend Error").with_status(503);
    let error_type = TokenRefreshErrorType::from_raw(&raw);
    assert_eq!(error_type, TokenRefreshErrorType::ServiceUnavailable);

    let mut attempts = 0;
    while coordinator.ensure_refresh_allowed(user, None).is_ok() {
        coordinator.record_refresh_attempt(user, None);
        coordinator
            .record_refresh_failure(&store, record.id, error_type, &raw.message)
            .await
            .unwrap();
        attempts += 1;
    }

    assert_eq!(attempts, 5);
    let stored = store.load(record.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_failure_count, 5);
    assert_eq!(stored.access_token, "stale");
}
