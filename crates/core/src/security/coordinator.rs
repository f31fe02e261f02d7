//! Token refresh security: rate limiting, rotation and audit.

use chrono::Utc;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uplink_shared::RateLimitConfig;
use uplink_shared::types::{ProviderTokenId, UserId};

use super::audit::{AuditEvent, AuditSink, events};
use super::counter::CounterStore;
use super::error::{RateLimitScope, SecurityError};
use super::token::{NewTokenData, TokenRecord, TokenStore};
use crate::recovery::retry::Retryable;
use crate::taxonomy::{ProviderKind, TokenRefreshErrorType};

/// Coordinates token refreshes across workers.
///
/// Rate limits are fixed windows started by the first attempt. The check
/// methods are read-only and `record_refresh_attempt` counts, so concurrent
/// callers may both pass a check before either records.
pub struct TokenSecurityCoordinator {
    counters: Arc<dyn CounterStore>,
    audit: Arc<dyn AuditSink>,
    config: RateLimitConfig,
}

impl TokenSecurityCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        counters: Arc<dyn CounterStore>,
        audit: Arc<dyn AuditSink>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            counters,
            audit,
            config,
        }
    }

    fn user_key(user_id: UserId) -> String {
        format!("token_refresh:user:{user_id}")
    }

    fn ip_key(ip: IpAddr) -> String {
        format!("token_refresh:ip:{ip}")
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    fn remaining(&self, key: &str, ceiling: u32) -> u32 {
        let used = u32::try_from(self.counters.get(key)).unwrap_or(u32::MAX);
        ceiling.saturating_sub(used)
    }

    /// Returns true if `user_id` may attempt another refresh.
    #[must_use]
    pub fn check_user_rate_limit(&self, user_id: UserId) -> bool {
        self.remaining_user_attempts(user_id) > 0
    }

    /// Returns true if `ip` may attempt another refresh.
    #[must_use]
    pub fn check_ip_rate_limit(&self, ip: IpAddr) -> bool {
        self.remaining_ip_attempts(ip) > 0
    }

    /// Attempts left for `user_id` in the current window.
    #[must_use]
    pub fn remaining_user_attempts(&self, user_id: UserId) -> u32 {
        self.remaining(&Self::user_key(user_id), self.config.user_max_attempts)
    }

    /// Attempts left for `ip` in the current window.
    #[must_use]
    pub fn remaining_ip_attempts(&self, ip: IpAddr) -> u32 {
        self.remaining(&Self::ip_key(ip), self.config.ip_max_attempts)
    }

    /// Counts one refresh attempt against the user and, if known, the IP.
    pub fn record_refresh_attempt(&self, user_id: UserId, ip: Option<IpAddr>) {
        self.count(&Self::user_key(user_id));
        if let Some(ip) = ip {
            self.count(&Self::ip_key(ip));
        }
    }

    fn count(&self, key: &str) {
        if self.counters.increment(key) == 1 {
            self.counters.expire(key, self.window());
        }
    }

    /// Clears the user's counter.
    pub fn reset_user_rate_limit(&self, user_id: UserId) {
        self.counters.delete(&Self::user_key(user_id));
        info!(user_id = %user_id, "Token refresh rate limit reset");
        self.emit(AuditEvent::new(events::RATE_LIMIT_RESET, user_id).with("scope", "user"));
    }

    /// Clears the IP's counter. `actor` is the administrator doing the reset.
    pub fn reset_ip_rate_limit(&self, ip: IpAddr, actor: UserId) {
        self.counters.delete(&Self::ip_key(ip));
        info!(ip = %ip, actor = %actor, "Token refresh rate limit reset");
        self.emit(
            AuditEvent::new(events::RATE_LIMIT_RESET, actor)
                .with("scope", "ip")
                .with("ip", ip.to_string()),
        );
    }

    /// Performs both checks; a block is audited and returned as an error.
    ///
    /// Read-only like the individual checks: call
    /// [`record_refresh_attempt`](Self::record_refresh_attempt) before the refresh.
    ///
    /// # Errors
    ///
    /// Returns `SecurityError::RateLimited` if either limit is exhausted.
    pub fn ensure_refresh_allowed(
        &self,
        user_id: UserId,
        ip: Option<IpAddr>,
    ) -> Result<(), SecurityError> {
        let blocked = if self.check_user_rate_limit(user_id) {
            ip.filter(|ip| !self.check_ip_rate_limit(*ip))
                .map(|_| (RateLimitScope::Ip, self.config.ip_max_attempts))
        } else {
            Some((RateLimitScope::User, self.config.user_max_attempts))
        };

        let Some((scope, limit)) = blocked else {
            return Ok(());
        };

        warn!(user_id = %user_id, scope = scope.as_str(), limit, "Token refresh rate limited");
        let mut event = AuditEvent::new(events::RATE_LIMIT_EXCEEDED, user_id)
            .with("scope", scope.as_str())
            .with("limit", limit)
            .with("window_secs", self.config.window_secs);
        if let Some(ip) = ip {
            event = event.with("ip", ip.to_string());
        }
        self.emit(event);

        Err(SecurityError::RateLimited { scope, limit })
    }

    /// Builds the record that replaces `record` after a successful refresh.
    ///
    /// The failure count is cleared and the refresh time stamped. A missing
    /// new refresh token keeps the current one.
    #[must_use]
    pub fn rotate_token_on_refresh(&self, record: &TokenRecord, data: NewTokenData) -> TokenRecord {
        let now = Utc::now();
        let rotated = TokenRecord {
            access_token: data.access_token,
            refresh_token: data.refresh_token.or_else(|| record.refresh_token.clone()),
            expires_at: data.expires_at,
            refresh_failure_count: 0,
            last_successful_refresh_at: Some(now),
            updated_at: now,
            ..record.clone()
        };

        let mut event = AuditEvent::new(events::TOKEN_ROTATED, record.user_id)
            .with("token_id", record.id.to_string())
            .with("provider", record.provider.as_str())
            .with("previous_failures", record.refresh_failure_count);
        if let Some(expires_at) = rotated.expires_at {
            event = event.with("expires_at", expires_at.to_rfc3339());
        }
        self.emit(event);

        rotated
    }

    /// Loads, rotates and saves a record in a single `save`.
    ///
    /// # Errors
    ///
    /// Returns `TokenNotFound` if no record exists, or the store failure.
    pub async fn rotate_and_persist<S>(
        &self,
        store: &S,
        id: ProviderTokenId,
        data: NewTokenData,
    ) -> Result<TokenRecord, SecurityError>
    where
        S: TokenStore + ?Sized,
    {
        let record = store
            .load(id)
            .await?
            .ok_or(SecurityError::TokenNotFound(id))?;
        let rotated = self.rotate_token_on_refresh(&record, data);
        store.save(&rotated).await?;

        info!(user_id = %rotated.user_id, token_id = %id, "Token rotated");
        Ok(rotated)
    }

    /// Counts a failed refresh on the record and audits it.
    ///
    /// Failures that need the user also emit a user-intervention event.
    ///
    /// # Errors
    ///
    /// Returns `TokenNotFound` if no record exists, or the store failure.
    pub async fn record_refresh_failure<S>(
        &self,
        store: &S,
        id: ProviderTokenId,
        error_type: TokenRefreshErrorType,
        message: &str,
    ) -> Result<TokenRecord, SecurityError>
    where
        S: TokenStore + ?Sized,
    {
        let record = store
            .load(id)
            .await?
            .ok_or(SecurityError::TokenNotFound(id))?;
        let updated = TokenRecord {
            refresh_failure_count: record.refresh_failure_count.saturating_add(1),
            updated_at: Utc::now(),
            ..record
        };
        store.save(&updated).await?;

        self.audit_refresh_failure(
            updated.user_id,
            updated.provider,
            error_type,
            updated.refresh_failure_count,
            message,
        );
        if error_type.requires_user_intervention() {
            self.audit_user_intervention(updated.user_id, updated.provider, error_type.description());
        }

        Ok(updated)
    }

    /// Audits a failed refresh attempt.
    pub fn audit_refresh_failure(
        &self,
        user_id: UserId,
        provider: ProviderKind,
        error_type: TokenRefreshErrorType,
        attempt: u32,
        message: &str,
    ) {
        warn!(
            user_id = %user_id,
            provider = %provider,
            error_type = error_type.as_str(),
            attempt,
            "Token refresh failed"
        );
        self.emit(
            AuditEvent::new(events::TOKEN_REFRESH_FAILED, user_id)
                .with("provider", provider.as_str())
                .with("error_type", error_type.as_str())
                .with("attempt", attempt)
                .with("recoverable", error_type.is_recoverable())
                .with("urgency", format!("{:?}", error_type.notification_urgency()))
                .with("message", message),
        );
    }

    /// Audits an arbitrary authentication event with free-form details.
    pub fn log_authentication_event(&self, user_id: UserId, event: &str, details: Value) {
        self.emit(AuditEvent::new(event, user_id).with_details(details));
    }

    /// Audits that the user has to reconnect `provider`.
    pub fn audit_user_intervention(&self, user_id: UserId, provider: ProviderKind, reason: &str) {
        warn!(user_id = %user_id, provider = %provider, reason, "User intervention required");
        self.emit(
            AuditEvent::new(events::USER_INTERVENTION_REQUIRED, user_id)
                .with("provider", provider.as_str())
                .with("reason", reason),
        );
    }

    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event) {
            warn!(event = %event.event, error = %e, code = e.error_code(), "Failed to record audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::counter::MokaCounterStore;
    use crate::security::error::AuditError;
    use crate::security::token::MemoryTokenStore;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(|e| e.event.clone()).collect()
        }
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Sink("disk full".into()))
        }
    }

    fn coordinator_with(config: RateLimitConfig) -> (TokenSecurityCoordinator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let coordinator = TokenSecurityCoordinator::new(
            Arc::new(MokaCounterStore::default()),
            sink.clone(),
            config,
        );
        (coordinator, sink)
    }

    fn coordinator() -> (TokenSecurityCoordinator, Arc<RecordingSink>) {
        coordinator_with(RateLimitConfig::default())
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([203, 0, 113, last])
    }

    fn drive_record() -> TokenRecord {
        let mut record = TokenRecord::new(
            UserId::new(),
            ProviderKind::GoogleDrive,
            NewTokenData::from_expires_in("old-access", Some("old-refresh".into()), 60, Utc::now()),
        );
        record.refresh_failure_count = 3;
        record
    }

    #[test]
    fn test_user_ceiling_and_reset() {
        let (coordinator, _) = coordinator();
        let user = UserId::new();

        assert_eq!(coordinator.remaining_user_attempts(user), 5);
        for expected_remaining in (0..5).rev() {
            assert!(coordinator.check_user_rate_limit(user));
            coordinator.record_refresh_attempt(user, None);
            assert_eq!(coordinator.remaining_user_attempts(user), expected_remaining);
        }
        assert!(!coordinator.check_user_rate_limit(user));

        coordinator.reset_user_rate_limit(user);
        assert!(coordinator.check_user_rate_limit(user));
        assert_eq!(coordinator.remaining_user_attempts(user), 5);
    }

    #[test]
    fn test_sixth_attempt_is_blocked() {
        let (coordinator, sink) = coordinator();
        let user = UserId::new();

        let outcomes: Vec<bool> = (0..6)
            .map(|_| {
                let allowed = coordinator.ensure_refresh_allowed(user, None).is_ok();
                if allowed {
                    coordinator.record_refresh_attempt(user, None);
                }
                allowed
            })
            .collect();

        assert_eq!(outcomes, vec![true, true, true, true, true, false]);
        assert_eq!(sink.names(), vec![events::RATE_LIMIT_EXCEEDED.to_string()]);
    }

    #[test]
    fn test_ip_ceiling_is_independent() {
        let (coordinator, sink) = coordinator();
        let shared_ip = ip(7);

        // Twenty different users behind one address.
        for _ in 0..20 {
            let user = UserId::new();
            assert!(coordinator.ensure_refresh_allowed(user, Some(shared_ip)).is_ok());
            coordinator.record_refresh_attempt(user, Some(shared_ip));
        }

        let fresh_user = UserId::new();
        assert!(coordinator.check_user_rate_limit(fresh_user));
        assert!(!coordinator.check_ip_rate_limit(shared_ip));
        assert_eq!(coordinator.remaining_ip_attempts(shared_ip), 0);
        assert!(coordinator.check_ip_rate_limit(ip(8)));

        let err = coordinator
            .ensure_refresh_allowed(fresh_user, Some(shared_ip))
            .unwrap_err();
        assert!(matches!(
            err,
            SecurityError::RateLimited {
                scope: RateLimitScope::Ip,
                limit: 20
            }
        ));

        // Without an address only the user limit applies.
        assert!(coordinator.ensure_refresh_allowed(fresh_user, None).is_ok());

        let admin = UserId::new();
        coordinator.reset_ip_rate_limit(shared_ip, admin);
        assert_eq!(coordinator.remaining_ip_attempts(shared_ip), 20);

        let recorded = sink.events.lock().unwrap();
        let reset = recorded
            .iter()
            .find(|e| e.event == events::RATE_LIMIT_RESET)
            .expect("ip reset is audited");
        assert_eq!(reset.data["scope"], json!("ip"));
        assert_eq!(reset.data["ip"], json!(shared_ip.to_string()));
        assert_eq!(reset.data["user_id"], json!(admin.to_string()));
    }

    #[test]
    fn test_user_block_does_not_touch_ip() {
        let (coordinator, _) = coordinator();
        let user = UserId::new();

        for _ in 0..5 {
            coordinator.record_refresh_attempt(user, Some(ip(1)));
        }
        assert!(!coordinator.check_user_rate_limit(user));
        assert_eq!(coordinator.remaining_ip_attempts(ip(1)), 15);
    }

    #[test]
    fn test_window_expiry_unblocks() {
        let (coordinator, _) = coordinator_with(RateLimitConfig {
            user_max_attempts: 1,
            window_secs: 1,
            ..RateLimitConfig::default()
        });
        let user = UserId::new();

        coordinator.record_refresh_attempt(user, None);
        assert!(!coordinator.check_user_rate_limit(user));

        std::thread::sleep(std::time::Duration::from_millis(1_200));
        assert!(coordinator.check_user_rate_limit(user));
        assert_eq!(coordinator.remaining_user_attempts(user), 1);
    }

    #[test]
    fn test_rotation_resets_failures_and_copies_tokens() {
        let (coordinator, sink) = coordinator();
        let record = drive_record();
        let expires_at = Utc::now() + ChronoDuration::hours(1);

        let rotated = coordinator.rotate_token_on_refresh(
            &record,
            NewTokenData {
                access_token: "new-access".into(),
                refresh_token: Some("new-refresh".into()),
                expires_at: Some(expires_at),
            },
        );

        assert_eq!(rotated.id, record.id);
        assert_eq!(rotated.user_id, record.user_id);
        assert_eq!(rotated.access_token, "new-access");
        assert_eq!(rotated.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(rotated.expires_at, Some(expires_at));
        assert_eq!(rotated.refresh_failure_count, 0);
        assert!(rotated.last_successful_refresh_at.is_some());
        assert!(rotated.updated_at >= record.updated_at);

        // The input is untouched.
        assert_eq!(record.refresh_failure_count, 3);
        assert_eq!(sink.names(), vec![events::TOKEN_ROTATED.to_string()]);
    }

    #[test]
    fn test_rotation_keeps_refresh_token_when_not_reissued() {
        let (coordinator, _) = coordinator();
        let record = drive_record();

        let rotated = coordinator.rotate_token_on_refresh(
            &record,
            NewTokenData::from_expires_in("new-access", None, 3600, Utc::now()),
        );

        assert_eq!(rotated.refresh_token.as_deref(), Some("old-refresh"));
    }

    #[tokio::test]
    async fn test_rotate_and_persist() {
        let (coordinator, _) = coordinator();
        let store = MemoryTokenStore::new();
        let record = drive_record();
        store.save(&record).await.unwrap();

        let rotated = coordinator
            .rotate_and_persist(
                &store,
                record.id,
                NewTokenData::from_expires_in("new-access", None, 3600, Utc::now()),
            )
            .await
            .unwrap();

        let stored = store.load(record.id).await.unwrap().unwrap();
        assert_eq!(stored, rotated);
        assert_eq!(stored.refresh_failure_count, 0);

        let missing = coordinator
            .rotate_and_persist(
                &store,
                ProviderTokenId::new(),
                NewTokenData::from_expires_in("x", None, 60, Utc::now()),
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, SecurityError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn test_record_refresh_failure_counts_and_audits() {
        let (coordinator, sink) = coordinator();
        let store = MemoryTokenStore::new();
        let record = drive_record();
        store.save(&record).await.unwrap();

        let updated = coordinator
            .record_refresh_failure(&store, record.id, TokenRefreshErrorType::NetworkTimeout, "timed out")
            .await
            .unwrap();
        assert_eq!(updated.refresh_failure_count, 4);
        assert_eq!(sink.names(), vec![events::TOKEN_REFRESH_FAILED.to_string()]);

        coordinator
            .record_refresh_failure(
                &store,
                record.id,
                TokenRefreshErrorType::ExpiredRefreshToken,
                "Token has been expired or revoked.",
            )
            .await
            .unwrap();
        assert_eq!(
            sink.names()[1..],
            [
                events::TOKEN_REFRESH_FAILED.to_string(),
                events::USER_INTERVENTION_REQUIRED.to_string()
            ]
        );
        assert_eq!(store.load(record.id).await.unwrap().unwrap().refresh_failure_count, 5);
    }

    #[test]
    fn test_authentication_event_details() {
        let (coordinator, sink) = coordinator();
        let user = UserId::new();

        coordinator.log_authentication_event(user, "provider_connected", json!({ "provider": "s3" }));

        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].event, "provider_connected");
        assert_eq!(events[0].data["provider"], json!("s3"));
        assert_eq!(events[0].data["user_id"], json!(user.to_string()));
    }

    #[test]
    fn test_audit_failures_are_swallowed() {
        let coordinator = TokenSecurityCoordinator::new(
            Arc::new(MokaCounterStore::default()),
            Arc::new(FailingSink),
            RateLimitConfig::default(),
        );
        let rotated = coordinator.rotate_token_on_refresh(
            &drive_record(),
            NewTokenData::from_expires_in("new", None, 60, Utc::now()),
        );
        assert_eq!(rotated.access_token, "new");
    }

    #[tokio::test]
    async fn test_concurrent_attempts_block_after_ceiling() {
        let coordinator = Arc::new(coordinator().0);
        let user = UserId::new();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.record_refresh_attempt(user, None) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(!coordinator.check_user_rate_limit(user));
        assert_eq!(coordinator.remaining_user_attempts(user), 0);
    }
}
