//! Stored provider credentials and their persistence seam.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use uplink_shared::types::{ProviderTokenId, UserId};

use super::error::StoreError;
use crate::taxonomy::ProviderKind;

/// A user's stored credentials for one provider.
///
/// `refresh_failure_count` and `last_successful_refresh_at` are only changed
/// by the [`TokenSecurityCoordinator`](super::TokenSecurityCoordinator).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Record ID.
    pub id: ProviderTokenId,
    /// Owner.
    pub user_id: UserId,
    /// Provider the token is for.
    pub provider: ProviderKind,
    /// Current access token.
    pub access_token: String,
    /// Refresh token, if the provider issued one.
    pub refresh_token: Option<String>,
    /// Access token expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Failed refreshes since the last success.
    pub refresh_failure_count: u32,
    /// Time of the last successful refresh.
    pub last_successful_refresh_at: Option<DateTime<Utc>>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Creates a record for freshly issued credentials.
    #[must_use]
    pub fn new(user_id: UserId, provider: ProviderKind, data: NewTokenData) -> Self {
        Self {
            id: ProviderTokenId::new(),
            user_id,
            provider,
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_at: data.expires_at,
            refresh_failure_count: 0,
            last_successful_refresh_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Returns true if a refresh token is on file.
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns true if the access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns true if the access token expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| now.checked_add_signed(window).is_none_or(|limit| at <= limit))
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("refresh_failure_count", &self.refresh_failure_count)
            .field("last_successful_refresh_at", &self.last_successful_refresh_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Credentials returned by a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct NewTokenData {
    /// New access token.
    pub access_token: String,
    /// New refresh token; `None` keeps the current one.
    pub refresh_token: Option<String>,
    /// New access token expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewTokenData {
    /// Builds token data from an OAuth `expires_in` value.
    #[must_use]
    pub fn from_expires_in(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: Some(now + Duration::seconds(expires_in_secs)),
        }
    }
}

impl fmt::Debug for NewTokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewTokenData")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token persistence collaborator.
///
/// `save` must replace the whole record atomically.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Loads a record by ID.
    async fn load(&self, id: ProviderTokenId) -> Result<Option<TokenRecord>, StoreError>;

    /// Saves a complete record.
    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError>;
}

/// In-memory [`TokenStore`], for single-process deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: RwLock<HashMap<ProviderTokenId, TokenRecord>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, id: ProviderTokenId) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }
}
