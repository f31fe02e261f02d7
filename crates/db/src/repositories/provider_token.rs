//! Provider token repository for database operations.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use tracing::debug;
use uplink_core::security::{StoreError, TokenRecord, TokenStore};
use uplink_core::taxonomy::ProviderKind;
use uplink_shared::types::{ProviderTokenId, UserId};

use crate::entities::provider_tokens;

/// Provider token repository.
///
/// Every write replaces the full row in one `INSERT ... ON CONFLICT` statement,
/// so a concurrent reader sees either the old or the new credentials.
#[derive(Debug, Clone)]
pub struct ProviderTokenRepository {
    db: DatabaseConnection,
}

impl ProviderTokenRepository {
    /// Creates a new provider token repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a token record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn find_by_id(&self, id: ProviderTokenId) -> Result<Option<TokenRecord>, DbErr> {
        provider_tokens::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .map(to_record)
            .transpose()
    }

    /// Finds the token record a user holds for a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn find_for_user(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> Result<Option<TokenRecord>, DbErr> {
        provider_tokens::Entity::find()
            .filter(provider_tokens::Column::UserId.eq(user_id.into_inner()))
            .filter(provider_tokens::Column::Provider.eq(provider.as_str()))
            .one(&self.db)
            .await?
            .map(to_record)
            .transpose()
    }

    /// Inserts or fully replaces a token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn upsert(&self, record: &TokenRecord) -> Result<(), DbErr> {
        let model = provider_tokens::ActiveModel {
            id: Set(record.id.into_inner()),
            user_id: Set(record.user_id.into_inner()),
            provider: Set(record.provider.as_str().to_string()),
            access_token: Set(record.access_token.clone()),
            refresh_token: Set(record.refresh_token.clone()),
            expires_at: Set(record.expires_at.map(Into::into)),
            refresh_failure_count: Set(i32::try_from(record.refresh_failure_count).unwrap_or(i32::MAX)),
            last_successful_refresh_at: Set(record.last_successful_refresh_at.map(Into::into)),
            created_at: NotSet,
            updated_at: Set(record.updated_at.into()),
        };

        provider_tokens::Entity::insert(model)
            .on_conflict(
                OnConflict::column(provider_tokens::Column::Id)
                    .update_columns([
                        provider_tokens::Column::AccessToken,
                        provider_tokens::Column::RefreshToken,
                        provider_tokens::Column::ExpiresAt,
                        provider_tokens::Column::RefreshFailureCount,
                        provider_tokens::Column::LastSuccessfulRefreshAt,
                        provider_tokens::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        debug!(token_id = %record.id, provider = %record.provider, "provider token saved");
        Ok(())
    }

    /// Deletes a token record. Returns true if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn delete(&self, id: ProviderTokenId) -> Result<bool, DbErr> {
        let result = provider_tokens::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl TokenStore for ProviderTokenRepository {
    async fn load(&self, id: ProviderTokenId) -> Result<Option<TokenRecord>, StoreError> {
        self.find_by_id(id).await.map_err(store_error)
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.upsert(record).await.map_err(store_error)
    }
}

fn store_error(err: DbErr) -> StoreError {
    match err {
        DbErr::Custom(message) => StoreError::InvalidRecord(message),
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn to_record(model: provider_tokens::Model) -> Result<TokenRecord, DbErr> {
    let refresh_failure_count = u32::try_from(model.refresh_failure_count).map_err(|_| {
        DbErr::Custom(format!(
            "provider token {} has negative refresh_failure_count",
            model.id
        ))
    })?;

    Ok(TokenRecord {
        id: ProviderTokenId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        provider: ProviderKind::parse(&model.provider),
        access_token: model.access_token,
        refresh_token: model.refresh_token,
        expires_at: model.expires_at.map(|at| at.with_timezone(&Utc)),
        refresh_failure_count,
        last_successful_refresh_at: model.last_successful_refresh_at.map(|at| at.with_timezone(&Utc)),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
