//! Health snapshot repository for database operations.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use tracing::debug;
use uplink_core::health::{CloudStorageHealthStatus, HealthState};
use uplink_core::taxonomy::{ErrorType, ProviderKind};
use uplink_shared::types::{HealthSnapshotId, UserId};

use crate::entities::cloud_storage_health_statuses as snapshots;

/// Health snapshot repository. Snapshots are append-only.
#[derive(Debug, Clone)]
pub struct HealthStatusRepository {
    db: DatabaseConnection,
}

impl HealthStatusRepository {
    /// Creates a new health snapshot repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn record(&self, status: &CloudStorageHealthStatus) -> Result<HealthSnapshotId, DbErr> {
        let id = HealthSnapshotId::new();

        snapshots::ActiveModel {
            id: Set(id.into_inner()),
            user_id: Set(status.user_id.map(UserId::into_inner)),
            provider: Set(status.provider.as_str().to_string()),
            status: Set(status.status.as_str().to_string()),
            consecutive_failures: Set(i32::try_from(status.consecutive_failures).unwrap_or(i32::MAX)),
            last_error_message: Set(status.last_error_message.clone()),
            last_error_type: Set(status.last_error_type.map(|t| t.as_str().to_string())),
            last_successful_operation_at: Set(status.last_successful_operation_at.map(Into::into)),
            token_expires_at: Set(status.token_expires_at.map(Into::into)),
            checked_at: Set(status.checked_at.into()),
        }
        .insert(&self.db)
        .await?;

        debug!(snapshot_id = %id, provider = %status.provider, status = %status.status, "health snapshot recorded");
        Ok(id)
    }

    /// Returns the most recent snapshot for a connection.
    ///
    /// `user_id = None` selects snapshots taken without a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn latest_for(
        &self,
        user_id: Option<UserId>,
        provider: ProviderKind,
    ) -> Result<Option<CloudStorageHealthStatus>, DbErr> {
        connection(user_id, provider)
            .one(&self.db)
            .await?
            .map(to_status)
            .transpose()
    }

    /// Returns up to `limit` snapshots for a connection, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn history(
        &self,
        user_id: Option<UserId>,
        provider: ProviderKind,
        limit: u64,
    ) -> Result<Vec<CloudStorageHealthStatus>, DbErr> {
        connection(user_id, provider)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_status)
            .collect()
    }
}

fn connection(user_id: Option<UserId>, provider: ProviderKind) -> Select<snapshots::Entity> {
    let query = snapshots::Entity::find().filter(snapshots::Column::Provider.eq(provider.as_str()));
    let query = match user_id {
        Some(user_id) => query.filter(snapshots::Column::UserId.eq(user_id.into_inner())),
        None => query.filter(snapshots::Column::UserId.is_null()),
    };
    query.order_by_desc(snapshots::Column::CheckedAt)
}

fn to_status(model: snapshots::Model) -> Result<CloudStorageHealthStatus, DbErr> {
    let status = HealthState::parse(&model.status)
        .ok_or_else(|| DbErr::Custom(format!("unknown health status: {}", model.status)))?;
    let consecutive_failures = u32::try_from(model.consecutive_failures)
        .map_err(|_| DbErr::Custom(format!("snapshot {} has negative failure count", model.id)))?;

    Ok(CloudStorageHealthStatus {
        user_id: model.user_id.map(UserId::from_uuid),
        provider: ProviderKind::parse(&model.provider),
        status,
        consecutive_failures,
        last_error_message: model.last_error_message,
        last_error_type: model.last_error_type.as_deref().and_then(ErrorType::parse),
        last_successful_operation_at: model
            .last_successful_operation_at
            .map(|at| at.with_timezone(&Utc)),
        token_expires_at: model.token_expires_at.map(|at| at.with_timezone(&Utc)),
        checked_at: model.checked_at.with_timezone(&Utc),
    })
}
