//! Provider token and connection health tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(RELIABILITY_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS cloud_storage_health_statuses CASCADE;
             DROP TABLE IF EXISTS provider_tokens CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const RELIABILITY_SQL: &str = r"
-- One credential record per user and provider
CREATE TABLE provider_tokens (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    provider VARCHAR(32) NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    expires_at TIMESTAMPTZ,
    refresh_failure_count INTEGER NOT NULL DEFAULT 0,
    last_successful_refresh_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_provider_tokens_user_provider UNIQUE (user_id, provider),
    CONSTRAINT chk_refresh_failure_count CHECK (refresh_failure_count >= 0)
);

CREATE INDEX idx_provider_tokens_expires_at ON provider_tokens(expires_at)
    WHERE expires_at IS NOT NULL;

-- Append-only connection health snapshots
CREATE TABLE cloud_storage_health_statuses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID,
    provider VARCHAR(32) NOT NULL,
    status VARCHAR(16) NOT NULL,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    last_error_message TEXT,
    last_error_type VARCHAR(64),
    last_successful_operation_at TIMESTAMPTZ,
    token_expires_at TIMESTAMPTZ,
    checked_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_health_status CHECK (status IN ('healthy', 'degraded', 'unhealthy', 'disconnected')),
    CONSTRAINT chk_consecutive_failures CHECK (consecutive_failures >= 0)
);

CREATE INDEX idx_health_statuses_latest
    ON cloud_storage_health_statuses(user_id, provider, checked_at DESC);
";
