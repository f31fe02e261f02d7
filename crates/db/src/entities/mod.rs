//! `SeaORM` entity definitions.

pub mod prelude;

pub mod cloud_storage_health_statuses;
pub mod provider_tokens;
