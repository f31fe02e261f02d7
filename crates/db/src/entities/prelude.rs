//! `SeaORM` entity prelude.

pub use super::cloud_storage_health_statuses::Entity as CloudStorageHealthStatuses;
pub use super::provider_tokens::Entity as ProviderTokens;
