//! Repository implementations for database access.

mod health_status;
mod provider_token;

pub use health_status::HealthStatusRepository;
pub use provider_token::ProviderTokenRepository;
