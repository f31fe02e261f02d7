//! Token refresh security.
//!
//! Per-user and per-IP refresh rate limits, atomic token rotation and
//! structured audit events.
//!
//! # Modules
//!
//! - `counter` - Keyed counters with expiry (Moka-backed)
//! - `token` - Token records and the persistence seam
//! - `audit` - Audit events and sinks
//! - `coordinator` - The coordinator tying them together
//! - `error` - Security and collaborator errors

pub mod audit;
pub mod coordinator;
pub mod counter;
pub mod error;
pub mod token;

#[cfg(test)]
mod tests;

pub use audit::{AUDIT_TARGET, AuditEvent, AuditSink, TracingAuditSink};
pub use coordinator::TokenSecurityCoordinator;
pub use counter::{CounterStore, MokaCounterStore};
pub use error::{AuditError, RateLimitScope, SecurityError, StoreError};
pub use token::{MemoryTokenStore, NewTokenData, TokenRecord, TokenStore};
