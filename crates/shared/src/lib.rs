//! Shared types, errors, and configuration for Uplink.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management, including the reliability layer settings

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppConfig, HealthConfig, RateLimitConfig, ReliabilityConfig, RetryConfig, StorageSettings,
};
pub use error::{AppError, AppResult};
