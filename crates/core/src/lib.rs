//! Cloud storage reliability layer for Uplink.
//!
//! Classifies heterogeneous provider failures into a universal taxonomy,
//! decides whether and when to retry or recover, tracks per-connection
//! health, and coordinates token refresh under concurrent access.
//!
//! # Modules
//!
//! - `taxonomy` - Error categories, raw provider errors and the classifier
//! - `recovery` - Recovery strategies, retry policy and the retry executor
//! - `health` - Connection health snapshots and transitions
//! - `security` - Refresh rate limiting, token rotation and audit events
//! - `provider` - OpenDAL-backed provider adapters

pub mod health;
pub mod provider;
pub mod recovery;
pub mod security;
pub mod taxonomy;
