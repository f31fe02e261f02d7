//! Per-connection health tracking.
//!
//! - `status` - Health snapshots and states
//! - `tracker` - Transitions driven by operation outcomes

pub mod status;
pub mod tracker;

pub use status::{CloudStorageHealthStatus, HealthState};
pub use tracker::HealthTracker;
