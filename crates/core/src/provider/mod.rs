//! Cloud storage provider adapters using Apache OpenDAL.
//!
//! Supported backends:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only)
//!
//! Failures leave the adapter as classified [`ProviderError`]s, ready for the
//! retry engine and the health tracker.

mod adapter;
mod config;
mod error;

pub use adapter::ProviderAdapter;
pub use config::StorageProvider;
pub use error::ProviderError;
