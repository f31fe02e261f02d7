//! Universal error taxonomy for cloud storage providers.
//!
//! Provider failures arrive as [`RawProviderError`]s and leave as one of two
//! closed taxonomies: [`ErrorType`] for storage operations and
//! [`TokenRefreshErrorType`] for credential renewal.
//!
//! # Modules
//!
//! - `error_type` - The 28 universal error categories and their metadata
//! - `raw` - Unclassified provider errors and provider families
//! - `classifier` - Ordered rules mapping raw errors to `ErrorType`
//! - `refresh` - Token refresh failure taxonomy

pub mod classifier;
pub mod error_type;
pub mod raw;
pub mod refresh;

#[cfg(test)]
mod classifier_props;

pub use classifier::{ErrorClassification, ErrorClassifier};
pub use error_type::{ErrorType, Severity};
pub use raw::{ProviderKind, RawProviderError};
pub use refresh::TokenRefreshErrorType;
