//! Provider connection settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uplink_shared::StorageSettings;

use super::error::ProviderError;
use crate::taxonomy::ProviderKind;

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, DigitalOcean Spaces
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region.
        region: String,
    },
    /// Azure Blob Storage
    AzureBlob {
        /// Blob service endpoint.
        endpoint: String,
        /// Storage account name.
        account: String,
        /// Storage account key.
        access_key: String,
        /// Container name.
        container: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Create S3-compatible provider (Cloudflare R2, Supabase, AWS S3).
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create Azure Blob Storage provider on the public cloud endpoint.
    #[must_use]
    pub fn azure_blob(
        account: impl Into<String>,
        access_key: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        let account = account.into();
        Self::AzureBlob {
            endpoint: format!("https://{account}.blob.core.windows.net"),
            account,
            access_key: access_key.into(),
            container: container.into(),
        }
    }

    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Builds the provider from loaded settings.
    ///
    /// For Azure, `access_key_id` holds the account name and
    /// `secret_access_key` the account key.
    ///
    /// # Errors
    ///
    /// Returns `ProviderNotConfigured` when the kind has no object-storage
    /// backend or a required setting is missing.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, ProviderError> {
        let kind = ProviderKind::parse(&settings.kind);
        let require = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    ProviderError::not_configured(kind, format!("storage.{name} is required"))
                })
        };

        match kind {
            ProviderKind::S3 => {
                let region = settings.region.clone().unwrap_or_else(|| "auto".to_string());
                let endpoint = settings
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| format!("https://s3.{region}.amazonaws.com"));
                Ok(Self::s3(
                    endpoint,
                    require(&settings.bucket, "bucket")?,
                    require(&settings.access_key_id, "access_key_id")?,
                    require(&settings.secret_access_key, "secret_access_key")?,
                    region,
                ))
            }
            ProviderKind::AzureBlob => {
                let account = require(&settings.access_key_id, "access_key_id")?;
                Ok(Self::AzureBlob {
                    endpoint: settings
                        .endpoint
                        .clone()
                        .unwrap_or_else(|| format!("https://{account}.blob.core.windows.net")),
                    account,
                    access_key: require(&settings.secret_access_key, "secret_access_key")?,
                    container: require(&settings.bucket, "bucket")?,
                })
            }
            ProviderKind::LocalFs => Ok(Self::local_fs(&settings.root)),
            ProviderKind::GoogleDrive | ProviderKind::Other => Err(ProviderError::not_configured(
                kind,
                format!("no object storage backend for provider '{}'", settings.kind),
            )),
        }
    }

    /// Provider family used for classification.
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::S3 { .. } => ProviderKind::S3,
            Self::AzureBlob { .. } => ProviderKind::AzureBlob,
            Self::LocalFs { .. } => ProviderKind::LocalFs,
        }
    }

    /// Get the bucket/container name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::AzureBlob { container, .. } => container,
            Self::LocalFs { root } => root.to_str().unwrap_or("local"),
        }
    }
}
