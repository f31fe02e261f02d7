//! Object storage adapter using Apache OpenDAL.

use chrono::Utc;
use opendal::{ErrorKind, Operator, services};
use tracing::{debug, info, warn};
use uplink_shared::{HealthConfig, StorageSettings};
use uuid::Uuid;

use super::config::StorageProvider;
use super::error::ProviderError;
use crate::health::{CloudStorageHealthStatus, HealthTracker};
use crate::taxonomy::ProviderKind;

/// Prefix of the objects written by health probes.
const PROBE_PREFIX: &str = ".uplink/health";

/// Provider I/O behind one OpenDAL operator.
///
/// Every failure is returned as a classified [`ProviderError`]; the adapter
/// itself never retries.
pub struct ProviderAdapter {
    operator: Operator,
    provider: StorageProvider,
    max_file_size: u64,
    tracker: HealthTracker,
}

impl ProviderAdapter {
    /// Creates an adapter for `provider`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderInitializationFailed` if the operator cannot be built.
    pub fn new(
        provider: StorageProvider,
        max_file_size: u64,
        tracker: HealthTracker,
    ) -> Result<Self, ProviderError> {
        let operator = Self::create_operator(&provider)?;
        Ok(Self {
            operator,
            provider,
            max_file_size,
            tracker,
        })
    }

    /// Creates an adapter from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are incomplete or the operator cannot be built.
    pub fn from_settings(
        settings: &StorageSettings,
        health: &HealthConfig,
    ) -> Result<Self, ProviderError> {
        let provider = StorageProvider::from_settings(settings)?;
        Self::new(provider, settings.max_file_size, HealthTracker::new(health))
    }

    fn create_operator(provider: &StorageProvider) -> Result<Operator, ProviderError> {
        let kind = provider.kind();
        let init_err = |e: opendal::Error| ProviderError::initialization(kind, &e);

        let operator = match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);
                Operator::new(builder).map_err(init_err)?.finish()
            }
            StorageProvider::AzureBlob {
                endpoint,
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .endpoint(endpoint)
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);
                Operator::new(builder).map_err(init_err)?.finish()
            }
            StorageProvider::LocalFs { root } => {
                let root = root.to_str().ok_or_else(|| {
                    ProviderError::not_configured(kind, "storage root is not valid UTF-8")
                })?;
                Operator::new(services::Fs::default().root(root))
                    .map_err(init_err)?
                    .finish()
            }
        };

        Ok(operator)
    }

    /// Provider family of this adapter.
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Provider configuration.
    #[must_use]
    pub fn provider(&self) -> &StorageProvider {
        &self.provider
    }

    /// Writes `bytes` to `path`.
    ///
    /// # Errors
    ///
    /// Returns `FileTooLarge` above the size limit, or the classified provider failure.
    pub async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), ProviderError> {
        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if size > self.max_file_size {
            return Err(ProviderError::file_too_large(
                self.kind(),
                size,
                self.max_file_size,
            ));
        }

        self.operator
            .write(path, bytes)
            .await
            .map_err(|e| self.classify(&e))?;

        debug!(provider = %self.kind(), path, size, "Uploaded object");
        Ok(())
    }

    /// Deletes `path`. Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns the classified provider failure.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.operator
            .delete(path)
            .await
            .map_err(|e| self.classify(&e))
    }

    /// Returns whether `path` exists.
    ///
    /// # Errors
    ///
    /// Returns the classified provider failure for anything but "not found".
    pub async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        match self.operator.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.classify(&e)),
        }
    }

    /// Probes the connection and applies the outcome to `current`.
    ///
    /// The probe writes, stats and deletes a small object under a reserved
    /// prefix. Never fails: a failing probe is a health result.
    pub async fn check_health(&self, current: &CloudStorageHealthStatus) -> CloudStorageHealthStatus {
        let now = Utc::now();
        match self.probe().await {
            Ok(()) => {
                info!(provider = %self.kind(), "Health probe succeeded");
                self.tracker.record_success(current, now)
            }
            Err(err) => {
                warn!(
                    provider = %self.kind(),
                    error_type = err.error_code(),
                    error = %err.raw(),
                    "Health probe failed"
                );
                self.tracker
                    .record_failure(current, err.error_type(), err.raw().message.clone(), now)
            }
        }
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        let path = format!("{PROBE_PREFIX}/{}", Uuid::new_v4());

        self.operator
            .write(&path, b"ok".to_vec())
            .await
            .map_err(|e| self.classify(&e))?;
        self.operator
            .stat(&path)
            .await
            .map_err(|e| self.classify(&e))?;
        self.delete(&path).await
    }

    fn classify(&self, err: &opendal::Error) -> ProviderError {
        ProviderError::from_opendal(self.kind(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ErrorType;
    use tempfile::TempDir;

    fn local_adapter(dir: &TempDir, max_file_size: u64) -> ProviderAdapter {
        ProviderAdapter::new(
            StorageProvider::local_fs(dir.path()),
            max_file_size,
            HealthTracker::default(),
        )
        .expect("local adapter should build")
    }

    #[tokio::test]
    async fn test_upload_exists_delete() {
        let dir = TempDir::new().unwrap();
        let adapter = local_adapter(&dir, 1024);

        assert!(!adapter.exists("docs/report.pdf").await.unwrap());

        adapter
            .upload("docs/report.pdf", b"%PDF-1.7".to_vec())
            .await
            .unwrap();
        assert!(adapter.exists("docs/report.pdf").await.unwrap());
        assert!(dir.path().join("docs/report.pdf").exists());

        adapter.delete("docs/report.pdf").await.unwrap();
        assert!(!adapter.exists("docs/report.pdf").await.unwrap());

        // Idempotent.
        adapter.delete("docs/report.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_files() {
        let dir = TempDir::new().unwrap();
        let adapter = local_adapter(&dir, 4);

        let err = adapter.upload("big.bin", vec![0; 5]).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::FileTooLarge);
        assert!(!dir.path().join("big.bin").exists());
    }

    #[tokio::test]
    async fn test_check_health_recovers_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let adapter = local_adapter(&dir, 1024);
        let current = CloudStorageHealthStatus::unhealthy(ProviderKind::LocalFs, 4, "disk gone");

        let next = adapter.check_health(&current).await;

        assert!(next.is_healthy());
        assert_eq!(next.consecutive_failures, 0);
        assert!(next.last_successful_operation_at.is_some());

        let probes = dir.path().join(PROBE_PREFIX);
        let leftover = std::fs::read_dir(&probes).map_or(0, |entries| entries.count());
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_from_settings_builds_local_adapter() {
        let dir = TempDir::new().unwrap();
        let settings = StorageSettings {
            root: dir.path().to_string_lossy().into_owned(),
            ..StorageSettings::default()
        };

        let adapter = ProviderAdapter::from_settings(&settings, &HealthConfig::default()).unwrap();
        assert_eq!(adapter.kind(), ProviderKind::LocalFs);
    }
}
