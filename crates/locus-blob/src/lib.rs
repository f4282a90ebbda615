//! locus-blob - BlobStoreClient.
//!
//! Storage is an `opendal::Operator`, exactly as `otlp2parquet-storage`'s
//! `ParquetWriter`/`opendal_storage` abstract over S3/R2/filesystem behind
//! one interface. Production selects the S3 service; simulation (never used
//! in production) selects the filesystem service. The choice is made once
//! at construction, not branched on in the hot path.
//!
//! Blob metadata is carried in a sidecar object `{name}.metadata.json`
//! rather than relying on a particular backend's custom-header support, so
//! list/read/delete behave identically on every backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use locus_config::{BlobBackend, BlobConfig};
use locus_core::types::{BlobMetadata, Family};
use locus_core::PipelineError;
use opendal::Operator;

#[async_trait]
pub trait BlobStoreClient: Send + Sync {
    async fn upload(
        &self,
        name: &str,
        body: String,
        metadata: BlobMetadata,
    ) -> Result<UploadResult, PipelineError>;

    async fn list(
        &self,
        prefix: &str,
        family_filter: Option<Family>,
    ) -> Result<Vec<BlobInfo>, PipelineError>;

    async fn read(&self, name: &str) -> Result<String, PipelineError>;

    async fn delete(&self, name: &str) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub uri: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub metadata: BlobMetadata,
}

/// `opendal`-backed blob store. `new_production` and `new_simulation`
/// construct the two backends; nothing downstream needs to know which one
/// it got.
pub struct OpenDalBlobStore {
    operator: Operator,
}

impl OpenDalBlobStore {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    pub fn from_config(config: &BlobConfig) -> Result<Self, PipelineError> {
        let operator = match config.backend {
            BlobBackend::Fs => {
                let builder = opendal::services::Fs::default().root(&config.fs_root);
                Operator::new(builder)
                    .map_err(|e| {
                        PipelineError::permanent_config("blob", format!("fs backend: {e}"))
                    })?
                    .finish()
            }
            BlobBackend::S3 => {
                let mut builder = opendal::services::S3::default()
                    .bucket(&config.bucket)
                    .region(&config.region);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.endpoint(endpoint);
                }
                Operator::new(builder)
                    .map_err(|e| {
                        PipelineError::permanent_config("blob", format!("s3 backend: {e}"))
                    })?
                    .finish()
            }
        };
        Ok(Self { operator })
    }

    fn metadata_path(name: &str) -> String {
        format!("{name}.metadata.json")
    }

    fn map_io_err(system: &'static str, err: opendal::Error) -> PipelineError {
        use opendal::ErrorKind;
        match err.kind() {
            ErrorKind::ConfigInvalid | ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                PipelineError::permanent_config(system, err.to_string())
            }
            _ => PipelineError::transient(system, err.to_string()),
        }
    }
}

#[async_trait]
impl BlobStoreClient for OpenDalBlobStore {
    async fn upload(
        &self,
        name: &str,
        body: String,
        metadata: BlobMetadata,
    ) -> Result<UploadResult, PipelineError> {
        let size_bytes = body.len() as u64;

        self.operator
            .write(name, body)
            .await
            .map_err(|e| Self::map_io_err("blob", e))?;

        let metadata_json = serde_json::to_vec(&metadata)
            .map_err(|e| PipelineError::permanent_config("blob", e.to_string()))?;
        self.operator
            .write(&Self::metadata_path(name), metadata_json)
            .await
            .map_err(|e| Self::map_io_err("blob", e))?;

        Ok(UploadResult {
            uri: name.to_string(),
            size_bytes,
        })
    }

    async fn list(
        &self,
        prefix: &str,
        family_filter: Option<Family>,
    ) -> Result<Vec<BlobInfo>, PipelineError> {
        let entries = self
            .operator
            .list(prefix)
            .await
            .map_err(|e| Self::map_io_err("blob", e))?;

        let mut infos = Vec::new();
        for entry in entries {
            let name = entry.path().to_string();
            if name.ends_with(".metadata.json") || name.ends_with('/') {
                continue;
            }

            let meta_bytes = match self.operator.read(&Self::metadata_path(&name)).await {
                Ok(buf) => buf.to_vec(),
                Err(_) => continue, // no sidecar: not one of our blobs
            };
            let metadata: BlobMetadata = match serde_json::from_slice(&meta_bytes) {
                Ok(m) => m,
                Err(_) => continue,
            };

            if let Some(family) = family_filter {
                if metadata.data_type != family {
                    continue;
                }
            }

            let stat = self
                .operator
                .stat(&name)
                .await
                .map_err(|e| Self::map_io_err("blob", e))?;

            infos.push(BlobInfo {
                name,
                size_bytes: stat.content_length(),
                created_at: metadata.uploaded_at,
                metadata,
            });
        }

        Ok(infos)
    }

    async fn read(&self, name: &str) -> Result<String, PipelineError> {
        let bytes = self
            .operator
            .read(name)
            .await
            .map_err(|e| Self::map_io_err("blob", e))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| PipelineError::permanent_config("blob", e.to_string()))
    }

    async fn delete(&self, name: &str) -> Result<(), PipelineError> {
        self.operator
            .delete(name)
            .await
            .map_err(|e| Self::map_io_err("blob", e))?;
        // Best-effort: an orphaned sidecar is harmless, but clean it up anyway.
        let _ = self.operator.delete(&Self::metadata_path(name)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_core::types::Family;
    use opendal::services;

    fn memory_store() -> OpenDalBlobStore {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        OpenDalBlobStore::new(op)
    }

    #[tokio::test]
    async fn upload_then_read_round_trips_body() {
        let store = memory_store();
        let metadata = BlobMetadata::new(Family::Gps, "p1".into(), 3);
        store
            .upload("gps-data/x.json", "line1\nline2".into(), metadata)
            .await
            .unwrap();

        let body = store.read("gps-data/x.json").await.unwrap();
        assert_eq!(body, "line1\nline2");
    }

    #[tokio::test]
    async fn list_filters_by_family_and_skips_sidecars() {
        let store = memory_store();
        store
            .upload(
                "gps-data/a.json",
                "x".into(),
                BlobMetadata::new(Family::Gps, "a".into(), 1),
            )
            .await
            .unwrap();
        store
            .upload(
                "gps-data/b.json",
                "y".into(),
                BlobMetadata::new(Family::Mobile, "b".into(), 1),
            )
            .await
            .unwrap();

        let gps_only = store.list("gps-data/", Some(Family::Gps)).await.unwrap();
        assert_eq!(gps_only.len(), 1);
        assert_eq!(gps_only[0].name, "gps-data/a.json");

        let all = store.list("gps-data/", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_blob_and_sidecar() {
        let store = memory_store();
        let metadata = BlobMetadata::new(Family::Gps, "a".into(), 1);
        store
            .upload("gps-data/a.json", "x".into(), metadata)
            .await
            .unwrap();

        store.delete("gps-data/a.json").await.unwrap();
        assert!(store.read("gps-data/a.json").await.is_err());
    }
}
