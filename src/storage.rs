//! Asset store: content-addressed image storage for problem photos and
//! "after" images of solutions. The engine only ever keeps the resulting [`AssetRef`].

use async_trait::async_trait;
use log::{error, info, warn};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AppConfig, AssetBackend};
use crate::models::AssetRef;

pub const ALLOWED_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("unsupported media type {0}")]
    Unsupported(String),
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub reference: AssetRef,
    pub mime: String,
    pub size: usize,
    /// Identical bytes were already stored; the upload is idempotent.
    pub duplicate: bool,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, bytes: &[u8]) -> Result<StoredAsset, AssetStoreError>;
    async fn load(&self, reference: &AssetRef) -> Result<(Vec<u8>, String), AssetStoreError>;
    fn public_url(&self, reference: &AssetRef) -> String;
}

pub fn content_ref(bytes: &[u8]) -> AssetRef {
    AssetRef(format!("{:x}", Sha256::digest(bytes)))
}

pub fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into())
}

fn checked_upload(bytes: &[u8]) -> Result<(AssetRef, String), AssetStoreError> {
    let mime = sniff_mime(bytes);
    if !ALLOWED_MIME.contains(&mime.as_str()) {
        return Err(AssetStoreError::Unsupported(mime));
    }
    Ok((content_ref(bytes), mime))
}

/// References are lowercase sha256 hex digests; anything else never reaches a backend.
pub fn is_valid_ref(reference: &AssetRef) -> bool {
    let r = reference.as_str();
    r.len() == 64 && r.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

fn join_url(base: &str, reference: &AssetRef) -> String {
    format!("{}/{}", base.trim_end_matches('/'), reference.as_str())
}

// ---------------- Filesystem implementation (local dev, single node) ----------------
pub struct FsAssetStore {
    root: PathBuf,
    public_base: String,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self { root: root.into(), public_base: public_base.into() }
    }

    fn path_for(&self, reference: &AssetRef) -> PathBuf {
        let r = reference.as_str();
        self.root.join(&r[0..2]).join(r)
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn upload(&self, bytes: &[u8]) -> Result<StoredAsset, AssetStoreError> {
        let (reference, mime) = checked_upload(bytes)?;
        let path = self.path_for(&reference);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(StoredAsset { reference, mime, size: bytes.len(), duplicate: true });
        }
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| AssetStoreError::Other(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!("asset write failed path={} err={e}", path.display());
            AssetStoreError::Other(e.to_string())
        })?;
        Ok(StoredAsset { reference, mime, size: bytes.len(), duplicate: false })
    }

    async fn load(&self, reference: &AssetRef) -> Result<(Vec<u8>, String), AssetStoreError> {
        if !is_valid_ref(reference) { return Err(AssetStoreError::NotFound); }
        let bytes = tokio::fs::read(self.path_for(reference)).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetStoreError::NotFound,
            _ => AssetStoreError::Other(e.to_string()),
        })?;
        let mime = sniff_mime(&bytes);
        Ok((bytes, mime))
    }

    fn public_url(&self, reference: &AssetRef) -> String { join_url(&self.public_base, reference) }
}

// ---------------- S3 Implementation (MinIO compatible) ----------------
pub struct S3AssetStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    prefix: String,
    public_base: String,
}

impl S3AssetStore {
    pub async fn new(public_base: String) -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "ideahub-assets".into());
        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set (MinIO / S3 endpoint)"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region));
        loader = loader.endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // path-style addressing: MinIO/local endpoints lack wildcard DNS
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized S3/MinIO client (path-style addressing enabled)");

        if let Err(e) = client.head_bucket().bucket(&bucket).send().await {
            warn!("head_bucket failed for '{bucket}' (will attempt create): {e:?}");
            let mut attempt = 0u32;
            let max_attempts = 8;
            loop {
                attempt += 1;
                match client.create_bucket().bucket(&bucket).send().await {
                    Ok(_) => {
                        info!("created bucket '{bucket}' (attempt {attempt})");
                        break;
                    }
                    Err(e2) if attempt >= max_attempts => {
                        error!("create_bucket failed for '{bucket}' after {attempt} attempts: {e2:?}");
                        return Err(anyhow::anyhow!("failed to ensure bucket '{bucket}': {e2}"));
                    }
                    Err(e2) => {
                        let backoff_ms = 200 * attempt.pow(2); // quadratic backoff
                        warn!("create_bucket attempt {attempt} failed for '{bucket}': {e2:?} (retrying in {backoff_ms}ms)");
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms as u64)).await;
                    }
                }
            }
        }

        Ok(Self { bucket, client, prefix: "assets".into(), public_base })
    }

    fn key_for(&self, reference: &AssetRef) -> String {
        let r = reference.as_str();
        format!("{}/{}/{}", self.prefix, &r[0..2], r)
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(&self, bytes: &[u8]) -> Result<StoredAsset, AssetStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        let (reference, mime) = checked_upload(bytes)?;
        let key = self.key_for(&reference);
        if self.client.head_object().bucket(&self.bucket).key(&key).send().await.is_ok() {
            return Ok(StoredAsset { reference, mime, size: bytes.len(), duplicate: true });
        }
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(mime.clone());
        if let Err(e) = put.send().await {
            error!("put_object failed ref={reference:?} key={key} bucket={} err={e:?}", self.bucket);
            return Err(AssetStoreError::Other(e.to_string()));
        }
        Ok(StoredAsset { reference, mime, size: bytes.len(), duplicate: false })
    }

    async fn load(&self, reference: &AssetRef) -> Result<(Vec<u8>, String), AssetStoreError> {
        if !is_valid_ref(reference) { return Err(AssetStoreError::NotFound); }
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key_for(reference))
            .send()
            .await
            .map_err(|_| AssetStoreError::NotFound)?;
        let data = obj
            .body
            .collect()
            .await
            .map_err(|e| AssetStoreError::Other(e.to_string()))?;
        let bytes = data.into_bytes().to_vec();
        let mime = sniff_mime(&bytes);
        Ok((bytes, mime))
    }

    fn public_url(&self, reference: &AssetRef) -> String { join_url(&self.public_base, reference) }
}

pub async fn build_asset_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn AssetStore>> {
    Ok(match cfg.asset_backend {
        AssetBackend::Fs => Arc::new(FsAssetStore::new(cfg.asset_dir.clone(), cfg.asset_public_base.clone())),
        AssetBackend::S3 => Arc::new(S3AssetStore::new(cfg.asset_public_base.clone()).await?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    ];

    #[tokio::test]
    async fn fs_upload_is_content_addressed_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAssetStore::new(dir.path(), "/assets/");
        let first = store.upload(PNG).await.unwrap();
        assert_eq!(first.mime, "image/png");
        assert!(!first.duplicate);
        assert_eq!(first.reference, content_ref(PNG));

        let again = store.upload(PNG).await.unwrap();
        assert!(again.duplicate);

        let (bytes, mime) = store.load(&first.reference).await.unwrap();
        assert_eq!(bytes, PNG);
        assert_eq!(mime, "image/png");
        assert_eq!(store.public_url(&first.reference), format!("/assets/{}", first.reference.as_str()));
    }

    #[tokio::test]
    async fn fs_rejects_non_images_and_bad_refs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAssetStore::new(dir.path(), "/assets");
        assert!(matches!(store.upload(b"hello world").await, Err(AssetStoreError::Unsupported(_))));
        assert!(matches!(store.load(&AssetRef("../etc/passwd".into())).await, Err(AssetStoreError::NotFound)));
    }
}
