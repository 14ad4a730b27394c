//! Storage for uploaded CVs and their metadata.
//!
//! Layout is the same on every backend: `cv/<upload_id>.pdf` holds the file and
//! `data/<upload_id>.json` holds the metadata. One metadata file exists per
//! upload, which is what the statistics count.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, StorageKind};
use crate::intake::extract::TextStats;
use crate::intake::models::UploadMetadata;

pub const CV_FOLDER: &str = "cv";
pub const DATA_FOLDER: &str = "data";

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Type name reported by `/api/stats`.
    fn name(&self) -> &'static str;

    /// Writes `content` and returns where it was written.
    async fn save_file(&self, content: Bytes, filename: &str, folder: &str) -> Result<String>;

    async fn save_json(&self, data: &Value, filename: &str, folder: &str) -> Result<String> {
        let json = serde_json::to_vec_pretty(data).context("Failed to serialize metadata")?;
        self.save_file(Bytes::from(json), filename, folder).await
    }

    /// Public URL of a stored file.
    fn file_url(&self, filename: &str, folder: &str) -> String;

    /// Number of files in `folder` with the given extension.
    async fn count_files(&self, folder: &str, extension: &str) -> Result<u64>;

    async fn read_json(&self, filename: &str, folder: &str) -> Result<Option<Value>>;

    async fn exists(&self, filename: &str, folder: &str) -> Result<bool>;
}

// ────────────────────────────────────────────────────────────────────────────
// Local filesystem
// ────────────────────────────────────────────────────────────────────────────

/// Files under `root`, served back by the router at `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for folder in [CV_FOLDER, DATA_FOLDER] {
            let dir = root.join(folder);
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(Self { root })
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    fn name(&self) -> &'static str {
        "LocalStorageBackend"
    }

    async fn save_file(&self, content: Bytes, filename: &str, folder: &str) -> Result<String> {
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(filename);

        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(&content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        file.sync_all().await?;

        Ok(path.display().to_string())
    }

    fn file_url(&self, filename: &str, folder: &str) -> String {
        format!("/uploads/{folder}/{filename}")
    }

    async fn count_files(&self, folder: &str, extension: &str) -> Result<u64> {
        let dir = self.root.join(folder);
        if !fs::try_exists(&dir).await? {
            return Ok(0);
        }
        let mut entries = fs::read_dir(&dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let matches = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if matches && entry.file_type().await?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn read_json(&self, filename: &str, folder: &str) -> Result<Option<Value>> {
        let path = self.root.join(folder).join(filename);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn exists(&self, filename: &str, folder: &str) -> Result<bool> {
        Ok(fs::try_exists(self.root.join(folder).join(filename)).await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// S3 / MinIO
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct S3StorageBackend {
    client: S3Client,
    bucket: String,
    endpoint: String,
}

impl S3StorageBackend {
    pub fn new(client: S3Client, bucket: String, endpoint: String) -> Self {
        Self {
            client,
            bucket,
            endpoint,
        }
    }

    fn key(folder: &str, filename: &str) -> String {
        format!("{folder}/{filename}")
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
pub async fn build_s3_client(endpoint: &str, access_key_id: &str, secret: &str) -> S3Client {
    let credentials = Credentials::new(access_key_id, secret, None, None, "cv-upload-static");

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(endpoint)
        .load()
        .await;

    S3Client::new(&s3_config)
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    fn name(&self) -> &'static str {
        "S3StorageBackend"
    }

    async fn save_file(&self, content: Bytes, filename: &str, folder: &str) -> Result<String> {
        let key = Self::key(folder, filename);
        let content_type = if filename.ends_with(".json") {
            "application/json"
        } else {
            "application/pdf"
        };
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{key}", self.bucket))?;
        Ok(format!("s3://{}/{key}", self.bucket))
    }

    fn file_url(&self, filename: &str, folder: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            Self::key(folder, filename)
        )
    }

    async fn count_files(&self, folder: &str, extension: &str) -> Result<u64> {
        let prefix = format!("{folder}/");
        let suffix = format!(".{extension}");
        let mut count = 0;
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .with_context(|| format!("Failed to list s3://{}/{prefix}", self.bucket))?;
            count += page
                .contents()
                .iter()
                .filter(|o| o.key().is_some_and(|k| k.ends_with(&suffix)))
                .count() as u64;
            match page.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(count)
    }

    async fn read_json(&self, filename: &str, folder: &str) -> Result<Option<Value>> {
        let key = Self::key(folder, filename);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => return Err(e).context(format!("Failed to fetch s3://{}/{key}", self.bucket)),
        };
        let bytes = output.body.collect().await?.into_bytes();
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn exists(&self, filename: &str, folder: &str) -> Result<bool> {
        let key = Self::key(folder, filename);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(e).context(format!("Failed to stat s3://{}/{key}", self.bucket)),
        }
    }
}

/// Builds the backend selected by `STORAGE_BACKEND`.
pub async fn build_storage(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    match &config.storage {
        StorageKind::Local => {
            let backend = LocalStorageBackend::new(&config.upload_dir).await?;
            info!("Local storage at {}", config.upload_dir.display());
            Ok(Arc::new(backend))
        }
        StorageKind::S3 {
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
        } => {
            let client = build_s3_client(endpoint, access_key_id, secret_access_key).await;
            info!("S3 storage in bucket {bucket}");
            Ok(Arc::new(S3StorageBackend::new(
                client,
                bucket.clone(),
                endpoint.clone(),
            )))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Upload persistence
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub upload_id: Uuid,
    pub cv_url: String,
    pub data_url: String,
    pub cv_path: String,
    pub data_path: String,
}

/// Writes one upload: the CV first, then its metadata.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn StorageBackend>,
}

impl StorageService {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub async fn save_cv_upload(
        &self,
        cv_content: Bytes,
        form_data: &Map<String, Value>,
        text_stats: Option<TextStats>,
    ) -> Result<StoredUpload> {
        let upload_id = Uuid::new_v4();
        let cv_filename = format!("{upload_id}.pdf");
        let data_filename = format!("{upload_id}.json");

        let cv_path = self
            .backend
            .save_file(cv_content, &cv_filename, CV_FOLDER)
            .await?;

        let metadata = UploadMetadata {
            upload_id,
            form_data: Value::Object(form_data.clone()),
            cv_filename: cv_filename.clone(),
            upload_timestamp: chrono::Utc::now().to_rfc3339(),
            text_stats,
        };
        let data_path = self
            .backend
            .save_json(&serde_json::to_value(&metadata)?, &data_filename, DATA_FOLDER)
            .await?;

        info!(%upload_id, backend = self.backend.name(), "CV upload stored");

        Ok(StoredUpload {
            upload_id,
            cv_url: self.backend.file_url(&cv_filename, CV_FOLDER),
            data_url: self.backend.file_url(&data_filename, DATA_FOLDER),
            cv_path,
            data_path,
        })
    }

    pub async fn count_uploads(&self) -> Result<u64> {
        self.backend.count_files(DATA_FOLDER, "json").await
    }

    pub async fn load_metadata(&self, upload_id: Uuid) -> Result<Option<Value>> {
        self.backend
            .read_json(&format!("{upload_id}.json"), DATA_FOLDER)
            .await
    }

    pub async fn cv_available(&self, upload_id: Uuid) -> Result<bool> {
        self.backend
            .exists(&format!("{upload_id}.pdf"), CV_FOLDER)
            .await
    }
}
