//! Object store access
//!
//! [`ObjectStore`] is the seam the processor talks to; [`Storage`] is the S3
//! implementation, bound to a single bucket. The worker holds one for the
//! input bucket and one for the output bucket.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client};
use batch_common::checksum::sha256_hex;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::aws::load_sdk_config;

pub mod config;

/// Key-addressed storage for whole objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket (or equivalent namespace) this store reads and writes
    fn bucket(&self) -> &str;

    /// Fetch the full content of `key`
    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Write `data` under `key`, replacing any existing object
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<UploadResult>;

    /// Fetch `key` and decode it as UTF-8 text
    async fn download_text(&self, key: &str) -> Result<String> {
        let data = self.download(key).await?;
        String::from_utf8(data)
            .with_context(|| format!("Object {}/{} is not valid UTF-8", self.bucket(), key))
    }

    /// Upload a local file under `key`, replacing any existing object
    async fn upload_file(
        &self,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<UploadResult> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {} for upload", path.display()))?;
        self.upload(key, data, content_type).await
    }
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> Result<Self> {
        debug!("Initializing storage with config: {:?}", config);

        let sdk_config = load_sdk_config(&config.region, config.credentials.as_ref()).await;

        let mut s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(bucket = %config.bucket, "Storage client initialized");

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to download s3://{}/{}", self.bucket, key))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket))]
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<UploadResult> {
        let checksum = sha256_hex(&data);
        let size = data.len() as i64;

        debug!("Uploading {} bytes to s3://{}/{}", size, self.bucket, key);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;

        info!("Successfully uploaded to s3://{}/{}", self.bucket, key);

        Ok(UploadResult {
            key: key.to_string(),
            checksum,
            size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    /// Hex SHA-256 of the uploaded bytes
    pub checksum: String,
    pub size: i64,
}
