//! Asset finalization sinks.
//!
//! One sink is chosen at worker construction from configuration: inline
//! base64 payloads by default, or S3 offload when a bucket endpoint is
//! configured. Per-asset logic never branches on the storage mode.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use snapgen_core::config::S3Config;

use crate::collector::AssetRef;

/// A finalized output asset as returned to the job submitter.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedAsset {
    pub filename: String,
    /// Payload encoding: `base64` or `s3_url`.
    #[serde(rename = "type")]
    pub payload_type: String,
    /// The inline base64 payload or the fetchable URL.
    pub data: String,
}

/// Errors from asset storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The remote store rejected the upload.
    #[error("S3 upload failed: {0}")]
    Upload(String),
}

/// Destination for finalized asset bytes.
#[async_trait]
pub trait AssetSink: Send + Sync {
    async fn store(
        &self,
        job_id: &str,
        asset: &AssetRef,
        bytes: Vec<u8>,
    ) -> Result<FinalizedAsset, StorageError>;
}

/// Default sink: base64-encode the bytes into the response payload.
pub struct InlineSink;

#[async_trait]
impl AssetSink for InlineSink {
    async fn store(
        &self,
        _job_id: &str,
        asset: &AssetRef,
        bytes: Vec<u8>,
    ) -> Result<FinalizedAsset, StorageError> {
        Ok(FinalizedAsset {
            filename: asset.filename.clone(),
            payload_type: "base64".into(),
            data: STANDARD.encode(bytes),
        })
    }
}

/// Offload sink: upload to S3 and return a fetchable URL.
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    endpoint_url: Option<String>,
}

impl S3Sink {
    /// Build a sink from worker configuration.
    ///
    /// Credentials and region come from the ambient AWS environment; a
    /// configured endpoint URL switches to path-style addressing for
    /// S3-compatible stores.
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(url) = &config.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint_url.is_some())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }
}

#[async_trait]
impl AssetSink for S3Sink {
    async fn store(
        &self,
        job_id: &str,
        asset: &AssetRef,
        bytes: Vec<u8>,
    ) -> Result<FinalizedAsset, StorageError> {
        let key = format!("{job_id}/{}", asset.filename);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type_for(&asset.filename))
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        let url = self.object_url(&key);
        tracing::info!(job_id, filename = %asset.filename, url = %url, "Uploaded asset to S3");

        Ok(FinalizedAsset {
            filename: asset.filename.clone(),
            payload_type: "s3_url".into(),
            data: url,
        })
    }
}

/// Build the sink selected by configuration.
pub async fn sink_from_config(s3: Option<&S3Config>) -> std::sync::Arc<dyn AssetSink> {
    match s3 {
        Some(config) => std::sync::Arc::new(S3Sink::from_config(config).await),
        None => std::sync::Arc::new(InlineSink),
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
