//! History polling and asset retrieval.

use std::time::Duration;

use serde_json::Value;
use snapgen_comfyui::api::ComfyApi;

use crate::finalize::{AssetSink, FinalizedAsset};
use crate::CollectError;

/// The two asset kinds a workflow can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Video,
}

/// Reference to one finalized output file, as listed in the history record.
#[derive(Debug, Clone)]
pub struct AssetRef {
    pub filename: String,
    pub subfolder: String,
    /// ComfyUI file type (`output`, `input`, `temp`).
    pub file_type: String,
    pub kind: AssetKind,
}

/// Polling budget for asset readiness.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Exact number of history fetches before giving up.
    pub max_attempts: u32,
    /// Delay between consecutive attempts.
    pub delay: Duration,
}

/// The job's sole output payload: finalized assets grouped by kind.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobOutput {
    pub images: Vec<FinalizedAsset>,
    pub videos: Vec<FinalizedAsset>,
}

/// Collects and finalizes the outputs of one completed workflow.
pub struct OutputCollector<'a> {
    api: &'a ComfyApi,
    config: CollectorConfig,
}

impl<'a> OutputCollector<'a> {
    pub fn new(api: &'a ComfyApi, config: CollectorConfig) -> Self {
        Self { api, config }
    }

    /// Poll the history record until every expected asset kind is present.
    ///
    /// The "completed" WebSocket event can arrive before output files are
    /// flushed, so an empty or partial record is retried up to exactly
    /// [`CollectorConfig::max_attempts`] times.
    pub async fn await_assets(
        &self,
        prompt_id: &str,
        expected: &[AssetKind],
    ) -> Result<Vec<AssetRef>, CollectError> {
        for attempt in 1..=self.config.max_attempts {
            match self.api.history(prompt_id).await {
                Ok(history) => {
                    if let Some(record) = history.get(prompt_id) {
                        let assets = extract_assets(record);
                        let ready = !assets.is_empty()
                            && expected
                                .iter()
                                .all(|kind| assets.iter().any(|a| a.kind == *kind));
                        if ready {
                            return Ok(assets);
                        }
                    }
                    tracing::debug!(
                        prompt_id,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        "Outputs not ready, retrying",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        prompt_id,
                        attempt,
                        error = %e,
                        "History fetch failed",
                    );
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        Err(CollectError::AssetsNotReady {
            attempts: self.config.max_attempts,
        })
    }

    /// Download one asset's raw bytes.
    pub async fn fetch(&self, asset: &AssetRef) -> Result<Vec<u8>, CollectError> {
        self.api
            .view(&asset.filename, &asset.subfolder, &asset.file_type)
            .await
            .map_err(|source| CollectError::Fetch {
                filename: asset.filename.clone(),
                source,
            })
    }

    /// Await, download, and finalize every output asset for a prompt.
    pub async fn collect(
        &self,
        prompt_id: &str,
        expected: &[AssetKind],
        sink: &dyn AssetSink,
        job_id: &str,
    ) -> Result<JobOutput, CollectError> {
        let assets = self.await_assets(prompt_id, expected).await?;
        let mut output = JobOutput::default();

        for asset in &assets {
            let bytes = self.fetch(asset).await?;
            let finalized =
                sink.store(job_id, asset, bytes)
                    .await
                    .map_err(|e| CollectError::Storage {
                        filename: asset.filename.clone(),
                        message: e.to_string(),
                    })?;

            match asset.kind {
                AssetKind::Image => output.images.push(finalized),
                AssetKind::Video => output.videos.push(finalized),
            }
        }

        tracing::info!(
            job_id,
            prompt_id,
            images = output.images.len(),
            videos = output.videos.len(),
            "Processed workflow outputs",
        );
        Ok(output)
    }
}

/// Enumerate finalized assets from one history record.
///
/// Walks every node's `images` and `videos` arrays, skipping placeholder
/// entries: empty filenames and `temp`-type previews.
pub fn extract_assets(record: &Value) -> Vec<AssetRef> {
    let mut assets = Vec::new();

    let Some(outputs) = record.get("outputs").and_then(Value::as_object) else {
        return assets;
    };

    for node_output in outputs.values() {
        collect_kind(node_output, "images", AssetKind::Image, &mut assets);
        collect_kind(node_output, "videos", AssetKind::Video, &mut assets);
    }

    assets
}

fn collect_kind(node_output: &Value, key: &str, kind: AssetKind, assets: &mut Vec<AssetRef>) {
    let Some(entries) = node_output.get(key).and_then(Value::as_array) else {
        return;
    };

    for entry in entries {
        let filename = entry
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let file_type = entry
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("output");

        if filename.is_empty() || file_type == "temp" {
            continue;
        }

        assets.push(AssetRef {
            filename: filename.to_string(),
            subfolder: entry
                .get("subfolder")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            file_type: file_type.to_string(),
            kind,
        });
    }
}
