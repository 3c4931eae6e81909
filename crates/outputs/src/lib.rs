//! Output collection and finalization for completed workflows.
//!
//! A workflow's terminal "completed" event can land before its output
//! files are durably written, so the collector polls the history endpoint
//! until every expected asset kind is present, then downloads each asset
//! and hands it to the configured sink (inline base64 by default, S3 when
//! an offload target is configured).

pub mod collector;
pub mod finalize;

pub use collector::{extract_assets, AssetKind, AssetRef, CollectorConfig, JobOutput, OutputCollector};
pub use finalize::{sink_from_config, AssetSink, FinalizedAsset, InlineSink, S3Sink};

use snapgen_comfyui::api::ApiError;

/// Errors from output collection and finalization.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The expected assets never appeared in the history record.
    #[error("Outputs not ready after {attempts} history attempts")]
    AssetsNotReady { attempts: u32 },

    /// An asset download failed.
    #[error("Failed to fetch output asset '{filename}': {source}")]
    Fetch {
        filename: String,
        source: ApiError,
    },

    /// The configured sink rejected an asset.
    #[error("Failed to store output asset '{filename}': {message}")]
    Storage { filename: String, message: String },
}
