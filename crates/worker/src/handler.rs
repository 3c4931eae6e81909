//! The per-job orchestrator.

use std::sync::Arc;
use std::time::Duration;

use snapgen_comfyui::api::{ApiError, ComfyApi};
use snapgen_comfyui::client::ComfyClient;
use snapgen_comfyui::events::ExecutionEvent;
use snapgen_comfyui::monitor::{monitor, MonitorConfig, MonitorError};
use snapgen_comfyui::reconnect::ReconnectConfig;
use snapgen_comfyui::upload::{prepare_input_image, ImageInputError};
use snapgen_core::config::WorkerConfig;
use snapgen_core::resources::{check_headroom, snapshot, ResourceExhausted, ResourceFloors};
use snapgen_core::validation::{validate_job_input, ValidationFailure};
use snapgen_outputs::{
    sink_from_config, AssetKind, AssetSink, CollectError, CollectorConfig, JobOutput,
    OutputCollector,
};
use snapgen_workflows::template::output_kinds;
use snapgen_workflows::{catalog, prepare, requires_input_image, Substitutions, TemplateError, TemplateStore};

use crate::response::JobResponse;

/// Everything that can abort a job before it produces output.
///
/// All variants are converted to a `{error}` response at the handler
/// boundary; none propagate further.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    ResourceExhausted(#[from] ResourceExhausted),

    #[error("ComfyUI server is not ready: {0}")]
    ServerUnavailable(String),

    #[error(transparent)]
    ImageInput(#[from] ImageInputError),

    #[error("Error uploading image: {0}")]
    Upload(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Failed to queue workflow: {0}")]
    SubmissionRejected(String),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// Processes jobs one at a time against a single local ComfyUI instance.
///
/// Constructed once at startup; holds no per-job state, so a shared
/// reference can serve sequential jobs.
pub struct JobHandler {
    config: WorkerConfig,
    api: ComfyApi,
    client: ComfyClient,
    store: TemplateStore,
    sink: Arc<dyn AssetSink>,
}

impl JobHandler {
    /// Build a handler and its storage sink from configuration.
    pub async fn from_config(config: WorkerConfig) -> Self {
        let api = ComfyApi::new(config.api_url.clone());
        let client = ComfyClient::new(config.ws_url.clone(), config.api_url.clone());
        let store = TemplateStore::new(config.templates_dir.clone());
        let sink = sink_from_config(config.s3.as_ref()).await;

        Self {
            config,
            api,
            client,
            store,
            sink,
        }
    }

    /// Single-shot liveness probe of the ComfyUI server, for health checks.
    pub async fn probe_server(&self) -> Result<(), ApiError> {
        self.api.check_server(1, Duration::ZERO).await
    }

    /// Run one job end to end.
    ///
    /// Never panics or returns an error: every failure is mapped to
    /// [`JobResponse::Error`] here, and every path logs with the job ID
    /// attached for correlation.
    pub async fn handle(&self, job_id: &str, input: &serde_json::Value) -> JobResponse {
        tracing::info!(job_id, "Starting job");

        match self.run(job_id, input).await {
            Ok(output) => {
                tracing::info!(
                    job_id,
                    images = output.images.len(),
                    videos = output.videos.len(),
                    "Job completed",
                );
                JobResponse::output(output)
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Job failed");
                JobResponse::error(e.to_string())
            }
        }
    }

    async fn run(&self, job_id: &str, input: &serde_json::Value) -> Result<JobOutput, HandlerError> {
        let job = validate_job_input(input, &catalog::template_names())?;

        // Fail fast on low headroom before touching the upstream server.
        let resources = snapshot(&self.config.disk_check_path);
        check_headroom(
            &resources,
            &ResourceFloors {
                min_available_memory_bytes: self.config.min_available_memory_bytes,
                min_free_disk_bytes: self.config.min_free_disk_bytes,
            },
        )?;

        tracing::info!(
            job_id,
            template = %job.template,
            width = job.width,
            height = job.height,
            length = job.length,
            "Processing workflow",
        );

        self.api
            .check_server(
                self.config.server_probe_attempts,
                self.config.server_probe_interval,
            )
            .await
            .map_err(|e| HandlerError::ServerUnavailable(e.to_string()))?;

        let template = self.store.load(&job.template)?;

        let uploaded_name = match (requires_input_image(&template), job.image.as_deref()) {
            (true, Some(image_data)) => {
                let prepared = prepare_input_image(image_data, job.width, job.height)?;
                tracing::info!(job_id, filename = %prepared.filename, "Uploading input image");
                let response = self
                    .api
                    .upload_image(&prepared.filename, prepared.png_bytes)
                    .await
                    .map_err(|e| HandlerError::Upload(e.to_string()))?;
                Some(response.name)
            }
            // prepare() below reports the missing placeholder.
            (true, None) => None,
            (false, provided) => {
                if provided.is_some() {
                    tracing::debug!(job_id, "Template takes no input image, ignoring provided image");
                }
                None
            }
        };

        let workflow = prepare(
            &template,
            &Substitutions {
                prompt: &job.prompt,
                image_filename: uploaded_name.as_deref(),
                width: job.width,
                height: job.height,
                length: job.length,
            },
        )?;

        let kinds = output_kinds(&workflow);
        let mut expected = Vec::new();
        if kinds.images {
            expected.push(AssetKind::Image);
        }
        if kinds.videos {
            expected.push(AssetKind::Video);
        }

        // Connect before submitting so the session's client ID is attached
        // to the prompt and ComfyUI addresses execution messages to us.
        let session = self
            .client
            .connect()
            .await
            .map_err(|e| HandlerError::ServerUnavailable(e.to_string()))?;

        let submitted = self
            .api
            .submit(&workflow, &session.client_id, job.comfy_org_api_key.as_deref())
            .await
            .map_err(|e| HandlerError::SubmissionRejected(e.to_string()))?;
        let prompt_id = submitted.prompt_id;
        tracing::info!(
            job_id,
            prompt_id = %prompt_id,
            queue_position = submitted.number,
            "Workflow queued",
        );

        let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(64);
        let progress_task = tokio::spawn({
            let job_id = job_id.to_string();
            async move {
                while let Some(event) = events_rx.recv().await {
                    log_event(&job_id, &event);
                }
            }
        });

        let monitor_config = MonitorConfig {
            timeout: self.config.job_timeout,
            reconnect: ReconnectConfig {
                max_attempts: self.config.ws_reconnect_attempts,
                ..ReconnectConfig::default()
            },
        };
        let monitor_result = monitor(
            session,
            &self.client,
            &self.api,
            &prompt_id,
            &monitor_config,
            events_tx,
        )
        .await;
        let _ = progress_task.await;
        monitor_result?;

        let collector = OutputCollector::new(
            &self.api,
            CollectorConfig {
                max_attempts: self.config.history_attempts,
                delay: self.config.history_delay,
            },
        );
        let output = collector
            .collect(&prompt_id, &expected, self.sink.as_ref(), job_id)
            .await?;

        Ok(output)
    }
}

/// Emit one progress log line per execution event, keyed by job ID.
fn log_event(job_id: &str, event: &ExecutionEvent) {
    match event {
        ExecutionEvent::Queued => tracing::info!(job_id, "Workflow accepted into queue"),
        ExecutionEvent::Executing { node } => {
            tracing::debug!(job_id, node = %node, "Executing node");
        }
        ExecutionEvent::Progress { fraction } => {
            tracing::debug!(job_id, percent = (fraction * 100.0) as i16, "Generation progress");
        }
        ExecutionEvent::Completed => tracing::info!(job_id, "Generation completed"),
        ExecutionEvent::Failed { detail } => {
            tracing::error!(job_id, detail = %detail, "Generation failed");
        }
    }
}
