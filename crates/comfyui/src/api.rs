//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (liveness probing, image upload, workflow
//! submission, history retrieval, output download) using [`reqwest`].

use std::time::Duration;

use serde::Deserialize;

/// Per-request timeout for the liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a single ComfyUI instance.
pub struct ComfyApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after successfully
/// queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    pub number: i32,
}

/// Response returned by `/upload/image`.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    /// Server-assigned filename to reference from workflows.
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The server never answered the liveness probe.
    #[error("ComfyUI server did not respond after {attempts} attempts")]
    Unavailable { attempts: u32 },
}

impl ComfyApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Base HTTP URL of this instance.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Probe `/system_stats` until the server answers or `attempts` runs out.
    ///
    /// Callers must run this before submitting anything -- a cold worker may
    /// come up well before its colocated ComfyUI finishes loading models.
    pub async fn check_server(&self, attempts: u32, interval: Duration) -> Result<(), ApiError> {
        tracing::info!("Checking ComfyUI server at {}", self.api_url);

        for attempt in 1..=attempts {
            let response = self
                .client
                .get(format!("{}/system_stats", self.api_url))
                .timeout(PROBE_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("ComfyUI server is reachable");
                    return Ok(());
                }
                Ok(resp) => {
                    tracing::debug!(status = resp.status().as_u16(), attempt, "Probe rejected");
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "Probe failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        tracing::error!(attempts, "Failed to connect to ComfyUI server");
        Err(ApiError::Unavailable { attempts })
    }

    /// Upload an input image.
    ///
    /// Sends a multipart `POST /upload/image` with `overwrite=true` and
    /// returns the server-assigned filename to reference in workflows.
    pub async fn upload_image(
        &self,
        filename: &str,
        png_bytes: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        let part = reqwest::multipart::Part::bytes(png_bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON and
    /// client ID. A provided Comfy.org API key rides along in `extra_data`
    /// for API-backed nodes. Returns the server-assigned `prompt_id`.
    pub async fn submit(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
        api_key: Option<&str>,
    ) -> Result<SubmitResponse, ApiError> {
        let mut body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });
        if let Some(key) = api_key {
            body["extra_data"] = serde_json::json!({ "api_key_comfy_org": key });
        }

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. The returned JSON is
    /// keyed by prompt ID and contains output file references, node
    /// results, and status.
    pub async fn history(&self, prompt_id: &str) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download one output file via `GET /view`.
    pub async fn view(
        &self,
        filename: &str,
        subfolder: &str,
        file_type: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", file_type),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or an [`ApiError::Status`] containing the
    /// status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
