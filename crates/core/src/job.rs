//! Validated job input model.

/// A job request after schema validation, with defaults applied.
///
/// Produced by [`crate::validation::validate_job_input`]; downstream code
/// can rely on the bounds documented there.
#[derive(Debug, Clone)]
pub struct JobInput {
    /// Generation prompt text. Never empty.
    pub prompt: String,
    /// Optional input image as a base64 data URI or bare base64 string.
    pub image: Option<String>,
    /// Requested output width in pixels.
    pub width: u32,
    /// Requested output height in pixels.
    pub height: u32,
    /// Requested frame count for video templates.
    pub length: u32,
    /// Name of the workflow template to run.
    pub template: String,
    /// Optional Comfy.org API key forwarded to API-backed nodes.
    pub comfy_org_api_key: Option<String>,
}
