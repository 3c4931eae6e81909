//! Workflow template catalog and per-job specialization.
//!
//! Templates are opaque ComfyUI node graphs stored as JSON files in a
//! catalog directory. Each job loads a fresh copy of its template and
//! specializes it: placeholder tokens are substituted, dimension nodes are
//! overridden, and save nodes get a unique output prefix so concurrent
//! jobs sharing one ComfyUI instance cannot collide.

pub mod catalog;
pub mod template;

pub use catalog::TemplateStore;
pub use template::{prepare, requires_input_image, Substitutions};

/// Errors from template loading and preparation.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The requested name is not in the fixed catalog.
    #[error("Unknown workflow template '{name}'. Must be one of: {valid:?}")]
    UnknownTemplate {
        name: String,
        valid: Vec<&'static str>,
    },

    /// The catalog entry exists but its file could not be read.
    #[error("Failed to read workflow template {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The template file is not valid JSON.
    #[error("Invalid JSON in workflow template {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    /// The template requires a placeholder the job supplied no value for.
    #[error("Template requires placeholder '{token}' but no value was supplied")]
    MissingPlaceholder { token: &'static str },
}
