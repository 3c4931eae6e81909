//! Fixed workflow template catalog.

use std::path::PathBuf;

use crate::TemplateError;

/// The catalog: template name to file name within the templates directory.
///
/// This list is fixed at compile time; jobs select a template by name and
/// anything else is rejected up front.
const CATALOG: &[(&str, &str)] = &[
    ("video_wan2_2_14B_i2v", "video_wan2_2_14B_i2v.json"),
    ("T2I_ChromaAnimaAIO", "T2I_ChromaAnimaAIO.json"),
    ("qwen-image-fast-runpod", "qwen-image-fast-runpod.json"),
    ("image_qwen_t2i", "image_qwen_image_distill_official_comfyui.json"),
    ("crayon-drawing", "crayon-drawing.json"),
    ("I2V-Wan-2.2-Lightning-runpod", "I2V-Wan-2.2-Lightning-runpod.json"),
];

/// All template names in the catalog.
pub fn template_names() -> Vec<&'static str> {
    CATALOG.iter().map(|(name, _)| *name).collect()
}

/// Loads templates by catalog name from a directory of JSON files.
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Whether `name` is a catalog entry.
    pub fn contains(&self, name: &str) -> bool {
        CATALOG.iter().any(|(n, _)| *n == name)
    }

    /// Load a template by catalog name.
    ///
    /// Each call re-reads and re-parses the file, so the returned document
    /// is always a fresh copy the caller may mutate freely.
    pub fn load(&self, name: &str) -> Result<serde_json::Value, TemplateError> {
        let Some((_, file)) = CATALOG.iter().find(|(n, _)| *n == name) else {
            return Err(TemplateError::UnknownTemplate {
                name: name.to_string(),
                valid: template_names(),
            });
        };

        let path = self.dir.join(file);
        let contents = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| TemplateError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
