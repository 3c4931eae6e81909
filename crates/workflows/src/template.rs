//! Placeholder substitution and per-job template specialization.

use serde_json::Value;

use crate::TemplateError;

/// Tokens that are replaced with the job's prompt text.
pub const PROMPT_TOKENS: &[&str] = &[
    "{{ VIDEO_PROMPT }}",
    "{{ POSITIVE_PROMPT }}",
    "{{ IMAGE_PROMPT }}",
];

/// Token replaced with the uploaded input-image filename.
pub const INPUT_IMAGE_TOKEN: &str = "{{ INPUT_IMAGE }}";

/// Tokens replaced with the requested output dimensions.
pub const WIDTH_TOKEN: &str = "{{ IMAGE_WIDTH }}";
pub const HEIGHT_TOKEN: &str = "{{ IMAGE_HEIGHT }}";

/// Node classes that accept width/height/length overrides.
const VIDEO_DIMENSION_CLASS: &str = "WanImageToVideo";
const IMAGE_DIMENSION_CLASS: &str = "EmptySD3LatentImage";

/// Node classes whose outputs land in the history record, by asset kind.
const IMAGE_SAVE_CLASSES: &[&str] = &["SaveImage", "SaveAnimatedWEBP"];
const VIDEO_SAVE_CLASSES: &[&str] = &["SaveVideo", "VHS_VideoCombine"];

/// Job-specific values substituted into a template.
#[derive(Debug, Clone)]
pub struct Substitutions<'a> {
    pub prompt: &'a str,
    /// Server-assigned filename of the uploaded input image, when the job
    /// carried one.
    pub image_filename: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub length: u32,
}

/// Which asset kinds a template's save nodes will produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputKinds {
    pub images: bool,
    pub videos: bool,
}

/// Whether the template contains the input-image placeholder anywhere.
pub fn requires_input_image(template: &Value) -> bool {
    contains_token(template, INPUT_IMAGE_TOKEN)
}

/// Whether any recognized placeholder token remains in the document.
pub fn has_unresolved_placeholders(template: &Value) -> bool {
    PROMPT_TOKENS
        .iter()
        .chain([&INPUT_IMAGE_TOKEN, &WIDTH_TOKEN, &HEIGHT_TOKEN])
        .any(|token| contains_token(template, token))
}

/// Classify the template's save nodes so the caller knows which asset
/// kinds to expect in the history record. Templates without a recognized
/// save node default to images.
pub fn output_kinds(template: &Value) -> OutputKinds {
    let mut kinds = OutputKinds {
        images: false,
        videos: false,
    };

    if let Some(nodes) = template.as_object() {
        for node in nodes.values() {
            match node.get("class_type").and_then(Value::as_str) {
                Some(class) if IMAGE_SAVE_CLASSES.contains(&class) => kinds.images = true,
                Some(class) if VIDEO_SAVE_CLASSES.contains(&class) => kinds.videos = true,
                _ => {}
            }
        }
    }

    if !kinds.images && !kinds.videos {
        kinds.images = true;
    }
    kinds
}

/// Specialize a template for one job.
///
/// Returns a deep copy with every recognized placeholder substituted,
/// dimension nodes overridden, and a fresh unique `filename_prefix`
/// assigned to every save node. Fails with
/// [`TemplateError::MissingPlaceholder`] when the template references the
/// input image and the job supplied none.
pub fn prepare(template: &Value, subs: &Substitutions<'_>) -> Result<Value, TemplateError> {
    if requires_input_image(template) && subs.image_filename.is_none() {
        return Err(TemplateError::MissingPlaceholder {
            token: INPUT_IMAGE_TOKEN,
        });
    }

    let mut prepared = substitute(template, subs);

    if !set_dimensions(&mut prepared, subs.width, subs.height, subs.length) {
        // Not every template exposes a dimension node; the requested size
        // then only affects input-image normalization.
        tracing::debug!("No dimension nodes in template, skipping size override");
    }

    assign_unique_output_prefix(&mut prepared);
    Ok(prepared)
}

/// Recursively rebuild the document, replacing recognized tokens.
fn substitute(value: &Value, subs: &Substitutions<'_>) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, subs)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, subs)).collect()),
        Value::String(s) => {
            if PROMPT_TOKENS.contains(&s.as_str()) {
                Value::String(subs.prompt.to_string())
            } else if s == INPUT_IMAGE_TOKEN {
                // Presence was checked in prepare().
                Value::String(subs.image_filename.unwrap_or_default().to_string())
            } else if s == WIDTH_TOKEN {
                Value::from(subs.width)
            } else if s == HEIGHT_TOKEN {
                Value::from(subs.height)
            } else {
                value.clone()
            }
        }
        other => other.clone(),
    }
}

/// Apply dimension overrides to the first recognized dimension node.
///
/// `WanImageToVideo` nodes take width/height/length; `EmptySD3LatentImage`
/// nodes take width/height only. Returns whether a node was found.
fn set_dimensions(template: &mut Value, width: u32, height: u32, length: u32) -> bool {
    let Some(nodes) = template.as_object_mut() else {
        return false;
    };

    for node in nodes.values_mut() {
        if node.get("class_type").and_then(Value::as_str) == Some(VIDEO_DIMENSION_CLASS) {
            let inputs = ensure_inputs(node);
            inputs.insert("width".into(), Value::from(width));
            inputs.insert("height".into(), Value::from(height));
            inputs.insert("length".into(), Value::from(length));
            tracing::debug!(width, height, length, "Set video workflow dimensions");
            return true;
        }
    }

    for node in nodes.values_mut() {
        if node.get("class_type").and_then(Value::as_str) == Some(IMAGE_DIMENSION_CLASS) {
            let inputs = ensure_inputs(node);
            inputs.insert("width".into(), Value::from(width));
            inputs.insert("height".into(), Value::from(height));
            tracing::debug!(width, height, "Set image workflow dimensions");
            return true;
        }
    }

    false
}

/// Give every save node a unique `filename_prefix` so concurrent jobs on
/// one ComfyUI instance cannot overwrite each other's outputs.
fn assign_unique_output_prefix(template: &mut Value) {
    let Some(nodes) = template.as_object_mut() else {
        return;
    };

    for node in nodes.values_mut() {
        let class = node.get("class_type").and_then(Value::as_str);
        let is_save = class
            .map(|c| IMAGE_SAVE_CLASSES.contains(&c) || VIDEO_SAVE_CLASSES.contains(&c))
            .unwrap_or(false);
        if is_save {
            let inputs = ensure_inputs(node);
            inputs.insert(
                "filename_prefix".into(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }
}

fn ensure_inputs(node: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !node.get("inputs").map(Value::is_object).unwrap_or(false) {
        node["inputs"] = Value::Object(serde_json::Map::new());
    }
    node["inputs"].as_object_mut().expect("inputs is an object")
}

fn contains_token(value: &Value, token: &str) -> bool {
    match value {
        Value::Object(map) => map.values().any(|v| contains_token(v, token)),
        Value::Array(items) => items.iter().any(|v| contains_token(v, token)),
        Value::String(s) => s == token,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn subs<'a>(image: Option<&'a str>) -> Substitutions<'a> {
        Substitutions {
            prompt: "a cat",
            image_filename: image,
            width: 480,
            height: 640,
            length: 81,
        }
    }

    #[test]
    fn substitutes_prompt_and_image_tokens() {
        let template = json!({
            "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "{{ VIDEO_PROMPT }}"}},
            "2": {"class_type": "LoadImage", "inputs": {"image": "{{ INPUT_IMAGE }}"}},
        });

        let prepared = prepare(&template, &subs(Some("in.png"))).unwrap();
        assert_eq!(prepared["1"]["inputs"]["text"], "a cat");
        assert_eq!(prepared["2"]["inputs"]["image"], "in.png");
    }

    #[test]
    fn substitutes_dimension_tokens_as_numbers() {
        let template = json!({
            "1": {"inputs": {"text": "{{ IMAGE_PROMPT }}", "width": "{{ IMAGE_WIDTH }}", "height": "{{ IMAGE_HEIGHT }}"}},
        });

        let prepared = prepare(&template, &subs(None)).unwrap();
        assert_eq!(prepared["1"]["inputs"]["width"], 480);
        assert_eq!(prepared["1"]["inputs"]["height"], 640);
    }

    #[test]
    fn complete_substitution_leaves_no_tokens() {
        let template = json!({
            "1": {"inputs": {"text": "{{ POSITIVE_PROMPT }}"}},
            "2": {"inputs": {"image": "{{ INPUT_IMAGE }}", "nested": [{"w": "{{ IMAGE_WIDTH }}"}]}},
        });

        assert!(has_unresolved_placeholders(&template));
        let prepared = prepare(&template, &subs(Some("in.png"))).unwrap();
        assert!(!has_unresolved_placeholders(&prepared));
    }

    #[test]
    fn image_template_without_image_fails() {
        let template = json!({
            "1": {"inputs": {"image": "{{ INPUT_IMAGE }}"}},
        });

        assert_matches!(
            prepare(&template, &subs(None)).unwrap_err(),
            TemplateError::MissingPlaceholder { token } if token == INPUT_IMAGE_TOKEN
        );
    }

    #[test]
    fn requires_input_image_detects_nested_tokens() {
        let with = json!({"a": {"b": [{"c": "{{ INPUT_IMAGE }}"}]}});
        let without = json!({"a": {"b": "{{ VIDEO_PROMPT }}"}});

        assert!(requires_input_image(&with));
        assert!(!requires_input_image(&without));
    }

    #[test]
    fn wan_node_gets_all_three_dimensions() {
        let template = json!({
            "5": {"class_type": "WanImageToVideo", "inputs": {"width": 0, "height": 0, "length": 0}},
        });

        let prepared = prepare(&template, &subs(None)).unwrap();
        assert_eq!(prepared["5"]["inputs"]["width"], 480);
        assert_eq!(prepared["5"]["inputs"]["height"], 640);
        assert_eq!(prepared["5"]["inputs"]["length"], 81);
    }

    #[test]
    fn latent_image_node_gets_width_and_height_only() {
        let template = json!({
            "5": {"class_type": "EmptySD3LatentImage", "inputs": {"width": 0, "height": 0}},
        });

        let prepared = prepare(&template, &subs(None)).unwrap();
        assert_eq!(prepared["5"]["inputs"]["width"], 480);
        assert_eq!(prepared["5"]["inputs"]["height"], 640);
        assert!(prepared["5"]["inputs"].get("length").is_none());
    }

    #[test]
    fn missing_dimension_nodes_are_not_fatal() {
        let template = json!({
            "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "{{ IMAGE_PROMPT }}"}},
        });

        assert!(prepare(&template, &subs(None)).is_ok());
    }

    #[test]
    fn save_nodes_get_unique_prefixes() {
        let template = json!({
            "8": {"class_type": "SaveImage", "inputs": {}},
            "9": {"class_type": "SaveVideo", "inputs": {}},
        });

        let first = prepare(&template, &subs(None)).unwrap();
        let second = prepare(&template, &subs(None)).unwrap();

        let image_prefix = first["8"]["inputs"]["filename_prefix"].as_str().unwrap();
        let video_prefix = first["9"]["inputs"]["filename_prefix"].as_str().unwrap();
        assert!(!image_prefix.is_empty());
        assert_ne!(image_prefix, video_prefix);
        assert_ne!(
            image_prefix,
            second["8"]["inputs"]["filename_prefix"].as_str().unwrap()
        );
    }

    #[test]
    fn output_kinds_classifies_save_nodes() {
        let video = json!({"1": {"class_type": "SaveVideo"}});
        let image = json!({"1": {"class_type": "SaveImage"}});
        let both = json!({
            "1": {"class_type": "SaveImage"},
            "2": {"class_type": "VHS_VideoCombine"},
        });
        let none = json!({"1": {"class_type": "CLIPTextEncode"}});

        assert_eq!(output_kinds(&video), OutputKinds { images: false, videos: true });
        assert_eq!(output_kinds(&image), OutputKinds { images: true, videos: false });
        assert_eq!(output_kinds(&both), OutputKinds { images: true, videos: true });
        // Unknown layouts default to expecting images.
        assert_eq!(output_kinds(&none), OutputKinds { images: true, videos: false });
    }
}
