//! Recognized-field validation for incoming job payloads.
//!
//! Pure logic, no I/O. The validator walks the raw JSON `input` object and
//! collects every violation rather than stopping at the first, so a caller
//! fixing a bad request sees the complete picture in one round trip.

use std::fmt;

use serde_json::Value;

use crate::job::JobInput;

/// Default output width when the job does not specify one.
pub const DEFAULT_WIDTH: u32 = 480;
/// Default output height when the job does not specify one.
pub const DEFAULT_HEIGHT: u32 = 640;
/// Default frame count for video templates.
pub const DEFAULT_LENGTH: u32 = 81;
/// Template selected when the job names none.
pub const DEFAULT_TEMPLATE: &str = "video_wan2_2_14B_i2v";

/// Dimension bounds guard the input-image resize path.
const MIN_DIMENSION: u64 = 16;
const MAX_DIMENSION: u64 = 4096;
const MIN_LENGTH: u64 = 1;
const MAX_LENGTH: u64 = 1024;

/// Fields accepted in a job payload. Anything else is a violation.
const RECOGNIZED_FIELDS: &[&str] = &[
    "prompt",
    "image",
    "width",
    "height",
    "length",
    "template",
    "comfy_org_api_key",
];

/// A single field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All violations found in one job payload.
#[derive(Debug, Clone)]
pub struct ValidationFailure(pub Vec<FieldViolation>);

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "Invalid job input: {}", details.join("; "))
    }
}

impl std::error::Error for ValidationFailure {}

/// Validate a raw job `input` object against the recognized-field schema.
///
/// Returns the typed [`JobInput`] with defaults applied, or every violation
/// found. `valid_templates` is the fixed template catalog -- membership is
/// checked here so a typo'd template name fails before any upstream call.
pub fn validate_job_input(
    input: &Value,
    valid_templates: &[&str],
) -> Result<JobInput, ValidationFailure> {
    let Some(obj) = input.as_object() else {
        return Err(ValidationFailure(vec![FieldViolation::new(
            "input",
            "must be a JSON object",
        )]));
    };

    let mut violations = Vec::new();

    for key in obj.keys() {
        if !RECOGNIZED_FIELDS.contains(&key.as_str()) {
            violations.push(FieldViolation::new(key.clone(), "unrecognized field"));
        }
    }

    let prompt = match obj.get("prompt") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => {
            violations.push(FieldViolation::new("prompt", "must not be empty"));
            String::new()
        }
        Some(_) => {
            violations.push(FieldViolation::new("prompt", "must be a string"));
            String::new()
        }
        None => {
            violations.push(FieldViolation::new("prompt", "required field is missing"));
            String::new()
        }
    };

    let image = optional_string(obj, "image", &mut violations);
    let comfy_org_api_key = optional_string(obj, "comfy_org_api_key", &mut violations);

    let width = bounded_u32(obj, "width", DEFAULT_WIDTH, MIN_DIMENSION, MAX_DIMENSION, &mut violations);
    let height = bounded_u32(obj, "height", DEFAULT_HEIGHT, MIN_DIMENSION, MAX_DIMENSION, &mut violations);
    let length = bounded_u32(obj, "length", DEFAULT_LENGTH, MIN_LENGTH, MAX_LENGTH, &mut violations);

    let template = match obj.get("template") {
        Some(Value::String(s)) => {
            if valid_templates.contains(&s.as_str()) {
                s.clone()
            } else {
                violations.push(FieldViolation::new(
                    "template",
                    format!("unknown template '{s}'. Must be one of: {valid_templates:?}"),
                ));
                String::new()
            }
        }
        Some(_) => {
            violations.push(FieldViolation::new("template", "must be a string"));
            String::new()
        }
        None => DEFAULT_TEMPLATE.to_string(),
    };

    if violations.is_empty() {
        Ok(JobInput {
            prompt,
            image,
            width,
            height,
            length,
            template,
            comfy_org_api_key,
        })
    } else {
        Err(ValidationFailure(violations))
    }
}

/// Read an optional non-empty string field, recording a violation on type
/// mismatch or emptiness.
fn optional_string(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            violations.push(FieldViolation::new(field, "must not be empty"));
            None
        }
        Some(_) => {
            violations.push(FieldViolation::new(field, "must be a string"));
            None
        }
        None => None,
    }
}

/// Read an optional integer field, clamping nothing -- out-of-range values
/// are violations, not silently adjusted.
fn bounded_u32(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    default: u32,
    min: u64,
    max: u64,
    violations: &mut Vec<FieldViolation>,
) -> u32 {
    match obj.get(field) {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) if (min..=max).contains(&v) => v as u32,
            Some(_) | None => {
                violations.push(FieldViolation::new(
                    field,
                    format!("must be an integer between {min} and {max}"),
                ));
                default
            }
        },
        Some(_) => {
            violations.push(FieldViolation::new(field, "must be an integer"));
            default
        }
        None => default,
    }
}
