//! Input-image normalization.
//!
//! Jobs carry their input image as a base64 data URI (or bare base64).
//! Before upload the image is decoded, converted to RGB, resized to the
//! requested dimensions when they differ, and re-encoded as PNG under a
//! unique filename so concurrent jobs cannot clobber each other's inputs.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

/// A normalized input image ready for upload.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Unique filename (`<uuid>.png`).
    pub filename: String,
    /// PNG-encoded pixel data at the requested dimensions.
    pub png_bytes: Vec<u8>,
}

/// Errors from input-image normalization.
#[derive(Debug, thiserror::Error)]
pub enum ImageInputError {
    /// The payload was not valid base64.
    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes were not a readable image, or re-encoding failed.
    #[error("Failed to process input image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode, resize, and re-encode a job's input image.
///
/// Accepts `data:image/...;base64,<payload>` URIs as well as bare base64.
pub fn prepare_input_image(
    image_data: &str,
    width: u32,
    height: u32,
) -> Result<PreparedImage, ImageInputError> {
    let base64_payload = match image_data.split_once(',') {
        Some((_, payload)) => payload,
        None => image_data,
    };

    let blob = STANDARD.decode(base64_payload.trim())?;
    let decoded = image::load_from_memory(&blob)?;
    let mut rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    if rgb.width() != width || rgb.height() != height {
        tracing::info!(
            from_width = rgb.width(),
            from_height = rgb.height(),
            to_width = width,
            to_height = height,
            "Resizing input image",
        );
        rgb = rgb.resize_exact(width, height, FilterType::Lanczos3);
    }

    let mut png_bytes = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;

    Ok(PreparedImage {
        filename: format!("{}.png", uuid::Uuid::new_v4()),
        png_bytes,
    })
}
