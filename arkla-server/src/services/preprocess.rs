//! Scan cleanup before OCR
//!
//! Photos and scans are decoded, converted to grayscale, contrast-stretched
//! and shrunk so the longest side is at most [`MAX_DIMENSION`] pixels, then
//! re-encoded as PNG. Smaller images mean fewer Gemini input tokens. PDFs
//! are sent as uploaded.

use std::io::Cursor;

use arkla_common::api::types::ErrorDetails;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat};
use tracing::debug;

use super::upload;
use crate::error::{ApiError, ApiResult};

/// Longest side of the image sent to Gemini
pub const MAX_DIMENSION: u32 = 800;

/// The document as it will be sent for OCR
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Spread the luma range of `image` over the full 0..=255 scale
pub fn stretch_contrast(image: &mut GrayImage) {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if max <= min {
        return;
    }

    let span = (max - min) as u32;
    for pixel in image.pixels_mut() {
        let value = (pixel.0[0] - min) as u32;
        pixel.0[0] = ((value * 255 + span / 2) / span) as u8;
    }
}

/// Grayscale, contrast and size cleanup of an encoded image; PNG out
pub fn clean_image(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = (decoded.width(), decoded.height());

    let mut gray = decoded.to_luma8();
    stretch_contrast(&mut gray);

    let mut cleaned = DynamicImage::ImageLuma8(gray);
    if width.max(height) > MAX_DIMENSION {
        cleaned = cleaned.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3);
    }
    debug!(
        width,
        height,
        out_width = cleaned.width(),
        out_height = cleaned.height(),
        "Image cleaned for OCR"
    );

    let mut out = Cursor::new(Vec::new());
    cleaned.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn preprocessing_failed(detail: String) -> ApiError {
    ApiError::OcrFailed {
        message: "Image preprocessing failed: IMAGE_CORRUPT".to_string(),
        details: ErrorDetails {
            step_failed: Some("preprocessing".to_string()),
            error_type: Some("invalid_image".to_string()),
            suggestion: Some("Upload a readable JPG, PNG or PDF scan".to_string()),
            detail: Some(detail),
            ..Default::default()
        },
    }
}

/// Prepare an upload with extension `ext` for OCR
pub async fn prepare(ext: &str, bytes: &[u8]) -> ApiResult<PreparedDocument> {
    if ext == "pdf" {
        return Ok(PreparedDocument {
            mime_type: upload::mime_type_for(ext),
            bytes: bytes.to_vec(),
        });
    }

    let input = bytes.to_vec();
    let cleaned = tokio::task::spawn_blocking(move || clean_image(&input))
        .await
        .map_err(|e| ApiError::Internal(format!("Preprocessing task failed: {}", e)))?
        .map_err(|e| preprocessing_failed(e.to_string()))?;

    Ok(PreparedDocument {
        mime_type: "image/png",
        bytes: cleaned,
    })
}
