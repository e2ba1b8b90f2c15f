//! Uploaded document validation and storage under `<root>/uploads/<surat_id>/`

use std::path::{Path, PathBuf};

use arkla_common::config::ArchiveLayout;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

/// Accepted extensions (lowercase, without dot)
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

const OCR_TEXT_FILE: &str = "ocr_raw.txt";

/// Lowercase extension of a file name
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Check name and size of an upload; returns its extension
pub fn validate_upload(filename: &str, size: usize, max_size: usize) -> ApiResult<String> {
    let ext = extension_of(filename)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            ApiError::InvalidFile(format!(
                "Invalid file format. Allowed: .{}",
                ALLOWED_EXTENSIONS.join(", .")
            ))
        })?;

    if size == 0 {
        return Err(ApiError::InvalidFile("Uploaded file is empty".to_string()));
    }

    if size > max_size {
        return Err(ApiError::FileTooLarge(format!(
            "File too large. Maximum size: {}MB",
            max_size / (1024 * 1024)
        )));
    }

    Ok(ext)
}

/// MIME type sent to Gemini for an allowed extension
pub fn mime_type_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

/// Base name only, without NUL bytes
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.replace('\0', "")
}

/// Hex SHA-256 of the upload
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn surat_dir(layout: &ArchiveLayout, surat_id: &str) -> PathBuf {
    layout.uploads_dir().join(surat_id)
}

/// Save the original document as `original.<ext>`
pub async fn store_original(
    layout: &ArchiveLayout,
    surat_id: &str,
    ext: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let dir = surat_dir(layout, surat_id);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(format!("original.{}", ext));
    tokio::fs::write(&path, bytes).await?;
    debug!(surat_id, path = %path.display(), size = bytes.len(), "Upload stored");
    Ok(path)
}

/// Keep the OCR text beside the original
pub async fn store_ocr_text(
    layout: &ArchiveLayout,
    surat_id: &str,
    text: &str,
) -> std::io::Result<()> {
    let dir = surat_dir(layout, surat_id);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(OCR_TEXT_FILE), text).await
}

/// Remove a letter's upload folder; failures are only logged
pub async fn remove_uploads(layout: &ArchiveLayout, surat_id: &str) {
    let dir = surat_dir(layout, surat_id);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => debug!(surat_id, "Upload folder removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(surat_id, error = %e, "Failed to remove upload folder"),
    }
}
