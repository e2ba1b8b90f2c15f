//! Letter processing pipeline behind `POST /process-surat`
//!
//! validation → upload → preprocessing → OCR / summary / fields → scoring → database.
//! Every error raised after the surat id exists carries that id.

use std::collections::BTreeMap;
use std::time::Instant;

use arkla_common::api::types::ErrorDetails;
use arkla_common::config::GeminiConfig;
use arkla_common::text::truncate_chars;
use arkla_common::Kategori;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::auto_filler::{self, FieldGuess};
use super::confidence::{self, round_to};
use super::extraction;
use super::gemini_client::{GeminiError, TokenUsage};
use super::kode_matcher::{self, KodeCandidate};
use super::preprocess;
use super::summarizer::{self, GEMINI_SUMMARY_CONFIDENCE};
use super::upload;
use crate::db::{self, surat::FieldValues};
use crate::error::{ApiError, ApiResult};
use crate::models::process_result::fallback_reason;
use crate::models::{ConfidenceSummary, GeminiApiUsage, ProcessResponse, ProcessingStatus};
use crate::AppState;

/// OCR text echoed back in the response
const RESPONSE_TEXT_CHARS: usize = 500;

/// One uploaded letter
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub category_id: String,
    pub filename: String,
    pub bytes: Vec<u8>,
    /// One Gemini call instead of three
    pub use_optimized: bool,
}

/// What the extraction steps produced
#[derive(Debug, Default)]
struct Extracted {
    raw_text: String,
    isi_ringkas: String,
    summary_confidence: f64,
    fields: BTreeMap<String, FieldGuess>,
    steps_completed: Vec<String>,
    steps_failed: Vec<String>,
    ocr_usage: TokenUsage,
    summary_usage: TokenUsage,
    auto_fill_usage: TokenUsage,
}

/// Run the full pipeline for one upload
pub async fn process_surat(state: &AppState, request: ProcessRequest) -> ApiResult<ProcessResponse> {
    let surat_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    info!(
        surat_id = %surat_id,
        category = %request.category_id,
        file_name = %request.filename,
        optimized = request.use_optimized,
        "Processing started"
    );

    run(state, &surat_id, started, request)
        .await
        .map_err(|e| e.for_surat(surat_id.as_str()))
}

async fn run(
    state: &AppState,
    surat_id: &str,
    started: Instant,
    request: ProcessRequest,
) -> ApiResult<ProcessResponse> {
    // validation
    let kategori: Kategori = request.category_id.parse().map_err(|_| {
        ApiError::InvalidCategory(format!(
            "Invalid kategori '{}'. Must be one of: {}",
            request.category_id,
            Kategori::valid_values()
        ))
    })?;
    let ext = upload::validate_upload(
        &request.filename,
        request.bytes.len(),
        state.config.max_file_size,
    )?;
    if !state.gemini.is_configured() {
        return Err(ApiError::GeminiConfig(
            "Gemini API not configured. Set GOOGLE_API_KEY".to_string(),
        ));
    }
    check_daily_budget(state).await?;

    let mut steps_completed = vec!["validation".to_string()];

    // upload
    upload::store_original(&state.layout, surat_id, &ext, &request.bytes).await?;
    let file_hash = upload::sha256_hex(&request.bytes);
    steps_completed.push("upload".to_string());

    let document = preprocess::prepare(&ext, &request.bytes).await?;
    steps_completed.push("preprocessing".to_string());

    let mut extracted = if request.use_optimized {
        extract_optimized(state, kategori, surat_id, document.mime_type, &document.bytes).await?
    } else {
        extract_legacy(state, kategori, surat_id, document.mime_type, &document.bytes).await?
    };
    steps_completed.append(&mut extracted.steps_completed);

    // scoring
    let mut breakdown: BTreeMap<String, f64> = extracted
        .fields
        .iter()
        .map(|(field, guess)| (field.clone(), guess.confidence))
        .collect();
    breakdown.insert(
        arkla_common::kategori::ISI_RINGKAS.to_string(),
        extracted.summary_confidence,
    );
    let report = confidence::score(breakdown);
    steps_completed.push("scoring".to_string());

    let kode_candidates = match_kode(state, &extracted.isi_ringkas, surat_id).await;

    let usage = GeminiApiUsage::from_steps(
        extracted.ocr_usage,
        extracted.summary_usage,
        extracted.auto_fill_usage,
    );
    let processing_time_ms = started.elapsed().as_millis() as u64;

    // database
    let field_values: FieldValues = extracted
        .fields
        .iter()
        .map(|(field, guess)| (field.clone(), guess.value.clone()))
        .collect();
    let original_filename = upload::sanitize_filename(&request.filename);
    let new_surat = db::surat::NewSurat {
        id: surat_id,
        kategori,
        raw_ocr_text: &extracted.raw_text,
        isi_ringkas: &extracted.isi_ringkas,
        overall_confidence: report.overall,
        requires_manual_review: report.requires_manual_review,
        gemini_tokens_used: usage.total_tokens(),
        processing_time_ms: processing_time_ms as i64,
        original_filename: Some(original_filename.as_str()),
        file_hash: Some(file_hash.as_str()),
    };
    db::surat::insert_unverified(&state.db, &new_surat, &field_values).await?;
    steps_completed.push("database".to_string());

    let status = if extracted.steps_failed.is_empty() {
        ProcessingStatus::Success
    } else {
        ProcessingStatus::PartialSuccess
    };
    let message = (!extracted.steps_failed.is_empty())
        .then(|| format!("Some steps used fallback: {}", extracted.steps_failed.join(", ")));

    let mut extracted_data = field_values;
    extracted_data.insert(
        "raw_ocr_text".to_string(),
        Some(truncate_chars(&extracted.raw_text, RESPONSE_TEXT_CHARS).to_string()),
    );
    extracted_data.insert(
        arkla_common::kategori::ISI_RINGKAS.to_string(),
        Some(extracted.isi_ringkas.clone()),
    );

    info!(
        surat_id,
        status = ?status,
        processing_time_ms,
        overall_confidence = report.overall,
        "Processing completed"
    );

    Ok(ProcessResponse {
        status,
        surat_id: surat_id.to_string(),
        kategori,
        processing_time_ms,
        steps_completed,
        extracted_data,
        isi_ringkas: extracted.isi_ringkas,
        isi_ringkas_confidence: round_to(extracted.summary_confidence, 2),
        confidence: ConfidenceSummary {
            overall: round_to(report.overall, 2),
            breakdown: report
                .breakdown
                .iter()
                .map(|(field, value)| (field.clone(), round_to(*value, 2)))
                .collect(),
        },
        requires_manual_review: report.requires_manual_review,
        low_confidence_fields: report.low_confidence_fields,
        gemini_api_usage: usage,
        kode_candidates,
        message,
        fallback_reason: fallback_reason(&extracted.steps_failed),
        steps_failed: extracted.steps_failed,
    })
}

/// Refuse new work once today's estimated spend reaches the limit
async fn check_daily_budget(state: &AppState) -> ApiResult<()> {
    let limit = state.config.gemini.daily_cost_limit_usd;
    if limit <= 0.0 {
        return Ok(());
    }

    let spent = db::usage::daily_cost(&state.db).await?;
    if spent >= limit {
        warn!(spent, limit, "Daily Gemini cost limit reached");
        return Err(ApiError::GeminiRateLimit {
            message: format!(
                "Daily Gemini cost limit reached (${:.2} of ${:.2})",
                spent, limit
            ),
            retry_after_seconds: seconds_until_utc_midnight(Utc::now()),
        });
    }
    Ok(())
}

fn seconds_until_utc_midnight(now: DateTime<Utc>) -> u64 {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .map(|midnight| (midnight - now.naive_utc()).num_seconds().max(1) as u64)
        .unwrap_or(3600)
}

/// Record a call in the usage ledger; a failed write is only logged
async fn record_usage(state: &AppState, surat_id: &str, operation: &str, usage: &TokenUsage) {
    if let Err(e) = db::usage::record(&state.db, surat_id, operation, usage).await {
        warn!(surat_id, operation, error = %e, "Failed to record Gemini usage");
    }
}

/// Map a failed document-level call to the error the client sees
fn extraction_error(step: &str, err: GeminiError, config: &GeminiConfig) -> ApiError {
    match err {
        GeminiError::RateLimited => ApiError::GeminiRateLimit {
            message: "Gemini API rate limit exceeded. Please try again later.".to_string(),
            retry_after_seconds: config.rate_limit_delay_secs,
        },
        GeminiError::InvalidApiKey(_) | GeminiError::NotConfigured => ApiError::GeminiConfig(
            "Gemini API key is invalid or not configured".to_string(),
        ),
        other => {
            let message = if step == "ocr" {
                format!(
                    "OCR extraction failed after {} retries. Please try again.",
                    config.max_retries
                )
            } else {
                "Unified extraction failed. Please try again.".to_string()
            };
            ApiError::OcrFailed {
                message,
                details: ErrorDetails {
                    step_failed: Some(step.to_string()),
                    error_type: Some(other.error_type().to_string()),
                    suggestion: Some("Check internet connection or try again later".to_string()),
                    detail: Some(other.to_string()),
                    ..Default::default()
                },
            }
        }
    }
}

fn no_text_error() -> ApiError {
    ApiError::NoTextExtracted(
        "No text could be extracted. Please check the image quality.".to_string(),
    )
}

async fn extract_optimized(
    state: &AppState,
    kategori: Kategori,
    surat_id: &str,
    mime_type: &str,
    document: &[u8],
) -> ApiResult<Extracted> {
    let (unified, usage) =
        extraction::unified_extract(&state.gemini, kategori, surat_id, mime_type, document)
            .await
            .map_err(|e| extraction_error("unified_extract", e, state.gemini.config()))?;
    record_usage(state, surat_id, "unified_extract", &usage).await;

    if unified.raw_text.trim().is_empty() {
        return Err(no_text_error());
    }
    upload::store_ocr_text(&state.layout, surat_id, &unified.raw_text).await?;

    let mut extracted = Extracted {
        raw_text: unified.raw_text,
        ocr_usage: usage,
        ..Default::default()
    };
    extracted.steps_completed.push("ocr".to_string());

    if unified.structured && !unified.isi_ringkas.trim().is_empty() {
        extracted.isi_ringkas = unified.isi_ringkas;
        extracted.summary_confidence = GEMINI_SUMMARY_CONFIDENCE;
        extracted.steps_completed.push("summarization".to_string());
    } else {
        let (summary, confidence) = if unified.structured {
            summarizer::regex_summary(&extracted.raw_text)
        } else {
            (unified.isi_ringkas, 0.40)
        };
        extracted.isi_ringkas = summary;
        extracted.summary_confidence = confidence;
        extracted.steps_failed.push("summarization".to_string());
    }

    extracted.fields = unified
        .fields
        .into_iter()
        .map(|(field, value)| {
            let confidence = confidence::optimized_field_confidence(value.as_deref());
            (field, FieldGuess { value, confidence })
        })
        .collect();
    if unified.structured {
        extracted.steps_completed.push("auto_fill".to_string());
    } else {
        extracted.steps_failed.push("auto_fill".to_string());
    }

    Ok(extracted)
}

async fn extract_legacy(
    state: &AppState,
    kategori: Kategori,
    surat_id: &str,
    mime_type: &str,
    document: &[u8],
) -> ApiResult<Extracted> {
    let (raw_text, ocr_usage) = extraction::ocr(&state.gemini, surat_id, mime_type, document)
        .await
        .map_err(|e| extraction_error("ocr", e, state.gemini.config()))?;
    record_usage(state, surat_id, "ocr", &ocr_usage).await;

    if raw_text.trim().is_empty() {
        return Err(no_text_error());
    }
    upload::store_ocr_text(&state.layout, surat_id, &raw_text).await?;

    let mut extracted = Extracted {
        ocr_usage,
        ..Default::default()
    };
    extracted.steps_completed.push("ocr".to_string());

    let summary = summarizer::summarize(&state.gemini, &raw_text, kategori, surat_id).await;
    if let Some(usage) = summary.usage {
        record_usage(state, surat_id, "summarization", &usage).await;
        extracted.summary_usage = usage;
    }
    if summary.used_fallback {
        extracted.steps_failed.push("summarization".to_string());
    } else {
        extracted.steps_completed.push("summarization".to_string());
    }
    extracted.isi_ringkas = summary.text;
    extracted.summary_confidence = summary.confidence;

    let columns: Vec<&str> = kategori.detail_columns().collect();
    let auto_fill = auto_filler::extract_fields(&state.gemini, &raw_text, &columns, surat_id).await;
    if let Some(usage) = auto_fill.usage {
        record_usage(state, surat_id, "auto_fill", &usage).await;
        extracted.auto_fill_usage = usage;
    }
    if auto_fill.used_fallback {
        extracted.steps_failed.push("auto_fill".to_string());
    } else {
        extracted.steps_completed.push("auto_fill".to_string());
    }
    extracted.fields = auto_fill.fields;
    extracted.raw_text = raw_text;

    Ok(extracted)
}

/// Kode Arsip suggestions when matching is enabled and master data exists
async fn match_kode(state: &AppState, summary: &str, surat_id: &str) -> Option<Vec<KodeCandidate>> {
    if !state.config.gemini.kode_matching_enabled || summary.trim().is_empty() {
        return None;
    }

    let codes = match db::klasifikasi::all(&state.db).await {
        Ok(codes) => codes,
        Err(e) => {
            warn!(surat_id, error = %e, "Kode matching failed");
            return None;
        }
    };

    let candidates = kode_matcher::match_candidates(summary, &codes);
    if candidates.is_empty() {
        return None;
    }
    info!(surat_id, count = candidates.len(), "Found Kode candidates");
    Some(candidates)
}
