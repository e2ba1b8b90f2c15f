//! Result of `POST /process-surat`

use std::collections::BTreeMap;

use arkla_common::Kategori;
use serde::Serialize;

use crate::services::gemini_client::TokenUsage;
use crate::services::kode_matcher::KodeCandidate;

/// Processing outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    /// At least one step used its local fallback
    PartialSuccess,
}

/// Overall score and per-field breakdown (2 decimals)
#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceSummary {
    pub overall: f64,
    pub breakdown: BTreeMap<String, f64>,
}

/// Tokens spent per step plus totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeminiApiUsage {
    /// OCR call, or the single unified call in optimized mode
    pub ocr_tokens: i64,
    pub summarization_tokens: i64,
    pub auto_fill_tokens: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub estimated_cost_usd: f64,
}

impl GeminiApiUsage {
    pub fn from_steps(ocr: TokenUsage, summarization: TokenUsage, auto_fill: TokenUsage) -> Self {
        let mut total = ocr;
        total += summarization;
        total += auto_fill;

        Self {
            ocr_tokens: ocr.total(),
            summarization_tokens: summarization.total(),
            auto_fill_tokens: auto_fill.total(),
            total_input_tokens: total.input_tokens,
            total_output_tokens: total.output_tokens,
            estimated_cost_usd: crate::services::confidence::round_to(total.cost_usd(), 4),
        }
    }

    pub fn total_tokens(&self) -> i64 {
        self.total_input_tokens + self.total_output_tokens
    }
}

/// Response body of a processed letter
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub status: ProcessingStatus,
    pub surat_id: String,
    pub kategori: Kategori,
    pub processing_time_ms: u64,
    pub steps_completed: Vec<String>,
    /// `raw_ocr_text` (truncated), `isi_ringkas` and every category field
    pub extracted_data: BTreeMap<String, Option<String>>,
    pub isi_ringkas: String,
    pub isi_ringkas_confidence: f64,
    pub confidence: ConfidenceSummary,
    pub requires_manual_review: bool,
    pub low_confidence_fields: Vec<String>,
    pub gemini_api_usage: GeminiApiUsage,
    pub kode_candidates: Option<Vec<KodeCandidate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps_failed: Vec<String>,
}

/// `GEMINI_SUMMARIZATION_AUTO_FILL_FAILED` style reason for fallback steps
pub fn fallback_reason(steps_failed: &[String]) -> Option<String> {
    if steps_failed.is_empty() {
        return None;
    }
    let steps: Vec<String> = steps_failed.iter().map(|s| s.to_uppercase()).collect();
    Some(format!("GEMINI_{}_FAILED", steps.join("_")))
}
