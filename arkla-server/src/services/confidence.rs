//! Confidence scoring for extracted fields

use std::collections::BTreeMap;

/// Fields scoring below this are flagged for the reviewer
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.75;
/// Overall score below which the letter needs manual review
pub const MANUAL_REVIEW_THRESHOLD: f64 = 0.60;
/// More low-confidence fields than this also forces manual review
const MAX_LOW_CONFIDENCE_FIELDS: usize = 2;

/// Field confidence in optimized mode, where Gemini gives no per-field score
pub fn optimized_field_confidence(value: Option<&str>) -> f64 {
    match value {
        Some(v) if !v.trim().is_empty() => 0.85,
        _ => 0.50,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceReport {
    pub overall: f64,
    pub breakdown: BTreeMap<String, f64>,
    pub low_confidence_fields: Vec<String>,
    pub requires_manual_review: bool,
}

/// Overall score is the plain mean of the field scores
pub fn score(breakdown: BTreeMap<String, f64>) -> ConfidenceReport {
    let overall = if breakdown.is_empty() {
        0.0
    } else {
        breakdown.values().sum::<f64>() / breakdown.len() as f64
    };

    let low_confidence_fields: Vec<String> = breakdown
        .iter()
        .filter(|(_, confidence)| **confidence < LOW_CONFIDENCE_THRESHOLD)
        .map(|(field, _)| field.clone())
        .collect();

    let requires_manual_review = overall < MANUAL_REVIEW_THRESHOLD
        || low_confidence_fields.len() > MAX_LOW_CONFIDENCE_FIELDS;

    ConfidenceReport {
        overall,
        breakdown,
        low_confidence_fields,
        requires_manual_review,
    }
}

/// Round to `places` decimals for display
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
