//! Kode Arsip suggestions by keyword overlap with the summary

use serde::Serialize;

use crate::db::klasifikasi::KodeKlasifikasi;

const MAX_CANDIDATES: usize = 3;
/// Keyword overlap never claims more than this
const MAX_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KodeCandidate {
    pub kode: String,
    pub keterangan: String,
    pub confidence: f64,
}

/// Best matching codes, most confident first
///
/// A code scores the share of words in its `keterangan` that occur in the
/// summary, scaled to at most 0.7.
pub fn match_candidates(summary: &str, codes: &[KodeKlasifikasi]) -> Vec<KodeCandidate> {
    let summary = summary.to_lowercase();
    if summary.trim().is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<KodeCandidate> = codes
        .iter()
        .filter_map(|code| {
            let keterangan = code.keterangan.as_deref().unwrap_or_default();
            let lower = keterangan.to_lowercase();
            let words: Vec<&str> = lower.split_whitespace().collect();
            let matches = words.iter().filter(|w| summary.contains(**w)).count();
            if matches == 0 {
                return None;
            }
            let ratio = (matches as f64 / words.len() as f64).min(1.0);
            Some(KodeCandidate {
                kode: code.kode.clone(),
                keterangan: keterangan.to_string(),
                confidence: ratio * MAX_CONFIDENCE,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}
