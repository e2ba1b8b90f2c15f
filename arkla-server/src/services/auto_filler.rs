//! Category field extraction from OCR text
//!
//! Gemini is asked for a JSON object first. A malformed answer is salvaged
//! field by field; when Gemini is unavailable each field falls back to the
//! keyword patterns below.

use std::collections::{BTreeMap, HashMap};

use arkla_common::dates::normalize_date;
use arkla_common::kategori::is_date_field;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{info, warn};

use super::gemini_client::{GeminiClient, Part, TokenUsage};
use super::prompts;

pub const GEMINI_FIELD_CONFIDENCE: f64 = 0.85;
const SALVAGED_FIELD_CONFIDENCE: f64 = 0.60;
const PATTERN_FIELD_CONFIDENCE: f64 = 0.55;
const PATTERN_DATE_CONFIDENCE: f64 = 0.60;
const PATTERN_RAW_DATE_CONFIDENCE: f64 = 0.45;

/// Extracted value and how sure we are of it
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGuess {
    pub value: Option<String>,
    pub confidence: f64,
}

impl FieldGuess {
    pub fn found(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            value: Some(value.into()),
            confidence,
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            confidence: 0.0,
        }
    }
}

pub type FieldGuesses = BTreeMap<String, FieldGuess>;

/// Outcome of the auto-fill step
#[derive(Debug, Clone)]
pub struct AutoFill {
    pub fields: FieldGuesses,
    /// Values came from the keyword patterns
    pub used_fallback: bool,
    pub usage: Option<TokenUsage>,
}

const MONTHS_ID: &str =
    "januari|februari|maret|april|mei|juni|juli|agustus|september|oktober|november|desember";
const LABELLED_DATE: &str = r"[.:\s]*(\d{1,2}[\s\-/]\w+[\s\-/]\d{2,4})";

fn pattern_sources() -> Vec<(&'static str, Vec<String>)> {
    let labelled = |label: &str| format!("(?:{}){}", label, LABELLED_DATE);
    let named_month = format!(r"(\d{{1,2}}\s+(?:{})\s+\d{{4}})", MONTHS_ID);

    vec![
        (
            "nomor_urut",
            vec![
                r"(?:no(?:mor)?\.?\s*urut|nomor)[.:\s]*(\d+)".into(),
                r"^(\d+)[.,\s]".into(),
            ],
        ),
        ("index_surat", vec![r"(?:index|indeks|jenis)[.:\s]*([^\n,;]+)".into()]),
        (
            "kode",
            vec![
                r"(?:kode|klasifikasi)[.:\s]*([A-Za-z0-9.\-]+)".into(),
                r"\b(\d{3}(?:\.\d+)?)\b".into(),
            ],
        ),
        (
            "nomor_surat",
            vec![
                r"(?:no(?:mor)?|nomor\s*surat)[.:\s]*([A-Za-z0-9\-/.]+)".into(),
                r"([A-Za-z0-9]+/[A-Za-z0-9]+/[A-Za-z0-9/\-]+)".into(),
                r"(?:^|\s)(\d+/[A-Za-z]+/[IVXLCDM]+/\d+)".into(),
            ],
        ),
        (
            "tgl_surat",
            vec![
                labelled(r"tanggal|tgl|dated?"),
                named_month.clone(),
                r"(\d{1,2}/\d{1,2}/\d{2,4})".into(),
                r"(\d{4}-\d{2}-\d{2})".into(),
            ],
        ),
        (
            "tgl_surat_masuk",
            vec![
                labelled(r"tgl\.?\s*surat\s*masuk|tanggal\s*masuk"),
                named_month,
            ],
        ),
        ("tgl_masuk", vec![labelled(r"tgl\.?\s*masuk|tanggal\s*masuk")]),
        ("tgl_masuk_surat", vec![labelled(r"tgl\.?\s*masuk\s*surat")]),
        ("tgl_terima_surat", vec![labelled(r"tgl\.?\s*terima|tanggal\s*terima")]),
        (
            "tgl_diteruskan",
            vec![labelled(r"tgl\.?\s*diteruskan|tanggal\s*diteruskan")],
        ),
        (
            "tgl_surat_turun",
            vec![labelled(r"tgl\.?\s*surat\s*turun|tanggal\s*turun")],
        ),
        (
            "tgl_penyelesaian",
            vec![labelled(r"tgl\.?\s*penyelesaian|tanggal\s*selesai")],
        ),
        (
            "asal_surat",
            vec![
                r"(?:dari|from|pengirim|asal)[.:\s]*([^\n]+)".into(),
                r"(?:kepala|direktur|ketua)\s+([^\n,]+)".into(),
            ],
        ),
        ("kepada", vec![r"(?:kepada|yth|to)[.:\s]*([^\n]+)".into()]),
        ("tujuan", vec![r"(?:tujuan|ditujukan)[.:\s]*([^\n]+)".into()]),
        (
            "diperuntukan",
            vec![r"(?:untuk|diperuntukan|bagi)[.:\s]*([^\n]+)".into()],
        ),
        (
            "pengolah",
            vec![r"(?:pengolah|oleh|diolah|bag(?:ian)?)[.:\s]*([^\n]+)".into()],
        ),
        ("lampiran", vec![r"(?:lampiran|lamp\.?)[.:\s]*(\d+|[^\n]+)".into()]),
        (
            "isi_ringkas",
            vec![r"(?:isi\s*ringkas|perihal|hal|subject)[.:\s]*([^\n]+)".into()],
        ),
        (
            "disposisi_ketua",
            vec![r"(?:disposisi\s*ketua|catatan\s*ketua)[.:\s]*([^\n]+)".into()],
        ),
        (
            "disposisi_sekwan",
            vec![r"(?:disposisi\s*sekwan|catatan\s*sekwan)[.:\s]*([^\n]+)".into()],
        ),
        ("catatan", vec![r"(?:catatan|keterangan|note)[.:\s]*([^\n]+)".into()]),
        ("keterangan", vec![r"(?:keterangan|ket\.?)[.:\s]*([^\n]+)".into()]),
    ]
}

/// Keyword patterns per field, tried in order (case-insensitive, multi-line)
static PATTERNS: Lazy<HashMap<&'static str, Vec<Regex>>> = Lazy::new(|| {
    pattern_sources()
        .into_iter()
        .map(|(field, sources)| {
            let compiled = sources
                .iter()
                .filter_map(|source| {
                    RegexBuilder::new(source)
                        .case_insensitive(true)
                        .multi_line(true)
                        .build()
                        .map_err(|e| warn!(field, error = %e, "Skipping invalid field pattern"))
                        .ok()
                })
                .collect();
            (field, compiled)
        })
        .collect()
});

static CODE_FENCE_OPEN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^```(?:json)?\s*").ok());
static CODE_FENCE_CLOSE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s*```$").ok());

/// Extract `fields` from OCR text
pub async fn extract_fields(
    gemini: &GeminiClient,
    text: &str,
    fields: &[&str],
    surat_id: &str,
) -> AutoFill {
    let prompt = prompts::auto_fill_prompt(fields, text);

    let usage = match gemini
        .generate("auto_fill", surat_id, &[Part::text(prompt)])
        .await
    {
        Ok(response) => {
            if let Some(parsed) = parse_gemini_fields(&response.text, fields) {
                let found = parsed.values().filter(|g| g.value.is_some()).count();
                info!(surat_id, fields_extracted = found, "Gemini auto-fill successful");
                return AutoFill {
                    fields: parsed,
                    used_fallback: false,
                    usage: Some(response.usage),
                };
            }
            warn!(surat_id, "Unusable Gemini auto-fill response");
            Some(response.usage)
        }
        Err(err) => {
            warn!(surat_id, error = %err, "Gemini auto-fill failed");
            None
        }
    };

    warn!(surat_id, "Using regex fallback for auto-fill");
    AutoFill {
        fields: regex_extract(text, fields),
        used_fallback: true,
        usage,
    }
}

/// Remove a surrounding Markdown code fence
fn strip_code_fence(response: &str) -> String {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut cleaned = trimmed.to_string();
    if let Some(re) = CODE_FENCE_OPEN.as_ref() {
        cleaned = re.replace(&cleaned, "").into_owned();
    }
    if let Some(re) = CODE_FENCE_CLOSE.as_ref() {
        cleaned = re.replace(&cleaned, "").into_owned();
    }
    cleaned
}

/// Interpret a Gemini JSON answer; `None` when nothing usable came back
pub fn parse_gemini_fields(response: &str, fields: &[&str]) -> Option<FieldGuesses> {
    let cleaned = strip_code_fence(response);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Some(
            fields
                .iter()
                .map(|field| {
                    let guess = match map.get(*field).and_then(json_text) {
                        Some(value) => {
                            let value = if is_date_field(field) {
                                normalize_date(&value).unwrap_or(value)
                            } else {
                                value
                            };
                            FieldGuess::found(value, GEMINI_FIELD_CONFIDENCE)
                        }
                        None => FieldGuess::missing(),
                    };
                    (field.to_string(), guess)
                })
                .collect(),
        ),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Failed to parse Gemini JSON response");
            Some(salvage_fields(&cleaned, fields))
        }
    }
}

/// Plain text of a JSON value; null, `"null"` and blanks count as absent
pub fn json_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() || text == "null" {
        None
    } else {
        Some(text)
    }
}

/// `"field": "value"` pairs out of malformed JSON
fn salvage_fields(response: &str, fields: &[&str]) -> FieldGuesses {
    fields
        .iter()
        .map(|field| {
            let pattern = format!(r#"(?i)"{}"[:\s]*"([^"]+)""#, regex::escape(field));
            let guess = Regex::new(&pattern)
                .ok()
                .and_then(|re| re.captures(response))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .filter(|v| !v.is_empty())
                .map(|v| FieldGuess::found(v, SALVAGED_FIELD_CONFIDENCE))
                .unwrap_or_else(FieldGuess::missing);
            (field.to_string(), guess)
        })
        .collect()
}

/// Keyword-pattern extraction for every field
pub fn regex_extract(text: &str, fields: &[&str]) -> FieldGuesses {
    fields
        .iter()
        .map(|field| (field.to_string(), extract_single_field(text, field)))
        .collect()
}

fn extract_single_field(text: &str, field: &str) -> FieldGuess {
    let Some(patterns) = PATTERNS.get(field) else {
        return FieldGuess::missing();
    };

    for pattern in patterns {
        let Some(value) = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|v| !v.is_empty())
        else {
            continue;
        };

        if is_date_field(field) {
            return match normalize_date(value) {
                Some(normalized) => FieldGuess::found(normalized, PATTERN_DATE_CONFIDENCE),
                None => FieldGuess::found(value, PATTERN_RAW_DATE_CONFIDENCE),
            };
        }
        return FieldGuess::found(value, PATTERN_FIELD_CONFIDENCE);
    }

    FieldGuess::missing()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pattern_compiles() {
        for (field, sources) in pattern_sources() {
            assert_eq!(PATTERNS[field].len(), sources.len(), "{}", field);
        }
    }

    #[test]
    fn test_gemini_json_with_fence() {
        let response = "```json\n{\"nomor_surat\": \"005/12/2025\", \"tgl_surat\": \"12 Maret 2025\", \"lampiran\": null, \"kepada\": \"null\"}\n```";
        let fields =
            parse_gemini_fields(response, &["nomor_surat", "tgl_surat", "lampiran", "kepada"]).unwrap();
        assert_eq!(fields["nomor_surat"], FieldGuess::found("005/12/2025", 0.85));
        assert_eq!(fields["tgl_surat"], FieldGuess::found("2025-03-12", 0.85));
        assert_eq!(fields["lampiran"], FieldGuess::missing());
        assert_eq!(fields["kepada"], FieldGuess::missing());
    }

    #[test]
    fn test_numbers_become_text() {
        let fields = parse_gemini_fields(r#"{"lampiran": 2}"#, &["lampiran"]).unwrap();
        assert_eq!(fields["lampiran"].value.as_deref(), Some("2"));
    }

    #[test]
    fn test_malformed_json_is_salvaged() {
        let response = r#"{"nomor_surat": "001/2026", "asal_surat": "Dinas ABC",,"#;
        let fields = parse_gemini_fields(response, &["nomor_surat", "asal_surat", "tujuan"]).unwrap();
        assert_eq!(fields["nomor_surat"], FieldGuess::found("001/2026", 0.60));
        assert_eq!(fields["asal_surat"], FieldGuess::found("Dinas ABC", 0.60));
        assert_eq!(fields["tujuan"], FieldGuess::missing());
    }

    #[test]
    fn test_non_object_json_is_unusable() {
        assert!(parse_gemini_fields("[1, 2]", &["kode"]).is_none());
    }

    #[test]
    fn test_regex_extract() {
        let text = "Kepada Yth. Ketua DPRD\nNomor: 005/123/Set\nTanggal: 12 Maret 2025\nLampiran: 2 berkas\nPerihal: Undangan";
        let fields = regex_extract(text, &["kepada", "tgl_surat", "lampiran", "disposisi_ketua"]);
        assert_eq!(fields["kepada"].confidence, 0.55);
        assert!(fields["kepada"].value.as_deref().unwrap().contains("Ketua DPRD"));
        assert_eq!(fields["tgl_surat"], FieldGuess::found("2025-03-12", 0.60));
        // the numeric alternative wins
        assert_eq!(fields["lampiran"], FieldGuess::found("2", 0.55));
        assert_eq!(fields["disposisi_ketua"], FieldGuess::missing());
    }

    #[test]
    fn test_unparseable_date_keeps_raw_value() {
        let fields = regex_extract("Tgl Terima: 31 Foo 2025", &["tgl_terima_surat"]);
        assert_eq!(fields["tgl_terima_surat"], FieldGuess::found("31 Foo 2025", 0.45));
    }

    #[test]
    fn test_unknown_field_is_missing() {
        let fields = regex_extract("anything", &["tidak_ada"]);
        assert_eq!(fields["tidak_ada"], FieldGuess::missing());
    }
}
