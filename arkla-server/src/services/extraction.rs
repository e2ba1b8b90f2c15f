//! Document-level Gemini calls: plain OCR and the single-call unified extraction

use std::collections::BTreeMap;

use arkla_common::dates::normalize_date;
use arkla_common::kategori::is_date_field;
use arkla_common::text::truncate_chars;
use arkla_common::Kategori;
use serde_json::Value;
use tracing::{info, warn};

use super::auto_filler::json_text;
use super::gemini_client::{GeminiClient, GeminiError, Part, TokenUsage};
use super::prompts;
use super::summarizer::MAX_SUMMARY_CHARS;

/// Parsed unified answer
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedExtraction {
    pub raw_text: String,
    pub isi_ringkas: String,
    /// Every detail column of the category (`None` when not found)
    pub fields: BTreeMap<String, Option<String>>,
    /// False when the answer was not JSON and was taken as raw text
    pub structured: bool,
}

/// OCR only: the document's full text
pub async fn ocr(
    gemini: &GeminiClient,
    surat_id: &str,
    mime_type: &str,
    document: &[u8],
) -> Result<(String, TokenUsage), GeminiError> {
    let parts = [
        Part::text(prompts::OCR_PROMPT),
        Part::inline(mime_type, document),
    ];
    let response = gemini.generate("ocr", surat_id, &parts).await?;
    info!(surat_id, text_length = response.text.len(), "OCR completed");
    Ok((response.text, response.usage))
}

/// Text, summary and category fields in one call
pub async fn unified_extract(
    gemini: &GeminiClient,
    kategori: Kategori,
    surat_id: &str,
    mime_type: &str,
    document: &[u8],
) -> Result<(UnifiedExtraction, TokenUsage), GeminiError> {
    let parts = [
        Part::text(prompts::unified_prompt(kategori)),
        Part::inline(mime_type, document),
    ];
    let response = gemini.generate("unified_extract", surat_id, &parts).await?;
    let extraction = parse_unified_response(&response.text, kategori);

    if !extraction.structured {
        warn!(surat_id, "Unified response was not JSON, using it as raw text");
    }
    info!(
        surat_id,
        text_length = extraction.raw_text.len(),
        tokens_used = response.usage.total(),
        "Unified extraction completed"
    );

    Ok((extraction, response.usage))
}

/// Parse the outermost `{...}` block of a unified answer
///
/// Anything unparsable becomes the raw text, with its first characters as
/// the summary and no fields.
pub fn parse_unified_response(response: &str, kategori: Kategori) -> UnifiedExtraction {
    let object = json_block(response)
        .and_then(|block| serde_json::from_str::<Value>(block).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        });

    let Some(map) = object else {
        return UnifiedExtraction {
            raw_text: response.to_string(),
            isi_ringkas: truncate_chars(response.trim(), MAX_SUMMARY_CHARS).to_string(),
            fields: kategori
                .detail_columns()
                .map(|column| (column.to_string(), None))
                .collect(),
            structured: false,
        };
    };

    let text_of = |key: &str| map.get(key).and_then(json_text).unwrap_or_default();

    let fields = kategori
        .detail_columns()
        .map(|column| {
            let value = map.get(column).and_then(json_text).map(|value| {
                if is_date_field(column) {
                    normalize_date(&value).unwrap_or(value)
                } else {
                    value
                }
            });
            (column.to_string(), value)
        })
        .collect();

    UnifiedExtraction {
        raw_text: text_of("raw_text"),
        isi_ringkas: text_of("isi_ringkas"),
        fields,
        structured: true,
    }
}

/// From the first `{` to the last `}`
fn json_block(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json() {
        let response = "```json\n{\n  \"raw_text\": \"SURAT UNDANGAN\\nHal: Rapat\",\n  \"isi_ringkas\": \"Rapat Paripurna pada 12 Maret 2025 di Ruang Rapat\",\n  \"asal_surat\": \"Sekretariat DPRD\",\n  \"tgl_surat_masuk\": \"12/03/2025\",\n  \"lampiran\": null\n}\n```";
        let extraction = parse_unified_response(response, Kategori::Undangan);

        assert!(extraction.structured);
        assert_eq!(extraction.raw_text, "SURAT UNDANGAN\nHal: Rapat");
        assert_eq!(
            extraction.isi_ringkas,
            "Rapat Paripurna pada 12 Maret 2025 di Ruang Rapat"
        );
        assert_eq!(extraction.fields["asal_surat"].as_deref(), Some("Sekretariat DPRD"));
        assert_eq!(extraction.fields["tgl_surat_masuk"].as_deref(), Some("2025-03-12"));
        assert_eq!(extraction.fields["lampiran"], None);
        assert_eq!(extraction.fields["diperuntukan"], None);
        assert!(!extraction.fields.contains_key("isi_ringkas"));
        assert_eq!(
            extraction.fields.len(),
            Kategori::Undangan.detail_columns().count()
        );
    }

    #[test]
    fn test_plain_text_falls_back() {
        let response = "PEMERINTAH KABUPATEN CONTOH ".repeat(20);
        let extraction = parse_unified_response(&response, Kategori::Keluar);

        assert!(!extraction.structured);
        assert_eq!(extraction.raw_text, response);
        assert_eq!(extraction.isi_ringkas.chars().count(), MAX_SUMMARY_CHARS);
        assert!(extraction.fields.values().all(Option::is_none));
    }

    #[test]
    fn test_broken_json_falls_back() {
        let extraction = parse_unified_response("{\"raw_text\": \"abc\"", Kategori::Rahasia);
        assert!(!extraction.structured);
        assert_eq!(extraction.raw_text, "{\"raw_text\": \"abc\"");
    }
}
