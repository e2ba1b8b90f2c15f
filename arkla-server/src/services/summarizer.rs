//! Letter summary (isi ringkas): Gemini first, regex heuristics as fallback

use arkla_common::text::truncate_chars;
use arkla_common::Kategori;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use super::gemini_client::{GeminiClient, GeminiError, Part, TokenUsage};
use super::prompts;

pub const MAX_SUMMARY_CHARS: usize = 200;

/// Confidence of a Gemini-written summary
pub const GEMINI_SUMMARY_CONFIDENCE: f64 = 0.85;

static WHITESPACE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s+").ok());
static SUBJECT_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:perihal|hal|re|subject)[:\s]+([^\n.]+)").ok());
static SENTENCE_BREAK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[.!?]\s+").ok());

/// Summary with its confidence
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub text: String,
    pub confidence: f64,
    /// Produced by the regex fallback
    pub used_fallback: bool,
    /// Tokens spent when Gemini produced the summary
    pub usage: Option<TokenUsage>,
    /// Gemini failure that triggered the fallback
    pub gemini_error: Option<String>,
}

/// Summarize OCR text, falling back to [`regex_summary`] on any Gemini failure
pub async fn summarize(
    gemini: &GeminiClient,
    text: &str,
    kategori: Kategori,
    surat_id: &str,
) -> Summary {
    if text.trim().is_empty() {
        return fallback(text, None);
    }

    let prompt = prompts::summary_prompt(kategori, text);
    match gemini
        .generate("summarization", surat_id, &[Part::text(prompt)])
        .await
    {
        Ok(response) if !response.text.trim().is_empty() => {
            let summary = truncate_chars(response.text.trim(), MAX_SUMMARY_CHARS).to_string();
            info!(surat_id, summary_length = summary.chars().count(), "Gemini summarization successful");
            Summary {
                text: summary,
                confidence: GEMINI_SUMMARY_CONFIDENCE,
                used_fallback: false,
                usage: Some(response.usage),
                gemini_error: None,
            }
        }
        Ok(_) => {
            warn!(surat_id, "Gemini returned an empty summary, using regex fallback");
            fallback(text, Some("empty response".to_string()))
        }
        Err(err) => {
            warn!(surat_id, error = %err, "Using regex fallback for summarization");
            fallback(text, Some(describe(&err)))
        }
    }
}

fn describe(err: &GeminiError) -> String {
    format!("{}: {}", err.error_type(), err)
}

fn fallback(text: &str, gemini_error: Option<String>) -> Summary {
    let (summary, confidence) = regex_summary(text);
    Summary {
        text: summary,
        confidence,
        used_fallback: true,
        usage: None,
        gemini_error,
    }
}

/// Heuristic summary
///
/// Subject line (0.60), else the first real sentence (0.50), else the
/// leading characters (0.40). Empty text yields `("", 0.0)`.
pub fn regex_summary(text: &str) -> (String, f64) {
    let collapsed = match WHITESPACE.as_ref() {
        Some(re) => re.replace_all(text, " ").trim().to_string(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    };

    if collapsed.is_empty() {
        return (String::new(), 0.0);
    }

    if let Some(caps) = SUBJECT_LINE.as_ref().and_then(|re| re.captures(&collapsed)) {
        let subject = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if !subject.is_empty() {
            return (truncate_chars(subject, MAX_SUMMARY_CHARS).to_string(), 0.60);
        }
    }

    if let Some(re) = SENTENCE_BREAK.as_ref() {
        let sentence = re
            .split(&collapsed)
            .map(str::trim)
            .find(|s| s.chars().count() > 20 && !is_header(s));
        if let Some(sentence) = sentence {
            return (truncate_chars(sentence, MAX_SUMMARY_CHARS).to_string(), 0.50);
        }
    }

    (truncate_chars(&collapsed, MAX_SUMMARY_CHARS).to_string(), 0.40)
}

/// All-caps heading such as `PEMERINTAH KABUPATEN`
fn is_header(sentence: &str) -> bool {
    sentence
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(WHITESPACE.is_some());
        assert!(SUBJECT_LINE.is_some());
        assert!(SENTENCE_BREAK.is_some());
    }

    #[test]
    fn test_subject_line_wins() {
        let text = "PEMERINTAH KABUPATEN\nNomor: 005/123\nPerihal: Undangan Rapat Paripurna. Dengan hormat";
        let (summary, confidence) = regex_summary(text);
        assert_eq!(summary, "Undangan Rapat Paripurna");
        assert_eq!(confidence, 0.60);
    }

    #[test]
    fn test_first_sentence_skips_headers() {
        let text = "SEKRETARIAT DPRD KABUPATEN CONTOH. Bersama ini kami sampaikan laporan kegiatan tahunan. Terima kasih";
        let (summary, confidence) = regex_summary(text);
        assert_eq!(summary, "Bersama ini kami sampaikan laporan kegiatan tahunan");
        assert_eq!(confidence, 0.50);
    }

    #[test]
    fn test_leading_characters_last() {
        let (summary, confidence) = regex_summary("SINGKAT");
        assert_eq!(summary, "SINGKAT");
        assert_eq!(confidence, 0.40);

        let long = "A".repeat(300);
        let (summary, _) = regex_summary(&long);
        assert_eq!(summary.chars().count(), MAX_SUMMARY_CHARS);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(regex_summary("  \n\t "), (String::new(), 0.0));
    }

    #[tokio::test]
    async fn test_unconfigured_client_falls_back() {
        let client = GeminiClient::new(Default::default()).unwrap();
        let summary = summarize(&client, "Hal: Permohonan Data", Kategori::MasukBiasa, "s").await;
        assert!(summary.used_fallback);
        assert_eq!(summary.text, "Permohonan Data");
        assert!(summary.usage.is_none());
        assert!(summary.gemini_error.unwrap().starts_with("not_configured"));
    }
}
