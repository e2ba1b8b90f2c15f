//! Prompt templates sent to Gemini

use arkla_common::text::truncate_chars;
use arkla_common::Kategori;

/// Characters of OCR text included in text-only prompts
const PROMPT_TEXT_LIMIT: usize = 4000;

pub const OCR_PROMPT: &str = "Extract ALL text from this document image exactly as it appears.
Preserve the structure and formatting where possible.
Return only the extracted text, nothing else.";

pub fn summary_prompt(kategori: Kategori, text: &str) -> String {
    format!(
        "Ringkas dokumen {kategori} berikut dalam 1-2 kalimat singkat.
Fokus pada tujuan utama dan informasi penting.

Teks dokumen:
{text}

Ringkasan (dalam Bahasa Indonesia, maksimal 200 karakter):",
        kategori = kategori.label(),
        text = truncate_chars(text, PROMPT_TEXT_LIMIT),
    )
}

pub fn auto_fill_prompt(fields: &[&str], text: &str) -> String {
    format!(
        r#"Dari teks dokumen berikut, ekstrak informasi untuk field-field ini:
{fields}

Teks dokumen:
{text}

Berikan hasil dalam format JSON dengan field name sebagai key.
Jika field tidak ditemukan, gunakan null.
Untuk tanggal, gunakan format YYYY-MM-DD jika memungkinkan.

Contoh output:
{{"nomor_surat": "001/2026", "asal_surat": "Dinas ABC", "tgl_surat": "2026-01-28"}}

JSON Response:"#,
        fields = fields.join(", "),
        text = truncate_chars(text, PROMPT_TEXT_LIMIT),
    )
}

fn isi_ringkas_rule(kategori: Kategori) -> &'static str {
    match kategori {
        Kategori::Undangan => {
            r#"- isi_ringkas: Gunakan format "[nama kegiatan] pada [tanggal] di [tempat]"
  Contoh: "Rapat Koordinasi pada 28 Januari 2026 di Ruang Rapat DPRD"
  Jika tidak ada jadwal lengkap, tulis nama kegiatan saja."#
        }
        _ => {
            r#"- isi_ringkas: PRIORITAS pertama, gunakan isi dari "Hal:" atau "Perihal:" jika ada di dokumen.
  Jika tidak ada Hal/Perihal, buat ringkasan singkat maksimal 100 karakter.
  Contoh: "Permohonan Revisi DPA Tahun 2026" (dari Hal:)"#
        }
    }
}

/// Single-call prompt: full text, summary and every category field as JSON
pub fn unified_prompt(kategori: Kategori) -> String {
    let fields = kategori.fields();
    let field_lines: Vec<String> = fields
        .iter()
        .map(|f| format!("\"{}\": \"nilai atau null\"", f))
        .collect();

    format!(
        r#"Analisis dokumen surat ini dan berikan output dalam format JSON.

TUGAS:
1. Ekstrak SEMUA teks dari gambar dokumen ini
2. Buat isi ringkas sesuai aturan di bawah
3. Ekstrak field-field berikut: {field_list}

OUTPUT FORMAT (JSON):
{{
    "raw_text": "teks lengkap dari dokumen...",
    "isi_ringkas": "ringkasan sesuai aturan",
    {field_lines}
}}

ATURAN:
- raw_text: ekstrak semua teks persis seperti yang terlihat
{rule}
- Untuk tanggal, gunakan format YYYY-MM-DD
- Jika field tidak ditemukan, gunakan null
- Output HANYA JSON, tanpa penjelasan tambahan"#,
        field_list = fields.join(", "),
        field_lines = field_lines.join(", "),
        rule = isi_ringkas_rule(kategori),
    )
}
