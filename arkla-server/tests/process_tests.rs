//! Integration tests for `POST /api/v1/process-surat` against a stubbed Gemini

mod helpers;

use axum::http::StatusCode;
use helpers::{
    gemini_text, has_inline_data, multipart_request, prompt_text, scan_png, spawn_gemini_stub,
    test_app, test_app_with, test_config,
};
use serde_json::{json, Value};

const CORRUPT_PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";

const OCR_TEXT: &str = "PEMERINTAH KOTA\nDINAS KEUANGAN\nNomor: 100/5\nHal: Permohonan data anggaran\nDengan hormat, bersama ini kami sampaikan permohonan data.";

fn unified_reply() -> Value {
    let body = json!({
        "raw_text": OCR_TEXT,
        "isi_ringkas": "Permohonan data anggaran",
        "nomor_surat": "100/5",
        "asal_surat": "Dinas Keuangan",
        "tgl_surat": "12 Maret 2025",
        "lampiran": null,
        "pengolah": ""
    });
    gemini_text(&format!("```json\n{}\n```", body))
}

fn process_request(category: &str, filename: &str, bytes: &[u8], optimized: bool) -> axum::http::Request<axum::body::Body> {
    let flag = if optimized { "true" } else { "false" };
    multipart_request(
        "/api/v1/process-surat",
        &[("category_id", category), ("use_optimized", flag)],
        Some(("file", filename, bytes)),
    )
}

async fn surat_count(pool: &sqlx::SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM surat")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_optimized_processing() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, unified_reply())).await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("masuk_biasa", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(stub.calls(), 1);

    assert_eq!(json["status"], "success");
    assert_eq!(json["kategori"], "masuk_biasa");
    assert_eq!(
        json["steps_completed"],
        json!([
            "validation",
            "upload",
            "preprocessing",
            "ocr",
            "summarization",
            "auto_fill",
            "scoring",
            "database"
        ])
    );
    assert_eq!(json["isi_ringkas"], "Permohonan data anggaran");
    assert_eq!(json["isi_ringkas_confidence"], 0.85);
    assert_eq!(json["extracted_data"]["nomor_surat"], "100/5");
    assert_eq!(json["extracted_data"]["tgl_surat"], "2025-03-12");
    assert_eq!(json["extracted_data"]["pengolah"], Value::Null);
    assert!(json["extracted_data"]["raw_ocr_text"]
        .as_str()
        .unwrap()
        .starts_with("PEMERINTAH KOTA"));
    assert_eq!(json["confidence"]["breakdown"]["asal_surat"], 0.85);
    assert_eq!(json["confidence"]["breakdown"]["pengolah"], 0.5);
    assert_eq!(json["requires_manual_review"], true);
    assert!(json["low_confidence_fields"]
        .as_array()
        .unwrap()
        .contains(&json!("lampiran")));
    assert_eq!(json["gemini_api_usage"]["ocr_tokens"], 1200);
    assert_eq!(json["gemini_api_usage"]["summarization_tokens"], 0);
    assert_eq!(json["gemini_api_usage"]["total_input_tokens"], 1000);
    assert_eq!(json["kode_candidates"], Value::Null);
    assert!(json.get("steps_failed").is_none());
    assert!(json.get("fallback_reason").is_none());

    // stored unverified, with the upload and the usage ledger
    let surat_id = json["surat_id"].as_str().unwrap();
    let (verified_at, file_hash): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT verified_at, file_hash FROM surat WHERE id = ?")
            .bind(surat_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert!(verified_at.is_none());
    assert_eq!(file_hash.map(|h| h.len()), Some(64));

    let upload_dir = app.layout.uploads_dir().join(surat_id);
    assert_eq!(std::fs::read(upload_dir.join("original.png")).unwrap(), scan_png());
    assert!(upload_dir.join("ocr_raw.txt").exists());

    let operations: Vec<String> =
        sqlx::query_scalar("SELECT operation FROM api_usage WHERE surat_id = ?")
            .bind(surat_id)
            .fetch_all(&app.pool)
            .await
            .unwrap();
    assert_eq!(operations, vec!["unified_extract"]);

    let (_, json) = app
        .get(&format!("/api/v1/surat/{}", surat_id))
        .await;
    assert_eq!(json["data"]["details"]["asal_surat"], "Dinas Keuangan");
    assert_eq!(json["data"]["original_filename"], "scan.png");
}

#[tokio::test]
async fn test_legacy_processing_three_calls() {
    let stub = spawn_gemini_stub(|body| {
        let prompt = prompt_text(body);
        let reply = if has_inline_data(body) {
            gemini_text(OCR_TEXT)
        } else if prompt.starts_with("Ringkas dokumen") {
            gemini_text("Permohonan data anggaran dari Dinas Keuangan")
        } else {
            gemini_text(r#"{"nomor_surat": "100/5", "asal_surat": "Dinas Keuangan", "tgl_surat": "12/03/2025"}"#)
        };
        (StatusCode::OK, reply)
    })
    .await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("masuk_biasa", "scan.pdf", b"%PDF-1.4", false))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(stub.calls(), 3);
    assert_eq!(json["status"], "success");
    assert_eq!(json["isi_ringkas"], "Permohonan data anggaran dari Dinas Keuangan");
    assert_eq!(json["extracted_data"]["tgl_surat"], "2025-03-12");
    assert_eq!(json["gemini_api_usage"]["ocr_tokens"], 1200);
    assert_eq!(json["gemini_api_usage"]["summarization_tokens"], 1200);
    assert_eq!(json["gemini_api_usage"]["auto_fill_tokens"], 1200);
    assert_eq!(json["gemini_api_usage"]["total_output_tokens"], 600);

    let usage_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_usage")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(usage_rows, 3);
}

#[tokio::test]
async fn test_unstructured_reply_is_partial_success() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, gemini_text(OCR_TEXT))).await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("undangan", "scan.jpg", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["status"], "partial_success");
    assert_eq!(json["steps_failed"], json!(["summarization", "auto_fill"]));
    assert_eq!(json["fallback_reason"], "GEMINI_SUMMARIZATION_AUTO_FILL_FAILED");
    assert!(json["message"].as_str().unwrap().contains("fallback"));
    assert_eq!(json["isi_ringkas_confidence"], 0.4);
    assert_eq!(surat_count(&app.pool).await, 1);
}

#[tokio::test]
async fn test_empty_text_is_rejected() {
    let stub = spawn_gemini_stub(|_| {
        (
            StatusCode::OK,
            gemini_text(r#"{"raw_text": "", "isi_ringkas": ""}"#),
        )
    })
    .await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("keluar", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "NO_TEXT_EXTRACTED");
    assert!(json["surat_id"].is_string());
    assert_eq!(surat_count(&app.pool).await, 0);
}

#[tokio::test]
async fn test_gemini_server_error_after_retries() {
    let stub = spawn_gemini_stub(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": {"message": "backend error"}}),
        )
    })
    .await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("rahasia", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "OCR_FAILED");
    assert_eq!(json["details"]["step_failed"], "unified_extract");
    assert_eq!(json["details"]["error_type"], "server_error");
    assert!(json["surat_id"].is_string());
    // first attempt plus one retry
    assert_eq!(stub.calls(), 2);
    assert_eq!(surat_count(&app.pool).await, 0);
}

#[tokio::test]
async fn test_gemini_rate_limit() {
    let stub = spawn_gemini_stub(|_| {
        (
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"message": "quota"}}),
        )
    })
    .await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("masuk_biasa", "scan.png", &scan_png(), false))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "GEMINI_RATE_LIMIT");
    assert!(json["details"]["retry_after_seconds"].is_u64());
}

#[tokio::test]
async fn test_rejected_api_key_is_config_error() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, unified_reply())).await;
    let mut config = test_config(Some(stub.base_url.as_str()));
    config.gemini.api_key = Some("wrong-key".to_string());
    let app = test_app_with(config).await;

    let (status, json) = app
        .json(process_request("masuk_biasa", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "GEMINI_CONFIG_ERROR");
    // invalid keys are not retried
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_validation_happens_before_gemini() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, unified_reply())).await;
    let mut config = test_config(Some(stub.base_url.as_str()));
    config.max_file_size = 1024;
    let app = test_app_with(config).await;

    let (status, json) = app
        .json(process_request("arsip_lain", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_CATEGORY");

    let (status, json) = app
        .json(process_request("undangan", "surat.docx", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_FILE");

    let big = vec![0u8; 2048];
    let (status, json) = app
        .json(process_request("undangan", "scan.png", &big, true))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "FILE_TOO_LARGE");

    let (status, json) = app
        .json(multipart_request(
            "/api/v1/process-surat",
            &[("category_id", "undangan")],
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_FILE");

    let (status, json) = app
        .json(multipart_request(
            "/api/v1/process-surat",
            &[("category_id", "undangan"), ("use_optimized", "perhaps")],
            Some(("file", "scan.png", scan_png().as_slice())),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    assert_eq!(stub.calls(), 0);
    assert_eq!(surat_count(&app.pool).await, 0);
}

#[tokio::test]
async fn test_missing_api_key() {
    let app = test_app(None).await;

    let (status, json) = app
        .json(process_request("undangan", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "GEMINI_CONFIG_ERROR");
}

#[tokio::test]
async fn test_daily_budget_exhausted() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, unified_reply())).await;
    let mut config = test_config(Some(stub.base_url.as_str()));
    config.gemini.daily_cost_limit_usd = 0.5;
    let app = test_app_with(config).await;

    sqlx::query(
        "INSERT INTO api_usage (surat_id, operation, input_tokens, output_tokens, estimated_cost_usd) VALUES ('x', 'ocr', 0, 0, 1.0)",
    )
    .execute(&app.pool)
    .await
    .unwrap();

    let (status, json) = app
        .json(process_request("undangan", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "GEMINI_RATE_LIMIT");
    assert!(json["details"]["retry_after_seconds"].as_u64().unwrap() >= 1);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_kode_candidates_when_enabled() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, unified_reply())).await;
    let mut config = test_config(Some(stub.base_url.as_str()));
    config.gemini.kode_matching_enabled = true;
    let app = test_app_with(config).await;

    sqlx::query(
        "INSERT INTO ref_klasifikasi (kode, keterangan) VALUES ('900', 'Keuangan Anggaran'), ('005', 'Undangan')",
    )
    .execute(&app.pool)
    .await
    .unwrap();

    let (status, json) = app
        .json(process_request("masuk_biasa", "scan.png", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    let candidates = json["kode_candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0]["kode"], "900");
    assert_eq!(candidates[0]["confidence"], 0.35);
}

#[tokio::test]
async fn test_corrupt_image_fails_before_gemini() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, unified_reply())).await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("masuk_biasa", "scan.png", CORRUPT_PNG, true))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "OCR_FAILED");
    assert_eq!(json["details"]["step_failed"], "preprocessing");
    assert_eq!(json["details"]["error_type"], "invalid_image");
    assert!(json["surat_id"].is_string());
    assert_eq!(stub.calls(), 0);
    assert_eq!(surat_count(&app.pool).await, 0);
}

#[tokio::test]
async fn test_scans_reach_gemini_as_png() {
    let stub = spawn_gemini_stub(|body| {
        let mime = body["contents"][0]["parts"]
            .as_array()
            .and_then(|parts| parts.iter().find_map(|p| p["inline_data"]["mime_type"].as_str()))
            .unwrap_or_default()
            .to_string();
        if mime == "image/png" {
            (StatusCode::OK, unified_reply())
        } else {
            (
                StatusCode::BAD_REQUEST,
                json!({"error": {"message": format!("unexpected mime {}", mime)}}),
            )
        }
    })
    .await;
    let app = test_app(Some(stub.base_url.as_str())).await;

    let (status, json) = app
        .json(process_request("undangan", "foto.jpeg", &scan_png(), true))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(stub.calls(), 1);

    // the original is kept as uploaded
    let surat_id = json["surat_id"].as_str().unwrap();
    let original = app.layout.uploads_dir().join(surat_id).join("original.jpeg");
    assert_eq!(std::fs::read(original).unwrap(), scan_png());
}

#[tokio::test]
async fn test_oversized_body_is_file_too_large() {
    let stub = spawn_gemini_stub(|_| (StatusCode::OK, unified_reply())).await;
    let mut config = test_config(Some(stub.base_url.as_str()));
    config.max_file_size = 1024;
    let app = test_app_with(config).await;

    // past the request body limit, not just the per-file check
    let huge = vec![0u8; 2 * 1024 * 1024 + 4096];
    let (status, json) = app
        .json(process_request("undangan", "scan.png", &huge, true))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "FILE_TOO_LARGE");
    assert_eq!(stub.calls(), 0);
    assert_eq!(surat_count(&app.pool).await, 0);
}
