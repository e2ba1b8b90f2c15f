//! Shared fixtures for arkla-server integration tests
//!
//! Every test gets its own root folder (database, uploads, output) in a
//! `TempDir`, and Gemini is replaced by a local axum stub.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arkla_common::config::{ArchiveLayout, ArklaConfig, GeminiConfig};
use arkla_common::Kategori;
use arkla_server::db::surat::{insert_unverified, FieldValues, NewSurat};
use arkla_server::services::GeminiClient;
use arkla_server::{build_router, db, AppState};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const API_KEY: &str = "test-key";

type Reply = Arc<dyn Fn(&Value) -> (StatusCode, Value) + Send + Sync>;

#[derive(Clone)]
struct StubState {
    reply: Reply,
    calls: Arc<AtomicUsize>,
}

/// Local stand-in for the Gemini REST endpoint
pub struct GeminiStub {
    pub base_url: String,
    calls: Arc<AtomicUsize>,
}

impl GeminiStub {
    /// Requests received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn stub_handler(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    stub.calls.fetch_add(1, Ordering::SeqCst);
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"message": "API key not valid"}})),
        );
    }
    let (status, reply) = (stub.reply)(&body);
    (status, Json(reply))
}

/// Start a Gemini stub answering every request with `reply(request_body)`
pub async fn spawn_gemini_stub<F>(reply: F) -> GeminiStub
where
    F: Fn(&Value) -> (StatusCode, Value) + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicUsize::new(0));
    let state = StubState {
        reply: Arc::new(reply),
        calls: calls.clone(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(stub_handler).with_state(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    GeminiStub {
        base_url: format!("http://{}", addr),
        calls,
    }
}

/// A small, decodable color PNG standing in for a scanned letter
pub fn scan_png() -> Vec<u8> {
    let scan = image::RgbImage::from_fn(64, 48, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 5) as u8, 128])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(scan)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A successful `generateContent` body with fixed token counts
pub fn gemini_text(text: &str) -> Value {
    json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
        "usageMetadata": {"promptTokenCount": 1000, "candidatesTokenCount": 200}
    })
}

/// Concatenated text parts of a `generateContent` request
pub fn prompt_text(body: &Value) -> String {
    body["contents"][0]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Whether the request carries the uploaded document
pub fn has_inline_data(body: &Value) -> bool {
    body["contents"][0]["parts"]
        .as_array()
        .map(|parts| parts.iter().any(|p| p.get("inline_data").is_some()))
        .unwrap_or(false)
}

/// Router plus handles on its database and folders
pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub layout: ArchiveLayout,
    _root: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, bytes)
    }

    pub async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, bytes) = self.send(request).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Store an unverified letter directly, bypassing Gemini
    pub async fn seed_surat(&self, id: &str, kategori: Kategori, isi_ringkas: &str, fields: &[(&str, &str)]) {
        let values: FieldValues = fields
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect();
        let surat = NewSurat {
            id,
            kategori,
            raw_ocr_text: "teks hasil ocr",
            isi_ringkas,
            overall_confidence: 0.85,
            requires_manual_review: false,
            gemini_tokens_used: 0,
            processing_time_ms: 0,
            original_filename: Some("scan.png"),
            file_hash: None,
        };
        insert_unverified(&self.pool, &surat, &values).await.unwrap();
    }
}

/// Config pointing at `gemini_base_url` with no retry delays
pub fn test_config(gemini_base_url: Option<&str>) -> ArklaConfig {
    ArklaConfig {
        gemini: GeminiConfig {
            api_key: gemini_base_url.map(|_| API_KEY.to_string()),
            base_url: gemini_base_url
                .unwrap_or("http://127.0.0.1:9")
                .to_string(),
            timeout_secs: 10,
            max_retries: 1,
            initial_retry_delay_secs: 0,
            max_retry_delay_secs: 0,
            rate_limit_delay_secs: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn test_app(gemini_base_url: Option<&str>) -> TestApp {
    test_app_with(test_config(gemini_base_url)).await
}

pub async fn test_app_with(config: ArklaConfig) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let layout = ArchiveLayout::new(root.path());
    layout.ensure_directories().unwrap();

    let pool = db::init_database(&layout.database_path()).await.unwrap();
    let gemini = GeminiClient::new(config.gemini.clone()).unwrap();
    let state = AppState::new(pool.clone(), gemini, config, layout.clone());

    TestApp {
        router: build_router(state),
        pool,
        layout,
        _root: root,
    }
}

const BOUNDARY: &str = "arkla-test-boundary";

/// multipart/form-data request; `file` is (field name, file name, bytes)
pub fn multipart_request(
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
