//! Gemini `generateContent` REST client
//!
//! One shared `reqwest::Client`; every call goes through [`GeminiClient::generate`],
//! which classifies failures and retries the transient ones with exponential
//! backoff (a fixed, longer delay after HTTP 429).

use arkla_common::config::GeminiConfig;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("ARKLA/", env!("CARGO_PKG_VERSION"));

/// USD per million prompt tokens
pub const INPUT_COST_PER_1M: f64 = 0.0075;
/// USD per million response tokens
pub const OUTPUT_COST_PER_1M: f64 = 0.030;

/// Gemini client errors
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini API key not configured")]
    NotConfigured,

    #[error("Invalid Gemini API key: {0}")]
    InvalidApiKey(String),

    #[error("Gemini rate limit exceeded")]
    RateLimited,

    #[error("Gemini request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gemini server error {0}: {1}")]
    Server(u16, String),

    #[error("Gemini API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl GeminiError {
    /// Worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeminiError::RateLimited
                | GeminiError::Timeout
                | GeminiError::Network(_)
                | GeminiError::Server(..)
        )
    }

    /// Short machine-readable kind, reported as `details.error_type`
    pub fn error_type(&self) -> &'static str {
        match self {
            GeminiError::NotConfigured => "not_configured",
            GeminiError::InvalidApiKey(_) => "invalid_api_key",
            GeminiError::RateLimited => "rate_limit",
            GeminiError::Timeout => "timeout",
            GeminiError::Network(_) => "network",
            GeminiError::Server(..) => "server_error",
            GeminiError::Api(..) => "api_error",
            GeminiError::Parse(_) => "parse_error",
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeminiError::Timeout
        } else {
            GeminiError::Network(err.to_string())
        }
    }

    /// Classify a non-success HTTP status
    fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => GeminiError::RateLimited,
            401 | 403 => GeminiError::InvalidApiKey(body),
            400 if body.to_lowercase().contains("api key") => GeminiError::InvalidApiKey(body),
            500..=599 => GeminiError::Server(status, body),
            _ => GeminiError::Api(status, body),
        }
    }
}

/// Tokens consumed by one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl TokenUsage {
    pub fn total(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }

    /// Estimated cost in USD
    pub fn cost_usd(&self) -> f64 {
        self.input_tokens as f64 / 1_000_000.0 * INPUT_COST_PER_1M
            + self.output_tokens as f64 / 1_000_000.0 * OUTPUT_COST_PER_1M
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One part of the user turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    /// Binary document, base64-encoded
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Part::InlineData {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: &'a [Part],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
}

/// Text and token usage of a successful call
#[derive(Debug, Clone, Default)]
pub struct GeminiResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// Gemini REST client
pub struct GeminiClient {
    http_client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| GeminiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Call the model, retrying transient failures
    ///
    /// `operation` only labels log lines (`ocr`, `summarization`, ...).
    pub async fn generate(
        &self,
        operation: &str,
        surat_id: &str,
        parts: &[Part],
    ) -> Result<GeminiResponse, GeminiError> {
        let mut attempt: u32 = 0;

        loop {
            match self.generate_once(parts).await {
                Ok(response) => {
                    info!(
                        operation,
                        surat_id,
                        attempt,
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        "Gemini call succeeded"
                    );
                    return Ok(response);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = match err {
                        GeminiError::RateLimited => self.config.rate_limit_delay(),
                        _ => self.config.retry_delay(attempt),
                    };
                    warn!(
                        operation,
                        surat_id,
                        attempt,
                        error = %err,
                        "Gemini call failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(operation, surat_id, attempt, error = %err, "Gemini call failed");
                    return Err(err);
                }
            }
        }
    }

    async fn generate_once(&self, parts: &[Part]) -> Result<GeminiResponse, GeminiError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GeminiError::NotConfigured)?;

        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts,
            }],
        };

        debug!(model = %self.config.model, parts = parts.len(), "Querying Gemini API");

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(GeminiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeminiError::from_status(status.as_u16(), error_text));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeminiError::Timeout
            } else {
                GeminiError::Parse(e.to_string())
            }
        })?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let usage = body
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(GeminiResponse { text, usage })
    }
}
