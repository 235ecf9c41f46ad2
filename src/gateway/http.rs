//! HTTP gateway for a Gemini-style `generateContent` endpoint.
//!
//! One POST per submission: the prompt as a text part, the image as inline
//! base64 data. Responses are flattened to the concatenated text parts of the
//! first candidate. Provider status codes are mapped onto the stable
//! [`GatewayError`] categories here, at the edge, so nothing downstream ever
//! inspects raw provider payloads.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{GatewayError, VisionGateway};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Blocking HTTP client for the inference provider.
pub struct HttpVisionGateway {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpVisionGateway {
    /// Create a gateway against an explicit endpoint.
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Construct from environment: `MANGOLENS_API_KEY` (required for real
    /// calls), `MANGOLENS_API_BASE` and `MANGOLENS_MODEL` (optional).
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MANGOLENS_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("MANGOLENS_API_KEY").unwrap_or_default();
        let model =
            std::env::var("MANGOLENS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(&base_url, &api_key, &model, DEFAULT_TIMEOUT_SECS)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

// ── Wire types ──────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Map a non-success status onto a stable error category.
fn classify_status(status: u16, body: &str) -> GatewayError {
    match status {
        401 | 403 => GatewayError::Auth,
        429 => GatewayError::RateLimited,
        503 | 529 => GatewayError::Overloaded,
        _ if body.to_lowercase().contains("overloaded") => GatewayError::Overloaded,
        _ => GatewayError::Unknown(format!("provider returned status {status}")),
    }
}

impl VisionGateway for HttpVisionGateway {
    fn submit(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, GatewayError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: Some(prompt),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: BASE64.encode(image),
                        }),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    GatewayError::Network(format!("cannot reach {}", self.base_url))
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| GatewayError::Unknown(format!("unreadable provider response: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GatewayError::Unknown(
                "provider response contained no text".into(),
            ));
        }
        Ok(text)
    }
}
