//! [`OcrTransport`] over the Mistral REST API.
//!
//! ## Request Flow
//!
//! ```text
//! PDF:   POST /files (multipart, purpose=ocr) ──▶ GET /files/{id}/url ──▶ POST /ocr
//! Image: POST /ocr (image_url = data URL)
//! JSON:  POST /chat/completions (response_format = json_schema | json_object)
//! ```
//!
//! Every call is made once. HTTP status codes are mapped onto [`OcrError`]
//! variants so callers can tell credentials, quota and server trouble apart;
//! a body that cannot be decoded is [`OcrError::MalformedResponse`].

use super::{DocumentSource, OcrOptions, OcrResponse, OcrTransport, StructuredRequest};
use crate::config::OcrConfig;
use crate::error::OcrError;
use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// HTTP client for the Mistral API.
#[derive(Clone)]
pub struct MistralTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for MistralTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: String },
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    /// A plain string, or a list of content chunks on newer models.
    #[serde(default)]
    content: Value,
}

// ── Construction ─────────────────────────────────────────────────────────────

impl MistralTransport {
    /// Build a client from `config`.
    ///
    /// Fails with [`OcrError::MissingApiKey`] when no key is configured.
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let api_key = config.require_api_key()?.to_string();

        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| OcrError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ── Individual endpoints ─────────────────────────────────────────────

    async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String, OcrError> {
        let endpoint = self.url("files");
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| OcrError::Internal(format!("invalid upload mime type: {e}")))?;
        let form = multipart::Form::new().text("purpose", "ocr").part("file", part);

        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network(&endpoint, e))?;
        let uploaded: UploadedFile = decode(&endpoint, check_status(&endpoint, resp).await?).await?;
        debug!("Uploaded {} as file {}", file_name, uploaded.id);
        Ok(uploaded.id)
    }

    async fn signed_url(&self, file_id: &str, expiry_hours: u32) -> Result<String, OcrError> {
        let endpoint = self.url(&format!("files/{file_id}/url"));
        let resp = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .query(&[("expiry", expiry_hours)])
            .send()
            .await
            .map_err(|e| network(&endpoint, e))?;
        let signed: SignedUrl = decode(&endpoint, check_status(&endpoint, resp).await?).await?;
        Ok(signed.url)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, OcrError> {
        let endpoint = self.url(path);
        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| network(&endpoint, e))?;
        decode(&endpoint, check_status(&endpoint, resp).await?).await
    }
}

#[async_trait]
impl OcrTransport for MistralTransport {
    async fn ocr_document(
        &self,
        source: &DocumentSource,
        options: &OcrOptions,
    ) -> Result<OcrResponse, OcrError> {
        let document = match source {
            DocumentSource::Pdf { file_name, bytes } => {
                let file_id = self.upload(file_name, bytes).await?;
                let url = self
                    .signed_url(&file_id, options.signed_url_expiry_hours)
                    .await?;
                json!({ "type": "document_url", "document_url": url })
            }
            DocumentSource::Image { data_url } => {
                json!({ "type": "image_url", "image_url": data_url })
            }
        };

        let body = json!({
            "model": options.model,
            "document": document,
            "include_image_base64": options.include_image_base64,
        });
        let response: OcrResponse = self.post_json("ocr", &body).await?;
        debug!("OCR returned {} page(s)", response.pages.len());
        Ok(response)
    }

    async fn structured(&self, request: &StructuredRequest) -> Result<Value, OcrError> {
        let mut content = vec![ContentPart::Text {
            text: request.prompt.clone(),
        }];
        if let Some(ref url) = request.image_data_url {
            content.push(ContentPart::ImageUrl {
                image_url: url.clone(),
            });
        }

        let response_format = match request.schema {
            Some(ref schema) => json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": schema,
                    "strict": true,
                }
            }),
            None => json!({ "type": "json_object" }),
        };

        let body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [ChatMessage { role: "user", content }],
            "response_format": response_format,
        });

        let chat: ChatResponse = self.post_json("chat/completions", &body).await?;
        let message = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::malformed("chat completion has no choices"))?
            .message;
        parse_json_reply(&message.content)
    }
}

// ── Response handling ────────────────────────────────────────────────────────

fn network(endpoint: &str, e: reqwest::Error) -> OcrError {
    let detail = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    OcrError::Network {
        endpoint: endpoint.to_string(),
        detail,
    }
}

/// Map a non-success status to the matching error variant.
async fn check_status(endpoint: &str, resp: Response) -> Result<Response, OcrError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OcrError::AuthError {
            status: status.as_u16(),
            detail: message,
        },
        StatusCode::TOO_MANY_REQUESTS => OcrError::RateLimited {
            retry_after_secs: retry_after,
        },
        _ => OcrError::ApiError {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        },
    })
}

async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, OcrError> {
    let bytes = resp.bytes().await.map_err(|e| network(endpoint, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| OcrError::malformed(format!("unexpected body from {endpoint}: {e}")))
}

/// Pull a readable message out of an error body.
///
/// The API uses `{"message": ..}`, `{"detail": ..}` or
/// `{"error": {"message": ..}}` depending on the endpoint.
fn error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let candidates = [
            v.get("message"),
            v.get("detail"),
            v.get("error").and_then(|e| e.get("message")),
        ];
        for c in candidates.into_iter().flatten() {
            match c {
                Value::String(s) => return s.clone(),
                Value::Null => {}
                other => return other.to_string(),
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "(empty body)".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}

/// Turn the assistant message content into JSON.
fn parse_json_reply(content: &Value) -> Result<Value, OcrError> {
    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(chunks) => chunks
            .iter()
            .filter_map(|c| c.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        Value::Null => return Err(OcrError::malformed("chat completion has no content")),
        other => return Ok(other.clone()),
    };

    let text = strip_json_fence(&text);
    serde_json::from_str(text)
        .map_err(|e| OcrError::malformed(format!("model reply is not valid JSON: {e}")))
}

fn strip_json_fence(text: &str) -> &str {
    let t = text.trim();
    t.strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(t)
}
