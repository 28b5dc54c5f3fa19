//! E-waste classification through a generative-AI model.
//!
//! [`ClassifyImage`] is the seam the request handler depends on; [`GeminiClassifier`] implements it
//! against the Generative Language API `generateContent` endpoint. The image travels inline as
//! base64 next to a fixed instruction prompt, and the first text part of the first candidate comes
//! back as the classification.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::GeminiConfig;
use crate::errors::{Error, Result};

/// Instruction sent with every image.
pub const CLASSIFICATION_PROMPT: &str = "Classify this e-waste image into one of these categories: repairable, sellable, recyclable, or hazardous. Prioritize in this order: 1) Sellable if the item seems functional or has valuable parts. 2) Repairable if it shows signs of minor damage that can be fixed. 3) Recyclable if the item is non-functional but contains materials that can be reused. 4) Hazardous if it contains dangerous substances like lead or mercury. Provide a brief explanation for the chosen category.";

/// Returned when the model answers without any text
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response from AI";

/// Anything that can turn image bytes into a free-text classification.
#[async_trait]
pub trait ClassifyImage: Send + Sync {
    async fn classify(&self, image: &[u8], mime_type: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: Blob<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: String,
}

/// Classifier backed by Gemini's `generateContent`.
pub struct GeminiClassifier {
    client: Client,
    endpoint: Url,
    api_key: String,
    request_timeout: Duration,
}

impl GeminiClassifier {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let endpoint = ensure_slash(&config.base_url)
            .join(&format!("v1beta/models/{}:generateContent", config.model))
            .map_err(|e| anyhow::anyhow!("Failed to construct generateContent URL: {}", e))?;
        let api_key = config
            .api_key()
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("Gemini API key is not configured"))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            request_timeout: config.request_timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::UpstreamTimeout {
                timeout: self.request_timeout,
            }
        } else {
            Error::UpstreamFailure { message: e.to_string() }
        }
    }
}

/// Makes sure a url has a trailing slash, so that `join` appends instead of replacing the last
/// path segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let path = format!("{}/", url.path());
        new_url.set_path(&path);
        new_url
    }
}

#[async_trait]
impl ClassifyImage for GeminiClassifier {
    #[instrument(skip(self, image), fields(image_bytes = image.len()))]
    async fn classify(&self, image: &[u8], mime_type: &str) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: CLASSIFICATION_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type,
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
        };

        info!(endpoint = %self.endpoint, "Requesting classification");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(Error::UpstreamFailure {
                message: format!("{} - {}", status, upstream_error_message(&text)),
            });
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| Error::UpstreamFailure {
            message: format!("invalid response body: {}", e),
        })?;
        debug!(response = %json, "Full classification response");

        Ok(extract_text(&json).unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string()))
    }
}

/// Pick the best available text out of a `generateContent` response.
///
/// Looks at the first candidate's parts for the first one carrying non-blank text, then at a
/// flattened top-level `text` field.
pub fn extract_text(response: &Value) -> Option<String> {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .and_then(|parts| parts.iter().find_map(non_blank))
        .or_else(|| non_blank(response))
        .map(str::to_owned)
}

fn non_blank(value: &Value) -> Option<&str> {
    value.get("text").and_then(Value::as_str).filter(|text| !text.trim().is_empty())
}

/// Google APIs wrap errors as `{"error": {"message": ...}}`; fall back to the raw body.
fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_string())
}
