//! AI client trait and shared request helpers.

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;

use crate::llm::error::LlmError;
use crate::llm::message::Message;

/// Endpoint used when the settings carry no base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when a step or column does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Token budget for every completion unless overridden.
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

/// Marker that identifies an aggregator base URL.
pub(crate) const AGGREGATOR_MARKER: &str = "openrouter";

/// Referer sent to the aggregator so it can attribute traffic.
pub(crate) const AGGREGATOR_REFERER: &str = "https://joelmnz.github.io/ai-slop/";

/// Application title sent to the aggregator.
pub(crate) const AGGREGATOR_TITLE: &str = "AI Slop";

/// Connection settings passed explicitly into every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSettings {
    /// Base URL of the OpenAI-compatible API, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: Option<String>,
    /// Bearer token. Empty means "not configured".
    pub api_key: String,
}

impl ApiSettings {
    /// Creates settings from a base URL and key.
    pub fn new(base_url: Option<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.filter(|url| !url.trim().is_empty()),
            api_key: api_key.into(),
        }
    }

    /// Returns the configured base URL or the public default.
    pub fn resolved_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Whether the base URL points at the aggregator.
    pub fn is_aggregator(&self) -> bool {
        self.resolved_base_url().contains(AGGREGATOR_MARKER)
    }

    /// Returns the trimmed API key, failing when none is set.
    pub fn require_api_key(&self) -> Result<&str, LlmError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(LlmError::missing_api_key());
        }
        Ok(key)
    }

    /// Joins an endpoint path onto the resolved base URL.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.resolved_base_url();
        let base = base.strip_suffix('/').unwrap_or(base);
        format!("{base}{path}")
    }
}

/// Builds the header set shared by completion and catalog requests.
pub(crate) fn build_headers(settings: &ApiSettings) -> Result<HeaderMap> {
    let api_key = settings.require_api_key()?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("API key contains characters that are not valid in a header")?,
    );

    if settings.is_aggregator() {
        headers.insert("http-referer", HeaderValue::from_static(AGGREGATOR_REFERER));
        headers.insert("x-title", HeaderValue::from_static(AGGREGATOR_TITLE));
    }

    Ok(headers)
}

/// Builds the HTTP client. No timeout is set; the user re-triggers by hand.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Checks an HTTP response for error status.
///
/// On failure, prefers `error.message` from a JSON body and falls back to the
/// canonical status text.
pub(crate) async fn check_error_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {e}");
        String::new()
    });
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.error)
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    tracing::warn!(status = %status, body = %body, "API responded with an error");
    Err(LlmError::api(message).into())
}

/// Trait for anything that can answer a message list.
///
/// The runners only talk to this trait so tests can substitute a scripted client.
pub trait AiClient: Send + Sync {
    /// Sends the ordered messages to `model` and returns the trimmed reply.
    fn send_messages<'a>(
        &'a self,
        messages: &'a [Message],
        model: &'a str,
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}
