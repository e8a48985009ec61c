//! OpenAI-compatible API client (works with OpenAI, OpenRouter and legacy completion servers).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::{build_headers, build_http_client, check_error_response, AiClient, ApiSettings};
use super::error::LlmError;
use super::message::{flatten_prompt, Message};

/// Marker in a model name that selects the chat-completions shape.
const CHAT_MODEL_MARKER: &str = "gpt";

/// Which upstream request/response shape a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// `{model, messages, max_tokens}` against `/chat/completions`.
    Chat,
    /// `{model, prompt, max_tokens}` against `/completions`.
    Legacy,
}

impl RequestShape {
    /// Picks the shape for a model/settings pair.
    pub fn select(model: &str, settings: &ApiSettings) -> Self {
        if model.contains(CHAT_MODEL_MARKER) || settings.is_aggregator() {
            Self::Chat
        } else {
            Self::Legacy
        }
    }

    /// Endpoint path for the shape.
    pub fn path(self) -> &'static str {
        match self {
            Self::Chat => "/chat/completions",
            Self::Legacy => "/completions",
        }
    }
}

/// Chat-completions request body.
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
}

/// Legacy completions request body.
#[derive(Serialize, Debug)]
struct LegacyRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: u32,
}

/// Response envelope shared by both shapes.
#[derive(Deserialize, Debug, Default)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct Choice {
    message: Option<ResponseMessage>,
    text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ResponseMessage {
    content: Option<String>,
}

impl CompletionResponse {
    /// Pulls the first choice's text for the given shape, trimmed, or `""`.
    fn into_text(self, shape: RequestShape) -> String {
        let first = self.choices.into_iter().next();
        let text = match shape {
            RequestShape::Chat => first.and_then(|c| c.message).and_then(|m| m.content),
            RequestShape::Legacy => first.and_then(|c| c.text),
        };
        text.map(|t| t.trim().to_string()).unwrap_or_default()
    }
}

/// OpenAI-compatible API client bound to one set of connection settings.
pub struct OpenAiCompatClient {
    /// HTTP client for API requests.
    client: Client,
    /// Connection settings used for every request.
    settings: ApiSettings,
}

impl OpenAiCompatClient {
    /// Creates a client for the given settings.
    pub fn new(settings: ApiSettings) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            settings,
        })
    }

    /// Settings this client was created with.
    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Shared HTTP client, reused by the catalog fetcher.
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Sends `messages` to `model` and returns the trimmed reply text.
    pub async fn complete(&self, messages: &[Message], model: &str, max_tokens: u32) -> Result<String> {
        // Validates the key before anything touches the network.
        let headers = build_headers(&self.settings)?;

        let shape = RequestShape::select(model, &self.settings);
        let url = self.settings.endpoint(shape.path());

        debug!(
            message_count = messages.len(),
            model = %model,
            max_tokens,
            shape = ?shape,
            "Built completion request payload"
        );
        info!(url = %url, model = %model, "Sending request to OpenAI-compatible API");

        let request = self.client.post(&url).headers(headers);
        let request = match shape {
            RequestShape::Chat => request.json(&ChatRequest {
                model,
                messages,
                max_tokens,
            }),
            RequestShape::Legacy => request.json(&LegacyRequest {
                model,
                prompt: flatten_prompt(messages),
                max_tokens,
            }),
        };

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;
        let response = check_error_response(response).await?;

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::api(format!("invalid response body: {e}")))?;

        debug!(
            choice_count = parsed.choices.len(),
            model = ?parsed.model,
            "Received completion response"
        );

        let text = parsed.into_text(shape);
        debug!(response_len = text.len(), "Extracted completion text");
        Ok(text)
    }
}

impl AiClient for OpenAiCompatClient {
    fn send_messages<'a>(
        &'a self,
        messages: &'a [Message],
        model: &'a str,
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.complete(messages, model, max_tokens))
    }
}

/// One-shot completion against `settings`.
pub async fn complete(
    messages: &[Message],
    model: &str,
    max_tokens: u32,
    settings: &ApiSettings,
) -> Result<String> {
    settings.require_api_key()?;
    OpenAiCompatClient::new(settings.clone())?
        .complete(messages, model, max_tokens)
        .await
}
