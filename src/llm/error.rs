//! LLM call error handling.

use thiserror::Error;

/// Errors surfaced by the API client, the model catalog and the runners.
///
/// Every variant carries a message meant to be shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Missing API key or otherwise unusable settings.
    #[error("{0}")]
    Config(String),

    /// Non-2xx upstream response or a body that could not be understood.
    #[error("{0}")]
    Api(String),

    /// A saved document could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// The request never reached the upstream endpoint.
    #[error("Network error: {0}")]
    Network(String),
}

impl LlmError {
    /// The error raised when no API key is configured.
    pub fn missing_api_key() -> Self {
        Self::Config("API key is missing. Please configure it in the settings.".to_string())
    }

    /// Wraps an upstream error message the way the UI has always shown it.
    pub fn api(message: impl std::fmt::Display) -> Self {
        Self::Api(format!("API Error: {message}"))
    }
}

/// Returns the [`LlmError`] at the root of an `anyhow` chain, if any.
pub fn llm_error(err: &anyhow::Error) -> Option<&LlmError> {
    err.chain().find_map(|cause| cause.downcast_ref::<LlmError>())
}
