//! OpenAI-compatible API integration.

pub mod catalog;
pub mod client;
pub mod error;
pub mod message;
pub mod openai;

#[cfg(test)]
pub(crate) mod test_utils;

pub use catalog::{list_models, ModelRecord};
pub use client::{AiClient, ApiSettings, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
pub use error::{llm_error, LlmError};
pub use message::{Message, Role};
pub use openai::{complete, OpenAiCompatClient, RequestShape};
