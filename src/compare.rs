//! Sends one prompt to several models and collects the replies.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::data::comparison::Comparison;
use crate::data::DEFAULT_SYSTEM_PROMPT;
use crate::llm::{AiClient, LlmError, Message};

/// A column whose request failed.
#[derive(Debug)]
pub struct ColumnFailure {
    /// 0-based column index.
    pub index: usize,
    /// Model the column asked for.
    pub model: String,
    /// Why the request failed.
    pub error: anyhow::Error,
}

/// Messages sent to every model in a comparison.
///
/// A blank system prompt is replaced by the default one.
pub fn comparison_messages(comparison: &Comparison) -> Vec<Message> {
    let system = if comparison.system_prompt.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT
    } else {
        comparison.system_prompt.as_str()
    };
    vec![
        Message::system(system),
        Message::user(comparison.user_prompt.as_str()),
    ]
}

/// Runs every column with a model, one at a time.
///
/// Replies are stored in the columns. A failing column is reported and keeps
/// its previous reply; the remaining columns still run.
pub async fn run_comparison(
    comparison: &mut Comparison,
    client: &dyn AiClient,
    max_tokens: u32,
) -> Result<Vec<ColumnFailure>> {
    if comparison.user_prompt.trim().is_empty() {
        return Err(LlmError::Config("User prompt cannot be empty".to_string()).into());
    }

    let messages = comparison_messages(comparison);
    let mut failures = Vec::new();

    for (index, column) in comparison.responses.iter_mut().enumerate() {
        let model = column.model_name.trim().to_string();
        if model.is_empty() {
            debug!(column = index, "Skipping column without a model");
            continue;
        }

        info!(column = index, model = %model, "Requesting comparison response");
        match client.send_messages(&messages, &model, max_tokens).await {
            Ok(reply) => column.llm_response = reply,
            Err(error) => {
                warn!(column = index, model = %model, error = %error, "Comparison column failed");
                failures.push(ColumnFailure {
                    index,
                    model,
                    error,
                });
            }
        }
    }

    Ok(failures)
}
