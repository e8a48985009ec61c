//! Saved side-by-side model comparisons.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::data::{parse_document, read_document, string_field, write_document, MISSING_FIELDS};
use crate::llm::LlmError;
use crate::utils::safe_filename;

/// System prompt used when a comparison does not carry one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, concise, and accurate responses.";

/// Title written when the comparison has none.
pub const UNTITLED_COMPARISON: &str = "Untitled Comparison";

/// Model name written for a column without one.
pub const UNNAMED_MODEL: &str = "Unnamed Model";

/// Number of empty columns in a fresh comparison.
const DEFAULT_COLUMNS: usize = 2;

/// One model's column in a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    /// Model identifier; empty columns are not run.
    pub model_name: String,
    /// Reply from the last run.
    pub llm_response: String,
    /// User rating, 1 to 5.
    pub rating: Option<u8>,
}

impl ModelResponse {
    /// Creates an unrated, empty column for `model_name`.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Sets the rating, discarding values outside 1..=5.
    pub fn set_rating(&mut self, rating: Option<i64>) {
        self.rating = normalize_rating(rating);
    }
}

/// A prompt sent to several models, with their replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Display title.
    pub title: String,
    /// System message sent to every model.
    pub system_prompt: String,
    /// User message sent to every model.
    pub user_prompt: String,
    /// One entry per model column.
    pub responses: Vec<ModelResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonDocument<'a> {
    comparison_title: &'a str,
    system_prompt: &'a str,
    user_prompt: &'a str,
    responses: Vec<ResponseRecord<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseRecord<'a> {
    model_name: &'a str,
    llm_response: &'a str,
    rating: Option<u8>,
}

fn normalize_rating(rating: Option<i64>) -> Option<u8> {
    rating
        .filter(|r| (1..=5).contains(r))
        .and_then(|r| u8::try_from(r).ok())
}

fn parse_rating(value: Option<&Value>) -> Option<u8> {
    let rating = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    normalize_rating(rating)
}

impl Default for Comparison {
    fn default() -> Self {
        Self {
            title: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: String::new(),
            responses: vec![ModelResponse::default(); DEFAULT_COLUMNS],
        }
    }
}

impl Comparison {
    /// Creates a comparison of `user_prompt` across `models`.
    ///
    /// With no models, the comparison gets two empty columns.
    pub fn new<I, S>(title: impl Into<String>, user_prompt: impl Into<String>, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responses: Vec<ModelResponse> = models.into_iter().map(ModelResponse::new).collect();
        let mut comparison = Self {
            title: title.into(),
            user_prompt: user_prompt.into(),
            ..Self::default()
        };
        if !responses.is_empty() {
            comparison.responses = responses;
        }
        comparison
    }

    /// Parses a comparison document.
    pub fn from_json(content: &str) -> Result<Self, LlmError> {
        Self::from_value(&parse_document(content)?)
    }

    /// Builds a comparison from an already parsed document.
    ///
    /// `comparisonTitle`, `userPrompt` and a `responses` array are required.
    /// Non-object response entries are skipped.
    pub fn from_value(value: &Value) -> Result<Self, LlmError> {
        let (Some(_), Some(_), Some(items)) = (
            value.get("comparisonTitle"),
            value.get("userPrompt"),
            value.get("responses").and_then(Value::as_array),
        ) else {
            return Err(LlmError::Parse(MISSING_FIELDS.to_string()));
        };

        let mut comparison = Self {
            title: string_field(value, "comparisonTitle"),
            system_prompt: value
                .get("systemPrompt")
                .map_or_else(
                    || DEFAULT_SYSTEM_PROMPT.to_string(),
                    |prompt| prompt.as_str().unwrap_or_default().to_string(),
                ),
            user_prompt: string_field(value, "userPrompt"),
            ..Self::default()
        };

        if !items.is_empty() {
            comparison.responses = items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    if !item.is_object() {
                        warn!(index, "Skipping invalid response item during load");
                        return None;
                    }
                    Some(ModelResponse {
                        model_name: string_field(item, "modelName"),
                        llm_response: string_field(item, "llmResponse"),
                        rating: parse_rating(item.get("rating")),
                    })
                })
                .collect();
        }

        Ok(comparison)
    }

    /// Loads and validates a comparison file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let value = read_document(path.as_ref())?;
        Ok(Self::from_value(&value)?)
    }

    /// Saves as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_document(path.as_ref(), &self.to_document())
    }

    /// Suggested file name derived from the title.
    pub fn default_filename(&self) -> String {
        format!("{}.json", safe_filename(self.saved_title(), "llm_comparison"))
    }

    fn saved_title(&self) -> &str {
        if self.title.is_empty() {
            UNTITLED_COMPARISON
        } else {
            &self.title
        }
    }

    fn to_document(&self) -> ComparisonDocument<'_> {
        ComparisonDocument {
            comparison_title: self.saved_title(),
            system_prompt: &self.system_prompt,
            user_prompt: &self.user_prompt,
            responses: self
                .responses
                .iter()
                .map(|response| ResponseRecord {
                    model_name: if response.model_name.is_empty() {
                        UNNAMED_MODEL
                    } else {
                        &response.model_name
                    },
                    llm_response: &response.llm_response,
                    rating: response.rating,
                })
                .collect(),
        }
    }
}
