//! Saved documents: transformation pipelines and model comparisons.
//!
//! Both are plain JSON files written with two-space indentation. Loading is
//! lenient about optional fields but rejects files missing the required ones.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::llm::LlmError;

pub mod comparison;
pub mod transformation;

pub use comparison::{Comparison, ModelResponse, DEFAULT_SYSTEM_PROMPT};
pub use transformation::Transformation;

/// Message for documents without their required fields.
pub const MISSING_FIELDS: &str = "Invalid file format. Missing required fields.";

/// Reads a JSON document from disk.
pub(crate) fn read_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_document(&content).with_context(|| format!("Failed to load {}", path.display()))
}

/// Parses JSON text, mapping syntax errors to [`LlmError::Parse`].
pub(crate) fn parse_document(content: &str) -> Result<Value, LlmError> {
    serde_json::from_str(content).map_err(|e| {
        LlmError::Parse(format!("Could not parse file. Ensure it's valid JSON. ({e})"))
    })
}

/// Writes `document` as pretty-printed JSON.
pub(crate) fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(document).context("Failed to serialize document")?;

    fs::write(path, json)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

/// String value of `key`, or empty when absent or not a string.
pub(crate) fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
