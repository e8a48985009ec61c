//! Saved transformation pipelines.

use std::path::Path;

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

use crate::data::{parse_document, read_document, string_field, write_document, MISSING_FIELDS};
use crate::llm::LlmError;
use crate::pipeline::Step;
use crate::utils::safe_filename;

/// Model given to loaded steps that do not name one.
pub const LOADED_STEP_MODEL: &str = "gpt-4o";

/// Title written when the transformation has none.
pub const UNTITLED_TRANSFORMATION: &str = "Untitled Transformation";

/// A titled input plus the steps that transform it.
///
/// There is always at least one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformation {
    /// Display title.
    pub title: String,
    /// Text fed to the first step.
    pub input: String,
    /// Output of the last run.
    pub output: String,
    steps: Vec<Step>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransformationDocument<'a> {
    title: &'a str,
    input: &'a str,
    output: &'a str,
    steps: Vec<StepRecord<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepRecord<'a> {
    step_number: usize,
    instructions: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_response: Option<&'a str>,
}

impl Transformation {
    /// Creates a transformation with one default step.
    pub fn new(title: impl Into<String>, input: impl Into<String>) -> Self {
        Self::with_steps(title, input, Vec::new())
    }

    /// Creates a transformation from `steps`, adding a default step if empty.
    pub fn with_steps(title: impl Into<String>, input: impl Into<String>, steps: Vec<Step>) -> Self {
        let steps = if steps.is_empty() {
            vec![Step::default()]
        } else {
            steps
        };
        Self {
            title: title.into(),
            input: input.into(),
            output: String::new(),
            steps,
        }
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Mutable steps, for running the pipeline in place.
    pub fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    /// Appends a step.
    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Removes the step at `index` (0-based).
    ///
    /// The last remaining step cannot be removed.
    pub fn remove_step(&mut self, index: usize) -> Result<Step> {
        if self.steps.len() <= 1 {
            bail!("Cannot remove the last step");
        }
        if index >= self.steps.len() {
            bail!(
                "Step {} does not exist (transformation has {} steps)",
                index + 1,
                self.steps.len()
            );
        }
        Ok(self.steps.remove(index))
    }

    /// Parses a transformation document.
    pub fn from_json(content: &str) -> Result<Self, LlmError> {
        Self::from_value(&parse_document(content)?)
    }

    /// Builds a transformation from an already parsed document.
    ///
    /// `title`, `input` and a `steps` array are required; everything else is
    /// filled with defaults.
    pub fn from_value(value: &Value) -> Result<Self, LlmError> {
        let (Some(title), Some(input), Some(steps)) = (
            value.get("title"),
            value.get("input"),
            value.get("steps").and_then(Value::as_array),
        ) else {
            return Err(LlmError::Parse(MISSING_FIELDS.to_string()));
        };

        let steps = steps
            .iter()
            .map(|step| {
                let model = string_field(step, "model");
                let mut parsed = Step::new(
                    string_field(step, "instructions"),
                    if model.is_empty() {
                        LOADED_STEP_MODEL.to_string()
                    } else {
                        model
                    },
                );
                parsed.last_response = step
                    .get("lastResponse")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                parsed
            })
            .collect();

        let mut transformation = Self::with_steps(
            title.as_str().unwrap_or_default(),
            input.as_str().unwrap_or_default(),
            steps,
        );
        transformation.output = string_field(value, "output");
        Ok(transformation)
    }

    /// Loads and validates a transformation file.
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
        format!("{}.json", safe_filename(self.saved_title(), "transformation"))
    }

    fn saved_title(&self) -> &str {
        if self.title.is_empty() {
            UNTITLED_TRANSFORMATION
        } else {
            &self.title
        }
    }

    fn to_document(&self) -> TransformationDocument<'_> {
        TransformationDocument {
            title: self.saved_title(),
            input: &self.input,
            output: &self.output,
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| StepRecord {
                    step_number: index + 1,
                    instructions: &step.instructions,
                    model: &step.model,
                    last_response: step.last_response.as_deref(),
                })
                .collect(),
        }
    }
}
