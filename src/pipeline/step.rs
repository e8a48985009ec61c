//! Pipeline step data.

use serde::{Deserialize, Serialize};

use crate::llm::DEFAULT_MODEL;

/// Execution status of one step within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepStatus {
    /// Not run yet.
    #[default]
    Idle,
    /// Request in flight.
    Running,
    /// Finished; `last_response` holds the reply.
    Succeeded,
    /// The request failed; `last_response` kept its previous value.
    Failed,
    /// Not run because instructions or model were empty.
    Skipped,
}

/// One unit of a transformation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// What the model should do with its input.
    pub instructions: String,
    /// Model identifier.
    pub model: String,
    /// Raw reply from the most recent successful run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response: Option<String>,
    /// Status within the current run; never persisted.
    #[serde(skip)]
    pub status: StepStatus,
}

impl Step {
    /// Creates an idle step.
    pub fn new(instructions: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            model: model.into(),
            last_response: None,
            status: StepStatus::Idle,
        }
    }

    /// Whether the step has something to run.
    pub fn is_runnable(&self) -> bool {
        !self.instructions.trim().is_empty() && !self.model.trim().is_empty()
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::new("", DEFAULT_MODEL)
    }
}
