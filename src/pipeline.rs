//! Multi-step transformation pipeline.
//!
//! Steps run strictly one after another. The first executed step receives the
//! user's input; every later step re-sends that first exchange, the previous
//! step's reply and its own instructions (see [`prompt`]).

pub mod cancel;
pub mod prompt;
pub mod step;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::llm::{AiClient, DEFAULT_MAX_TOKENS};
pub use cancel::CancellationFlag;
pub use step::{Step, StepStatus};

/// Progress report emitted after every step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgress {
    /// 1-based index of the step just attempted.
    pub current: usize,
    /// Number of steps in the run.
    pub total: usize,
    /// Status the step ended in.
    pub status: StepStatus,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step was attempted.
    Completed,
    /// Cancellation was observed at a step boundary.
    Cancelled {
        /// Steps attempted before the flag was seen.
        completed: usize,
    },
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Steps that produced a response.
    pub executed: usize,
    /// Steps skipped for missing instructions or model.
    pub skipped: usize,
    /// Reply of the last executed step.
    pub output: Option<String>,
}

/// Runs a list of steps against an [`AiClient`].
pub struct PipelineRunner<'a> {
    client: &'a dyn AiClient,
    max_tokens: u32,
    cancel: CancellationFlag,
}

impl<'a> PipelineRunner<'a> {
    /// Creates a runner using the default token budget.
    pub fn new(client: &'a dyn AiClient) -> Self {
        Self {
            client,
            max_tokens: DEFAULT_MAX_TOKENS,
            cancel: CancellationFlag::new(),
        }
    }

    /// Overrides the token budget for every step.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Uses `flag` for cancellation instead of a private one.
    #[must_use]
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Flag that stops this runner before its next step.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Executes `steps` in order starting from `initial_input`.
    ///
    /// Steps missing instructions or a model are skipped. The first failure
    /// stops the run and is returned; earlier results stay in place and the
    /// failed step keeps its previous response.
    pub async fn run_sequential<F>(
        &self,
        steps: &mut [Step],
        initial_input: &str,
        mut on_progress: F,
    ) -> Result<RunReport>
    where
        F: FnMut(StepProgress),
    {
        let total = steps.len();
        for step in steps.iter_mut() {
            step.status = StepStatus::Idle;
        }

        let mut first_instructions: Option<String> = None;
        let mut previous_response: Option<String> = None;
        let mut executed = 0;
        let mut skipped = 0;

        for (index, step) in steps.iter_mut().enumerate() {
            let current = index + 1;

            if self.cancel.is_cancelled() {
                info!(completed = index, total, "Pipeline cancelled");
                return Ok(RunReport {
                    outcome: RunOutcome::Cancelled { completed: index },
                    executed,
                    skipped,
                    output: previous_response,
                });
            }

            if !step.is_runnable() {
                warn!(
                    step = current,
                    "Skipping step {current}: missing instructions or model"
                );
                step.status = StepStatus::Skipped;
                skipped += 1;
                on_progress(StepProgress {
                    current,
                    total,
                    status: step.status,
                });
                continue;
            }

            let messages = match (&first_instructions, &previous_response) {
                (Some(first), Some(previous)) => {
                    prompt::follow_up_messages(initial_input, first, previous, &step.instructions)
                }
                _ => prompt::first_step_messages(initial_input, &step.instructions),
            };

            debug!(
                step = current,
                model = %step.model,
                message_count = messages.len(),
                "Running pipeline step"
            );
            step.status = StepStatus::Running;

            match self
                .client
                .send_messages(&messages, &step.model, self.max_tokens)
                .await
            {
                Ok(response) => {
                    step.last_response = Some(response.clone());
                    step.status = StepStatus::Succeeded;
                    first_instructions.get_or_insert_with(|| step.instructions.clone());
                    previous_response = Some(response);
                    executed += 1;
                    on_progress(StepProgress {
                        current,
                        total,
                        status: step.status,
                    });
                }
                Err(e) => {
                    step.status = StepStatus::Failed;
                    on_progress(StepProgress {
                        current,
                        total,
                        status: step.status,
                    });
                    return Err(e.context(format!("Step {current} ({}) failed", step.model)));
                }
            }
        }

        Ok(RunReport {
            outcome: RunOutcome::Completed,
            executed,
            skipped,
            output: previous_response,
        })
    }
}
