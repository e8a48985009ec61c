//! Message construction for pipeline steps.
//!
//! Content and instructions are delimited with ad hoc tags. The closing
//! instructions tag repeats the opening tag verbatim (no slash); keep the
//! text byte-for-byte.

use crate::llm::Message;

/// Content sent by the first executed step.
pub fn first_step_content(input: &str, instructions: &str) -> String {
    format!("<content>{input}</content>\n\n{}", tagged_instructions(instructions))
}

/// Instructions wrapped in the instruction tags.
pub fn tagged_instructions(instructions: &str) -> String {
    format!("<instructions>{instructions}<instructions>")
}

/// Messages for the first executed step: one user message.
pub fn first_step_messages(input: &str, instructions: &str) -> Vec<Message> {
    vec![Message::user(first_step_content(input, instructions))]
}

/// Messages for a later step.
///
/// Re-sends the first step's user message, then the previous step's raw reply
/// as the assistant turn, then the current instructions.
pub fn follow_up_messages(
    input: &str,
    first_instructions: &str,
    previous_response: &str,
    instructions: &str,
) -> Vec<Message> {
    vec![
        Message::user(first_step_content(input, first_instructions)),
        Message::assistant(previous_response),
        Message::user(tagged_instructions(instructions)),
    ]
}
