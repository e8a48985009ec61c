//! # ai-slop
//!
//! Small LLM utilities over any OpenAI-compatible API.
//!
//! ## Features
//!
//! - One call contract over the chat-completions and legacy completions shapes
//! - Multi-step transformation pipelines with cooperative cancellation
//! - Side-by-side model comparisons
//! - API settings stored with light AES-GCM obfuscation
//!
//! ## Quick Start
//!
//! ```rust
//! use ai_slop::pipeline::prompt::first_step_content;
//!
//! let content = first_step_content("Hello", "Translate to French");
//! assert!(content.starts_with("<content>Hello</content>"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod compare;
pub mod context;
pub mod credentials;
pub mod data;
pub mod llm;
pub mod pipeline;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of ai-slop.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
