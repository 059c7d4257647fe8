// crates/core/src/llm/mod.rs
//! Classifier runtime integration.
//!
//! Provides the `ClassifierRuntime` trait and a command-spawning
//! implementation. The interpreter owns timeouts, caching and budgets.

pub mod command;
pub mod runtime;
pub mod types;

pub use command::CommandRuntime;
pub use runtime::ClassifierRuntime;
pub use types::{LlmError, PromptMessage, PromptRole, RuntimeResponse};
