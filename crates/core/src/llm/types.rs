// crates/core/src/llm/types.rs
//! Prompt/response/error types for the classifier runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

/// One message of a classifier prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// Raw runtime output. `content` is untrusted until validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeResponse {
    pub content: String,
    pub latency_ms: u64,
}

/// Errors that can occur while invoking a classifier runtime.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to spawn classifier process: {0}")]
    SpawnFailed(String),

    #[error("Classifier exited with error: {0}")]
    RuntimeFailed(String),

    #[error("Classifier not available: {0}")]
    NotAvailable(String),

    /// The command answered, but not with text a validator could read.
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}
