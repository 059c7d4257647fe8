// crates/core/src/llm/runtime.rs
//! The seam between the interpreter and whatever actually runs the model.

use async_trait::async_trait;

use super::types::{LlmError, PromptMessage, RuntimeResponse};

/// A text-classification runtime.
///
/// Implementations only transport; they never interpret the content. Timeouts
/// are applied by the caller, so a runtime must be cancel-safe when dropped.
#[async_trait]
pub trait ClassifierRuntime: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[PromptMessage],
    ) -> Result<RuntimeResponse, LlmError>;

    /// Name for logging (e.g. "command").
    fn name(&self) -> &str;
}
