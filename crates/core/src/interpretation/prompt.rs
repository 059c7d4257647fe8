use crate::llm::PromptMessage;

use super::input::PreparedInput;

/// Bump whenever the prompt or the expected output shape changes; it is part
/// of every cache key.
pub const PROMPT_VERSION: &str = "handoff-deferral-v2";

const SYSTEM_PROMPT: &str = r#"You classify one customer message from a business chat. Output ONLY a JSON object, no other text.

Decide two things:
1. handoff: is the customer handing the decision to someone else or asking to be contacted another way?
2. deferred: is the customer postponing the decision? If so, pick the closest bucket.

Buckets: TODAY | TOMORROW | THIS_WEEK | NEXT_WEEK | TWO_WEEKS | THIS_MONTH | NEXT_MONTH
Confidence: low | medium | high
Evidence: the shortest quote from the message that supports the verdict, or "" if none.

{"handoff":{"verdict":false,"classification":null,"confidence":"low","evidence":""},"deferred":{"verdict":false,"classification":null,"confidence":"low","evidence":""}}"#;

/// Build the prompt. Only the prepared (truncated) text is embedded.
pub fn build_prompt(input: &PreparedInput) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(SYSTEM_PROMPT),
        PromptMessage::user(format!("Message: {}", input.text)),
    ]
}
