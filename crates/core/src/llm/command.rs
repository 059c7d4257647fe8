// crates/core/src/llm/command.rs
//! Runtime that shells out to an external classifier command.
//!
//! The command receives `{"model": ..., "messages": [...]}` on stdin and
//! prints the model's reply on stdout, either raw or wrapped in a JSON
//! envelope with a `result` or `content` string field.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;

use super::runtime::ClassifierRuntime;
use super::types::{LlmError, PromptMessage, RuntimeResponse};

pub struct CommandRuntime {
    program: String,
    args: Vec<String>,
}

impl CommandRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from an argv list such as `["llm-classify", "--json"]`.
    pub fn from_argv(argv: &[String]) -> Result<Self, LlmError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| LlmError::NotAvailable("empty classifier command".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

/// Pull the reply text out of the command's stdout.
pub fn extract_content(stdout: &str) -> String {
    if let Ok(serde_json::Value::Object(obj)) = serde_json::from_str::<serde_json::Value>(stdout) {
        if let Some(text) = ["result", "content"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(|v| v.as_str()))
        {
            return text.to_string();
        }
    }
    stdout.trim().to_string()
}

/// Decode stdout into reply text. Output that is not UTF-8, or that carries
/// no text at all, can never validate.
fn decode_stdout(stdout: Vec<u8>) -> Result<String, LlmError> {
    let text = String::from_utf8(stdout)
        .map_err(|e| LlmError::InvalidFormat(format!("stdout is not UTF-8: {e}")))?;
    let content = extract_content(&text);
    if content.is_empty() {
        return Err(LlmError::InvalidFormat("empty output".into()));
    }
    Ok(content)
}

#[async_trait]
impl ClassifierRuntime for CommandRuntime {
    async fn complete(
        &self,
        model: &str,
        messages: &[PromptMessage],
    ) -> Result<RuntimeResponse, LlmError> {
        let start = Instant::now();
        let payload = serde_json::json!({ "model": model, "messages": messages }).to_string();

        tracing::debug!(program = %self.program, model, "classifier command: spawning");

        let mut child = TokioCommand::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future (caller timeout) must not leak the process.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    program = %self.program,
                    "classifier command: failed to spawn"
                );
                LlmError::SpawnFailed(e.to_string())
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| LlmError::SpawnFailed(format!("failed to write stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LlmError::SpawnFailed(format!("failed to wait for command: {e}")))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.chars().take(500).collect();
            tracing::warn!(
                latency_ms,
                exit_code = ?output.status.code(),
                %stderr,
                "classifier command: non-zero exit"
            );
            return Err(LlmError::RuntimeFailed(stderr));
        }

        tracing::debug!(
            latency_ms,
            stdout_len = output.stdout.len(),
            "classifier command: response received"
        );
        let content = decode_stdout(output.stdout)?;

        Ok(RuntimeResponse { content, latency_ms })
    }

    fn name(&self) -> &str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content_envelope() {
        assert_eq!(extract_content(r#"{"result": "{\"a\":1}"}"#), r#"{"a":1}"#);
        assert_eq!(extract_content(r#"{"content": "hi"}"#), "hi");
    }

    #[test]
    fn test_extract_content_raw() {
        assert_eq!(extract_content("  plain text\n"), "plain text");
        // A bare verdict object is passed through untouched.
        let raw = r#"{"handoff": {}, "deferred": {}}"#;
        assert_eq!(extract_content(raw), raw);
    }

    #[test]
    fn test_from_argv() {
        assert!(CommandRuntime::from_argv(&[]).is_err());
        let rt = CommandRuntime::from_argv(&["cls".to_string(), "--json".to_string()]).unwrap();
        assert_eq!(rt.program, "cls");
        assert_eq!(rt.args, vec!["--json".to_string()]);
    }

    #[test]
    fn test_decode_stdout() {
        assert_eq!(decode_stdout(br#"{"result": "ok"}"#.to_vec()).unwrap(), "ok");
        assert!(matches!(
            decode_stdout(vec![0xff, 0xfe, b'{']),
            Err(LlmError::InvalidFormat(_))
        ));
        assert!(matches!(decode_stdout(b" \n".to_vec()), Err(LlmError::InvalidFormat(_))));
        assert!(matches!(
            decode_stdout(br#"{"content": ""}"#.to_vec()),
            Err(LlmError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let rt = CommandRuntime::new("/nonexistent/replyradar-classifier");
        let err = rt.complete("m", &[PromptMessage::user("x")]).await.unwrap_err();
        assert!(matches!(err, LlmError::SpawnFailed(_)));
    }
}
