//! Reading and shaping command input.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use replyradar_core::{Message, RawMessage, SignalBundle, Thresholds};

/// Read a file, or stdin when `path` is `None` or `-`.
pub fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
        }
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

/// Parse a signal bundle, filling what the caller left out.
///
/// A bundle without `thresholds` gets the configured ones; one without `now`
/// gets `now`. Thresholds outside the accepted range are rejected.
pub fn parse_bundle(
    text: &str,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Result<SignalBundle> {
    let value: Value = serde_json::from_str(text).context("signal bundle is not valid JSON")?;
    let Some(obj) = value.as_object() else {
        bail!("signal bundle must be a JSON object");
    };
    let has_thresholds = obj.contains_key("thresholds");
    let has_now = obj.contains_key("now");

    let mut bundle: SignalBundle =
        serde_json::from_value(value).context("malformed signal bundle")?;
    if !has_thresholds {
        bundle.thresholds = thresholds.clone();
    }
    if !has_now {
        bundle.now = now;
    }
    let problems = bundle.thresholds.problems("thresholds.");
    if !problems.is_empty() {
        bail!("invalid signal bundle: {}", problems.join("; "));
    }
    Ok(bundle)
}

/// Messages grouped by conversation, plus how many were dropped.
#[derive(Debug, Default)]
pub struct MessageBatch {
    pub conversations: BTreeMap<String, Vec<Message>>,
    pub dropped: usize,
}

/// Parse a JSON array of raw message rows and group them by conversation.
/// Rows with an unknown direction are dropped.
pub fn parse_messages(text: &str) -> Result<MessageBatch> {
    let raw: Vec<RawMessage> =
        serde_json::from_str(text).context("expected a JSON array of messages")?;
    let mut batch = MessageBatch::default();
    for row in raw {
        match Message::from_raw(row) {
            Some(message) => batch
                .conversations
                .entry(message.conversation_id.clone())
                .or_default()
                .push(message),
            None => batch.dropped += 1,
        }
    }
    if batch.dropped > 0 {
        warn!(dropped = batch.dropped, "skipped messages with an unknown direction");
    }
    Ok(batch)
}
