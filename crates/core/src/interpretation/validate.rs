//! Validation of classifier output.
//!
//! The classifier is untrusted: anything that is not exactly the expected
//! shape yields `None` and the caller skips the signal.

use chrono::{DateTime, Utc};
use replyradar_types::FollowupDueSource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::deferral::map_deferred_bucket_to_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// One yes/no judgement with its supporting detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub verdict: bool,
    /// Sub-type; for deferrals, the bucket label.
    pub classification: Option<String>,
    pub confidence: Confidence,
    pub evidence: String,
}

/// A validated classifier answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    pub handoff: Verdict,
    pub deferred: Verdict,
}

impl Interpretation {
    pub fn is_handoff(&self) -> bool {
        self.handoff.verdict
    }

    /// Deferral due date for the signal extractor, tagged as customer intent.
    /// `None` unless the deferral verdict holds and its bucket is known.
    pub fn deferral_hint(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, FollowupDueSource)> {
        if !self.deferred.verdict {
            return None;
        }
        let bucket = self.deferred.classification.as_deref()?;
        map_deferred_bucket_to_date(bucket, now).map(|due| (due, FollowupDueSource::CustomerIntent))
    }
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_markdown_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_verdict(obj: &Map<String, Value>) -> Option<Verdict> {
    let verdict = obj.get("verdict")?.as_bool()?;
    let classification = match obj.get("classification") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => return None,
    };
    let confidence = Confidence::parse(obj.get("confidence")?.as_str()?)?;
    let evidence = obj.get("evidence")?.as_str()?.to_string();
    Some(Verdict {
        verdict,
        classification,
        confidence,
        evidence,
    })
}

/// Validate raw classifier content. Malformed output yields `None`.
pub fn validate_ai_output(raw: &str) -> Option<Interpretation> {
    let value: Value = serde_json::from_str(strip_markdown_json(raw)).ok()?;
    let obj = value.as_object()?;
    let handoff = parse_verdict(obj.get("handoff")?.as_object()?)?;
    let deferred = parse_verdict(obj.get("deferred")?.as_object()?)?;
    Some(Interpretation { handoff, deferred })
}
