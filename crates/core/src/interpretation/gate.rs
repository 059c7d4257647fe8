//! Whether a classifier call is warranted, and whether it is affordable.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::message::MessageFeatures;

/// Phrases that make handoff/deferral intent ambiguous enough to ask the
/// classifier about.
pub const DEFAULT_AMBIGUITY_KEYWORDS: &[&str] = &[
    "later",
    "next week",
    "next month",
    "get back to you",
    "let me check",
    "let me think",
    "think about it",
    "talk to my",
    "ask my",
    "my husband",
    "my wife",
    "my boss",
    "my manager",
    "call me",
    "not now",
    "busy",
    "maybe",
    "after the",
];

/// Why the gate decided as it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// No ambiguity keyword in text or features.
    KeywordGate,
    /// A phone number, email or explicit contact already settles it.
    HardSignalPresent,
    AmbiguousKeyword,
}

impl GateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordGate => "keyword_gate",
            Self::HardSignalPresent => "hard_signal_present",
            Self::AmbiguousKeyword => "ambiguous_keyword",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub run: bool,
    pub reason: GateReason,
    /// The keyword that opened the gate, if any.
    pub matched_keyword: Option<String>,
}

fn phone_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d[\d\s().-]{7,}\d").ok()).as_ref()
}

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").ok())
        .as_ref()
}

/// Phone number or email address in free text.
pub fn has_hard_signal_text(text: &str) -> bool {
    phone_regex().is_some_and(|re| re.is_match(text))
        || email_regex().is_some_and(|re| re.is_match(text))
}

fn find_keyword(text: &str, features: &MessageFeatures, keywords: &[String]) -> Option<String> {
    if let Some(k) = features.ambiguity_keywords.iter().find(|k| !k.trim().is_empty()) {
        return Some(k.trim().to_lowercase());
    }
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .find(|k| !k.is_empty() && lowered.contains(k.as_str()))
}

/// Decide whether a message is worth a classifier call.
pub fn should_run_ai(text: &str, features: &MessageFeatures, keywords: &[String]) -> GateDecision {
    let Some(keyword) = find_keyword(text, features, keywords) else {
        return GateDecision {
            run: false,
            reason: GateReason::KeywordGate,
            matched_keyword: None,
        };
    };

    if features.has_hard_contact_signal() || has_hard_signal_text(text) {
        return GateDecision {
            run: false,
            reason: GateReason::HardSignalPresent,
            matched_keyword: Some(keyword),
        };
    }

    GateDecision {
        run: true,
        reason: GateReason::AmbiguousKeyword,
        matched_keyword: Some(keyword),
    }
}

/// Calls already made in the current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSnapshot {
    pub daily_calls: u32,
    pub conversation_calls: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLimits {
    pub daily_cap: u32,
    pub per_conversation_cap: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetDenial {
    DailyCapReached,
    ConversationCapReached,
}

impl BudgetDenial {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyCapReached => "daily_cap_reached",
            Self::ConversationCapReached => "conversation_cap_reached",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDecision {
    pub allowed: bool,
    pub denial: Option<BudgetDenial>,
}

/// Both caps need headroom. The daily cap is reported first when both are spent.
///
/// This only judges a snapshot; the store must still consume atomically.
pub fn should_allow_ai_call(snapshot: BudgetSnapshot, limits: BudgetLimits) -> BudgetDecision {
    let denial = if snapshot.daily_calls >= limits.daily_cap {
        Some(BudgetDenial::DailyCapReached)
    } else if snapshot.conversation_calls >= limits.per_conversation_cap {
        Some(BudgetDenial::ConversationCapReached)
    } else {
        None
    };
    BudgetDecision {
        allowed: denial.is_none(),
        denial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<String> {
        DEFAULT_AMBIGUITY_KEYWORDS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_keyword_is_gated() {
        let d = should_run_ai(
            "How much is the blue one?",
            &MessageFeatures::default(),
            &keywords(),
        );
        assert!(!d.run);
        assert_eq!(d.reason, GateReason::KeywordGate);
    }

    #[test]
    fn test_keyword_opens_gate() {
        let d = should_run_ai(
            "I'll talk to my wife and get back to you",
            &MessageFeatures::default(),
            &keywords(),
        );
        assert!(d.run);
        assert_eq!(d.reason, GateReason::AmbiguousKeyword);
        assert!(d.matched_keyword.is_some());
    }

    #[test]
    fn test_feature_keyword_opens_gate() {
        let features = MessageFeatures {
            ambiguity_keywords: vec!["ask around".into()],
            ..MessageFeatures::default()
        };
        let d = should_run_ai("hmm", &features, &keywords());
        assert!(d.run);
        assert_eq!(d.matched_keyword.as_deref(), Some("ask around"));
    }

    #[test]
    fn test_hard_signal_in_text() {
        let d = should_run_ai(
            "call me later at +1 (415) 555-0134",
            &MessageFeatures::default(),
            &keywords(),
        );
        assert!(!d.run);
        assert_eq!(d.reason, GateReason::HardSignalPresent);

        let d =
            should_run_ai("maybe email jo@example.com", &MessageFeatures::default(), &keywords());
        assert_eq!(d.reason, GateReason::HardSignalPresent);
    }

    #[test]
    fn test_hard_signal_feature() {
        let features = MessageFeatures {
            has_explicit_contact: true,
            ..MessageFeatures::default()
        };
        let d = should_run_ai("maybe later", &features, &keywords());
        assert_eq!(d.reason, GateReason::HardSignalPresent);
        assert_eq!(d.reason.as_str(), "hard_signal_present");
    }

    #[test]
    fn test_short_numbers_are_not_phones() {
        assert!(!has_hard_signal_text("maybe 2 or 3 later"));
        assert!(!has_hard_signal_text("size 42"));
    }

    #[test]
    fn test_budget_caps() {
        let limits = BudgetLimits {
            daily_cap: 10,
            per_conversation_cap: 2,
        };
        let snapshot = BudgetSnapshot {
            daily_calls: 9,
            conversation_calls: 1,
        };
        let ok = should_allow_ai_call(snapshot, limits);
        assert!(ok.allowed);
        assert_eq!(ok.denial, None);

        let snapshot = BudgetSnapshot {
            daily_calls: 10,
            conversation_calls: 0,
        };
        let d = should_allow_ai_call(snapshot, limits);
        assert_eq!(d.denial, Some(BudgetDenial::DailyCapReached));

        let snapshot = BudgetSnapshot {
            daily_calls: 0,
            conversation_calls: 2,
        };
        let c = should_allow_ai_call(snapshot, limits);
        assert!(!c.allowed);
        assert_eq!(c.denial, Some(BudgetDenial::ConversationCapReached));
    }

    #[test]
    fn test_zero_caps_deny() {
        let limits = BudgetLimits {
            daily_cap: 0,
            per_conversation_cap: 5,
        };
        assert!(!should_allow_ai_call(BudgetSnapshot::default(), limits).allowed);
    }
}
