// crates/core/src/message.rs
//! Timeline messages as the engine sees them.
//!
//! Storage hands us rows whose `features` and `rule_hits` columns are opaque
//! JSON text. [`Message::from_raw`] parses them exactly once; nothing past this
//! module touches JSON.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use replyradar_types::{Direction, SenderType};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A message row as stored, before boundary parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMessage {
    pub id: String,
    pub conversation_id: String,
    pub page_id: Option<String>,
    pub asset_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub direction: String,
    pub sender_type: String,
    pub body: Option<String>,
    pub message_type: Option<String>,
    pub trigger: Option<String>,
    /// JSON object text.
    pub features: Option<String>,
    /// JSON array text.
    pub rule_hits: Option<String>,
}

/// Features computed at ingestion. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFeatures {
    pub ack_only: bool,
    pub has_loss_phrase: bool,
    pub has_explicit_rejection: bool,
    pub has_price_rejection: bool,
    pub has_indefinite_deferral: bool,
    pub has_phone: bool,
    pub has_email: bool,
    pub has_explicit_contact: bool,
    /// Ambiguity keywords the ingestion matcher already found.
    pub ambiguity_keywords: Vec<String>,
}

impl MessageFeatures {
    /// Parse a features blob. Anything that isn't a JSON object yields defaults.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value @ serde_json::Value::Object(_)) => serde_json::from_value(value)
                .unwrap_or_else(|e| {
                    debug!(error = %e, "features blob has unexpected field types");
                    Self::default()
                }),
            Ok(_) => {
                debug!("features blob is not an object");
                Self::default()
            }
            Err(e) => {
                debug!(error = %e, "features blob is not valid JSON");
                Self::default()
            }
        }
    }

    pub fn has_hard_contact_signal(&self) -> bool {
        self.has_phone || self.has_email || self.has_explicit_contact
    }
}

/// A rule code produced by the ingestion rule matcher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleHit {
    SystemAssignment,
    LossPhrase,
    ExplicitRejection,
    PriceRejection,
    IndefiniteDeferral,
    ConcreteDeferral,
    OptOut,
    Blocked,
    Bounced,
    Conversion,
    OffPlatform,
    PriceMention,
    SpamPhrase,
    HandoffRequest,
    Other(String),
}

impl RuleHit {
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "SYSTEM_ASSIGNMENT" => Self::SystemAssignment,
            "LOSS_PHRASE" => Self::LossPhrase,
            "EXPLICIT_REJECTION" => Self::ExplicitRejection,
            "PRICE_REJECTION" => Self::PriceRejection,
            "INDEFINITE_DEFERRAL" => Self::IndefiniteDeferral,
            "CONCRETE_DEFERRAL" => Self::ConcreteDeferral,
            "OPT_OUT" => Self::OptOut,
            "BLOCKED" => Self::Blocked,
            "BOUNCED" => Self::Bounced,
            "CONVERSION" => Self::Conversion,
            "OFF_PLATFORM" => Self::OffPlatform,
            "PRICE_MENTION" => Self::PriceMention,
            "SPAM_PHRASE" => Self::SpamPhrase,
            "HANDOFF_REQUEST" => Self::HandoffRequest,
            _ => Self::Other(code.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SystemAssignment => "SYSTEM_ASSIGNMENT",
            Self::LossPhrase => "LOSS_PHRASE",
            Self::ExplicitRejection => "EXPLICIT_REJECTION",
            Self::PriceRejection => "PRICE_REJECTION",
            Self::IndefiniteDeferral => "INDEFINITE_DEFERRAL",
            Self::ConcreteDeferral => "CONCRETE_DEFERRAL",
            Self::OptOut => "OPT_OUT",
            Self::Blocked => "BLOCKED",
            Self::Bounced => "BOUNCED",
            Self::Conversion => "CONVERSION",
            Self::OffPlatform => "OFF_PLATFORM",
            Self::PriceMention => "PRICE_MENTION",
            Self::SpamPhrase => "SPAM_PHRASE",
            Self::HandoffRequest => "HANDOFF_REQUEST",
            Self::Other(code) => code.as_str(),
        }
    }

    /// Rule hits that mean the customer walked away.
    pub fn is_loss(&self) -> bool {
        matches!(
            self,
            Self::LossPhrase
                | Self::ExplicitRejection
                | Self::PriceRejection
                | Self::IndefiniteDeferral
        )
    }
}

impl fmt::Display for RuleHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of rule hits on one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleHitSet(BTreeSet<RuleHit>);

impl RuleHitSet {
    /// Parse a rule-hits blob.
    ///
    /// Accepts an array of code strings or of objects carrying the code under
    /// `rule`, `code` or `id`. Anything else yields an empty set.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::default();
        };
        let items = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Array(items)) => items,
            Ok(_) => {
                debug!("rule_hits blob is not an array");
                return Self::default();
            }
            Err(e) => {
                debug!(error = %e, "rule_hits blob is not valid JSON");
                return Self::default();
            }
        };

        items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(code) => Some(code.as_str()),
                serde_json::Value::Object(obj) => ["rule", "code", "id"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(|v| v.as_str())),
                _ => None,
            })
            .filter(|code| !code.trim().is_empty())
            .map(RuleHit::parse)
            .collect()
    }

    pub fn contains(&self, hit: &RuleHit) -> bool {
        self.0.contains(hit)
    }

    pub fn insert(&mut self, hit: RuleHit) {
        self.0.insert(hit);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleHit> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn any_loss(&self) -> bool {
        self.0.iter().any(RuleHit::is_loss)
    }
}

impl FromIterator<RuleHit> for RuleHitSet {
    fn from_iter<I: IntoIterator<Item = RuleHit>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A parsed, immutable timeline message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub page_id: Option<String>,
    pub asset_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub sender_type: SenderType,
    pub body: String,
    pub message_type: Option<String>,
    pub trigger: Option<String>,
    pub features: MessageFeatures,
    pub rule_hits: RuleHitSet,
}

const ADMIN_TAG_MARKERS: [&str; 3] = ["system", "assignment", "admin"];

impl Message {
    /// Boundary parse. Rows without a recognisable direction are dropped; an
    /// unknown sender type is treated as `system` so it never counts as activity.
    pub fn from_raw(raw: RawMessage) -> Option<Self> {
        let Some(direction) = Direction::parse(&raw.direction) else {
            debug!(
                message_id = %raw.id,
                direction = %raw.direction,
                "dropping message with unknown direction"
            );
            return None;
        };
        let sender_type = SenderType::parse(&raw.sender_type).unwrap_or(SenderType::System);

        Some(Self {
            features: MessageFeatures::parse(raw.features.as_deref()),
            rule_hits: RuleHitSet::parse(raw.rule_hits.as_deref()),
            id: raw.id,
            conversation_id: raw.conversation_id,
            page_id: raw.page_id,
            asset_id: raw.asset_id,
            user_id: raw.user_id,
            timestamp: raw.timestamp,
            direction,
            sender_type,
            body: raw.body.unwrap_or_default(),
            message_type: raw.message_type,
            trigger: raw.trigger,
        })
    }

    /// A bare message with no features or rule hits.
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        direction: Direction,
        sender_type: SenderType,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            page_id: None,
            asset_id: None,
            user_id: None,
            timestamp,
            direction,
            sender_type,
            body: String::new(),
            message_type: None,
            trigger: None,
            features: MessageFeatures::default(),
            rule_hits: RuleHitSet::default(),
        }
    }

    /// System notices, assignment changes and admin events.
    pub fn is_system_administrative(&self) -> bool {
        if self.sender_type == SenderType::System {
            return true;
        }
        let tagged = [self.message_type.as_deref(), self.trigger.as_deref()]
            .into_iter()
            .flatten()
            .any(|tag| {
                let tag = tag.to_ascii_lowercase();
                ADMIN_TAG_MARKERS.iter().any(|m| tag.contains(m))
            });
        tagged || self.rule_hits.contains(&RuleHit::SystemAssignment)
    }

    /// Inbound "thanks!"/"ok" style replies with no new intent.
    pub fn is_ack_only_inbound(&self) -> bool {
        self.direction == Direction::Inbound && self.features.ack_only
    }

    /// Whether this message moves the conversation's activity clock.
    pub fn counts_as_activity(&self) -> bool {
        !self.is_system_administrative() && !self.is_ack_only_inbound()
    }

    /// Outbound business message that may open a follow-up episode.
    pub fn is_eligible_followup(&self) -> bool {
        self.direction == Direction::Outbound
            && self.sender_type == SenderType::Business
            && !self.is_system_administrative()
    }

    /// Inbound message that can count as a customer response.
    pub fn is_attributable_reply(&self) -> bool {
        self.direction == Direction::Inbound && self.counts_as_activity()
    }

    /// Inbound carrying a loss signal, by rule hit or feature flag.
    pub fn is_loss_inbound(&self) -> bool {
        if self.direction != Direction::Inbound {
            return false;
        }
        let f = &self.features;
        self.rule_hits.any_loss()
            || f.has_loss_phrase
            || f.has_explicit_rejection
            || f.has_price_rejection
            || f.has_indefinite_deferral
    }
}
