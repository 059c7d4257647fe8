// crates/types/src/state.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle state of a customer-business conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    New,
    Engaged,
    PriceGiven,
    Deferred,
    OffPlatform,
    Spam,
    Converted,
    Lost,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Engaged => "ENGAGED",
            Self::PriceGiven => "PRICE_GIVEN",
            Self::Deferred => "DEFERRED",
            Self::OffPlatform => "OFF_PLATFORM",
            Self::Spam => "SPAM",
            Self::Converted => "CONVERTED",
            Self::Lost => "LOST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "ENGAGED" => Some(Self::Engaged),
            "PRICE_GIVEN" => Some(Self::PriceGiven),
            "DEFERRED" => Some(Self::Deferred),
            "OFF_PLATFORM" => Some(Self::OffPlatform),
            "SPAM" => Some(Self::Spam),
            "CONVERTED" => Some(Self::Converted),
            "LOST" => Some(Self::Lost),
            _ => None,
        }
    }

    /// Terminal states never carry a follow-up suggestion or due date.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Lost | Self::Spam)
    }
}

/// Why the state machine landed where it did. A result usually carries the
/// rule that chose the state plus any follow-up reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateReason {
    BlockedByRecipient,
    MessageBounced,
    OptOut,
    ExplicitRejection,
    PriceRejection,
    IndefiniteDeferral,
    LossPhrase,
    SpamConfirmed,
    Conversion,
    OffPlatform,
    InboundStale,
    Deferral,
    PriceGiven,
    Engaged,
    NewConversation,
    RejectionRevived,
    Reopened,
    HandoffRequested,
    UnrepliedInbound,
    OutboundStale,
    AwaitingCustomer,
}

impl StateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockedByRecipient => "BLOCKED_BY_RECIPIENT",
            Self::MessageBounced => "MESSAGE_BOUNCED",
            Self::OptOut => "OPT_OUT",
            Self::ExplicitRejection => "EXPLICIT_REJECTION",
            Self::PriceRejection => "PRICE_REJECTION",
            Self::IndefiniteDeferral => "INDEFINITE_DEFERRAL",
            Self::LossPhrase => "LOSS_PHRASE",
            Self::SpamConfirmed => "SPAM_CONFIRMED",
            Self::Conversion => "CONVERSION",
            Self::OffPlatform => "OFF_PLATFORM",
            Self::InboundStale => "INBOUND_STALE",
            Self::Deferral => "DEFERRAL",
            Self::PriceGiven => "PRICE_GIVEN",
            Self::Engaged => "ENGAGED",
            Self::NewConversation => "NEW_CONVERSATION",
            Self::RejectionRevived => "REJECTION_REVIVED",
            Self::Reopened => "REOPENED",
            Self::HandoffRequested => "HANDOFF_REQUESTED",
            Self::UnrepliedInbound => "UNREPLIED_INBOUND",
            Self::OutboundStale => "OUTBOUND_STALE",
            Self::AwaitingCustomer => "AWAITING_CUSTOMER",
        }
    }
}

/// Where a follow-up due date came from.
///
/// `CustomerIntent` means the customer named a time; `Default` is a system
/// guess and never triggers an immediate follow-up on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum FollowupDueSource {
    CustomerIntent,
    Default,
    #[default]
    Unknown,
}

impl FollowupDueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerIntent => "customer_intent",
            Self::Default => "default",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer_intent" => Some(Self::CustomerIntent),
            "default" => Some(Self::Default),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Output of one state machine evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct StateEvaluationResult {
    pub state: ConversationState,
    pub reasons: Vec<StateReason>,
    pub needs_followup: bool,
    pub followup_suggestion: Option<String>,
    pub followup_due_at: Option<DateTime<Utc>>,
    pub followup_due_source: Option<FollowupDueSource>,
}

impl StateEvaluationResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            state,
            reasons: Vec::new(),
            needs_followup: false,
            followup_suggestion: None,
            followup_due_at: None,
            followup_due_source: None,
        }
    }

    pub fn with_reason(mut self, reason: StateReason) -> Self {
        self.push_reason(reason);
        self
    }

    /// Append a reason unless it is already present.
    pub fn push_reason(&mut self, reason: StateReason) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    pub fn has_reason(&self, reason: StateReason) -> bool {
        self.reasons.contains(&reason)
    }

    /// Drop every follow-up field. Applied to terminal states.
    pub fn clear_followup(&mut self) {
        self.needs_followup = false;
        self.followup_suggestion = None;
        self.followup_due_at = None;
        self.followup_due_source = None;
    }
}
