//! Ordered precedence table for short-circuiting states.
//!
//! Rules are evaluated top to bottom and the first guard that holds decides
//! the state. Order is the contract: moving a row changes behaviour.

use replyradar_types::{ConversationState, StateReason};

use crate::signals::SignalBundle;

/// One guard/outcome pair.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub guard: fn(&SignalBundle) -> bool,
    pub state: ConversationState,
    pub reason: StateReason,
}

impl Rule {
    pub fn matches(&self, bundle: &SignalBundle) -> bool {
        (self.guard)(bundle)
    }
}

pub const PRECEDENCE: &[Rule] = &[
    Rule {
        name: "blocked",
        guard: |b| b.flags.has_blocked,
        state: ConversationState::Lost,
        reason: StateReason::BlockedByRecipient,
    },
    Rule {
        name: "bounced",
        guard: |b| b.flags.has_bounced,
        state: ConversationState::Lost,
        reason: StateReason::MessageBounced,
    },
    Rule {
        name: "opt_out",
        guard: |b| b.flags.has_opt_out,
        state: ConversationState::Lost,
        reason: StateReason::OptOut,
    },
    Rule {
        name: "explicit_rejection",
        guard: |b| b.flags.has_explicit_rejection && !b.flags.has_explicit_rejection_revival,
        state: ConversationState::Lost,
        reason: StateReason::ExplicitRejection,
    },
    Rule {
        name: "price_rejection",
        guard: |b| b.flags.has_price_rejection && !b.flags.has_price_rejection_revival,
        state: ConversationState::Lost,
        reason: StateReason::PriceRejection,
    },
    Rule {
        name: "indefinite_deferral",
        guard: |b| b.flags.has_indefinite_deferral && !b.flags.has_concrete_deferral,
        state: ConversationState::Lost,
        reason: StateReason::IndefiniteDeferral,
    },
    Rule {
        name: "loss_phrase",
        guard: |b| b.flags.has_loss_phrase,
        state: ConversationState::Lost,
        reason: StateReason::LossPhrase,
    },
    // A phrase match alone is too noisy; the context check must agree.
    Rule {
        name: "spam",
        guard: |b| b.flags.has_spam_phrase_match && b.flags.spam_context_confirmed,
        state: ConversationState::Spam,
        reason: StateReason::SpamConfirmed,
    },
    Rule {
        name: "conversion",
        guard: |b| b.flags.has_conversion,
        state: ConversationState::Converted,
        reason: StateReason::Conversion,
    },
    Rule {
        name: "off_platform",
        guard: |b| b.flags.has_off_platform && b.flags.has_explicit_contact,
        state: ConversationState::OffPlatform,
        reason: StateReason::OffPlatform,
    },
];

/// First rule whose guard holds, if any.
pub fn first_match(bundle: &SignalBundle) -> Option<&'static Rule> {
    PRECEDENCE.iter().find(|rule| rule.matches(bundle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bundle() -> SignalBundle {
        SignalBundle::at(Utc::now())
    }

    #[test]
    fn test_no_flags_no_match() {
        assert!(first_match(&bundle()).is_none());
    }

    #[test]
    fn test_rule_names_unique() {
        let mut names: Vec<_> = PRECEDENCE.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PRECEDENCE.len());
    }

    #[test]
    fn test_blocked_beats_everything() {
        let mut b = bundle();
        b.flags.has_blocked = true;
        b.flags.has_conversion = true;
        b.flags.has_opt_out = true;
        b.flags.has_spam_phrase_match = true;
        b.flags.spam_context_confirmed = true;
        assert_eq!(first_match(&b).map(|r| r.name), Some("blocked"));
    }

    #[test]
    fn test_revival_disarms_rejection() {
        let mut b = bundle();
        b.flags.has_explicit_rejection = true;
        b.flags.has_explicit_rejection_revival = true;
        assert!(first_match(&b).is_none());

        b.flags.has_price_rejection = true;
        assert_eq!(first_match(&b).map(|r| r.name), Some("price_rejection"));
    }

    #[test]
    fn test_off_platform_needs_contact() {
        let mut b = bundle();
        b.flags.has_off_platform = true;
        assert!(first_match(&b).is_none());
        b.flags.has_explicit_contact = true;
        assert_eq!(first_match(&b).map(|r| r.state), Some(ConversationState::OffPlatform));
    }
}
