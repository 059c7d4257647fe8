//! Property tests for the state machine invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use replyradar_types::{ConversationState, FollowupDueSource, StateReason};

use super::evaluate;
use crate::signals::{RuleFlags, SignalBundle};

fn base_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
}

fn arb_flags() -> impl Strategy<Value = RuleFlags> {
    prop::collection::vec(any::<bool>(), 18).prop_map(|v| RuleFlags {
        has_opt_out: v[0],
        has_blocked: v[1],
        has_bounced: v[2],
        has_explicit_rejection: v[3],
        has_explicit_rejection_revival: v[4],
        has_price_rejection: v[5],
        has_price_rejection_revival: v[6],
        has_deferral: v[7],
        has_indefinite_deferral: v[8],
        has_concrete_deferral: v[9],
        has_conversion: v[10],
        has_loss_phrase: v[11],
        has_off_platform: v[12],
        has_explicit_contact: v[13],
        has_price_mention: v[14],
        has_spam_phrase_match: v[15],
        spam_context_confirmed: v[16],
        has_handoff_request: v[17],
    })
}

fn arb_source() -> impl Strategy<Value = FollowupDueSource> {
    prop_oneof![
        Just(FollowupDueSource::CustomerIntent),
        Just(FollowupDueSource::Default),
        Just(FollowupDueSource::Unknown),
    ]
}

prop_compose! {
    fn arb_bundle()(
        flags in arb_flags(),
        inbound in 0u32..5,
        outbound in 0u32..5,
        inbound_hours_ago in prop::option::of(0i64..4000),
        outbound_hours_ago in prop::option::of(0i64..4000),
        due_offset_hours in prop::option::of(-500i64..500),
        source in arb_source(),
        days_since_inbound in prop::option::of(0i64..200),
    ) -> SignalBundle {
        let now = base_now();
        let mut b = SignalBundle::at(now);
        b.flags = flags;
        b.inbound_count = inbound;
        b.outbound_count = outbound;
        b.non_final_inbound_count = inbound;
        b.non_final_outbound_count = outbound;
        b.message_count = inbound + outbound;
        b.last_non_final_inbound_at = inbound_hours_ago.map(|h| now - Duration::hours(h));
        b.last_non_final_outbound_at = outbound_hours_ago.map(|h| now - Duration::hours(h));
        b.last_inbound_at = b.last_non_final_inbound_at;
        b.last_outbound_at = b.last_non_final_outbound_at;
        b.followup_due_at_from_deferral = due_offset_hours.map(|h| now + Duration::hours(h));
        b.followup_due_source = source;
        b.days_since_last_inbound = days_since_inbound;
        b
    }
}

proptest! {
    #[test]
    fn terminal_states_never_carry_followup(b in arb_bundle()) {
        let r = evaluate(&b);
        if r.state.is_terminal() {
            prop_assert!(!r.needs_followup);
            prop_assert!(r.followup_suggestion.is_none());
            prop_assert!(r.followup_due_at.is_none());
            prop_assert!(r.followup_due_source.is_none());
        }
    }

    #[test]
    fn blocked_always_lost(mut b in arb_bundle()) {
        b.flags.has_blocked = true;
        let r = evaluate(&b);
        prop_assert_eq!(r.state, ConversationState::Lost);
        prop_assert_eq!(r.reasons, vec![StateReason::BlockedByRecipient]);
    }

    #[test]
    fn phrase_only_spam_never_spam(mut b in arb_bundle()) {
        b.flags.has_spam_phrase_match = true;
        b.flags.spam_context_confirmed = false;
        prop_assert_ne!(evaluate(&b).state, ConversationState::Spam);
    }

    #[test]
    fn outbound_only_never_inbound_stale(mut b in arb_bundle()) {
        b.inbound_count = 0;
        b.non_final_inbound_count = 0;
        prop_assert!(!evaluate(&b).has_reason(StateReason::InboundStale));
    }

    #[test]
    fn needs_followup_implies_suggestion(b in arb_bundle()) {
        let r = evaluate(&b);
        if r.needs_followup {
            prop_assert!(r.followup_suggestion.is_some());
        }
    }

    #[test]
    fn evaluation_is_deterministic(b in arb_bundle()) {
        prop_assert_eq!(evaluate(&b), evaluate(&b));
    }
}
