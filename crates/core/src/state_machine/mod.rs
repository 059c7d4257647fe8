//! Conversation lifecycle state machine.
//!
//! `evaluate` is a pure function of a [`SignalBundle`]: no clock reads, no
//! I/O, no failure mode. Every flag combination lands on a defined result;
//! conflicting flags are resolved by precedence alone.
//!
//! Evaluation order:
//! 1. Short-circuit rules from [`rules::PRECEDENCE`] (lost/spam/converted/off-platform).
//! 2. Inbound staleness, which can still force `LOST` on any non-terminal
//!    outcome, off-platform included.
//! 3. Deferral.
//! 4. Active states (`PRICE_GIVEN`, `ENGAGED`, `NEW`) and their follow-up timing.
//! 5. Terminal states have every follow-up field cleared, whatever ran before.

pub mod rules;

#[cfg(test)]
mod proptests;

use replyradar_types::{
    ConversationState, Direction, FollowupDueSource, StateEvaluationResult, StateReason,
};
use tracing::debug;

use crate::calendar::{add_days, saturating_add, saturating_hours, whole_days_between};
use crate::signals::SignalBundle;

pub const SUGGEST_REPLY_RECOMMENDED: &str = "Reply recommended";
pub const SUGGEST_REPLY_SOON: &str = "Reply soon";
pub const SUGGEST_FOLLOW_UP_NOW: &str = "Follow up now";
pub const SUGGEST_FOLLOW_UP_LATER: &str = "Follow up later";
pub const SUGGEST_VISIBILITY_LOST: &str = "Visibility lost (off-platform)";

/// Derive state, reasons and follow-up recommendation for one conversation.
pub fn evaluate(bundle: &SignalBundle) -> StateEvaluationResult {
    let matched = rules::first_match(bundle);
    if let Some(rule) = matched {
        debug!(rule = rule.name, state = rule.state.as_str(), "precedence rule matched");
    }

    let mut result = match matched {
        Some(rule) if rule.state.is_terminal() => {
            StateEvaluationResult::new(rule.state).with_reason(rule.reason)
        }
        _ if is_inbound_stale(bundle) => {
            debug!(
                days_since_last_inbound = ?inbound_age_days(bundle),
                threshold_days = staleness_threshold_days(bundle),
                "inbound stale"
            );
            StateEvaluationResult::new(ConversationState::Lost)
                .with_reason(StateReason::InboundStale)
        }
        Some(rule) => {
            let mut result = StateEvaluationResult::new(rule.state).with_reason(rule.reason);
            if rule.state == ConversationState::OffPlatform {
                // No reliable channel to nudge the customer, so no due date either.
                result.followup_suggestion = Some(SUGGEST_VISIBILITY_LOST.to_string());
            }
            result
        }
        None if bundle.has_any_deferral() => evaluate_deferred(bundle),
        None => evaluate_active(bundle),
    };

    annotate(&mut result, bundle);

    if result.state.is_terminal() {
        result.clear_followup();
    }
    result
}

/// Days since the customer last wrote, preferring the extractor's value.
fn inbound_age_days(bundle: &SignalBundle) -> Option<i64> {
    bundle.days_since_last_inbound.or_else(|| {
        bundle
            .last_inbound_at
            .map(|at| whole_days_between(at, bundle.now))
    })
}

/// Inactivity allowance for the state the thread would otherwise be in.
fn staleness_threshold_days(bundle: &SignalBundle) -> i64 {
    let t = &bundle.thresholds;
    let f = &bundle.flags;
    if f.has_price_mention || f.has_price_rejection_revival {
        t.lost_after_days_price_given
    } else if f.has_off_platform && !f.has_explicit_contact {
        t.lost_after_days_off_platform_no_contact
    } else {
        t.inactivity_timeout_days
    }
}

fn is_inbound_stale(bundle: &SignalBundle) -> bool {
    // Outbound-only threads have nothing to be stale relative to.
    if !bundle.has_customer_reply() {
        return false;
    }
    // A committed future touchpoint suppresses staleness whatever its source tag.
    if bundle.future_deferral_due().is_some() {
        return false;
    }
    match inbound_age_days(bundle) {
        Some(days) => days > staleness_threshold_days(bundle),
        None => false,
    }
}

fn evaluate_deferred(bundle: &SignalBundle) -> StateEvaluationResult {
    let mut result = StateEvaluationResult::new(ConversationState::Deferred)
        .with_reason(StateReason::Deferral);

    let Some(due) = bundle.followup_due_at_from_deferral else {
        result.followup_suggestion = Some(SUGGEST_FOLLOW_UP_LATER.to_string());
        result.push_reason(StateReason::AwaitingCustomer);
        return result;
    };

    let source = bundle.followup_due_source;
    let soon = saturating_hours(bundle.thresholds.due_soon_hours);
    let due_soon = due <= saturating_add(bundle.now, soon);
    result.followup_due_at = Some(due);
    result.followup_due_source = Some(source);

    // Only a date the customer named can make a follow-up due; a default
    // date is our own guess.
    if due_soon && source == FollowupDueSource::CustomerIntent {
        result.needs_followup = true;
        result.followup_suggestion = Some(SUGGEST_FOLLOW_UP_NOW.to_string());
    } else {
        result.followup_suggestion = Some(SUGGEST_FOLLOW_UP_LATER.to_string());
    }
    result
}

fn evaluate_active(bundle: &SignalBundle) -> StateEvaluationResult {
    let both_sides_spoke = bundle.has_customer_reply() && bundle.outbound_count > 0;
    let (state, reason) = if bundle.flags.has_price_mention {
        (ConversationState::PriceGiven, StateReason::PriceGiven)
    } else if both_sides_spoke {
        (ConversationState::Engaged, StateReason::Engaged)
    } else {
        (ConversationState::New, StateReason::NewConversation)
    };

    let mut result = StateEvaluationResult::new(state).with_reason(reason);
    apply_response_timing(&mut result, bundle);
    result
}

/// Follow-up timing for active states, driven by the last message that
/// carried intent. An unreplied inbound always outranks outbound staleness.
fn apply_response_timing(result: &mut StateEvaluationResult, bundle: &SignalBundle) {
    let Some((direction, at)) = bundle.last_non_final_message() else {
        return;
    };
    let t = &bundle.thresholds;

    match direction {
        Direction::Inbound => {
            let due = saturating_add(at, saturating_hours(t.sla_hours));
            result.followup_due_at = Some(due);
            result.followup_due_source = Some(FollowupDueSource::Default);
            if bundle.now >= due {
                result.needs_followup = true;
                result.followup_suggestion = Some(SUGGEST_REPLY_RECOMMENDED.to_string());
                result.push_reason(StateReason::UnrepliedInbound);
            } else {
                result.followup_suggestion = Some(SUGGEST_REPLY_SOON.to_string());
            }
        }
        Direction::Outbound => {
            let due = add_days(at, t.stale_outbound_days, t.stale_outbound_calendar);
            result.followup_due_at = Some(due);
            result.followup_due_source = Some(FollowupDueSource::Default);
            if bundle.now >= due {
                result.needs_followup = true;
                result.followup_suggestion = Some(SUGGEST_FOLLOW_UP_NOW.to_string());
                result.push_reason(StateReason::OutboundStale);
            } else {
                result.followup_suggestion = Some(SUGGEST_FOLLOW_UP_LATER.to_string());
                result.push_reason(StateReason::AwaitingCustomer);
            }
        }
    }
}

/// Secondary reasons that never change the state itself.
fn annotate(result: &mut StateEvaluationResult, bundle: &SignalBundle) {
    if result.state.is_terminal() {
        return;
    }
    let f = &bundle.flags;
    if (f.has_explicit_rejection && f.has_explicit_rejection_revival)
        || (f.has_price_rejection && f.has_price_rejection_revival)
    {
        result.push_reason(StateReason::RejectionRevived);
    }
    if bundle.previous_state == Some(ConversationState::Lost) {
        result.push_reason(StateReason::Reopened);
    }
    if f.has_handoff_request && result.state != ConversationState::OffPlatform {
        result.push_reason(StateReason::HandoffRequested);
        result.needs_followup = true;
        result.followup_suggestion = Some(SUGGEST_REPLY_RECOMMENDED.to_string());
        if result.followup_due_at.is_none() {
            result.followup_due_at = Some(bundle.now);
            result.followup_due_source = Some(FollowupDueSource::Default);
        }
    }
}
