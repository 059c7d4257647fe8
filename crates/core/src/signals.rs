// crates/core/src/signals.rs
//! The typed snapshot the state machine consumes.
//!
//! A `SignalBundle` is produced by the signal extractor (outside this crate)
//! from a conversation's rows. The engine trusts it completely and never
//! re-derives flags from raw text.

use chrono::{DateTime, Utc};
use replyradar_types::{ConversationState, Direction, FollowupDueSource};
use serde::{Deserialize, Serialize};

/// How "N days" of outbound staleness is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarMode {
    /// Every day counts.
    CalendarDays,
    /// Saturdays and Sundays (UTC) are skipped.
    #[default]
    BusinessDays,
}

/// Largest hour-valued threshold accepted from config or a bundle (ten years).
pub const MAX_THRESHOLD_HOURS: i64 = 24 * 3650;
/// Largest day-valued threshold accepted from config or a bundle.
pub const MAX_THRESHOLD_DAYS: i64 = 3650;

/// Tunable thresholds for one evaluation.
///
/// Bundles carry these camelCase; the snake_case aliases let the `[thresholds]`
/// config table use the same key style as the other sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    /// Hours an inbound message may wait before a reply is recommended.
    #[serde(alias = "sla_hours")]
    pub sla_hours: i64,
    /// A customer-intent due date this close (or already past) is due now.
    #[serde(alias = "due_soon_hours")]
    pub due_soon_hours: i64,
    /// Generic inbound inactivity before a thread is considered lost.
    #[serde(alias = "inactivity_timeout_days")]
    pub inactivity_timeout_days: i64,
    /// Inbound inactivity after a price was quoted.
    #[serde(alias = "lost_after_days_price_given")]
    pub lost_after_days_price_given: i64,
    /// Inbound inactivity after the customer moved off-platform without leaving contact details.
    #[serde(alias = "lost_after_days_off_platform_no_contact")]
    pub lost_after_days_off_platform_no_contact: i64,
    /// Outbound messages older than this are stale and need a nudge.
    #[serde(alias = "stale_outbound_days")]
    pub stale_outbound_days: i64,
    #[serde(alias = "stale_outbound_calendar")]
    pub stale_outbound_calendar: CalendarMode,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            sla_hours: 24,
            due_soon_hours: 24,
            inactivity_timeout_days: 30,
            lost_after_days_price_given: 14,
            lost_after_days_off_platform_no_contact: 21,
            stale_outbound_days: 3,
            stale_outbound_calendar: CalendarMode::BusinessDays,
        }
    }
}

impl Thresholds {
    /// Range problems, each prefixed with `prefix` (e.g. `thresholds.`).
    pub fn problems(&self, prefix: &str) -> Vec<String> {
        let hours = [("sla_hours", self.sla_hours), ("due_soon_hours", self.due_soon_hours)];
        let days = [
            ("inactivity_timeout_days", self.inactivity_timeout_days),
            ("lost_after_days_price_given", self.lost_after_days_price_given),
            (
                "lost_after_days_off_platform_no_contact",
                self.lost_after_days_off_platform_no_contact,
            ),
            ("stale_outbound_days", self.stale_outbound_days),
        ];
        let mut problems = Vec::new();
        for (name, value) in hours {
            check_range(&mut problems, prefix, name, value, MAX_THRESHOLD_HOURS);
        }
        for (name, value) in days {
            check_range(&mut problems, prefix, name, value, MAX_THRESHOLD_DAYS);
        }
        problems
    }
}

/// Push a problem unless `0 <= value <= max`.
pub(crate) fn check_range(
    problems: &mut Vec<String>,
    prefix: &str,
    name: &str,
    value: i64,
    max: i64,
) {
    if !(0..=max).contains(&value) {
        problems.push(format!("{prefix}{name} must be between 0 and {max}, got {value}"));
    }
}

/// Rule-hit flags computed by the extractor's text/rule matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleFlags {
    pub has_opt_out: bool,
    pub has_blocked: bool,
    pub has_bounced: bool,
    pub has_explicit_rejection: bool,
    /// The customer re-engaged after an explicit rejection.
    pub has_explicit_rejection_revival: bool,
    pub has_price_rejection: bool,
    pub has_price_rejection_revival: bool,
    pub has_deferral: bool,
    pub has_indefinite_deferral: bool,
    pub has_concrete_deferral: bool,
    pub has_conversion: bool,
    pub has_loss_phrase: bool,
    pub has_off_platform: bool,
    pub has_explicit_contact: bool,
    pub has_price_mention: bool,
    pub has_spam_phrase_match: bool,
    pub spam_context_confirmed: bool,
    pub has_handoff_request: bool,
}

/// Everything one state evaluation needs. Temporal fields are absolute UTC
/// instants; `now` is explicit so evaluation is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalBundle {
    pub now: DateTime<Utc>,
    pub previous_state: Option<ConversationState>,

    pub message_count: u32,
    pub inbound_count: u32,
    pub outbound_count: u32,
    /// Inbound messages excluding system and acknowledgement-only ones.
    pub non_final_inbound_count: u32,
    pub non_final_outbound_count: u32,

    pub last_inbound_at: Option<DateTime<Utc>>,
    pub last_outbound_at: Option<DateTime<Utc>>,
    pub last_non_final_inbound_at: Option<DateTime<Utc>>,
    pub last_non_final_outbound_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub flags: RuleFlags,

    pub followup_due_at_from_deferral: Option<DateTime<Utc>>,
    pub followup_due_source: FollowupDueSource,

    pub days_since_last_inbound: Option<i64>,
    pub days_since_last_activity: Option<i64>,

    pub thresholds: Thresholds,
}

impl SignalBundle {
    /// An empty conversation evaluated at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    /// Direction and time of the most recent message that carries intent.
    ///
    /// Falls back to the raw last-activity timestamps when the extractor did
    /// not supply non-final ones. Ties go to inbound: an unreplied customer
    /// message outranks our own.
    pub fn last_non_final_message(&self) -> Option<(Direction, DateTime<Utc>)> {
        let (inbound, outbound) = if self.last_non_final_inbound_at.is_some()
            || self.last_non_final_outbound_at.is_some()
        {
            (self.last_non_final_inbound_at, self.last_non_final_outbound_at)
        } else {
            (self.last_inbound_at, self.last_outbound_at)
        };

        match (inbound, outbound) {
            (Some(i), Some(o)) if o > i => Some((Direction::Outbound, o)),
            (Some(i), _) => Some((Direction::Inbound, i)),
            (None, Some(o)) => Some((Direction::Outbound, o)),
            (None, None) => None,
        }
    }

    /// The deferral due date, if it lies strictly after `now`.
    pub fn future_deferral_due(&self) -> Option<DateTime<Utc>> {
        self.followup_due_at_from_deferral.filter(|due| *due > self.now)
    }

    pub fn has_any_deferral(&self) -> bool {
        self.flags.has_deferral
            || self.flags.has_concrete_deferral
            || self.flags.has_indefinite_deferral
    }

    pub fn has_customer_reply(&self) -> bool {
        self.inbound_count > 0
    }
}
