// crates/types/src/followup.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One follow-up episode: an outbound business message that broke an idle
/// period, plus what the customer did next.
///
/// Identity is `followup_message_id`. The outcome fields (`revived`,
/// `immediate_loss`, `next_inbound_*`) only ever move forward when merged with
/// a previously stored copy; see `replyradar_core::followup::merge_followup_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct FollowupEvent {
    pub followup_message_id: String,
    pub conversation_id: String,
    pub followup_sent_at: DateTime<Utc>,
    pub previous_activity_at: Option<DateTime<Utc>>,
    /// Seconds since the previous non-administrative activity. `None` only
    /// when the episode opened the conversation.
    #[ts(type = "number | null")]
    pub idle_seconds: Option<i64>,
    pub revived: bool,
    pub immediate_loss: bool,
    pub next_inbound_message_id: Option<String>,
    pub next_inbound_at: Option<DateTime<Utc>>,
    pub next_inbound_is_loss: bool,
}

impl FollowupEvent {
    pub fn new(
        followup_message_id: impl Into<String>,
        conversation_id: impl Into<String>,
        followup_sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            followup_message_id: followup_message_id.into(),
            conversation_id: conversation_id.into(),
            followup_sent_at,
            previous_activity_at: None,
            idle_seconds: None,
            revived: false,
            immediate_loss: false,
            next_inbound_message_id: None,
            next_inbound_at: None,
            next_inbound_is_loss: false,
        }
    }

    pub fn has_response(&self) -> bool {
        self.next_inbound_message_id.is_some()
    }
}

/// Effectiveness roll-up over a set of follow-up episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct FollowupSummary {
    pub total: u32,
    pub revived: u32,
    pub immediate_loss: u32,
    /// Episodes with no attributed customer reply.
    pub unanswered: u32,
    /// `revived / total`, 0 when there are no episodes.
    pub revival_rate: f64,
    /// `immediate_loss / revived`, 0 when nothing was revived.
    pub immediate_loss_rate: f64,
    /// Median idle gap in hours, ignoring episodes that opened a conversation.
    pub median_idle_hours: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_serializes_camel_case() {
        let sent = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let event = FollowupEvent::new("m-1", "c-1", sent);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["followupMessageId"], "m-1");
        assert_eq!(json["revived"], false);
        assert!(json["idleSeconds"].is_null());
        assert!(!event.has_response());
    }
}
