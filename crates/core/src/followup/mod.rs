//! Follow-up episode derivation.
//!
//! An episode starts at an outbound business message sent after an idle gap
//! (or as the very first activity). The first customer reply after it decides
//! whether the episode revived the conversation and whether that reply was a
//! loss.
//!
//! Derivation is pure; [`recompute_conversation_events`] is the persistence
//! wrapper.

mod recompute;
mod store;

pub use recompute::{recompute_conversation_events, RecomputeOutcome};
pub use store::{FollowupEventRepository, InMemoryFollowupStore};

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use replyradar_types::FollowupEvent;
use serde::{Deserialize, Serialize};

use crate::calendar::saturating_hours;
use crate::message::Message;

/// Tunables for episode detection and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowupConfig {
    /// Minimum gap since the last activity for an outbound to open an episode.
    pub idle_threshold_hours: i64,
    /// A reply within this window of the send counts as a revival.
    pub revival_window_hours: i64,
    /// Rows per persistence transaction.
    pub batch_size: usize,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            idle_threshold_hours: 24,
            revival_window_hours: 24,
            batch_size: 100,
        }
    }
}

impl FollowupConfig {
    fn idle_threshold(&self) -> Duration {
        saturating_hours(self.idle_threshold_hours)
    }

    fn revival_window(&self) -> Duration {
        saturating_hours(self.revival_window_hours)
    }
}

/// Reconcile a freshly derived episode with its stored copy.
///
/// `revived` and `immediate_loss` never go back to false. The reply fields
/// are first-writer-wins and move as a group so an id never pairs with
/// another reply's timestamp.
pub fn merge_followup_event(existing: &FollowupEvent, fresh: &FollowupEvent) -> FollowupEvent {
    let mut merged = fresh.clone();
    merged.revived = existing.revived || fresh.revived;
    merged.immediate_loss = existing.immediate_loss || fresh.immediate_loss;
    if existing.next_inbound_message_id.is_some() {
        merged.next_inbound_message_id = existing.next_inbound_message_id.clone();
        merged.next_inbound_at = existing.next_inbound_at;
        merged.next_inbound_is_loss = existing.next_inbound_is_loss;
    }
    merged
}

/// Derive a conversation's episodes and reconcile them with `existing`
/// (keyed by follow-up message id).
///
/// `messages` may arrive in any order; they are sorted by timestamp with the
/// message id as tiebreaker.
pub fn derive_followup_events(
    messages: &[Message],
    existing: &HashMap<String, FollowupEvent>,
    config: &FollowupConfig,
) -> Vec<FollowupEvent> {
    let mut timeline: Vec<&Message> = messages.iter().collect();
    timeline.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut episodes = detect_episodes(&timeline, config);
    attribute_replies(&mut episodes, &timeline, config);

    episodes
        .into_iter()
        .map(|fresh| match existing.get(&fresh.followup_message_id) {
            Some(stored) => merge_followup_event(stored, &fresh),
            None => fresh,
        })
        .collect()
}

fn detect_episodes(timeline: &[&Message], config: &FollowupConfig) -> Vec<FollowupEvent> {
    let mut episodes = Vec::new();
    let mut last_activity_at: Option<DateTime<Utc>> = None;

    for msg in timeline {
        if msg.is_eligible_followup() {
            let opens_episode = match last_activity_at {
                None => true,
                Some(prev) => msg.timestamp - prev >= config.idle_threshold(),
            };
            if opens_episode {
                let mut event = FollowupEvent::new(&msg.id, &msg.conversation_id, msg.timestamp);
                event.previous_activity_at = last_activity_at;
                event.idle_seconds =
                    last_activity_at.map(|prev| (msg.timestamp - prev).num_seconds());
                episodes.push(event);
            }
        }
        if msg.counts_as_activity() {
            last_activity_at = Some(msg.timestamp);
        }
    }
    episodes
}

fn attribute_replies(
    episodes: &mut [FollowupEvent],
    timeline: &[&Message],
    config: &FollowupConfig,
) {
    for msg in timeline.iter().filter(|m| m.is_attributable_reply()) {
        let target = episodes
            .iter_mut()
            .rev()
            .find(|e| e.followup_sent_at <= msg.timestamp && e.next_inbound_message_id.is_none());
        let Some(episode) = target else {
            continue;
        };

        let is_loss = msg.is_loss_inbound();
        let revived = msg.timestamp - episode.followup_sent_at <= config.revival_window();
        episode.next_inbound_message_id = Some(msg.id.clone());
        episode.next_inbound_at = Some(msg.timestamp);
        episode.next_inbound_is_loss = is_loss;
        episode.revived = revived;
        episode.immediate_loss = revived && is_loss;
    }
}
