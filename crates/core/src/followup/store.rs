use std::collections::HashMap;

use async_trait::async_trait;
use replyradar_types::FollowupEvent;
use tokio::sync::RwLock;

use super::merge_followup_event;
use crate::error::StoreError;

/// Storage for follow-up episodes.
///
/// `save_events` must apply [`merge_followup_event`] against whatever is
/// already stored for each id, so a retried or overlapping save is harmless.
#[async_trait]
pub trait FollowupEventRepository: Send + Sync {
    /// Stored episodes for one conversation, keyed by follow-up message id.
    async fn load_existing_events(
        &self,
        conversation_id: &str,
    ) -> Result<HashMap<String, FollowupEvent>, StoreError>;

    /// Merge-upsert one batch.
    async fn save_events(&self, events: &[FollowupEvent]) -> Result<(), StoreError>;
}

/// Process-local repository, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryFollowupStore {
    events: RwLock<HashMap<String, FollowupEvent>>,
}

impl InMemoryFollowupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<FollowupEvent> {
        let mut events: Vec<_> = self.events.read().await.values().cloned().collect();
        events.sort_by(|a, b| {
            a.followup_sent_at
                .cmp(&b.followup_sent_at)
                .then_with(|| a.followup_message_id.cmp(&b.followup_message_id))
        });
        events
    }
}

#[async_trait]
impl FollowupEventRepository for InMemoryFollowupStore {
    async fn load_existing_events(
        &self,
        conversation_id: &str,
    ) -> Result<HashMap<String, FollowupEvent>, StoreError> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| e.conversation_id == conversation_id)
            .map(|e| (e.followup_message_id.clone(), e.clone()))
            .collect())
    }

    async fn save_events(&self, batch: &[FollowupEvent]) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        for event in batch {
            let merged = match events.get(&event.followup_message_id) {
                Some(stored) => merge_followup_event(stored, event),
                None => event.clone(),
            };
            events.insert(merged.followup_message_id.clone(), merged);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_save_merges_with_stored() {
        let store = InMemoryFollowupStore::new();
        let sent = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        let mut first = FollowupEvent::new("o0", "c1", sent);
        first.revived = true;
        first.next_inbound_message_id = Some("i1".into());
        store.save_events(&[first]).await.unwrap();

        let downgrade = FollowupEvent::new("o0", "c1", sent);
        store.save_events(&[downgrade]).await.unwrap();

        let loaded = store.load_existing_events("c1").await.unwrap();
        let event = &loaded["o0"];
        assert!(event.revived);
        assert_eq!(event.next_inbound_message_id.as_deref(), Some("i1"));
        assert!(store.load_existing_events("other").await.unwrap().is_empty());
    }
}
