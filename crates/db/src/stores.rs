// crates/db/src/stores.rs
//! `Database` as the engine's persistence collaborators.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::Database;
use replyradar_core::interpretation::{
    AiBudgetLedger, BudgetLimits, BudgetSnapshot, CachedInterpretation, InterpretationCache,
};
use replyradar_core::{FollowupEventRepository, StoreError};
use replyradar_types::FollowupEvent;

#[async_trait]
impl FollowupEventRepository for Database {
    async fn load_existing_events(
        &self,
        conversation_id: &str,
    ) -> Result<HashMap<String, FollowupEvent>, StoreError> {
        let events = self.get_followup_events(conversation_id).await?;
        Ok(events
            .into_iter()
            .map(|e| (e.followup_message_id.clone(), e))
            .collect())
    }

    async fn save_events(&self, events: &[FollowupEvent]) -> Result<(), StoreError> {
        Ok(self.upsert_followup_events(events).await?)
    }
}

#[async_trait]
impl InterpretationCache for Database {
    async fn get(&self, input_hash: &str) -> Result<Option<CachedInterpretation>, StoreError> {
        Ok(self.get_cached_interpretation(input_hash).await?)
    }

    async fn put(&self, entry: &CachedInterpretation) -> Result<(), StoreError> {
        Ok(self.put_cached_interpretation(entry).await?)
    }
}

#[async_trait]
impl AiBudgetLedger for Database {
    async fn snapshot(
        &self,
        conversation_id: &str,
        day: NaiveDate,
    ) -> Result<BudgetSnapshot, StoreError> {
        Ok(self.ai_budget_snapshot(conversation_id, day).await?)
    }

    async fn try_consume(
        &self,
        conversation_id: &str,
        day: NaiveDate,
        limits: BudgetLimits,
    ) -> Result<bool, StoreError> {
        Ok(self.try_consume_ai_call(conversation_id, day, limits).await?)
    }
}
