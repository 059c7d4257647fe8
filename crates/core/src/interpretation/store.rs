//! Persistence seams for the interpreter: result cache and call budget.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::gate::{BudgetLimits, BudgetSnapshot};
use super::validate::Interpretation;
use crate::error::StoreError;

/// What a cache entry remembers about one input hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedOutcome {
    Interpreted { interpretation: Interpretation },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedInterpretation {
    pub input_hash: String,
    pub model: String,
    pub prompt_version: String,
    pub outcome: CachedOutcome,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait InterpretationCache: Send + Sync {
    async fn get(&self, input_hash: &str) -> Result<Option<CachedInterpretation>, StoreError>;

    /// Insert or replace the entry for `entry.input_hash`.
    async fn put(&self, entry: &CachedInterpretation) -> Result<(), StoreError>;
}

/// Classifier call counters, windowed per UTC day.
#[async_trait]
pub trait AiBudgetLedger: Send + Sync {
    async fn snapshot(
        &self,
        conversation_id: &str,
        day: NaiveDate,
    ) -> Result<BudgetSnapshot, StoreError>;

    /// Take one call if both caps still have headroom. Must be atomic: two
    /// concurrent callers can never both take the last slot.
    async fn try_consume(
        &self,
        conversation_id: &str,
        day: NaiveDate,
        limits: BudgetLimits,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryInterpretationCache {
    entries: Mutex<HashMap<String, CachedInterpretation>>,
}

impl InMemoryInterpretationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl InterpretationCache for InMemoryInterpretationCache {
    async fn get(&self, input_hash: &str) -> Result<Option<CachedInterpretation>, StoreError> {
        Ok(self.entries.lock().await.get(input_hash).cloned())
    }

    async fn put(&self, entry: &CachedInterpretation) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(entry.input_hash.clone(), entry.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    daily: HashMap<NaiveDate, u32>,
    per_conversation: HashMap<(NaiveDate, String), u32>,
}

#[derive(Debug, Default)]
pub struct InMemoryBudgetLedger {
    counters: Mutex<Counters>,
}

impl InMemoryBudgetLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AiBudgetLedger for InMemoryBudgetLedger {
    async fn snapshot(
        &self,
        conversation_id: &str,
        day: NaiveDate,
    ) -> Result<BudgetSnapshot, StoreError> {
        let counters = self.counters.lock().await;
        Ok(BudgetSnapshot {
            daily_calls: counters.daily.get(&day).copied().unwrap_or(0),
            conversation_calls: counters
                .per_conversation
                .get(&(day, conversation_id.to_string()))
                .copied()
                .unwrap_or(0),
        })
    }

    async fn try_consume(
        &self,
        conversation_id: &str,
        day: NaiveDate,
        limits: BudgetLimits,
    ) -> Result<bool, StoreError> {
        let mut counters = self.counters.lock().await;
        let key = (day, conversation_id.to_string());
        let daily = counters.daily.get(&day).copied().unwrap_or(0);
        let conversation = counters.per_conversation.get(&key).copied().unwrap_or(0);
        if daily >= limits.daily_cap || conversation >= limits.per_conversation_cap {
            return Ok(false);
        }
        counters.daily.insert(day, daily + 1);
        counters.per_conversation.insert(key, conversation + 1);
        Ok(true)
    }
}
