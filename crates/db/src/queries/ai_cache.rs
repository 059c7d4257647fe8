// crates/db/src/queries/ai_cache.rs
//! Classifier result cache keyed by input hash.

use sqlx::Row;

use super::{from_unix, to_unix};
use crate::{Database, DbError, DbResult};
use replyradar_core::interpretation::{CachedInterpretation, CachedOutcome};

const TABLE: &str = "ai_interpretation_cache";

impl Database {
    pub async fn get_cached_interpretation(
        &self,
        input_hash: &str,
    ) -> DbResult<Option<CachedInterpretation>> {
        let row = sqlx::query(
            "SELECT input_hash, model, prompt_version, outcome, created_at
             FROM ai_interpretation_cache WHERE input_hash = ?",
        )
        .bind(input_hash)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let outcome: String = row.try_get("outcome")?;
        let outcome: CachedOutcome = serde_json::from_str(&outcome)
            .map_err(|e| DbError::corrupt(TABLE, format!("outcome: {e}")))?;
        Ok(Some(CachedInterpretation {
            input_hash: row.try_get("input_hash")?,
            model: row.try_get("model")?,
            prompt_version: row.try_get("prompt_version")?,
            outcome,
            created_at: from_unix(TABLE, row.try_get("created_at")?)?,
        }))
    }

    /// Insert or replace the entry for `entry.input_hash`.
    pub async fn put_cached_interpretation(&self, entry: &CachedInterpretation) -> DbResult<()> {
        let outcome = serde_json::to_string(&entry.outcome)
            .map_err(|e| DbError::corrupt(TABLE, format!("outcome: {e}")))?;
        sqlx::query(
            "INSERT OR REPLACE INTO ai_interpretation_cache (input_hash, model, prompt_version, outcome, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.input_hash)
        .bind(&entry.model)
        .bind(&entry.prompt_version)
        .bind(outcome)
        .bind(to_unix(entry.created_at))
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
