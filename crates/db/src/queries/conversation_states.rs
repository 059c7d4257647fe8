// crates/db/src/queries/conversation_states.rs
//! Latest state machine output per conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use super::{from_unix, from_unix_opt, to_unix};
use crate::{Database, DbError, DbResult};
use replyradar_types::{ConversationState, FollowupDueSource, StateEvaluationResult, StateReason};

const TABLE: &str = "conversation_states";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConversationState {
    pub conversation_id: String,
    pub result: StateEvaluationResult,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ConversationStateRow {
    conversation_id: String,
    state: String,
    reasons: String,
    needs_followup: bool,
    followup_suggestion: Option<String>,
    followup_due_at: Option<i64>,
    followup_due_source: Option<String>,
    evaluated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for ConversationStateRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            conversation_id: row.try_get("conversation_id")?,
            state: row.try_get("state")?,
            reasons: row.try_get("reasons")?,
            needs_followup: row.try_get("needs_followup")?,
            followup_suggestion: row.try_get("followup_suggestion")?,
            followup_due_at: row.try_get("followup_due_at")?,
            followup_due_source: row.try_get("followup_due_source")?,
            evaluated_at: row.try_get("evaluated_at")?,
        })
    }
}

impl ConversationStateRow {
    fn into_stored(self) -> DbResult<StoredConversationState> {
        let state = ConversationState::parse(&self.state)
            .ok_or_else(|| DbError::corrupt(TABLE, format!("unknown state {:?}", self.state)))?;
        let reasons: Vec<StateReason> = serde_json::from_str(&self.reasons)
            .map_err(|e| DbError::corrupt(TABLE, format!("reasons: {e}")))?;
        let followup_due_source = match self.followup_due_source {
            Some(s) => Some(
                FollowupDueSource::parse(&s)
                    .ok_or_else(|| DbError::corrupt(TABLE, format!("unknown due source {s:?}")))?,
            ),
            None => None,
        };
        Ok(StoredConversationState {
            conversation_id: self.conversation_id,
            result: StateEvaluationResult {
                state,
                reasons,
                needs_followup: self.needs_followup,
                followup_suggestion: self.followup_suggestion,
                followup_due_at: from_unix_opt(TABLE, self.followup_due_at)?,
                followup_due_source,
            },
            evaluated_at: from_unix(TABLE, self.evaluated_at)?,
        })
    }
}

impl Database {
    /// Record the latest evaluation for a conversation, replacing any previous one.
    pub async fn upsert_conversation_state(
        &self,
        conversation_id: &str,
        result: &StateEvaluationResult,
        evaluated_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let reasons = serde_json::to_string(&result.reasons)
            .map_err(|e| DbError::corrupt(TABLE, format!("reasons: {e}")))?;
        sqlx::query(
            r#"INSERT INTO conversation_states (
                conversation_id, state, reasons, needs_followup, followup_suggestion,
                followup_due_at, followup_due_source, evaluated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(conversation_id) DO UPDATE SET
                state = excluded.state,
                reasons = excluded.reasons,
                needs_followup = excluded.needs_followup,
                followup_suggestion = excluded.followup_suggestion,
                followup_due_at = excluded.followup_due_at,
                followup_due_source = excluded.followup_due_source,
                evaluated_at = excluded.evaluated_at"#,
        )
        .bind(conversation_id)
        .bind(result.state.as_str())
        .bind(reasons)
        .bind(result.needs_followup)
        .bind(&result.followup_suggestion)
        .bind(result.followup_due_at.map(to_unix))
        .bind(result.followup_due_source.map(|s| s.as_str()))
        .bind(to_unix(evaluated_at))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_conversation_state(
        &self,
        conversation_id: &str,
    ) -> DbResult<Option<StoredConversationState>> {
        let row: Option<ConversationStateRow> =
            sqlx::query_as("SELECT * FROM conversation_states WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_optional(self.pool())
                .await?;
        row.map(ConversationStateRow::into_stored).transpose()
    }

    /// Conversations needing a follow-up whose due time is at or before
    /// `until`, most overdue first. Rows without a due time come last.
    pub async fn list_due_followups(
        &self,
        until: DateTime<Utc>,
    ) -> DbResult<Vec<StoredConversationState>> {
        let rows: Vec<ConversationStateRow> = sqlx::query_as(
            "SELECT * FROM conversation_states
             WHERE needs_followup = 1 AND (followup_due_at IS NULL OR followup_due_at <= ?)
             ORDER BY followup_due_at IS NULL, followup_due_at ASC, conversation_id ASC",
        )
        .bind(to_unix(until))
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(ConversationStateRow::into_stored).collect()
    }
}
