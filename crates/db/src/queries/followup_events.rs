// crates/db/src/queries/followup_events.rs
//! Follow-up episode persistence.
//!
//! Upserts merge in SQL so concurrent recomputes of the same conversation
//! can't lose a recorded outcome: `revived` and `immediate_loss` are OR'd with
//! the stored row, and a stored reply (id, time, loss flag) is kept as a group.
//! This is the same rule as `replyradar_core::merge_followup_event`.

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{from_unix, from_unix_opt, to_unix};
use crate::{Database, DbResult};
use replyradar_types::FollowupEvent;

const TABLE: &str = "followup_events";

const SELECT_COLUMNS: &str = "followup_message_id, conversation_id, followup_sent_at, previous_activity_at,
     idle_seconds, revived, immediate_loss, next_inbound_message_id, next_inbound_at, next_inbound_is_loss";

/// Raw row shape; timestamps still in unix seconds.
#[derive(Debug, Clone)]
struct FollowupEventRow {
    followup_message_id: String,
    conversation_id: String,
    followup_sent_at: i64,
    previous_activity_at: Option<i64>,
    idle_seconds: Option<i64>,
    revived: bool,
    immediate_loss: bool,
    next_inbound_message_id: Option<String>,
    next_inbound_at: Option<i64>,
    next_inbound_is_loss: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for FollowupEventRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            followup_message_id: row.try_get("followup_message_id")?,
            conversation_id: row.try_get("conversation_id")?,
            followup_sent_at: row.try_get("followup_sent_at")?,
            previous_activity_at: row.try_get("previous_activity_at")?,
            idle_seconds: row.try_get("idle_seconds")?,
            revived: row.try_get("revived")?,
            immediate_loss: row.try_get("immediate_loss")?,
            next_inbound_message_id: row.try_get("next_inbound_message_id")?,
            next_inbound_at: row.try_get("next_inbound_at")?,
            next_inbound_is_loss: row.try_get("next_inbound_is_loss")?,
        })
    }
}

impl FollowupEventRow {
    fn into_event(self) -> DbResult<FollowupEvent> {
        Ok(FollowupEvent {
            followup_message_id: self.followup_message_id,
            conversation_id: self.conversation_id,
            followup_sent_at: from_unix(TABLE, self.followup_sent_at)?,
            previous_activity_at: from_unix_opt(TABLE, self.previous_activity_at)?,
            idle_seconds: self.idle_seconds,
            revived: self.revived,
            immediate_loss: self.immediate_loss,
            next_inbound_message_id: self.next_inbound_message_id,
            next_inbound_at: from_unix_opt(TABLE, self.next_inbound_at)?,
            next_inbound_is_loss: self.next_inbound_is_loss,
        })
    }
}

fn into_events(rows: Vec<FollowupEventRow>) -> DbResult<Vec<FollowupEvent>> {
    rows.into_iter().map(FollowupEventRow::into_event).collect()
}

impl Database {
    /// Merge-upsert a batch of episodes in one transaction.
    pub async fn upsert_followup_events(&self, events: &[FollowupEvent]) -> DbResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let now = to_unix(Utc::now());
        let mut tx = self.pool().begin().await?;
        for event in events {
            sqlx::query(
                r#"INSERT INTO followup_events (
                    followup_message_id, conversation_id, followup_sent_at, previous_activity_at,
                    idle_seconds, revived, immediate_loss, next_inbound_message_id, next_inbound_at,
                    next_inbound_is_loss, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(followup_message_id) DO UPDATE SET
                    conversation_id = excluded.conversation_id,
                    followup_sent_at = excluded.followup_sent_at,
                    previous_activity_at = excluded.previous_activity_at,
                    idle_seconds = excluded.idle_seconds,
                    revived = (followup_events.revived OR excluded.revived),
                    immediate_loss = (followup_events.immediate_loss OR excluded.immediate_loss),
                    next_inbound_at = CASE WHEN followup_events.next_inbound_message_id IS NOT NULL
                        THEN followup_events.next_inbound_at ELSE excluded.next_inbound_at END,
                    next_inbound_is_loss = CASE WHEN followup_events.next_inbound_message_id IS NOT NULL
                        THEN followup_events.next_inbound_is_loss ELSE excluded.next_inbound_is_loss END,
                    next_inbound_message_id = COALESCE(followup_events.next_inbound_message_id,
                        excluded.next_inbound_message_id),
                    updated_at = excluded.updated_at"#,
            )
            .bind(&event.followup_message_id)
            .bind(&event.conversation_id)
            .bind(to_unix(event.followup_sent_at))
            .bind(event.previous_activity_at.map(to_unix))
            .bind(event.idle_seconds)
            .bind(event.revived)
            .bind(event.immediate_loss)
            .bind(&event.next_inbound_message_id)
            .bind(event.next_inbound_at.map(to_unix))
            .bind(event.next_inbound_is_loss)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Episodes of one conversation, oldest first.
    pub async fn get_followup_events(&self, conversation_id: &str) -> DbResult<Vec<FollowupEvent>> {
        let rows: Vec<FollowupEventRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM followup_events
             WHERE conversation_id = ?
             ORDER BY followup_sent_at ASC, followup_message_id ASC"
        ))
        .bind(conversation_id)
        .fetch_all(self.pool())
        .await?;
        into_events(rows)
    }

    /// Episodes across all conversations sent at or after `since`.
    pub async fn get_followup_events_since(
        &self,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<FollowupEvent>> {
        let rows: Vec<FollowupEventRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM followup_events
             WHERE followup_sent_at >= ?
             ORDER BY followup_sent_at ASC, followup_message_id ASC"
        ))
        .bind(to_unix(since))
        .fetch_all(self.pool())
        .await?;
        into_events(rows)
    }
}
