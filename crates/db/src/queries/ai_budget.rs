// crates/db/src/queries/ai_budget.rs
//! Per-day classifier call counters.
//!
//! One row per (day, scope). The daily total lives under [`DAILY_SCOPE`];
//! each conversation gets `conv:<id>`. Consumption runs inside
//! `BEGIN IMMEDIATE` so the write lock is held from the first read, and
//! each increment is guarded by `calls < cap`: two writers can never both
//! take the last slot, in-process or across processes.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::{debug, warn};

use crate::{Database, DbResult};
use replyradar_core::interpretation::{BudgetLimits, BudgetSnapshot};

pub const DAILY_SCOPE: &str = "*";
pub const CONVERSATION_SCOPE_PREFIX: &str = "conv:";

fn conversation_scope(conversation_id: &str) -> String {
    format!("{CONVERSATION_SCOPE_PREFIX}{conversation_id}")
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Increment one counter if it is below `cap`. Returns whether it moved.
async fn bump(conn: &mut SqliteConnection, day: &str, scope: &str, cap: u32) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE ai_call_counters SET calls = calls + 1 WHERE day = ? AND scope = ? AND calls < ?",
    )
        .bind(day)
        .bind(scope)
        .bind(i64::from(cap))
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn consume_locked(
    conn: &mut SqliteConnection,
    day: &str,
    scope: &str,
    limits: BudgetLimits,
) -> DbResult<bool> {
    sqlx::query(
        "INSERT OR IGNORE INTO ai_call_counters (day, scope, calls) VALUES (?, ?, 0), (?, ?, 0)",
    )
        .bind(day)
        .bind(DAILY_SCOPE)
        .bind(day)
        .bind(scope)
        .execute(&mut *conn)
        .await?;

    if !bump(conn, day, DAILY_SCOPE, limits.daily_cap).await? {
        return Ok(false);
    }
    bump(conn, day, scope, limits.per_conversation_cap).await
}

impl Database {
    pub async fn ai_budget_snapshot(
        &self,
        conversation_id: &str,
        day: NaiveDate,
    ) -> DbResult<BudgetSnapshot> {
        let scope = conversation_scope(conversation_id);
        let rows = sqlx::query(
            "SELECT scope, calls FROM ai_call_counters WHERE day = ? AND scope IN (?, ?)",
        )
            .bind(day_key(day))
            .bind(DAILY_SCOPE)
            .bind(&scope)
            .fetch_all(self.pool())
            .await?;

        let mut snapshot = BudgetSnapshot::default();
        for row in rows {
            let row_scope: String = row.try_get("scope")?;
            let calls: i64 = row.try_get("calls")?;
            let calls = u32::try_from(calls).unwrap_or(u32::MAX);
            if row_scope == DAILY_SCOPE {
                snapshot.daily_calls = calls;
            } else {
                snapshot.conversation_calls = calls;
            }
        }
        Ok(snapshot)
    }

    /// Take one classifier call for `conversation_id` on `day` if both caps
    /// have headroom. Nothing is incremented when either cap is reached.
    pub async fn try_consume_ai_call(
        &self,
        conversation_id: &str,
        day: NaiveDate,
        limits: BudgetLimits,
    ) -> DbResult<bool> {
        let day = day_key(day);
        let scope = conversation_scope(conversation_id);

        let mut conn = self.pool().acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match consume_locked(&mut conn, &day, &scope, limits).await {
            Ok(true) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                debug!(conversation_id, day = %day, "classifier call consumed");
                Ok(true)
            }
            Ok(false) => {
                sqlx::query("ROLLBACK").execute(&mut *conn).await?;
                debug!(conversation_id, day = %day, "classifier budget exhausted");
                Ok(false)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    warn!(error = %rollback, "rollback after failed budget update");
                }
                Err(e)
            }
        }
    }
}
