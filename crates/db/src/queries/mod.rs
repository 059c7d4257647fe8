// crates/db/src/queries/mod.rs
// Typed reads and writes over the replyradar tables.

pub mod ai_budget;
pub mod ai_cache;
pub mod conversation_states;
pub mod followup_events;

use chrono::{DateTime, Utc};

use crate::{DbError, DbResult};

pub(crate) fn to_unix(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

pub(crate) fn from_unix(table: &'static str, secs: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| DbError::corrupt(table, format!("timestamp out of range: {secs}")))
}

pub(crate) fn from_unix_opt(
    table: &'static str,
    secs: Option<i64>,
) -> DbResult<Option<DateTime<Utc>>> {
    secs.map(|s| from_unix(table, s)).transpose()
}
