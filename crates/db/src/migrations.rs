/// Inline SQL migrations for the replyradar database.
///
/// Timestamps are stored as unix seconds (INTEGER). Booleans are 0/1.
/// Append only: applied versions are tracked in `_migrations`.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: follow-up episodes, keyed by the outbound message that opened them
    r#"
CREATE TABLE IF NOT EXISTS followup_events (
    followup_message_id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    followup_sent_at INTEGER NOT NULL,
    previous_activity_at INTEGER,
    idle_seconds INTEGER,
    revived INTEGER NOT NULL DEFAULT 0,
    immediate_loss INTEGER NOT NULL DEFAULT 0,
    next_inbound_message_id TEXT,
    next_inbound_at INTEGER,
    next_inbound_is_loss INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_followup_events_conversation ON followup_events(conversation_id, followup_sent_at);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_followup_events_sent_at ON followup_events(followup_sent_at);
"#,
    // Migration 4: latest state machine output per conversation
    r#"
CREATE TABLE IF NOT EXISTS conversation_states (
    conversation_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    reasons TEXT NOT NULL DEFAULT '[]',
    needs_followup INTEGER NOT NULL DEFAULT 0,
    followup_suggestion TEXT,
    followup_due_at INTEGER,
    followup_due_source TEXT,
    evaluated_at INTEGER NOT NULL
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_conversation_states_due ON conversation_states(needs_followup, followup_due_at);
"#,
    // Migration 6: classifier cache + call counters
    r#"
BEGIN;
CREATE TABLE IF NOT EXISTS ai_interpretation_cache (
    input_hash TEXT PRIMARY KEY,
    model TEXT NOT NULL,
    prompt_version TEXT NOT NULL,
    outcome TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS ai_call_counters (
    day TEXT NOT NULL,
    scope TEXT NOT NULL,
    calls INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (day, scope)
);
COMMIT;
"#,
];
