//! Integration tests: the engine's pipelines running against SQLite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;

use replyradar_core::interpretation::{
    AmbiguityInterpreter, BudgetLimits, InterpretRequest, SkipReason,
};
use replyradar_core::llm::{ClassifierRuntime, LlmError, PromptMessage, RuntimeResponse};
use replyradar_core::types::{Direction, SenderType};
use replyradar_core::{
    recompute_conversation_events, AiConfig, FollowupConfig, Message, MessageFeatures,
};
use replyradar_db::Database;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn inbound(id: &str, at: DateTime<Utc>) -> Message {
    Message::new(id, "c1", at, Direction::Inbound, SenderType::Customer)
}

fn outbound(id: &str, at: DateTime<Utc>) -> Message {
    Message::new(id, "c1", at, Direction::Outbound, SenderType::Business)
}

#[tokio::test]
async fn test_recompute_is_sticky_across_runs() {
    let db = Database::new_in_memory().await.unwrap();
    let config = FollowupConfig::default();

    let full = vec![
        inbound("i0", t0()),
        outbound("o1", t0() + Duration::hours(30)),
        inbound("i1", t0() + Duration::hours(32)),
    ];
    let first = recompute_conversation_events(&db, "c1", &full, &config).await.unwrap();
    assert_eq!(first.derived, 1);
    assert_eq!(first.revived, 1);

    // The reply is no longer visible (e.g. deleted upstream); the stored
    // outcome must survive.
    let truncated = &full[..2];
    let second = recompute_conversation_events(&db, "c1", truncated, &config).await.unwrap();
    assert_eq!(second.previously_stored, 1);

    let stored = db.get_followup_events("c1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].revived);
    assert_eq!(stored[0].next_inbound_message_id.as_deref(), Some("i1"));
    assert_eq!(stored[0].idle_seconds, Some(30 * 3600));
}

#[tokio::test]
async fn test_recompute_batches() {
    let db = Database::new_in_memory().await.unwrap();
    let config = FollowupConfig {
        batch_size: 2,
        ..FollowupConfig::default()
    };
    // Five outbound nudges, each two days apart, never answered.
    let messages: Vec<Message> = (0..5)
        .map(|i| outbound(&format!("o{i}"), t0() + Duration::days(2 * i)))
        .collect();

    let outcome = recompute_conversation_events(&db, "c1", &messages, &config).await.unwrap();
    assert_eq!(outcome.derived, 5);
    assert_eq!(outcome.batches, 3);
    assert_eq!(db.get_followup_events("c1").await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("replyradar.db");

    {
        let db = Database::new(&path).await.unwrap();
        let messages = vec![outbound("o1", t0())];
        recompute_conversation_events(&db, "c1", &messages, &FollowupConfig::default())
            .await
            .unwrap();
        assert_eq!(db.db_path(), path.as_path());
    }

    let reopened = Database::new(&path).await.unwrap();
    let stored = reopened.get_followup_events("c1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].followup_message_id, "o1");
}

#[tokio::test]
async fn test_budget_last_slot_under_contention() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&dir.path().join("budget.db")).await.unwrap();
    let day = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
    let limits = BudgetLimits {
        daily_cap: 3,
        per_conversation_cap: 10,
    };

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.try_consume_ai_call(&format!("c{}", i % 4), day, limits).await
            })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 3);
    assert_eq!(db.ai_budget_snapshot("c0", day).await.unwrap().daily_calls, 3);
}

const DEFERRED: &str = r#"{"handoff":{"verdict":false,"classification":null,"confidence":"low","evidence":""},
    "deferred":{"verdict":true,"classification":"NEXT_WEEK","confidence":"high","evidence":"next week"}}"#;

struct CountingRuntime {
    reply: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl ClassifierRuntime for CountingRuntime {
    async fn complete(
        &self,
        _model: &str,
        _messages: &[PromptMessage],
    ) -> Result<RuntimeResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RuntimeResponse {
            content: self.reply.to_string(),
            latency_ms: 1,
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn request<'a>(
    text: &'a str,
    features: &'a MessageFeatures,
    now: DateTime<Utc>,
) -> InterpretRequest<'a> {
    InterpretRequest {
        conversation_id: "c1",
        text,
        features,
        context: &[],
        now,
    }
}

#[tokio::test]
async fn test_interpreter_uses_sqlite_cache_and_budget() {
    let db = Arc::new(Database::new_in_memory().await.unwrap());
    let runtime = Arc::new(CountingRuntime {
        reply: DEFERRED,
        calls: AtomicUsize::new(0),
    });
    let config = AiConfig {
        per_conversation_cap: 1,
        ..AiConfig::default()
    };
    let interpreter = AmbiguityInterpreter::new(runtime.clone(), db.clone(), db.clone(), config);

    let features = MessageFeatures::default();
    let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
    let first = interpreter
        .interpret(request("I'll get back to you next week", &features, now))
        .await
        .unwrap();
    assert!(first.interpretation().is_some());
    assert!(!first.is_cached());

    // Same input: served from SQLite without touching the budget.
    let again = interpreter
        .interpret(request("I'll get back to you next week", &features, now))
        .await
        .unwrap();
    assert!(again.is_cached());
    assert_eq!(runtime.calls.load(Ordering::SeqCst), 1);

    // New input, but the conversation already used its one call today.
    let capped = interpreter
        .interpret(request("let me think, later maybe", &features, now))
        .await
        .unwrap();
    assert_eq!(capped.skip_reason(), Some(SkipReason::ConversationCapReached));
    assert_eq!(runtime.calls.load(Ordering::SeqCst), 1);
}
