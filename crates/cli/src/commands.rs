//! Subcommand bodies. Each returns a serializable report; `main` prints it.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use replyradar_core::interpretation::{
    prepare_input, should_run_ai, AiBudgetLedger, AmbiguityInterpreter, BudgetSnapshot,
    GateDecision, InterpretOutcome, InterpretRequest, Interpretation, PreparedInput, SkipReason,
};
use replyradar_core::llm::{ClassifierRuntime, CommandRuntime};
use replyradar_core::{
    build_followup_series, evaluate_conversation_state, recompute_conversation_events,
    series_window_start, summarize_followups, AiConfig, FollowupConfig, FollowupEventRepository,
    InMemoryFollowupStore, MessageFeatures, SignalBundle,
};
use replyradar_db::{Database, StoredConversationState};
use replyradar_types::{
    FollowupDueSource, FollowupEvent, FollowupSummary, Granularity, SeriesPoint,
    StateEvaluationResult, TimeRange,
};

use crate::input::MessageBatch;

/// Evaluate one bundle. With a store and conversation id, a missing
/// `previousState` is taken from the last stored evaluation and the new
/// result is recorded.
pub async fn evaluate(
    mut bundle: SignalBundle,
    store: Option<(&Database, &str)>,
) -> Result<StateEvaluationResult> {
    if let Some((db, conversation_id)) = store {
        if bundle.previous_state.is_none() {
            bundle.previous_state = db
                .get_conversation_state(conversation_id)
                .await
                .context("loading previous state")?
                .map(|stored| stored.result.state);
        }
    }

    let result = evaluate_conversation_state(&bundle);

    if let Some((db, conversation_id)) = store {
        db.upsert_conversation_state(conversation_id, &result, bundle.now)
            .await
            .context("saving evaluation")?;
        info!(conversation_id, state = result.state.as_str(), "evaluation stored");
    }
    Ok(result)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveReport {
    pub conversations: usize,
    pub dropped_messages: usize,
    pub events: Vec<FollowupEvent>,
}

/// Recompute follow-up episodes for every conversation in `batch`. Without a
/// database the episodes live only for this run.
pub async fn derive(
    batch: MessageBatch,
    db: Option<&Database>,
    config: &FollowupConfig,
) -> Result<DeriveReport> {
    let scratch = InMemoryFollowupStore::new();
    let repo: &dyn FollowupEventRepository = match db {
        Some(db) => db,
        None => &scratch,
    };

    let mut events = Vec::new();
    for (conversation_id, messages) in &batch.conversations {
        recompute_conversation_events(repo, conversation_id, messages, config)
            .await
            .with_context(|| format!("recomputing {conversation_id}"))?;
        let mut stored: Vec<FollowupEvent> = repo
            .load_existing_events(conversation_id)
            .await
            .with_context(|| format!("loading events for {conversation_id}"))?
            .into_values()
            .collect();
        stored.sort_by(|a, b| {
            a.followup_sent_at
                .cmp(&b.followup_sent_at)
                .then_with(|| a.followup_message_id.cmp(&b.followup_message_id))
        });
        events.extend(stored);
    }

    Ok(DeriveReport {
        conversations: batch.conversations.len(),
        dropped_messages: batch.dropped,
        events,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesReport {
    pub range: TimeRange,
    pub granularity: Granularity,
    pub points: Vec<SeriesPoint>,
    pub summary: FollowupSummary,
}

/// Bucketed series plus summary over the window ending at `now`. The summary
/// counts the same episodes as the buckets, first bucket included in full.
pub fn series(
    events: &[FollowupEvent],
    range: TimeRange,
    granularity: Option<Granularity>,
    now: DateTime<Utc>,
) -> SeriesReport {
    let granularity = granularity.unwrap_or_else(|| range.default_granularity());
    let start = series_window_start(range, Some(granularity), now);
    let in_window: Vec<FollowupEvent> = events
        .iter()
        .filter(|e| e.followup_sent_at >= start && e.followup_sent_at <= now)
        .cloned()
        .collect();

    SeriesReport {
        range,
        granularity,
        points: build_followup_series(&in_window, range, Some(granularity), now),
        summary: summarize_followups(&in_window),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateReport {
    pub decision: GateDecision,
    /// What would be sent and its cache key; absent when gated.
    pub input: Option<PreparedInput>,
    pub budget: Option<BudgetSnapshot>,
}

/// Dry run of the classifier gate. No runtime is called and no budget spent.
pub async fn gate(
    text: &str,
    features: &MessageFeatures,
    config: &AiConfig,
    budget: Option<(&Database, &str, DateTime<Utc>)>,
) -> Result<GateReport> {
    let decision = should_run_ai(text, features, &config.ambiguity_keywords);
    let input = decision.run.then(|| {
        prepare_input(
            text,
            config.max_input_chars,
            &config.prompt_version,
            &config.model,
            "",
        )
    });
    let budget = match budget {
        Some((db, conversation_id, now)) => Some(
            db.ai_budget_snapshot(conversation_id, now.date_naive())
                .await
                .context("reading classifier budget")?,
        ),
        None => None,
    };
    Ok(GateReport {
        decision,
        input,
        budget,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretReport {
    pub interpreted: bool,
    pub cached: bool,
    pub skip_reason: Option<SkipReason>,
    pub interpretation: Option<Interpretation>,
    pub handoff: bool,
    pub deferral_due_at: Option<DateTime<Utc>>,
    pub deferral_due_source: Option<FollowupDueSource>,
    pub input: Option<PreparedInput>,
}

impl InterpretReport {
    fn from_outcome(outcome: InterpretOutcome, now: DateTime<Utc>) -> Self {
        match outcome {
            InterpretOutcome::Interpreted {
                interpretation,
                input,
                cached,
            } => {
                let hint = interpretation.deferral_hint(now);
                Self {
                    interpreted: true,
                    cached,
                    skip_reason: None,
                    handoff: interpretation.is_handoff(),
                    deferral_due_at: hint.map(|(at, _)| at),
                    deferral_due_source: hint.map(|(_, source)| source),
                    interpretation: Some(interpretation),
                    input: Some(input),
                }
            }
            InterpretOutcome::Skipped { reason, input, cached } => Self {
                interpreted: false,
                cached,
                skip_reason: Some(reason),
                interpretation: None,
                handoff: false,
                deferral_due_at: None,
                deferral_due_source: None,
                input,
            },
        }
    }
}

/// Run the full classifier path for one message using the configured
/// command runtime, with cache and budget kept in `db`.
pub async fn interpret(
    db: Arc<Database>,
    config: &AiConfig,
    conversation_id: &str,
    text: &str,
    context: &[String],
    now: DateTime<Utc>,
) -> Result<InterpretReport> {
    if config.command.is_empty() {
        bail!("no classifier command configured (set [ai].command)");
    }
    let runtime =
        CommandRuntime::from_argv(&config.command).context("building classifier runtime")?;
    let runtime: Arc<dyn ClassifierRuntime> = Arc::new(runtime);
    let budget: Arc<dyn AiBudgetLedger> = db.clone();
    let interpreter = AmbiguityInterpreter::new(runtime, db, budget, config.clone());

    let features = MessageFeatures::default();
    let outcome = interpreter
        .interpret(InterpretRequest {
            conversation_id,
            text,
            features: &features,
            context,
            now,
        })
        .await
        .context("classifier storage failed")?;
    Ok(InterpretReport::from_outcome(outcome, now))
}

/// Conversations whose follow-up is due by `now`.
pub async fn due(db: &Database, now: DateTime<Utc>) -> Result<Vec<StoredConversationState>> {
    db.list_due_followups(now).await.context("listing due follow-ups")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_messages;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use replyradar_types::ConversationState;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
    }

    const MESSAGES: &str = r#"[
        {"id": "i0", "conversationId": "c1", "timestamp": "2026-03-01T08:00:00Z", "direction": "inbound", "senderType": "customer"},
        {"id": "o1", "conversationId": "c1", "timestamp": "2026-03-02T12:00:00Z", "direction": "outbound", "senderType": "business"},
        {"id": "i1", "conversationId": "c1", "timestamp": "2026-03-02T13:00:00Z", "direction": "inbound", "senderType": "customer"},
        {"id": "o9", "conversationId": "c2", "timestamp": "2026-03-03T09:00:00Z", "direction": "outbound", "senderType": "business"}
    ]"#;

    #[tokio::test]
    async fn test_evaluate_persists_and_reopens() {
        let db = Database::new_in_memory().await.unwrap();

        let mut lost = SignalBundle::at(now());
        lost.flags.has_blocked = true;
        let first = evaluate(lost, Some((&db, "c1"))).await.unwrap();
        assert_eq!(first.state, ConversationState::Lost);

        // The customer writes again; previous state comes from the store.
        let mut back = SignalBundle::at(now() + Duration::hours(1));
        back.inbound_count = 1;
        back.message_count = 1;
        back.last_inbound_at = Some(now());
        back.last_non_final_inbound_at = Some(now());
        let second = evaluate(back, Some((&db, "c1"))).await.unwrap();
        assert!(second.has_reason(replyradar_types::StateReason::Reopened));

        let stored = db.get_conversation_state("c1").await.unwrap().unwrap();
        assert_eq!(stored.result, second);
    }

    #[tokio::test]
    async fn test_derive_without_db() {
        let batch = parse_messages(MESSAGES).unwrap();
        let report = derive(batch, None, &FollowupConfig::default()).await.unwrap();
        assert_eq!(report.conversations, 2);
        let ids: Vec<&str> = report.events.iter().map(|e| e.followup_message_id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o9"]);
        assert!(report.events[0].revived);
        assert!(!report.events[1].revived);
    }

    #[tokio::test]
    async fn test_derive_with_db_persists() {
        let db = Database::new_in_memory().await.unwrap();
        let batch = parse_messages(MESSAGES).unwrap();
        derive(batch, Some(&db), &FollowupConfig::default()).await.unwrap();
        assert_eq!(db.get_followup_events("c1").await.unwrap().len(), 1);
        assert_eq!(db.get_followup_events("c2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_series_report() {
        let batch = parse_messages(MESSAGES).unwrap();
        let report = derive(batch, None, &FollowupConfig::default()).await.unwrap();
        let s = series(&report.events, TimeRange::Last7d, None, now());
        assert_eq!(s.granularity, Granularity::Day);
        assert_eq!(s.points.len(), 8);
        assert_eq!(s.summary.total, 2);
        assert_eq!(s.summary.revived, 1);
        assert_eq!(s.points.iter().map(|p| p.events).sum::<u32>(), 2);
    }

    #[test]
    fn test_series_counts_whole_first_bucket() {
        // 30 days before noon on 2026-03-04 is noon on 2026-02-02; its day
        // bucket opens at midnight.
        let opening = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        let mut early = FollowupEvent::new("o-early", "c1", opening + Duration::hours(1));
        early.revived = true;
        let before = FollowupEvent::new("o-before", "c1", opening - Duration::hours(1));

        let s = series(&[early, before], TimeRange::Last30d, None, now());
        assert_eq!(s.points[0].bucket_start, opening);
        assert_eq!(s.points[0].events, 1);
        assert_eq!(s.summary.total, 1);
        assert_eq!(s.summary.revived, 1);
    }

    #[tokio::test]
    async fn test_gate_dry_run() {
        let config = AiConfig::default();
        let features = MessageFeatures::default();

        let gated = gate("ok thanks", &features, &config, None).await.unwrap();
        assert!(!gated.decision.run);
        assert!(gated.input.is_none());

        let open = gate("I'll think about it", &features, &config, None).await.unwrap();
        assert!(open.decision.run);
        assert_eq!(open.input.unwrap().text, "i'll think about it");
    }

    #[tokio::test]
    async fn test_interpret_requires_command() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let err = interpret(db, &AiConfig::default(), "c1", "later", &[], now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no classifier command"));
    }
}
