//! End-to-end interpretation of one ambiguous message.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::gate::{should_allow_ai_call, should_run_ai, BudgetDenial, GateReason};
use super::input::{context_digest, prepare_input, PreparedInput};
use super::prompt::build_prompt;
use super::store::{AiBudgetLedger, CachedInterpretation, CachedOutcome, InterpretationCache};
use super::validate::{validate_ai_output, Interpretation};
use crate::config::AiConfig;
use crate::error::StoreError;
use crate::llm::{ClassifierRuntime, LlmError};
use crate::message::MessageFeatures;

/// Why no fresh interpretation was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    KeywordGate,
    HardSignalPresent,
    DailyCapReached,
    ConversationCapReached,
    Timeout,
    RuntimeError,
    InvalidOutput,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::KeywordGate => "keyword_gate",
            Self::HardSignalPresent => "hard_signal_present",
            Self::DailyCapReached => "daily_cap_reached",
            Self::ConversationCapReached => "conversation_cap_reached",
            Self::Timeout => "timeout",
            Self::RuntimeError => "runtime_error",
            Self::InvalidOutput => "invalid_output",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Disabled,
            Self::KeywordGate,
            Self::HardSignalPresent,
            Self::DailyCapReached,
            Self::ConversationCapReached,
            Self::Timeout,
            Self::RuntimeError,
            Self::InvalidOutput,
        ]
        .into_iter()
        .find(|r| r.as_str() == s)
    }

    /// Deterministic failures are worth caching; transient ones are retried.
    fn is_cacheable(&self) -> bool {
        matches!(self, Self::InvalidOutput)
    }
}

impl From<GateReason> for SkipReason {
    fn from(reason: GateReason) -> Self {
        match reason {
            GateReason::HardSignalPresent => Self::HardSignalPresent,
            GateReason::KeywordGate | GateReason::AmbiguousKeyword => Self::KeywordGate,
        }
    }
}

impl From<BudgetDenial> for SkipReason {
    fn from(denial: BudgetDenial) -> Self {
        match denial {
            BudgetDenial::DailyCapReached => Self::DailyCapReached,
            BudgetDenial::ConversationCapReached => Self::ConversationCapReached,
        }
    }
}

/// One message to interpret.
#[derive(Debug, Clone)]
pub struct InterpretRequest<'a> {
    pub conversation_id: &'a str,
    pub text: &'a str,
    pub features: &'a MessageFeatures,
    /// Recent message bodies; only their digest reaches the cache key.
    pub context: &'a [String],
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpretOutcome {
    Interpreted {
        interpretation: Interpretation,
        input: PreparedInput,
        cached: bool,
    },
    Skipped {
        reason: SkipReason,
        input: Option<PreparedInput>,
        cached: bool,
    },
}

impl InterpretOutcome {
    pub fn interpretation(&self) -> Option<&Interpretation> {
        match self {
            Self::Interpreted { interpretation, .. } => Some(interpretation),
            Self::Skipped { .. } => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Interpreted { .. } => None,
            Self::Skipped { reason, .. } => Some(*reason),
        }
    }

    pub fn is_cached(&self) -> bool {
        match self {
            Self::Interpreted { cached, .. } | Self::Skipped { cached, .. } => *cached,
        }
    }

    fn skipped(reason: SkipReason, input: Option<PreparedInput>) -> Self {
        Self::Skipped {
            reason,
            input,
            cached: false,
        }
    }
}

/// Gate, cache, budget, classifier call and validation for one message.
pub struct AmbiguityInterpreter {
    runtime: Arc<dyn ClassifierRuntime>,
    cache: Arc<dyn InterpretationCache>,
    budget: Arc<dyn AiBudgetLedger>,
    config: AiConfig,
}

impl AmbiguityInterpreter {
    pub fn new(
        runtime: Arc<dyn ClassifierRuntime>,
        cache: Arc<dyn InterpretationCache>,
        budget: Arc<dyn AiBudgetLedger>,
        config: AiConfig,
    ) -> Self {
        Self {
            runtime,
            cache,
            budget,
            config,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Interpret one message. Only storage failures are errors; every
    /// classifier problem becomes a [`SkipReason`].
    pub async fn interpret(
        &self,
        req: InterpretRequest<'_>,
    ) -> Result<InterpretOutcome, StoreError> {
        let cfg = &self.config;
        if !cfg.enabled {
            return Ok(InterpretOutcome::skipped(SkipReason::Disabled, None));
        }

        let gate = should_run_ai(req.text, req.features, &cfg.ambiguity_keywords);
        if !gate.run {
            debug!(
                conversation_id = req.conversation_id,
                reason = gate.reason.as_str(),
                "classifier gated"
            );
            return Ok(InterpretOutcome::skipped(gate.reason.into(), None));
        }

        let input = prepare_input(
            req.text,
            cfg.max_input_chars,
            &cfg.prompt_version,
            &cfg.model,
            &context_digest(req.context),
        );

        if let Some(entry) = self.cache.get(&input.input_hash).await? {
            debug!(input_hash = %input.input_hash, "interpretation cache hit");
            return Ok(match entry.outcome {
                CachedOutcome::Interpreted { interpretation } => InterpretOutcome::Interpreted {
                    interpretation,
                    input,
                    cached: true,
                },
                CachedOutcome::Skipped { reason } => InterpretOutcome::Skipped {
                    reason: SkipReason::parse(&reason).unwrap_or(SkipReason::InvalidOutput),
                    input: Some(input),
                    cached: true,
                },
            });
        }

        let day = req.now.date_naive();
        let limits = cfg.limits();
        let snapshot = self.budget.snapshot(req.conversation_id, day).await?;
        let decision = should_allow_ai_call(snapshot, limits);
        if let Some(denial) = decision.denial {
            debug!(
                conversation_id = req.conversation_id,
                reason = denial.as_str(),
                "classifier budget exhausted"
            );
            return Ok(InterpretOutcome::skipped(denial.into(), Some(input)));
        }
        if !self.budget.try_consume(req.conversation_id, day, limits).await? {
            // Lost the race for the last slot.
            let snapshot = self.budget.snapshot(req.conversation_id, day).await?;
            let reason = should_allow_ai_call(snapshot, limits)
                .denial
                .unwrap_or(BudgetDenial::DailyCapReached);
            return Ok(InterpretOutcome::skipped(reason.into(), Some(input)));
        }

        let messages = build_prompt(&input);
        let call = self.runtime.complete(&cfg.model, &messages);
        let conversation_id = req.conversation_id;
        let reason = match tokio::time::timeout(Duration::from_millis(cfg.timeout_ms), call).await {
            Err(_) => {
                warn!(conversation_id, timeout_ms = cfg.timeout_ms, "classifier timed out");
                SkipReason::Timeout
            }
            Ok(Err(LlmError::InvalidFormat(detail))) => {
                warn!(conversation_id, %detail, "classifier output unreadable");
                SkipReason::InvalidOutput
            }
            Ok(Err(e)) => {
                warn!(
                    conversation_id,
                    runtime = self.runtime.name(),
                    error = %e,
                    "classifier failed"
                );
                SkipReason::RuntimeError
            }
            Ok(Ok(response)) => match validate_ai_output(&response.content) {
                Some(interpretation) => {
                    debug!(
                        latency_ms = response.latency_ms,
                        handoff = interpretation.handoff.verdict,
                        deferred = interpretation.deferred.verdict,
                        "classifier answered"
                    );
                    let outcome = CachedOutcome::Interpreted {
                        interpretation: interpretation.clone(),
                    };
                    self.store(&input, outcome, req.now).await;
                    return Ok(InterpretOutcome::Interpreted {
                        interpretation,
                        input,
                        cached: false,
                    });
                }
                None => {
                    let preview: String = response.content.chars().take(200).collect();
                    warn!(conversation_id, %preview, "classifier output failed validation");
                    SkipReason::InvalidOutput
                }
            },
        };

        if reason.is_cacheable() {
            let outcome = CachedOutcome::Skipped {
                reason: reason.as_str().to_string(),
            };
            self.store(&input, outcome, req.now).await;
        }
        Ok(InterpretOutcome::skipped(reason, Some(input)))
    }

    /// Cache writes are best effort: the result is already in hand.
    async fn store(&self, input: &PreparedInput, outcome: CachedOutcome, now: DateTime<Utc>) {
        let entry = CachedInterpretation {
            input_hash: input.input_hash.clone(),
            model: self.config.model.clone(),
            prompt_version: self.config.prompt_version.clone(),
            outcome,
            created_at: now,
        };
        if let Err(e) = self.cache.put(&entry).await {
            warn!(input_hash = %entry.input_hash, error = %e, "failed to cache interpretation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpretation::store::{InMemoryBudgetLedger, InMemoryInterpretationCache};
    use crate::llm::{LlmError, PromptMessage, RuntimeResponse};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GOOD: &str = r#"{"handoff":{"verdict":false,"classification":null,"confidence":"low","evidence":""},
        "deferred":{"verdict":true,"classification":"NEXT_WEEK","confidence":"high","evidence":"next week"}}"#;

    enum Script {
        Reply(&'static str),
        Fail,
        Garbled,
        Hang,
    }

    struct FakeRuntime {
        script: Script,
        calls: AtomicUsize,
    }

    impl FakeRuntime {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ClassifierRuntime for FakeRuntime {
        async fn complete(
            &self,
            _model: &str,
            _messages: &[PromptMessage],
        ) -> Result<RuntimeResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Reply(content) => Ok(RuntimeResponse {
                    content: content.to_string(),
                    latency_ms: 5,
                }),
                Script::Fail => Err(LlmError::RuntimeFailed("boom".into())),
                Script::Garbled => Err(LlmError::InvalidFormat("stdout is not UTF-8".into())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LlmError::RuntimeFailed("still hanging".into()))
                }
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct Harness {
        runtime: Arc<FakeRuntime>,
        cache: Arc<InMemoryInterpretationCache>,
        interpreter: AmbiguityInterpreter,
    }

    fn harness(script: Script, config: AiConfig) -> Harness {
        let runtime = FakeRuntime::new(script);
        let cache = Arc::new(InMemoryInterpretationCache::new());
        let budget = Arc::new(InMemoryBudgetLedger::new());
        let interpreter = AmbiguityInterpreter::new(runtime.clone(), cache.clone(), budget, config);
        Harness {
            runtime,
            cache,
            interpreter,
        }
    }

    fn request<'a>(text: &'a str, features: &'a MessageFeatures) -> InterpretRequest<'a> {
        InterpretRequest {
            conversation_id: "c1",
            text,
            features,
            context: &[],
            now: Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_interprets_and_caches() {
        let h = harness(Script::Reply(GOOD), AiConfig::default());
        let features = MessageFeatures::default();

        let first = h.interpreter.interpret(request("Maybe next week", &features)).await.unwrap();
        let interpretation = first.interpretation().unwrap();
        assert!(interpretation.deferred.verdict);
        assert!(!first.is_cached());

        let second = h.interpreter.interpret(request("maybe next week ", &features)).await.unwrap();
        assert!(second.is_cached());
        assert_eq!(second.interpretation(), first.interpretation());
        assert_eq!(h.runtime.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_keyword_gate_skips_without_call() {
        let h = harness(Script::Reply(GOOD), AiConfig::default());
        let features = MessageFeatures::default();
        let out = h
            .interpreter
            .interpret(request("what colours do you have", &features))
            .await
            .unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::KeywordGate));
        assert_eq!(h.runtime.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hard_signal_skips() {
        let h = harness(Script::Reply(GOOD), AiConfig::default());
        let features = MessageFeatures::default();
        let out = h
            .interpreter
            .interpret(request("call me later on 0412 345 678", &features))
            .await
            .unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::HardSignalPresent));
    }

    #[tokio::test]
    async fn test_disabled() {
        let config = AiConfig {
            enabled: false,
            ..AiConfig::default()
        };
        let h = harness(Script::Reply(GOOD), config);
        let features = MessageFeatures::default();
        let out = h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::Disabled));
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let config = AiConfig {
            per_conversation_cap: 1,
            ..AiConfig::default()
        };
        let h = harness(Script::Reply(GOOD), config);
        let features = MessageFeatures::default();
        h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        let out = h.interpreter.interpret(request("maybe next month", &features)).await.unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::ConversationCapReached));
        assert_eq!(h.runtime.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_consumes_no_budget() {
        let config = AiConfig {
            per_conversation_cap: 1,
            ..AiConfig::default()
        };
        let h = harness(Script::Reply(GOOD), config);
        let features = MessageFeatures::default();
        h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        let again = h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        assert!(again.is_cached());
        assert!(again.interpretation().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_skip_and_not_cached() {
        let config = AiConfig {
            timeout_ms: 50,
            ..AiConfig::default()
        };
        let h = harness(Script::Hang, config);
        let features = MessageFeatures::default();
        let out = h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::Timeout));
        assert_eq!(h.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_runtime_error_is_skip() {
        let h = harness(Script::Fail, AiConfig::default());
        let features = MessageFeatures::default();
        let out = h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::RuntimeError));
        assert_eq!(h.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_output_cached_as_skip() {
        let h = harness(Script::Reply("sure! the customer is deferring"), AiConfig::default());
        let features = MessageFeatures::default();
        let out = h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::InvalidOutput));

        let again = h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        assert_eq!(again.skip_reason(), Some(SkipReason::InvalidOutput));
        assert!(again.is_cached());
        assert_eq!(h.runtime.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_output_counts_as_invalid() {
        let h = harness(Script::Garbled, AiConfig::default());
        let features = MessageFeatures::default();
        let out = h.interpreter.interpret(request("maybe later", &features)).await.unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::InvalidOutput));
        assert_eq!(h.cache.len().await, 1);
    }

    #[test]
    fn test_skip_reason_round_trip() {
        for r in [SkipReason::InvalidOutput, SkipReason::Timeout, SkipReason::KeywordGate] {
            assert_eq!(SkipReason::parse(r.as_str()), Some(r));
        }
        assert_eq!(SkipReason::parse("nope"), None);
    }
}
