//! Ambiguity interpretation: a budget- and cache-aware policy around an
//! external free-text classifier.
//!
//! The pure pieces (gate, input hashing, validation, bucket mapping) never
//! touch I/O. [`AmbiguityInterpreter`] wires them to a runtime, a cache and a
//! budget ledger.

pub mod deferral;
pub mod gate;
pub mod input;
pub mod interpreter;
pub mod prompt;
pub mod store;
pub mod validate;

pub use deferral::map_deferred_bucket_to_date;
pub use gate::{
    should_allow_ai_call, should_run_ai, BudgetDecision, BudgetDenial, BudgetLimits, BudgetSnapshot,
    GateDecision, GateReason,
};
pub use input::{compute_input_hash, context_digest, prepare_input, PreparedInput};
pub use interpreter::{AmbiguityInterpreter, InterpretOutcome, InterpretRequest, SkipReason};
pub use store::{
    AiBudgetLedger, CachedInterpretation, CachedOutcome, InMemoryBudgetLedger,
    InMemoryInterpretationCache,
    InterpretationCache,
};
pub use validate::{strip_markdown_json, validate_ai_output, Confidence, Interpretation, Verdict};
