// crates/core/src/lib.rs
pub mod calendar;
pub mod config;
pub mod error;
pub mod followup;
pub mod interpretation;
pub mod llm;
pub mod message;
pub mod paths;
pub mod series;
pub mod signals;
pub mod state_machine;

pub use config::{AiConfig, EngineConfig, LoggingConfig};
pub use error::*;
pub use followup::{
    derive_followup_events, merge_followup_event, recompute_conversation_events, FollowupConfig,
    FollowupEventRepository, InMemoryFollowupStore, RecomputeOutcome,
};
pub use message::{Message, MessageFeatures, RawMessage, RuleHit, RuleHitSet};
pub use series::{
    build_followup_series, floor_to_bucket, series_window_start, summarize_followups,
};
pub use signals::{CalendarMode, RuleFlags, SignalBundle, Thresholds};
pub use state_machine::evaluate as evaluate_conversation_state;

pub use replyradar_types as types;
