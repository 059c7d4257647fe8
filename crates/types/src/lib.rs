// crates/types/src/lib.rs
//! Wire-level types shared by the engine, the store, and the dashboard.
//!
//! Everything here is plain data: enums with stable string forms and the
//! DTOs the engine emits. Behaviour lives in `replyradar-core`.

pub mod followup;
pub mod message;
pub mod series;
pub mod state;

pub use followup::{FollowupEvent, FollowupSummary};
pub use message::{Direction, SenderType};
pub use series::{Granularity, ParseRangeError, SeriesPoint, TimeRange};
pub use state::{ConversationState, FollowupDueSource, StateEvaluationResult, StateReason};
