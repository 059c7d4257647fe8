use tracing::{debug, info};

use super::{derive_followup_events, FollowupConfig, FollowupEventRepository};
use crate::error::StoreError;
use crate::message::Message;

/// Counts from one recomputation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeOutcome {
    pub derived: usize,
    pub previously_stored: usize,
    pub revived: usize,
    pub batches: usize,
}

/// Load stored episodes, re-derive from `messages`, and save the merged
/// result in batches of `config.batch_size`.
///
/// The caller must not run two recomputations for the same conversation at
/// once; stores make each batch atomic but not the whole read-derive-write.
pub async fn recompute_conversation_events<R>(
    repo: &R,
    conversation_id: &str,
    messages: &[Message],
    config: &FollowupConfig,
) -> Result<RecomputeOutcome, StoreError>
where
    R: FollowupEventRepository + ?Sized,
{
    let existing = repo.load_existing_events(conversation_id).await?;
    let events = derive_followup_events(messages, &existing, config);

    let mut outcome = RecomputeOutcome {
        derived: events.len(),
        previously_stored: existing.len(),
        revived: events.iter().filter(|e| e.revived).count(),
        batches: 0,
    };

    for batch in events.chunks(config.batch_size.max(1)) {
        repo.save_events(batch).await?;
        outcome.batches += 1;
        debug!(conversation_id, rows = batch.len(), "saved follow-up batch");
    }

    info!(
        conversation_id,
        messages = messages.len(),
        derived = outcome.derived,
        previously_stored = outcome.previously_stored,
        revived = outcome.revived,
        batches = outcome.batches,
        "recomputed follow-up events"
    );
    Ok(outcome)
}
