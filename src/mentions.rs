//! Mention loading for chat turns.
//!
//! Raw mention ids are filtered through the visibility gate before any
//! transcript body is read. Ids the user cannot see are dropped without a
//! trace; the caller cannot tell them apart from ids that do not exist.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::max_mentions;
use crate::prompt_context::PromptMentionDocument;
use crate::store::{TranscriptContentStore, VisibilityStore};
use crate::types::UserIdentity;
use crate::visibility::filter_visible_transcript_ids_for_user;

/// First occurrence wins; empty ids are skipped; at most `cap` ids are kept.
pub fn dedupe_mention_ids(raw_ids: &[String], cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .take(cap)
        .map(str::to_string)
        .collect()
}

/// Load the mentioned transcripts `user` may see, in mention order.
///
/// One gate call, then at most one batched fetch. Nothing is fetched when no
/// mention survives the gate.
pub fn load_mention_documents<S>(
    store: &S,
    user: &UserIdentity,
    model: &str,
    raw_ids: &[String],
) -> Result<Vec<PromptMentionDocument>>
where
    S: VisibilityStore + TranscriptContentStore + ?Sized,
{
    let requested = dedupe_mention_ids(raw_ids, max_mentions(model));
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let visible = filter_visible_transcript_ids_for_user(store, user, &requested);
    if visible.len() < requested.len() {
        log::debug!(
            "Dropped {} of {} mentions for user {}",
            requested.len() - visible.len(),
            requested.len(),
            user.user_id
        );
    }
    if visible.is_empty() {
        return Ok(Vec::new());
    }

    let bodies = store.fetch_transcripts_by_ids(&visible)?;
    Ok(bodies.into_iter().map(PromptMentionDocument::from).collect())
}
