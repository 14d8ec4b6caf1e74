//! Per-user visibility gate for transcripts.
//!
//! Every read surface asks the gate fresh; persisted classification is never
//! trusted alone. A transcript is visible to a user when:
//!   - its classification is `non_private`, or
//!   - it is `private` and the user attended it, is an admin, or can access
//!     the project the transcript is linked to.
//!
//! The gate fails closed. A missing classification row, a missing link, or
//! any storage error makes the transcript invisible; errors are logged, never
//! returned to the read path.

use std::collections::{HashMap, HashSet};

use serde_json::json;

use crate::acl::project_accessible;
use crate::audit::{self, AuditEvent};
use crate::db::{DbError, DbProjectLink, TranscriptDb};
use crate::error::{GateError, Result};
use crate::normalize::normalize_email;
use crate::store::{ClassificationStore, VisibilityStore};
use crate::types::{LinkSource, UserIdentity, Visibility};

/// Batch form of the gate. Returns the visible subset of `transcript_ids`,
/// in input order (duplicates are kept or dropped together).
///
/// All ids are evaluated together with one query per lookup kind; a denial
/// for one id never affects another. When the classification lookup fails the
/// result is empty. When a later lookup fails only the private ids still
/// pending at that point are denied.
pub fn filter_visible_transcript_ids_for_user<S: VisibilityStore + ?Sized>(
    store: &S,
    user: &UserIdentity,
    transcript_ids: &[String],
) -> Vec<String> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = transcript_ids
        .iter()
        .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
        .cloned()
        .collect();
    if unique.is_empty() {
        return Vec::new();
    }

    match visible_set(store, user, &unique) {
        Ok(visible) => transcript_ids
            .iter()
            .filter(|id| visible.contains(id.as_str()))
            .cloned()
            .collect(),
        Err(e) => {
            log::warn!(
                "Visibility lookup failed for user {} ({} ids); denying all: {}",
                user.user_id,
                unique.len(),
                e
            );
            Vec::new()
        }
    }
}

/// Single-id form of the gate.
pub fn can_user_view_transcript<S: VisibilityStore + ?Sized>(
    store: &S,
    user: &UserIdentity,
    transcript_id: &str,
) -> bool {
    let ids = [transcript_id.to_string()];
    !filter_visible_transcript_ids_for_user(store, user, &ids).is_empty()
}

/// Read-path guard: `NotFound` when the user may not see the transcript, so a
/// denial is indistinguishable from a missing row.
pub fn require_visible<S: VisibilityStore + ?Sized>(
    store: &S,
    user: &UserIdentity,
    transcript_id: &str,
) -> Result<()> {
    if can_user_view_transcript(store, user, transcript_id) {
        Ok(())
    } else {
        Err(GateError::NotFound)
    }
}

fn visible_set<S: VisibilityStore + ?Sized>(
    store: &S,
    user: &UserIdentity,
    ids: &[String],
) -> std::result::Result<HashSet<String>, DbError> {
    let visibility = store.visibility_for(ids)?;
    let mut visible = HashSet::new();
    let mut private_ids = Vec::new();

    for id in ids {
        match visibility.get(id) {
            Some(Visibility::NonPrivate) => {
                visible.insert(id.clone());
            }
            Some(Visibility::Private) => private_ids.push(id.clone()),
            None => {}
        }
    }
    if private_ids.is_empty() {
        return Ok(visible);
    }

    let pending = private_ids.len();
    if let Err(e) = extend_with_private(store, user, private_ids, &mut visible) {
        log::warn!(
            "Private access lookup failed for user {} ({} private ids); denying pending: {}",
            user.user_id,
            pending,
            e
        );
    }
    Ok(visible)
}

/// Adds the private ids the user may see. Ids are only inserted once the
/// lookups deciding them have succeeded, so an error leaves every id still
/// pending denied.
fn extend_with_private<S: VisibilityStore + ?Sized>(
    store: &S,
    user: &UserIdentity,
    private_ids: Vec<String>,
    visible: &mut HashSet<String>,
) -> std::result::Result<(), DbError> {
    // Attendees always see their own meetings
    let attended = store.attended_by(&private_ids, &normalize_email(&user.email))?;
    let remaining: Vec<String> = private_ids
        .into_iter()
        .filter(|id| {
            if attended.contains(id) {
                visible.insert(id.clone());
                false
            } else {
                true
            }
        })
        .collect();
    if remaining.is_empty() {
        return Ok(());
    }

    if store.is_admin(&user.user_id)? {
        visible.extend(remaining);
        return Ok(());
    }

    let links: HashMap<String, String> = store.project_links_for(&remaining)?;
    if links.is_empty() {
        return Ok(());
    }
    let mut project_ids: Vec<String> = links.values().cloned().collect();
    project_ids.sort();
    project_ids.dedup();

    let projects = store.project_access_rows(&project_ids)?;
    let memberships = store.membership_snapshot(&user.user_id)?;
    let accessible: HashSet<&str> = projects
        .iter()
        .filter(|p| project_accessible(&user.user_id, p, &memberships))
        .map(|p| p.id.as_str())
        .collect();

    for id in remaining {
        if links
            .get(&id)
            .is_some_and(|project_id| accessible.contains(project_id.as_str()))
        {
            visible.insert(id);
        }
    }
    Ok(())
}

// =============================================================================
// Relink
// =============================================================================

/// Reject relinking of private transcripts, whoever the caller is.
///
/// A transcript without a classification row is rejected too: relinking is
/// only allowed once the transcript is known to be non-private.
pub fn assert_transcript_relink_allowed<S: ClassificationStore + ?Sized>(
    store: &S,
    transcript_id: &str,
) -> Result<()> {
    match store.get_classification(transcript_id)? {
        Some(record) if record.visibility == Visibility::NonPrivate => Ok(()),
        Some(_) => Err(GateError::access_denied("Private transcripts cannot be relinked")),
        None => Err(GateError::access_denied("Unclassified transcripts cannot be relinked")),
    }
}

/// Admin-only manual relink of a transcript to another project.
pub fn relink_transcript(
    db: &TranscriptDb,
    actor: &UserIdentity,
    transcript_id: &str,
    project_id: &str,
    request_id: Option<&str>,
) -> Result<DbProjectLink> {
    if db.get_transcript(transcript_id)?.is_none() {
        return Err(GateError::NotFound);
    }
    assert_transcript_relink_allowed(db, transcript_id)?;
    if !db.user_is_admin(&actor.user_id)? {
        return Err(GateError::access_denied("Only admins can relink transcripts"));
    }
    if db.get_project(project_id)?.is_none() {
        return Err(GateError::InvalidInput(format!("Unknown project {}", project_id)));
    }

    db.with_transaction(|tx| -> Result<DbProjectLink> {
        let previous = tx.get_project_link(transcript_id)?;
        tx.upsert_project_link(transcript_id, project_id, LinkSource::ManualRelink)?;
        audit::write_audit_event(
            tx,
            &AuditEvent {
                event_type: audit::EVENT_RELINKED,
                transcript_id,
                actor_user_id: Some(&actor.user_id),
                request_id,
                payload: json!({
                    "from_project_id": previous.map(|link| link.project_id),
                    "to_project_id": project_id,
                }),
            },
        );
        tx.get_project_link(transcript_id)?
            .ok_or(GateError::NotFound)
    })
    .inspect(|_| {
        log::info!(
            "Transcript {} relinked to project {} by {}",
            transcript_id,
            project_id,
            actor.user_id
        )
    })
}
