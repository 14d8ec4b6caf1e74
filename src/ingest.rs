//! Transcript ingestion.
//!
//! One transaction per transcript: the row is upserted by `source_id`,
//! attendees are normalized and stored, then classification and routing are
//! recomputed from the stored attendee set. Audit events record what changed.

use serde::Serialize;
use serde_json::json;

use crate::audit::{self, AuditEvent};
use crate::classify::{classify_and_store, ClassificationInput};
use crate::db::{DbClassification, TranscriptDb};
use crate::error::{GateError, Result};
use crate::normalize::{normalize_attendee, unique_domains, InternalDomains, NormalizedAttendee};
use crate::routing::{route_and_store, StoredLink};
use crate::sources::NormalizedTranscript;
use crate::types::{ClassificationReason, LinkSource, Visibility};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub transcript_id: String,
    pub is_new: bool,
    pub visibility: Visibility,
    pub reason: ClassificationReason,
    pub project_id: Option<String>,
    pub link_source: Option<LinkSource>,
}

/// Derived state after classification and routing, with change flags
/// relative to what was stored before.
#[derive(Debug, Clone)]
pub(crate) struct Reconciled {
    pub classification: DbClassification,
    pub classification_changed: bool,
    pub link: StoredLink,
    pub link_changed: bool,
}

/// Ingest one normalized transcript.
pub fn ingest_transcript(
    db: &TranscriptDb,
    internal_domains: &InternalDomains,
    transcript: &NormalizedTranscript,
) -> Result<IngestOutcome> {
    if transcript.source_id.trim().is_empty() {
        return Err(GateError::InvalidInput("source_id is required".to_string()));
    }

    let attendees: Vec<NormalizedAttendee> = transcript
        .attendees
        .iter()
        .filter_map(|a| normalize_attendee(&a.email, a.name.as_deref()))
        .collect();
    let skipped = transcript.attendees.len() - attendees.len();
    if skipped > 0 {
        log::warn!(
            "Skipped {} malformed attendee rows for {}",
            skipped,
            transcript.source_id
        );
    }

    let outcome = db.with_transaction(|db| -> Result<IngestOutcome> {
        let (transcript_id, is_new) = db.upsert_transcript(&transcript.to_new_transcript())?;
        db.upsert_attendees(&transcript_id, &attendees)?;

        if is_new {
            audit::write_audit_event(
                db,
                &AuditEvent {
                    event_type: audit::EVENT_INGESTED,
                    transcript_id: &transcript_id,
                    actor_user_id: None,
                    request_id: None,
                    payload: json!({
                        "source_id": transcript.source_id,
                        "attendee_count": attendees.len(),
                    }),
                },
            );
        }

        let reconciled = reconcile(db, internal_domains, &transcript_id, &transcript.title)?;
        Ok(IngestOutcome {
            transcript_id,
            is_new,
            visibility: reconciled.classification.visibility,
            reason: reconciled.classification.reason,
            project_id: reconciled.link.project_id,
            link_source: reconciled.link.source,
        })
    })?;

    log::info!(
        "Ingested {} as {} ({}, {})",
        transcript.source_id,
        outcome.transcript_id,
        if outcome.is_new { "new" } else { "updated" },
        outcome.visibility
    );
    Ok(outcome)
}

/// Recompute classification and routing for a stored transcript and audit
/// whatever changed. Runs inside the caller's transaction, if any.
pub(crate) fn reconcile(
    db: &TranscriptDb,
    internal_domains: &InternalDomains,
    transcript_id: &str,
    title: &str,
) -> Result<Reconciled> {
    let stored = db.get_attendees(transcript_id)?;
    let emails: Vec<String> = stored.iter().map(|a| a.normalized_email.clone()).collect();
    let domains = unique_domains(&emails);

    let previous_classification = db.get_classification(transcript_id)?;
    let classification = classify_and_store(
        db,
        transcript_id,
        ClassificationInput {
            title,
            attendee_emails: &emails,
            internal_domains,
        },
    )?;
    let classification_changed = previous_classification
        .as_ref()
        .map_or(true, |prev| !same_decision(prev, &classification));
    if classification_changed {
        audit::write_audit_event(
            db,
            &AuditEvent {
                event_type: audit::EVENT_CLASSIFIED,
                transcript_id,
                actor_user_id: None,
                request_id: None,
                payload: json!({
                    "visibility": classification.visibility,
                    "reason": classification.reason,
                    "previous_visibility": previous_classification.as_ref().map(|p| p.visibility),
                }),
            },
        );
    }

    let previous_link = StoredLink::from_record(db.get_project_link(transcript_id)?);
    let link = route_and_store(db, transcript_id, title, &domains)?;
    let link_changed = link != previous_link;
    if link_changed {
        audit::write_audit_event(
            db,
            &AuditEvent {
                event_type: audit::EVENT_ROUTED,
                transcript_id,
                actor_user_id: None,
                request_id: None,
                payload: json!({
                    "project_id": link.project_id,
                    "source": link.source,
                    "previous_project_id": previous_link.project_id,
                }),
            },
        );
    }

    Ok(Reconciled {
        classification,
        classification_changed,
        link,
        link_changed,
    })
}

fn same_decision(a: &DbClassification, b: &DbClassification) -> bool {
    a.visibility == b.visibility
        && a.reason == b.reason
        && a.is_weekly_exception == b.is_weekly_exception
        && a.normalized_title == b.normalized_title
        && a.attendee_count == b.attendee_count
        && a.external_attendee_count == b.external_attendee_count
}
