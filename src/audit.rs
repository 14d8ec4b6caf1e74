//! Best-effort audit trail for transcript lifecycle events.
//!
//! Audit writes live in their own failure domain: a failed insert is logged
//! and swallowed so it can never change an ingestion, relink or read result.

use serde_json::Value;

use crate::db::TranscriptDb;

pub const ENTITY_TRANSCRIPT: &str = "transcript";

pub const EVENT_INGESTED: &str = "transcript.ingested";
pub const EVENT_CLASSIFIED: &str = "transcript.classified";
pub const EVENT_ROUTED: &str = "transcript.routed";
pub const EVENT_RELINKED: &str = "transcript.relinked";

/// One audit record about a transcript.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub event_type: &'a str,
    pub transcript_id: &'a str,
    pub actor_user_id: Option<&'a str>,
    pub request_id: Option<&'a str>,
    pub payload: Value,
}

/// Write an audit event. Returns whether the write landed.
pub fn write_audit_event(db: &TranscriptDb, event: &AuditEvent<'_>) -> bool {
    match db.insert_audit_event(
        event.actor_user_id,
        event.event_type,
        ENTITY_TRANSCRIPT,
        Some(event.transcript_id),
        event.request_id,
        &event.payload,
    ) {
        Ok(_) => true,
        Err(e) => {
            log::warn!(
                "Audit write failed for {} on transcript {}: {}",
                event.event_type,
                event.transcript_id,
                e
            );
            false
        }
    }
}
