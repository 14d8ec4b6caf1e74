//! Read surfaces over transcripts.
//!
//! Every function here asks the visibility gate before any transcript payload
//! is returned. Lists and searches drop rows the user may not see; single-row
//! reads answer `NotFound` for a denial, exactly as for a missing row. Single
//! rows are gated before their body is read.

use serde::Serialize;

use crate::acl;
use crate::db::{DbAttendee, DbClassification, TranscriptDb, TranscriptSummaryRow};
use crate::error::{GateError, Result};
use crate::types::UserIdentity;
use crate::visibility::{filter_visible_transcript_ids_for_user, require_visible};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;
pub const MENTION_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptDetail {
    pub id: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub meeting_date: Option<String>,
    pub created_at: String,
    pub attendees: Vec<DbAttendee>,
    pub classification: Option<DbClassification>,
    pub project_id: Option<String>,
}

/// Raw export of a transcript as stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptExport {
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionSuggestion {
    pub id: String,
    pub title: String,
    pub meeting_date: Option<String>,
}

fn page_size(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn required_query(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(GateError::InvalidInput("Search query is required".to_string()));
    }
    Ok(query)
}

/// Keep the rows the gate lets through, in their original order.
fn gate_rows(
    db: &TranscriptDb,
    user: &UserIdentity,
    rows: Vec<TranscriptSummaryRow>,
) -> Vec<TranscriptSummaryRow> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let visible = filter_visible_transcript_ids_for_user(db, user, &ids);
    let hidden = rows.len() - visible.len();
    if hidden > 0 {
        log::debug!("Filtered {} hidden transcripts for user {}", hidden, user.user_id);
    }
    let mut visible = visible.into_iter().peekable();
    rows.into_iter()
        .filter(|row| {
            if visible.peek() == Some(&row.id) {
                visible.next();
                true
            } else {
                false
            }
        })
        .collect()
}

/// Newest first. A page may come back shorter than `limit` when rows in it
/// are hidden from the user.
pub fn list_transcripts(
    db: &TranscriptDb,
    user: &UserIdentity,
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<TranscriptSummaryRow>> {
    let rows = db.list_transcript_summaries(page_size(limit), offset)?;
    Ok(gate_rows(db, user, rows))
}

pub fn search_transcripts(
    db: &TranscriptDb,
    user: &UserIdentity,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<TranscriptSummaryRow>> {
    let query = required_query(query)?;
    let rows = db.search_transcript_summaries(query, page_size(limit))?;
    Ok(gate_rows(db, user, rows))
}

pub fn transcript_detail(
    db: &TranscriptDb,
    user: &UserIdentity,
    transcript_id: &str,
) -> Result<TranscriptDetail> {
    require_visible(db, user, transcript_id)?;
    let transcript = db.get_transcript(transcript_id)?.ok_or(GateError::NotFound)?;
    let attendees = db.get_attendees(transcript_id)?;
    let classification = db.get_classification(transcript_id)?;
    let project_id = db.get_project_link(transcript_id)?.map(|l| l.project_id);

    Ok(TranscriptDetail {
        id: transcript.id,
        title: transcript.title,
        content: transcript.content,
        summary: transcript.summary,
        meeting_date: transcript.meeting_date,
        created_at: transcript.created_at,
        attendees,
        classification,
        project_id,
    })
}

pub fn transcript_source(
    db: &TranscriptDb,
    user: &UserIdentity,
    transcript_id: &str,
) -> Result<TranscriptExport> {
    require_visible(db, user, transcript_id)?;
    let transcript = db.get_transcript(transcript_id)?.ok_or(GateError::NotFound)?;
    Ok(TranscriptExport {
        id: transcript.id,
        source_id: transcript.source_id,
        title: transcript.title,
        content: transcript.content,
    })
}

/// Title search for the mention picker. Only visible transcripts are offered.
pub fn search_mentions(
    db: &TranscriptDb,
    user: &UserIdentity,
    query: &str,
) -> Result<Vec<MentionSuggestion>> {
    let query = required_query(query)?;
    let rows = db.search_transcript_titles(query, MENTION_SEARCH_LIMIT)?;
    Ok(gate_rows(db, user, rows)
        .into_iter()
        .map(|row| MentionSuggestion {
            id: row.id,
            title: row.title,
            meeting_date: row.meeting_date,
        })
        .collect())
}

/// Overview markdown of a project the user can access, for the chat prompt.
pub fn project_overview(
    db: &TranscriptDb,
    user: &UserIdentity,
    project_id: &str,
) -> Result<Option<String>> {
    acl::assert_project_access(db, &user.user_id, project_id)?;
    Ok(db
        .get_project(project_id)?
        .and_then(|p| p.overview_markdown)
        .filter(|md| !md.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_transcript;
    use crate::normalize::InternalDomains;
    use crate::sources::{NormalizedTranscript, RawAttendee};
    use crate::types::{ClassificationReason, Visibility};
    use chrono::{TimeZone, Utc};

    fn ingest(db: &TranscriptDb, source_id: &str, title: &str, attendees: &[&str]) -> String {
        let transcript = NormalizedTranscript {
            source_id: source_id.to_string(),
            title: title.to_string(),
            content: format!("Notes from {}", title),
            summary: None,
            date: Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0).unwrap(),
            attendees: attendees
                .iter()
                .map(|email| RawAttendee {
                    email: email.to_string(),
                    name: None,
                })
                .collect(),
        };
        ingest_transcript(db, &InternalDomains::defaults(), &transcript)
            .unwrap()
            .transcript_id
    }

    /// Scenarios A-C ingested, plus a private 1:1.
    fn fixture() -> (TranscriptDb, [String; 4]) {
        let db = test_db_with_projects();
        let weekly = ingest(&db, "cb:a", "Oxy <> Weekly Planning", &["member@oxy.so"]);
        let notes = ingest(&db, "cb:b", "Oxy <> Weekly Planning Notes", &["member@oxy.so"]);
        let client = ingest(&db, "cb:c", "Client Sync", &["member@oxy.so", "client@acme.com"]);
        let private = ingest(&db, "cb:d", "Comp Review", &["boss@oxy.so", "member@oxy.so"]);
        (db, [weekly, notes, client, private])
    }

    fn test_db_with_projects() -> TranscriptDb {
        let db = crate::db::test_utils::test_db();
        crate::db::test_utils::seed_project(&db, "c1", "Acme", "p1", "Acme Delivery", false);
        db.add_project_domain("p1", "acme.com").unwrap();
        db
    }

    fn outsider() -> UserIdentity {
        UserIdentity::new("outsider", "outsider@oxy.so")
    }

    #[test]
    fn test_ingested_scenarios_classify_as_expected() {
        let (db, [weekly, notes, client, _]) = fixture();
        let weekly = db.get_classification(&weekly).unwrap().unwrap();
        assert_eq!(weekly.visibility, Visibility::NonPrivate);
        assert_eq!(weekly.reason, ClassificationReason::WeeklyException);

        let notes = db.get_classification(&notes).unwrap().unwrap();
        assert_eq!(notes.visibility, Visibility::Private);
        assert_eq!(notes.reason, ClassificationReason::InternalAttendeesOnly);

        let client = db.get_classification(&client).unwrap().unwrap();
        assert_eq!(client.visibility, Visibility::NonPrivate);
        assert_eq!(client.reason, ClassificationReason::ExternalAttendee);
        assert_eq!(client.external_attendee_count, 1);
    }

    #[test]
    fn test_private_transcript_hidden_from_every_surface() {
        let (db, [weekly, notes, client, private]) = fixture();
        let user = outsider();

        let listed: Vec<String> = list_transcripts(&db, &user, None, 0)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert!(listed.contains(&weekly));
        assert!(listed.contains(&client));
        assert!(!listed.contains(&private));
        assert!(!listed.contains(&notes));

        let found = search_transcripts(&db, &user, "comp review", None).unwrap();
        assert!(found.is_empty());
        let found = search_transcripts(&db, &user, "Notes from", None).unwrap();
        assert_eq!(found.len(), 2);

        assert!(matches!(transcript_detail(&db, &user, &private), Err(GateError::NotFound)));
        assert!(matches!(transcript_source(&db, &user, &private), Err(GateError::NotFound)));
        assert!(matches!(transcript_detail(&db, &user, "no-such-id"), Err(GateError::NotFound)));

        assert!(search_mentions(&db, &user, "Comp").unwrap().is_empty());
    }

    #[test]
    fn test_attendee_and_admin_see_private_transcript() {
        let (db, [_, _, _, private]) = fixture();
        let boss = UserIdentity::new("boss", "boss@oxy.so");
        let detail = transcript_detail(&db, &boss, &private).unwrap();
        assert_eq!(detail.title, "Comp Review");
        assert_eq!(detail.attendees.len(), 2);
        assert_eq!(
            detail.classification.map(|c| c.reason),
            Some(ClassificationReason::InternalAttendeesOnly)
        );

        db.set_user_role("root", "admin").unwrap();
        let admin = UserIdentity::new("root", "root@oxy.so");
        let source = transcript_source(&db, &admin, &private).unwrap();
        assert_eq!(source.source_id, "cb:d");
        assert_eq!(search_mentions(&db, &admin, "comp").unwrap().len(), 1);
    }

    #[test]
    fn test_project_member_sees_linked_private_transcript() {
        let db = test_db_with_projects();
        db.add_project_alias("p1", "Acme Internal Prep").unwrap();
        let prep = ingest(&db, "cb:e", "Acme Internal Prep", &["member@oxy.so"]);
        db.add_project_member("delivery-lead", "p1").unwrap();

        let lead = UserIdentity::new("delivery-lead", "lead@oxy.so");
        let detail = transcript_detail(&db, &lead, &prep).unwrap();
        assert_eq!(detail.project_id.as_deref(), Some("p1"));
        assert!(transcript_detail(&db, &outsider(), &prep).is_err());
    }

    #[test]
    fn test_blank_query_is_invalid_input() {
        let (db, _) = fixture();
        assert!(matches!(
            search_transcripts(&db, &outsider(), "  ", None),
            Err(GateError::InvalidInput(_))
        ));
        assert!(matches!(
            search_mentions(&db, &outsider(), ""),
            Err(GateError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_project_overview_requires_access() {
        let db = test_db_with_projects();
        db.set_project_overview("p1", Some("## Acme\nRollout in Q2")).unwrap();
        db.add_client_member("acme-team", "c1").unwrap();

        let member = UserIdentity::new("acme-team", "team@oxy.so");
        assert_eq!(
            project_overview(&db, &member, "p1").unwrap().as_deref(),
            Some("## Acme\nRollout in Q2")
        );
        assert!(project_overview(&db, &outsider(), "p1")
            .unwrap_err()
            .is_access_denied());
    }

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(10_000)), MAX_PAGE_SIZE);
    }
}
