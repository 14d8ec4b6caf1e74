//! Shared type definitions for the database layer.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ClassificationReason, LinkSource, Visibility};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// Failure reported by a non-SQLite store implementation.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Parse a TEXT column into one of the domain enums.
pub(crate) fn parse_text_column<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

/// Comma-separated `?` placeholders for an `IN (...)` list.
pub(crate) fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Transcript fields supplied by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTranscript {
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub meeting_date: Option<String>,
}

/// A row from the `transcripts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTranscript {
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub meeting_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Listing projection of a transcript (no body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSummaryRow {
    pub id: String,
    pub title: String,
    pub meeting_date: Option<String>,
    pub summary: Option<String>,
}

/// The body of a transcript as fed into a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptBody {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// Keyset-pagination row used by the backfill driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptPageRow {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

/// A row from `transcript_attendees`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAttendee {
    pub transcript_id: String,
    pub email: String,
    pub normalized_email: String,
    pub name: Option<String>,
}

/// A row from `transcript_classification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbClassification {
    pub transcript_id: String,
    pub visibility: Visibility,
    pub reason: ClassificationReason,
    pub is_weekly_exception: bool,
    pub normalized_title: String,
    pub attendee_count: i64,
    pub external_attendee_count: i64,
    pub classified_at: String,
}

/// A row from `transcript_project_links`. At most one per transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbProjectLink {
    pub transcript_id: String,
    pub project_id: String,
    pub source: LinkSource,
    pub updated_at: String,
}

/// A row from the `clients` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbClient {
    pub id: String,
    pub name: String,
    pub owner_user_id: Option<String>,
    pub created_at: String,
}

/// A row from the `projects` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbProject {
    pub id: String,
    pub client_id: String,
    pub name: String,
    /// "client" or "global".
    pub scope: String,
    pub is_inbox: bool,
    pub owner_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_markdown: Option<String>,
    pub created_at: String,
}

/// The slice of a project the access checks need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectAccessRow {
    pub id: String,
    pub client_id: String,
    pub owner_user_id: Option<String>,
}

/// All project and client memberships of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub project_ids: HashSet<String>,
    pub client_ids: HashSet<String>,
}

/// A row from `audit_events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuditEvent {
    pub id: i64,
    pub actor_user_id: Option<String>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub request_id: Option<String>,
    pub payload: String,
    pub created_at: String,
}
