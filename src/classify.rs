//! Transcript visibility classification.
//!
//! Decision table, first match wins:
//!   1. Weekly exception: exact canonical weekly planning title → non_private
//!   2. No attendees → private (absent attendee data never defaults to shareable)
//!   3. Any attendee with a non-internal domain → non_private
//!   4. Otherwise → private
//!
//! `compute_classification` is total and pure. `classify_and_store` is the thin
//! persistence wrapper that timestamps and upserts the result.

use chrono::Utc;
use serde::Serialize;

use crate::db::{DbClassification, DbError};
use crate::normalize::{extract_domain, is_weekly_planning_title, normalize_title, InternalDomains};
use crate::store::ClassificationStore;
use crate::types::{ClassificationReason, Visibility};

/// Input to the classifier.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    pub title: &'a str,
    pub attendee_emails: &'a [String],
    pub internal_domains: &'a InternalDomains,
}

/// Result of classification, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationDecision {
    pub visibility: Visibility,
    pub reason: ClassificationReason,
    pub is_weekly_exception: bool,
    pub normalized_title: String,
    pub attendee_count: usize,
    pub external_attendee_count: usize,
}

impl ClassificationDecision {
    fn from_reason(
        reason: ClassificationReason,
        normalized_title: String,
        attendee_count: usize,
        external_attendee_count: usize,
    ) -> Self {
        Self {
            visibility: reason.visibility(),
            reason,
            is_weekly_exception: reason == ClassificationReason::WeeklyException,
            normalized_title,
            attendee_count,
            external_attendee_count,
        }
    }
}

/// Classify a transcript from its title and attendee emails.
pub fn compute_classification(input: ClassificationInput<'_>) -> ClassificationDecision {
    let normalized_title = normalize_title(input.title);
    let attendee_count = input.attendee_emails.len();

    // ---- Step 1: Weekly exception (external count intentionally not computed) ----
    if is_weekly_planning_title(input.title) {
        return ClassificationDecision::from_reason(
            ClassificationReason::WeeklyException,
            normalized_title,
            attendee_count,
            0,
        );
    }

    // ---- Step 2: No attendees → fail closed ----
    if attendee_count == 0 {
        return ClassificationDecision::from_reason(
            ClassificationReason::NoAttendees,
            normalized_title,
            0,
            0,
        );
    }

    // ---- Step 3: External attendees ----
    let external_attendee_count = count_external_attendees(input.attendee_emails, input.internal_domains);
    if external_attendee_count > 0 {
        return ClassificationDecision::from_reason(
            ClassificationReason::ExternalAttendee,
            normalized_title,
            attendee_count,
            external_attendee_count,
        );
    }

    // ---- Step 4: Internal only ----
    ClassificationDecision::from_reason(
        ClassificationReason::InternalAttendeesOnly,
        normalized_title,
        attendee_count,
        0,
    )
}

/// Attendees whose domain is outside the internal set.
/// Emails with no extractable domain are not counted.
pub fn count_external_attendees(emails: &[String], internal_domains: &InternalDomains) -> usize {
    emails
        .iter()
        .filter_map(|email| extract_domain(email))
        .filter(|domain| !internal_domains.contains(domain))
        .count()
}

/// Classify and upsert the classification row for one transcript.
///
/// Storage errors propagate: the caller decides whether to retry or skip.
pub fn classify_and_store<S: ClassificationStore + ?Sized>(
    store: &S,
    transcript_id: &str,
    input: ClassificationInput<'_>,
) -> Result<DbClassification, DbError> {
    let decision = compute_classification(input);
    let now = Utc::now().to_rfc3339();
    let record = DbClassification {
        transcript_id: transcript_id.to_string(),
        visibility: decision.visibility,
        reason: decision.reason,
        is_weekly_exception: decision.is_weekly_exception,
        normalized_title: decision.normalized_title,
        attendee_count: decision.attendee_count as i64,
        external_attendee_count: decision.external_attendee_count as i64,
        classified_at: now,
    };

    store.upsert_classification(&record)?;
    log::debug!(
        "Classified transcript {}: {} ({})",
        transcript_id,
        record.visibility,
        record.reason
    );
    Ok(record)
}

// ============================================================================
// Tests
// ============================================================================
