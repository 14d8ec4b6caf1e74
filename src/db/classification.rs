use std::collections::HashMap;

use chrono::Utc;
use rusqlite::params;

use super::*;
use crate::types::Visibility;

impl TranscriptDb {
    /// Insert or replace the classification row for a transcript.
    pub fn upsert_classification(&self, record: &DbClassification) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO transcript_classification (
                transcript_id, visibility, classification_reason, is_weekly_exception,
                normalized_title, attendee_count, external_attendee_count, classified_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(transcript_id) DO UPDATE SET
                visibility = excluded.visibility,
                classification_reason = excluded.classification_reason,
                is_weekly_exception = excluded.is_weekly_exception,
                normalized_title = excluded.normalized_title,
                attendee_count = excluded.attendee_count,
                external_attendee_count = excluded.external_attendee_count,
                classified_at = excluded.classified_at,
                updated_at = excluded.updated_at",
            params![
                record.transcript_id,
                record.visibility.as_str(),
                record.reason.as_str(),
                record.is_weekly_exception as i32,
                record.normalized_title,
                record.attendee_count,
                record.external_attendee_count,
                record.classified_at,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_classification(&self, transcript_id: &str) -> Result<Option<DbClassification>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT transcript_id, visibility, classification_reason, is_weekly_exception,
                    normalized_title, attendee_count, external_attendee_count, classified_at
             FROM transcript_classification
             WHERE transcript_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![transcript_id], |row| {
            Ok(DbClassification {
                transcript_id: row.get(0)?,
                visibility: parse_text_column(1, row.get(1)?)?,
                reason: parse_text_column(2, row.get(2)?)?,
                is_weekly_exception: row.get::<_, i32>(3)? != 0,
                normalized_title: row.get(4)?,
                attendee_count: row.get(5)?,
                external_attendee_count: row.get(6)?,
                classified_at: row.get(7)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Persisted visibility for each of `transcript_ids` that has a classification row.
    /// Ids without a row are absent from the map.
    pub fn visibility_for_ids(
        &self,
        transcript_ids: &[String],
    ) -> Result<HashMap<String, Visibility>, DbError> {
        if transcript_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT transcript_id, visibility FROM transcript_classification
             WHERE transcript_id IN ({})",
            in_placeholders(transcript_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(transcript_ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, parse_text_column::<Visibility>(1, row.get(1)?)?))
        })?;
        Ok(rows.collect::<Result<HashMap<_, _>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{seed_transcript, test_db};
    use super::*;
    use crate::types::ClassificationReason;

    fn record(transcript_id: &str, reason: ClassificationReason) -> DbClassification {
        DbClassification {
            transcript_id: transcript_id.to_string(),
            visibility: reason.visibility(),
            reason,
            is_weekly_exception: reason == ClassificationReason::WeeklyException,
            normalized_title: "sync".to_string(),
            attendee_count: 2,
            external_attendee_count: 0,
            classified_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_upsert_replaces_row() {
        let db = test_db();
        let id = seed_transcript(&db, "s-1", "Sync", &[]);
        db.upsert_classification(&record(&id, ClassificationReason::NoAttendees))
            .unwrap();
        db.upsert_classification(&record(&id, ClassificationReason::ExternalAttendee))
            .unwrap();

        let stored = db.get_classification(&id).unwrap().unwrap();
        assert_eq!(stored.reason, ClassificationReason::ExternalAttendee);
        assert_eq!(stored.visibility, Visibility::NonPrivate);

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM transcript_classification", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_visibility_for_ids_skips_unclassified() {
        let db = test_db();
        let a = seed_transcript(&db, "s-a", "A", &[]);
        let b = seed_transcript(&db, "s-b", "B", &[]);
        db.upsert_classification(&record(&a, ClassificationReason::InternalAttendeesOnly))
            .unwrap();

        let map = db.visibility_for_ids(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(map.get(&a), Some(&Visibility::Private));
        assert!(!map.contains_key(&b));
    }

    #[test]
    fn test_missing_classification_is_none() {
        let db = test_db();
        assert!(db.get_classification("nope").unwrap().is_none());
    }
}
