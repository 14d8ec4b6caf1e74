use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rusqlite::params;

use super::*;
use crate::normalize::NormalizedAttendee;

impl TranscriptDb {
    // =========================================================================
    // Transcripts
    // =========================================================================

    /// Insert or refresh a transcript keyed by `source_id`.
    /// Returns the transcript id and whether the row was newly inserted.
    pub fn upsert_transcript(&self, transcript: &NewTranscript) -> Result<(String, bool), DbError> {
        let now = Utc::now().to_rfc3339();
        if let Some(existing_id) = self.transcript_id_for_source(&transcript.source_id)? {
            self.conn.execute(
                "UPDATE transcripts
                 SET title = ?1, content = ?2, summary = ?3, meeting_date = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    transcript.title,
                    transcript.content,
                    transcript.summary,
                    transcript.meeting_date,
                    now,
                    existing_id,
                ],
            )?;
            return Ok((existing_id, false));
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO transcripts (
                id, source_id, title, content, summary, meeting_date, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                transcript.source_id,
                transcript.title,
                transcript.content,
                transcript.summary,
                transcript.meeting_date,
                now,
            ],
        )?;
        Ok((id, true))
    }

    pub fn transcript_id_for_source(&self, source_id: &str) -> Result<Option<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM transcripts WHERE source_id = ?1")?;
        let mut rows = stmt.query_map(params![source_id], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_transcript(&self, id: &str) -> Result<Option<DbTranscript>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, title, content, summary, meeting_date, created_at, updated_at
             FROM transcripts WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_transcript_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn map_transcript_row(row: &rusqlite::Row) -> rusqlite::Result<DbTranscript> {
        Ok(DbTranscript {
            id: row.get(0)?,
            source_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            summary: row.get(4)?,
            meeting_date: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn map_summary_row(row: &rusqlite::Row) -> rusqlite::Result<TranscriptSummaryRow> {
        Ok(TranscriptSummaryRow {
            id: row.get(0)?,
            title: row.get(1)?,
            meeting_date: row.get(2)?,
            summary: row.get(3)?,
        })
    }

    /// Newest-first listing without bodies.
    pub fn list_transcript_summaries(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TranscriptSummaryRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, meeting_date, summary
             FROM transcripts
             ORDER BY COALESCE(meeting_date, created_at) DESC, id ASC
             LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], Self::map_summary_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Case-insensitive substring search over title, summary and body.
    pub fn search_transcript_summaries(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TranscriptSummaryRow>, DbError> {
        let pattern = like_pattern(query);
        let mut stmt = self.conn.prepare(
            "SELECT id, title, meeting_date, summary
             FROM transcripts
             WHERE title LIKE ?1 ESCAPE '\\'
                OR COALESCE(summary, '') LIKE ?1 ESCAPE '\\'
                OR content LIKE ?1 ESCAPE '\\'
             ORDER BY COALESCE(meeting_date, created_at) DESC, id ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], Self::map_summary_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Title-only search used by the mention picker.
    pub fn search_transcript_titles(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TranscriptSummaryRow>, DbError> {
        let pattern = like_pattern(query);
        let mut stmt = self.conn.prepare(
            "SELECT id, title, meeting_date, summary
             FROM transcripts
             WHERE title LIKE ?1 ESCAPE '\\'
             ORDER BY COALESCE(meeting_date, created_at) DESC, id ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], Self::map_summary_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetch `{id, title, content}` for the given ids in one query.
    /// The result follows the order of `ids`; unknown ids are skipped.
    pub fn fetch_transcripts_by_ids(&self, ids: &[String]) -> Result<Vec<TranscriptBody>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, title, content FROM transcripts WHERE id IN ({})",
            in_placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(TranscriptBody {
                id: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
            })
        })?;
        let mut by_id: HashMap<String, TranscriptBody> = HashMap::new();
        for row in rows {
            let body = row?;
            by_id.insert(body.id.clone(), body);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// One page of transcripts ordered by `(created_at, id)`, strictly after `after`.
    pub fn transcript_page(
        &self,
        after: Option<(&str, &str)>,
        limit: usize,
    ) -> Result<Vec<TranscriptPageRow>, DbError> {
        let (after_created, after_id) = after.unwrap_or(("", ""));
        let mut stmt = self.conn.prepare(
            "SELECT id, title, created_at
             FROM transcripts
             WHERE created_at > ?1 OR (created_at = ?1 AND id > ?2)
             ORDER BY created_at ASC, id ASC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![after_created, after_id, limit as i64], |row| {
            Ok(TranscriptPageRow {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Attendees
    // =========================================================================

    /// Upsert attendee rows keyed by `(transcript_id, normalized_email)`.
    /// An incoming empty name never clears a stored one.
    pub fn upsert_attendees(
        &self,
        transcript_id: &str,
        attendees: &[NormalizedAttendee],
    ) -> Result<usize, DbError> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO transcript_attendees (transcript_id, email, normalized_email, name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(transcript_id, normalized_email) DO UPDATE SET
                email = excluded.email,
                name = COALESCE(excluded.name, transcript_attendees.name)",
        )?;
        let mut written = 0;
        for attendee in attendees {
            written += stmt.execute(params![
                transcript_id,
                attendee.email,
                attendee.normalized_email,
                attendee.name,
            ])?;
        }
        Ok(written)
    }

    pub fn get_attendees(&self, transcript_id: &str) -> Result<Vec<DbAttendee>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT transcript_id, email, normalized_email, name
             FROM transcript_attendees
             WHERE transcript_id = ?1
             ORDER BY normalized_email",
        )?;
        let rows = stmt.query_map(params![transcript_id], |row| {
            Ok(DbAttendee {
                transcript_id: row.get(0)?,
                email: row.get(1)?,
                normalized_email: row.get(2)?,
                name: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Of `transcript_ids`, the ones `normalized_email` attended.
    pub fn transcripts_attended_by(
        &self,
        transcript_ids: &[String],
        normalized_email: &str,
    ) -> Result<HashSet<String>, DbError> {
        if transcript_ids.is_empty() || normalized_email.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!(
            "SELECT DISTINCT transcript_id FROM transcript_attendees
             WHERE normalized_email = ? AND transcript_id IN ({})",
            in_placeholders(transcript_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bind = std::iter::once(normalized_email).chain(transcript_ids.iter().map(String::as_str));
        let rows = stmt.query_map(rusqlite::params_from_iter(bind), |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }
}

/// `%query%` with LIKE wildcards in the query escaped.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{seed_transcript, test_db};
    use super::*;

    fn new_transcript(source_id: &str, title: &str) -> NewTranscript {
        NewTranscript {
            source_id: source_id.to_string(),
            title: title.to_string(),
            content: "hello".to_string(),
            summary: None,
            meeting_date: None,
        }
    }

    #[test]
    fn test_upsert_dedups_by_source_id() {
        let db = test_db();
        let (first_id, is_new) = db.upsert_transcript(&new_transcript("cb:1", "Sync")).unwrap();
        assert!(is_new);

        let (second_id, is_new) = db
            .upsert_transcript(&new_transcript("cb:1", "Sync (renamed)"))
            .unwrap();
        assert!(!is_new);
        assert_eq!(first_id, second_id);

        let stored = db.get_transcript(&first_id).unwrap().unwrap();
        assert_eq!(stored.title, "Sync (renamed)");
        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM transcripts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_fetch_by_ids_keeps_caller_order() {
        let db = test_db();
        let a = seed_transcript(&db, "s-a", "Alpha", &[]);
        let b = seed_transcript(&db, "s-b", "Beta", &[]);

        let ids = vec![b.clone(), "missing".to_string(), a.clone()];
        let bodies = db.fetch_transcripts_by_ids(&ids).unwrap();
        let titles: Vec<_> = bodies.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Beta", "Alpha"]);
        assert!(db.fetch_transcripts_by_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_attendee_upsert_keeps_name() {
        let db = test_db();
        let id = seed_transcript(&db, "s-1", "Sync", &[]);
        let named = crate::normalize::normalize_attendee("Jane@Acme.com", Some("Jane")).unwrap();
        let unnamed = crate::normalize::normalize_attendee("jane@acme.com", None).unwrap();
        db.upsert_attendees(&id, &[named]).unwrap();
        db.upsert_attendees(&id, &[unnamed]).unwrap();

        let attendees = db.get_attendees(&id).unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].name.as_deref(), Some("Jane"));
        assert_eq!(attendees[0].normalized_email, "jane@acme.com");
    }

    #[test]
    fn test_transcripts_attended_by() {
        let db = test_db();
        let a = seed_transcript(&db, "s-a", "Alpha", &["me@oxy.so"]);
        let b = seed_transcript(&db, "s-b", "Beta", &["other@oxy.so"]);
        let attended = db
            .transcripts_attended_by(&[a.clone(), b.clone()], "me@oxy.so")
            .unwrap();
        assert!(attended.contains(&a));
        assert!(!attended.contains(&b));
    }

    #[test]
    fn test_search_escapes_wildcards() {
        let db = test_db();
        seed_transcript(&db, "s-a", "100% Review", &[]);
        seed_transcript(&db, "s-b", "1000 Review", &[]);
        let hits = db.search_transcript_titles("100%", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "100% Review");
    }

    #[test]
    fn test_transcript_page_walks_everything() {
        let db = test_db();
        for i in 0..5 {
            seed_transcript(&db, &format!("s-{}", i), &format!("T{}", i), &[]);
        }
        let mut seen = Vec::new();
        let mut cursor: Option<(String, String)> = None;
        loop {
            let page = db
                .transcript_page(cursor.as_ref().map(|(c, i)| (c.as_str(), i.as_str())), 2)
                .unwrap();
            if page.is_empty() {
                break;
            }
            let last = page.last().unwrap();
            cursor = Some((last.created_at.clone(), last.id.clone()));
            seen.extend(page.into_iter().map(|row| row.id));
        }
        assert_eq!(seen.len(), 5);
    }
}
