use chrono::Utc;
use rusqlite::params;

use super::*;

impl TranscriptDb {
    /// Append one audit event. Returns the new row id.
    pub fn insert_audit_event(
        &self,
        actor_user_id: Option<&str>,
        event_type: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        request_id: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO audit_events (
                actor_user_id, event_type, entity_type, entity_id, request_id, payload, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                actor_user_id,
                event_type,
                entity_type,
                entity_id,
                request_id,
                payload.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Audit events for one entity, oldest first.
    pub fn audit_events_for(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<DbAuditEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, actor_user_id, event_type, entity_type, entity_id, request_id, payload, created_at
             FROM audit_events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![entity_type, entity_id], |row| {
            Ok(DbAuditEvent {
                id: row.get(0)?,
                actor_user_id: row.get(1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                request_id: row.get(5)?,
                payload: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
