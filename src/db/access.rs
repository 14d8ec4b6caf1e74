use chrono::Utc;
use rusqlite::params;

use super::*;

impl TranscriptDb {
    // =========================================================================
    // Roles and memberships
    // =========================================================================

    /// Set a user's role (`"admin"` or `"member"`).
    pub fn set_user_role(&self, user_id: &str, role: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
            params![user_id, role],
        )?;
        Ok(())
    }

    /// Role lookup. A user without a row is a member.
    pub fn user_is_admin(&self, user_id: &str) -> Result<bool, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT role FROM user_roles WHERE user_id = ?1")?;
        let mut rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(row? == "admin"),
            None => Ok(false),
        }
    }

    pub fn add_project_member(&self, user_id: &str, project_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO project_memberships (user_id, project_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, project_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn add_client_member(&self, user_id: &str, client_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO client_memberships (user_id, client_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, client_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Every project and client the user is a direct member of.
    pub fn membership_snapshot(&self, user_id: &str) -> Result<MembershipSnapshot, DbError> {
        let mut snapshot = MembershipSnapshot::default();

        let mut stmt = self
            .conn
            .prepare("SELECT project_id FROM project_memberships WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            snapshot.project_ids.insert(row?);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT client_id FROM client_memberships WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            snapshot.client_ids.insert(row?);
        }

        Ok(snapshot)
    }

    /// `{id, client_id, owner_user_id}` for each existing project in `project_ids`.
    pub fn project_access_rows(&self, project_ids: &[String]) -> Result<Vec<ProjectAccessRow>, DbError> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, client_id, owner_user_id FROM projects WHERE id IN ({})",
            in_placeholders(project_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(project_ids.iter()), |row| {
            Ok(ProjectAccessRow {
                id: row.get(0)?,
                client_id: row.get(1)?,
                owner_user_id: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
