use std::collections::HashMap;

use chrono::Utc;
use rusqlite::params;

use super::*;
use crate::normalize::{normalize, normalize_domain, normalize_title};
use crate::types::{LinkSource, ProjectLinkCandidate};

impl TranscriptDb {
    // =========================================================================
    // Clients and projects
    // =========================================================================

    pub fn insert_client(
        &self,
        id: &str,
        name: &str,
        owner_user_id: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO clients (id, name, normalized_name, owner_user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, normalize(name), owner_user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_client(&self, id: &str) -> Result<Option<DbClient>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, owner_user_id, created_at FROM clients WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(DbClient {
                id: row.get(0)?,
                name: row.get(1)?,
                owner_user_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Insert a project. `scope` is `"client"` or `"global"`.
    pub fn insert_project(
        &self,
        id: &str,
        client_id: &str,
        name: &str,
        scope: &str,
        is_inbox: bool,
        owner_user_id: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO projects (id, client_id, name, scope, is_inbox, owner_user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                client_id,
                name,
                scope,
                is_inbox as i32,
                owner_user_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn set_project_overview(&self, project_id: &str, markdown: Option<&str>) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE projects SET overview_markdown = ?1 WHERE id = ?2",
            params![markdown, project_id],
        )?;
        if changed == 0 {
            return Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Result<Option<DbProject>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, name, scope, is_inbox, owner_user_id, overview_markdown, created_at
             FROM projects WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(DbProject {
                id: row.get(0)?,
                client_id: row.get(1)?,
                name: row.get(2)?,
                scope: row.get(3)?,
                is_inbox: row.get::<_, i32>(4)? != 0,
                owner_user_id: row.get(5)?,
                overview_markdown: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn add_project_domain(&self, project_id: &str, domain: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO project_domains (project_id, domain, normalized_domain, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![project_id, domain.trim(), normalize_domain(domain), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn add_project_alias(&self, project_id: &str, alias: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO project_aliases (project_id, alias, normalized_alias, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![project_id, alias.trim(), normalize_title(alias), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // =========================================================================
    // Candidate lookups
    // =========================================================================

    /// Lowest project id owning any of the given normalized domains.
    pub fn find_project_by_domains(
        &self,
        domains: &[String],
    ) -> Result<Option<ProjectLinkCandidate>, DbError> {
        if domains.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT p.id, p.client_id
             FROM project_domains pd
             INNER JOIN projects p ON p.id = pd.project_id
             WHERE pd.normalized_domain IN ({})
             ORDER BY p.id ASC
             LIMIT 1",
            in_placeholders(domains.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(rusqlite::params_from_iter(domains.iter()), Self::map_candidate)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Project whose alias equals the normalized title.
    pub fn find_project_by_alias(
        &self,
        normalized_title: &str,
    ) -> Result<Option<ProjectLinkCandidate>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.client_id
             FROM project_aliases pa
             INNER JOIN projects p ON p.id = pa.project_id
             WHERE pa.normalized_alias = ?1
             ORDER BY p.id ASC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![normalized_title], Self::map_candidate)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// First client matching a domain root, trying roots in order.
    /// Per root: exact normalized name first, then name prefix.
    pub fn find_client_by_domain_roots(&self, roots: &[String]) -> Result<Option<String>, DbError> {
        let mut exact = self.conn.prepare(
            "SELECT id FROM clients WHERE normalized_name = ?1 ORDER BY id ASC LIMIT 1",
        )?;
        let mut prefix = self.conn.prepare(
            "SELECT id FROM clients
             WHERE substr(normalized_name, 1, length(?1)) = ?1
             ORDER BY normalized_name ASC, id ASC
             LIMIT 1",
        )?;

        for root in roots.iter().filter(|r| !r.is_empty()) {
            let mut rows = exact.query_map(params![root], |row| row.get::<_, String>(0))?;
            if let Some(row) = rows.next() {
                return Ok(Some(row?));
            }

            let mut rows = prefix.query_map(params![root], |row| row.get::<_, String>(0))?;
            if let Some(row) = rows.next() {
                return Ok(Some(row?));
            }
        }
        Ok(None)
    }

    /// The inbox project of a client, by name then id.
    pub fn find_client_inbox(&self, client_id: &str) -> Result<Option<ProjectLinkCandidate>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id FROM projects
             WHERE client_id = ?1 AND is_inbox = 1
             ORDER BY name ASC, id ASC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![client_id], Self::map_candidate)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// The organization-wide triage inbox.
    pub fn find_global_inbox(&self) -> Result<Option<ProjectLinkCandidate>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id FROM projects
             WHERE scope = 'global' AND is_inbox = 1
             ORDER BY name ASC, id ASC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], Self::map_candidate)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn map_candidate(row: &rusqlite::Row) -> rusqlite::Result<ProjectLinkCandidate> {
        Ok(ProjectLinkCandidate {
            project_id: row.get(0)?,
            client_id: row.get(1)?,
        })
    }

    // =========================================================================
    // Links
    // =========================================================================

    pub fn get_project_link(&self, transcript_id: &str) -> Result<Option<DbProjectLink>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT transcript_id, project_id, link_source, updated_at
             FROM transcript_project_links WHERE transcript_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![transcript_id], |row| {
            Ok(DbProjectLink {
                transcript_id: row.get(0)?,
                project_id: row.get(1)?,
                source: parse_text_column(2, row.get(2)?)?,
                updated_at: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the single link for a transcript.
    pub fn upsert_project_link(
        &self,
        transcript_id: &str,
        project_id: &str,
        source: LinkSource,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO transcript_project_links (transcript_id, project_id, link_source, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(transcript_id) DO UPDATE SET
                project_id = excluded.project_id,
                link_source = excluded.link_source,
                updated_at = excluded.updated_at",
            params![transcript_id, project_id, source.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_project_link(&self, transcript_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM transcript_project_links WHERE transcript_id = ?1",
            params![transcript_id],
        )?;
        Ok(())
    }

    /// Linked project id for each of `transcript_ids` that has a link.
    pub fn project_links_for_ids(
        &self,
        transcript_ids: &[String],
    ) -> Result<HashMap<String, String>, DbError> {
        if transcript_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT transcript_id, project_id FROM transcript_project_links
             WHERE transcript_id IN ({})",
            in_placeholders(transcript_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(transcript_ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        Ok(rows.collect::<Result<HashMap<_, _>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{seed_project, seed_transcript, test_db};
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_domain_lookup_picks_lowest_project_id() {
        let db = test_db();
        seed_project(&db, "c1", "Acme", "p-b", "Acme Delivery", false);
        seed_project(&db, "c1", "Acme", "p-a", "Acme Strategy", false);
        db.add_project_domain("p-b", "acme.com").unwrap();
        db.add_project_domain("p-a", "@ACME.com").unwrap();

        let found = db
            .find_project_by_domains(&strings(&["other.org", "acme.com"]))
            .unwrap()
            .unwrap();
        assert_eq!(found.project_id, "p-a");
        assert_eq!(found.client_id, "c1");
        assert!(db.find_project_by_domains(&[]).unwrap().is_none());
    }

    #[test]
    fn test_alias_lookup_is_exact() {
        let db = test_db();
        seed_project(&db, "c1", "Acme", "p1", "Acme", false);
        db.add_project_alias("p1", "  Acme QBR ").unwrap();
        assert!(db.find_project_by_alias("acme qbr").unwrap().is_some());
        assert!(db.find_project_by_alias("acme qbr notes").unwrap().is_none());
    }

    #[test]
    fn test_client_lookup_prefers_exact_then_prefix() {
        let db = test_db();
        db.insert_client("c-prefix", "Acme Holdings", None).unwrap();
        db.insert_client("c-exact", "Acme", None).unwrap();
        db.insert_client("c-other", "Globex", None).unwrap();

        let roots = strings(&["acme"]);
        assert_eq!(db.find_client_by_domain_roots(&roots).unwrap().as_deref(), Some("c-exact"));

        let roots = strings(&["glo"]);
        assert_eq!(db.find_client_by_domain_roots(&roots).unwrap().as_deref(), Some("c-other"));

        let roots = strings(&["nobody", "acme"]);
        assert_eq!(db.find_client_by_domain_roots(&roots).unwrap().as_deref(), Some("c-exact"));

        assert!(db.find_client_by_domain_roots(&strings(&["zzz"])).unwrap().is_none());
    }

    #[test]
    fn test_prefix_lookup_treats_wildcards_literally() {
        let db = test_db();
        db.insert_client("c1", "Acme", None).unwrap();
        assert!(db.find_client_by_domain_roots(&strings(&["a%"])).unwrap().is_none());
        assert!(db.find_client_by_domain_roots(&strings(&["_cme"])).unwrap().is_none());
    }

    #[test]
    fn test_inbox_lookups() {
        let db = test_db();
        seed_project(&db, "c1", "Acme", "p-work", "Acme Work", false);
        seed_project(&db, "c1", "Acme", "p-inbox", "Acme Inbox", true);
        db.insert_client("org", "Oxy", None).unwrap();
        db.insert_project("p-triage", "org", "Triage", "global", true, None)
            .unwrap();

        assert_eq!(db.find_client_inbox("c1").unwrap().unwrap().project_id, "p-inbox");
        assert_eq!(db.find_global_inbox().unwrap().unwrap().project_id, "p-triage");
    }

    #[test]
    fn test_link_upsert_and_delete() {
        let db = test_db();
        seed_project(&db, "c1", "Acme", "p1", "Acme", false);
        seed_project(&db, "c1", "Acme", "p2", "Acme Two", false);
        let t = seed_transcript(&db, "s-1", "Sync", &[]);

        db.upsert_project_link(&t, "p1", LinkSource::DomainMatch).unwrap();
        db.upsert_project_link(&t, "p2", LinkSource::TitleAlias).unwrap();
        let link = db.get_project_link(&t).unwrap().unwrap();
        assert_eq!(link.project_id, "p2");
        assert_eq!(link.source, LinkSource::TitleAlias);

        let links = db.project_links_for_ids(&[t.clone()]).unwrap();
        assert_eq!(links.get(&t).map(String::as_str), Some("p2"));

        db.delete_project_link(&t).unwrap();
        assert!(db.get_project_link(&t).unwrap().is_none());
    }
}
