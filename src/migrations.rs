//! Embedded schema migrations.
//!
//! The schema version lives in SQLite's `user_version` header field. Each
//! migration and its version bump commit in one transaction, so a failed
//! migration leaves the previous version intact.

use std::path::Path;

use rusqlite::{Connection, DatabaseName};

use crate::db::DbError;

pub(crate) struct Migration {
    pub version: i32,
    pub sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

/// Versions before and after a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SchemaUpgrade {
    pub from: i32,
    pub to: i32,
}

impl SchemaUpgrade {
    pub fn applied(&self) -> usize {
        (self.to - self.from).max(0) as usize
    }
}

pub(crate) fn schema_version(conn: &Connection) -> Result<i32, DbError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the schema up to date.
///
/// When `backup_to` is set and an existing (non-empty) schema is about to
/// change, a copy of the database is written there first.
pub(crate) fn migrate(conn: &mut Connection, backup_to: Option<&Path>) -> Result<SchemaUpgrade, DbError> {
    migrate_with(conn, MIGRATIONS, backup_to)
}

fn migrate_with(
    conn: &mut Connection,
    migrations: &[Migration],
    backup_to: Option<&Path>,
) -> Result<SchemaUpgrade, DbError> {
    let from = schema_version(conn)?;
    let latest = migrations.last().map_or(0, |m| m.version);
    if from > latest {
        return Err(DbError::Migration(format!(
            "database is at schema v{}, this build only knows up to v{}",
            from, latest
        )));
    }

    let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > from).collect();
    if pending.is_empty() {
        return Ok(SchemaUpgrade { from, to: from });
    }

    if let Some(path) = backup_to.filter(|_| from > 0) {
        conn.backup(DatabaseName::Main, path, None)
            .map_err(|e| DbError::Migration(format!("backup to {} failed: {}", path.display(), e)))?;
        log::info!("Backed up schema v{} to {}", from, path.display());
    }

    let mut to = from;
    for migration in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| DbError::Migration(format!("v{}: {}", migration.version, e)))?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        to = migration.version;
        log::info!("Schema migrated to v{}", to);
    }

    Ok(SchemaUpgrade { from, to })
}
