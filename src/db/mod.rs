//! SQLite-backed store for transcripts, their derived classification and
//! routing state, and the membership tables the visibility gate reads.
//!
//! The database lives at `~/.transcript-gate/transcripts.db` unless the config
//! or `TRANSCRIPT_GATE_DB` names another path. Classification rows and project
//! links are derived state: they can always be recomputed by the backfill job
//! and are never the source of truth for access on their own.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

pub struct TranscriptDb {
    conn: Connection,
}

impl TranscriptDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::from(e)))?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| E::from(DbError::from(e)))?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at the default location and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let mut conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let backup = path.with_extension("pre-migration.bak");
        let upgrade = crate::migrations::migrate(&mut conn, Some(&backup))?;
        if upgrade.applied() > 0 {
            log::info!(
                "Database {} upgraded from v{} to v{}",
                path.display(),
                upgrade.from,
                upgrade.to
            );
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// `~/.transcript-gate/transcripts.db`
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".transcript-gate").join("transcripts.db"))
    }
}

pub mod access;
pub mod audit;
pub mod classification;
pub mod routing;
pub mod transcripts;

// =============================================================================
// Shared test utilities
// =============================================================================
