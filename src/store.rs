//! Narrow capability traits the core depends on.
//!
//! Each consumer names only the slice of storage it reads or writes:
//! the classifier needs `ClassificationStore`, the resolver `RoutingStore`,
//! the gate `VisibilityStore`, the mention loader `TranscriptContentStore`.
//! `TranscriptDb` implements all four; tests substitute in-memory or
//! failing implementations.

use std::collections::{HashMap, HashSet};

use crate::db::{
    DbClassification, DbError, DbProjectLink, MembershipSnapshot, ProjectAccessRow, TranscriptBody,
    TranscriptDb,
};
use crate::types::{LinkSource, ProjectLinkCandidate, Visibility};

// ==================== Sub-traits ====================

pub trait ClassificationStore {
    fn get_classification(&self, transcript_id: &str) -> Result<Option<DbClassification>, DbError>;
    fn upsert_classification(&self, record: &DbClassification) -> Result<(), DbError>;
}

pub trait RoutingStore {
    fn find_project_by_domains(&self, domains: &[String])
        -> Result<Option<ProjectLinkCandidate>, DbError>;
    fn find_project_by_alias(&self, normalized_title: &str)
        -> Result<Option<ProjectLinkCandidate>, DbError>;
    fn find_client_by_domain_roots(&self, roots: &[String]) -> Result<Option<String>, DbError>;
    fn find_client_inbox(&self, client_id: &str) -> Result<Option<ProjectLinkCandidate>, DbError>;
    fn find_global_inbox(&self) -> Result<Option<ProjectLinkCandidate>, DbError>;

    fn get_project_link(&self, transcript_id: &str) -> Result<Option<DbProjectLink>, DbError>;
    fn upsert_project_link(
        &self,
        transcript_id: &str,
        project_id: &str,
        source: LinkSource,
    ) -> Result<(), DbError>;
    fn delete_project_link(&self, transcript_id: &str) -> Result<(), DbError>;
}

/// Batch lookups behind the visibility gate. Every method takes the full id
/// list so the gate never issues per-id round trips.
pub trait VisibilityStore {
    /// Persisted visibility by transcript id. Unclassified ids are absent.
    fn visibility_for(&self, transcript_ids: &[String]) -> Result<HashMap<String, Visibility>, DbError>;
    /// Linked project id by transcript id. Unlinked ids are absent.
    fn project_links_for(&self, transcript_ids: &[String]) -> Result<HashMap<String, String>, DbError>;
    /// The subset of `transcript_ids` that `normalized_email` attended.
    fn attended_by(
        &self,
        transcript_ids: &[String],
        normalized_email: &str,
    ) -> Result<HashSet<String>, DbError>;
    fn is_admin(&self, user_id: &str) -> Result<bool, DbError>;
    fn membership_snapshot(&self, user_id: &str) -> Result<MembershipSnapshot, DbError>;
    fn project_access_rows(&self, project_ids: &[String]) -> Result<Vec<ProjectAccessRow>, DbError>;
}

pub trait TranscriptContentStore {
    /// `{id, title, content}` for `ids`, in the order given.
    fn fetch_transcripts_by_ids(&self, ids: &[String]) -> Result<Vec<TranscriptBody>, DbError>;
}

// ==================== SQLite implementations ====================

impl ClassificationStore for TranscriptDb {
    fn get_classification(&self, transcript_id: &str) -> Result<Option<DbClassification>, DbError> {
        TranscriptDb::get_classification(self, transcript_id)
    }

    fn upsert_classification(&self, record: &DbClassification) -> Result<(), DbError> {
        TranscriptDb::upsert_classification(self, record)
    }
}

impl RoutingStore for TranscriptDb {
    fn find_project_by_domains(
        &self,
        domains: &[String],
    ) -> Result<Option<ProjectLinkCandidate>, DbError> {
        TranscriptDb::find_project_by_domains(self, domains)
    }

    fn find_project_by_alias(
        &self,
        normalized_title: &str,
    ) -> Result<Option<ProjectLinkCandidate>, DbError> {
        TranscriptDb::find_project_by_alias(self, normalized_title)
    }

    fn find_client_by_domain_roots(&self, roots: &[String]) -> Result<Option<String>, DbError> {
        TranscriptDb::find_client_by_domain_roots(self, roots)
    }

    fn find_client_inbox(&self, client_id: &str) -> Result<Option<ProjectLinkCandidate>, DbError> {
        TranscriptDb::find_client_inbox(self, client_id)
    }

    fn find_global_inbox(&self) -> Result<Option<ProjectLinkCandidate>, DbError> {
        TranscriptDb::find_global_inbox(self)
    }

    fn get_project_link(&self, transcript_id: &str) -> Result<Option<DbProjectLink>, DbError> {
        TranscriptDb::get_project_link(self, transcript_id)
    }

    fn upsert_project_link(
        &self,
        transcript_id: &str,
        project_id: &str,
        source: LinkSource,
    ) -> Result<(), DbError> {
        TranscriptDb::upsert_project_link(self, transcript_id, project_id, source)
    }

    fn delete_project_link(&self, transcript_id: &str) -> Result<(), DbError> {
        TranscriptDb::delete_project_link(self, transcript_id)
    }
}

impl VisibilityStore for TranscriptDb {
    fn visibility_for(&self, transcript_ids: &[String]) -> Result<HashMap<String, Visibility>, DbError> {
        self.visibility_for_ids(transcript_ids)
    }

    fn project_links_for(&self, transcript_ids: &[String]) -> Result<HashMap<String, String>, DbError> {
        self.project_links_for_ids(transcript_ids)
    }

    fn attended_by(
        &self,
        transcript_ids: &[String],
        normalized_email: &str,
    ) -> Result<HashSet<String>, DbError> {
        self.transcripts_attended_by(transcript_ids, normalized_email)
    }

    fn is_admin(&self, user_id: &str) -> Result<bool, DbError> {
        self.user_is_admin(user_id)
    }

    fn membership_snapshot(&self, user_id: &str) -> Result<MembershipSnapshot, DbError> {
        TranscriptDb::membership_snapshot(self, user_id)
    }

    fn project_access_rows(&self, project_ids: &[String]) -> Result<Vec<ProjectAccessRow>, DbError> {
        TranscriptDb::project_access_rows(self, project_ids)
    }
}

impl TranscriptContentStore for TranscriptDb {
    fn fetch_transcripts_by_ids(&self, ids: &[String]) -> Result<Vec<TranscriptBody>, DbError> {
        TranscriptDb::fetch_transcripts_by_ids(self, ids)
    }
}
