//! Project routing for transcripts.
//!
//! Four independent strategies may each produce a candidate project:
//! attendee domain, title alias, the inbox of a client recognised from a
//! domain root, and the global triage inbox. The first present candidate in
//! that fixed order wins. There is no scoring and no tie-breaking beyond
//! presence, so the same candidate set always routes the same way.

use serde::Serialize;

use crate::db::{DbError, DbProjectLink};
use crate::normalize::{normalize_title, unique_domain_roots};
use crate::store::RoutingStore;
use crate::types::{LinkSource, ProjectLinkCandidate};

/// The four optional candidates, one per strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkCandidates {
    pub domain_match: Option<ProjectLinkCandidate>,
    pub alias_match: Option<ProjectLinkCandidate>,
    pub client_inbox_match: Option<ProjectLinkCandidate>,
    pub global_inbox_match: Option<ProjectLinkCandidate>,
}

/// Outcome of routing. Both fields are `None` when nothing matched; that is
/// "unrouted", not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLink {
    pub candidate: Option<ProjectLinkCandidate>,
    pub source: Option<LinkSource>,
}

impl ResolvedLink {
    fn found(candidate: ProjectLinkCandidate, source: LinkSource) -> Self {
        Self {
            candidate: Some(candidate),
            source: Some(source),
        }
    }

    pub fn is_unrouted(&self) -> bool {
        self.candidate.is_none()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.candidate.as_ref().map(|c| c.project_id.as_str())
    }
}

/// Pick the first present candidate: domain → alias → client inbox → global inbox.
pub fn choose_project_link(candidates: LinkCandidates) -> ResolvedLink {
    let LinkCandidates {
        domain_match,
        alias_match,
        client_inbox_match,
        global_inbox_match,
    } = candidates;

    if let Some(c) = domain_match {
        return ResolvedLink::found(c, LinkSource::DomainMatch);
    }
    if let Some(c) = alias_match {
        return ResolvedLink::found(c, LinkSource::TitleAlias);
    }
    if let Some(c) = client_inbox_match {
        return ResolvedLink::found(c, LinkSource::ClientInboxFallback);
    }
    if let Some(c) = global_inbox_match {
        return ResolvedLink::found(c, LinkSource::GlobalTriageFallback);
    }
    ResolvedLink::default()
}

/// Run the candidate lookups against the routing tables and choose.
///
/// Lookups stop at the first strategy that yields a candidate; since the
/// chooser is strictly ordered, the later lookups could not change the answer.
/// `attendee_domains` must already be normalized and de-duplicated.
pub fn resolve_project_link<S: RoutingStore + ?Sized>(
    store: &S,
    title: &str,
    attendee_domains: &[String],
) -> Result<ResolvedLink, DbError> {
    let mut candidates = LinkCandidates::default();

    candidates.domain_match = store.find_project_by_domains(attendee_domains)?;
    if candidates.domain_match.is_none() {
        candidates.alias_match = store.find_project_by_alias(&normalize_title(title))?;
    }
    if candidates.domain_match.is_none() && candidates.alias_match.is_none() {
        let roots = unique_domain_roots(attendee_domains);
        if let Some(client_id) = store.find_client_by_domain_roots(&roots)? {
            candidates.client_inbox_match = store.find_client_inbox(&client_id)?;
        }
        if candidates.client_inbox_match.is_none() {
            candidates.global_inbox_match = store.find_global_inbox()?;
        }
    }

    Ok(choose_project_link(candidates))
}

/// The link persisted for a transcript, as far as callers need to compare it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLink {
    pub project_id: Option<String>,
    pub source: Option<LinkSource>,
}

impl StoredLink {
    pub fn from_record(link: Option<DbProjectLink>) -> Self {
        match link {
            Some(link) => Self {
                project_id: Some(link.project_id),
                source: Some(link.source),
            },
            None => Self::default(),
        }
    }
}

/// Resolve and persist the link for one transcript.
///
/// A link written by an admin relink is kept as is. Otherwise an unrouted
/// result removes any previous link. Storage errors propagate to the caller.
pub fn route_and_store<S: RoutingStore + ?Sized>(
    store: &S,
    transcript_id: &str,
    title: &str,
    attendee_domains: &[String],
) -> Result<StoredLink, DbError> {
    if let Some(existing) = store.get_project_link(transcript_id)? {
        if existing.source == LinkSource::ManualRelink {
            log::debug!("Transcript {} keeps its manual link", transcript_id);
            return Ok(StoredLink::from_record(Some(existing)));
        }
    }

    let resolved = resolve_project_link(store, title, attendee_domains)?;
    match (resolved.candidate, resolved.source) {
        (Some(candidate), Some(source)) => {
            store.upsert_project_link(transcript_id, &candidate.project_id, source)?;
            log::info!(
                "Routed transcript {} to project {} via {}",
                transcript_id,
                candidate.project_id,
                source
            );
            Ok(StoredLink {
                project_id: Some(candidate.project_id),
                source: Some(source),
            })
        }
        _ => {
            store.delete_project_link(transcript_id)?;
            log::info!("Transcript {} left unrouted: no candidate matched", transcript_id);
            Ok(StoredLink::default())
        }
    }
}
