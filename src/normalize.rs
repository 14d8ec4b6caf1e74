//! String normalization for emails, domains and titles.
//!
//! Everything here is pure. The internal-domain set is resolved once at the
//! composition boundary (`state.rs`) and passed down explicitly.

use std::collections::BTreeSet;

/// Canonical normalized title of the recurring meeting that is always shareable.
pub const WEEKLY_PLANNING_CANONICAL_TITLE: &str = "oxy <> weekly planning";

/// Internal domains that are always present, whatever the configuration says.
pub const DEFAULT_INTERNAL_DOMAINS: &[&str] = &["oxy.so", "oxy.co"];

/// Trim + lowercase.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn normalize_email(email: &str) -> String {
    normalize(email)
}

/// Normalize a domain, tolerating a leading `@`.
pub fn normalize_domain(domain: &str) -> String {
    let normalized = normalize(domain);
    match normalized.strip_prefix('@') {
        Some(rest) => rest.to_string(),
        None => normalized,
    }
}

pub fn normalize_title(title: &str) -> String {
    normalize(title)
}

/// Domain part of an email: everything after the last `@`.
///
/// Returns `None` when there is no `@`, or it is the first or last character.
pub fn extract_domain(email: &str) -> Option<String> {
    let normalized = normalize_email(email);
    let at = normalized.rfind('@')?;
    if at == 0 || at == normalized.len() - 1 {
        return None;
    }
    Some(normalize_domain(&normalized[at + 1..]))
}

/// First label of a domain. `"acme.co.uk"` → `"acme"`.
pub fn domain_root(domain: &str) -> String {
    let normalized = normalize_domain(domain);
    normalized
        .split('.')
        .next()
        .map(str::to_string)
        .unwrap_or(normalized)
}

/// Exact match against the canonical weekly planning title.
/// Prefixes, suffixes and other superstrings never match.
pub fn is_weekly_planning_title(title: &str) -> bool {
    normalize_title(title) == WEEKLY_PLANNING_CANONICAL_TITLE
}

// =============================================================================
// Internal domains
// =============================================================================

/// The set of email domains treated as "inside the organization".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalDomains {
    domains: BTreeSet<String>,
}

impl InternalDomains {
    /// Parse a comma-separated config value.
    ///
    /// An empty value yields the defaults. A non-empty value yields the union of
    /// the configured and default domains: partial configuration must never
    /// shrink the internal set and widen what counts as external.
    pub fn from_config(config_value: Option<&str>) -> Self {
        let mut domains: BTreeSet<String> = config_value
            .unwrap_or("")
            .split(',')
            .map(normalize_domain)
            .filter(|d| !d.is_empty())
            .collect();

        domains.extend(DEFAULT_INTERNAL_DOMAINS.iter().map(|d| d.to_string()));
        Self { domains }
    }

    pub fn defaults() -> Self {
        Self::from_config(None)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(&normalize_domain(domain))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl Default for InternalDomains {
    fn default() -> Self {
        Self::defaults()
    }
}

// =============================================================================
// Attendees
// =============================================================================

/// An attendee row after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAttendee {
    /// Trimmed original email, as displayed.
    pub email: String,
    pub normalized_email: String,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub domain_root: Option<String>,
}

/// Normalize one attendee row. Rows with no `@` are rejected.
pub fn normalize_attendee(email: &str, name: Option<&str>) -> Option<NormalizedAttendee> {
    let normalized_email = normalize_email(email);
    if normalized_email.is_empty() || !normalized_email.contains('@') {
        return None;
    }

    let domain = extract_domain(&normalized_email);
    let domain_root = domain.as_deref().map(domain_root);
    let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);

    Some(NormalizedAttendee {
        email: email.trim().to_string(),
        normalized_email,
        name,
        domain,
        domain_root,
    })
}

/// Unique domains of normalized emails, in first-seen order.
pub fn unique_domains<S: AsRef<str>>(emails: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    emails
        .iter()
        .filter_map(|e| extract_domain(e.as_ref()))
        .filter(|d| seen.insert(d.clone()))
        .collect()
}

/// Unique domain roots, in first-seen order.
pub fn unique_domain_roots(domains: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    domains
        .iter()
        .map(|d| domain_root(d))
        .filter(|r| seen.insert(r.clone()))
        .collect()
}
