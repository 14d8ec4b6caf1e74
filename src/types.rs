//! Shared domain types: visibility labels, routing vocabulary, identities, config.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted visibility label for a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    NonPrivate,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::NonPrivate => "non_private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "non_private" => Ok(Visibility::NonPrivate),
            other => Err(format!("unknown visibility '{}'", other)),
        }
    }
}

/// Why a transcript received its visibility. The reason alone determines
/// the visibility (see [`ClassificationReason::visibility`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationReason {
    WeeklyException,
    ExternalAttendee,
    InternalAttendeesOnly,
    NoAttendees,
}

impl ClassificationReason {
    pub fn visibility(&self) -> Visibility {
        match self {
            ClassificationReason::WeeklyException | ClassificationReason::ExternalAttendee => {
                Visibility::NonPrivate
            }
            ClassificationReason::InternalAttendeesOnly | ClassificationReason::NoAttendees => {
                Visibility::Private
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationReason::WeeklyException => "weekly_exception",
            ClassificationReason::ExternalAttendee => "external_attendee",
            ClassificationReason::InternalAttendeesOnly => "internal_attendees_only",
            ClassificationReason::NoAttendees => "no_attendees",
        }
    }
}

impl fmt::Display for ClassificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassificationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly_exception" => Ok(ClassificationReason::WeeklyException),
            "external_attendee" => Ok(ClassificationReason::ExternalAttendee),
            "internal_attendees_only" => Ok(ClassificationReason::InternalAttendeesOnly),
            "no_attendees" => Ok(ClassificationReason::NoAttendees),
            other => Err(format!("unknown classification reason '{}'", other)),
        }
    }
}

/// Which strategy produced a transcript's project link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    DomainMatch,
    TitleAlias,
    ClientInboxFallback,
    GlobalTriageFallback,
    /// Written only by the admin relink path, never by the resolver.
    ManualRelink,
}

impl LinkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkSource::DomainMatch => "domain_match",
            LinkSource::TitleAlias => "title_alias",
            LinkSource::ClientInboxFallback => "client_inbox_fallback",
            LinkSource::GlobalTriageFallback => "global_triage_fallback",
            LinkSource::ManualRelink => "manual_relink",
        }
    }
}

impl fmt::Display for LinkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain_match" => Ok(LinkSource::DomainMatch),
            "title_alias" => Ok(LinkSource::TitleAlias),
            "client_inbox_fallback" => Ok(LinkSource::ClientInboxFallback),
            "global_triage_fallback" => Ok(LinkSource::GlobalTriageFallback),
            "manual_relink" => Ok(LinkSource::ManualRelink),
            other => Err(format!("unknown link source '{}'", other)),
        }
    }
}

/// A project a transcript could be routed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLinkCandidate {
    pub project_id: String,
    pub client_id: String,
}

/// The authenticated caller of a read or chat surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

// =============================================================================
// Config
// =============================================================================

/// On-disk configuration (`~/.transcript-gate/config.json`). Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Explicit database path. Defaults to `~/.transcript-gate/transcripts.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// Comma-separated internal email domains, merged with the built-in defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_email_domains: Option<String>,
    /// Model used when the caller does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Overrides the model-derived character budget for every chat turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars_override: Option<usize>,
}

fn default_model() -> String {
    crate::models::DEFAULT_MODEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            allowed_email_domains: None,
            default_model: default_model(),
            max_chars_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_determines_visibility() {
        let cases = [
            (ClassificationReason::WeeklyException, Visibility::NonPrivate),
            (ClassificationReason::ExternalAttendee, Visibility::NonPrivate),
            (ClassificationReason::InternalAttendeesOnly, Visibility::Private),
            (ClassificationReason::NoAttendees, Visibility::Private),
        ];
        for (reason, visibility) in cases {
            assert_eq!(reason.visibility(), visibility, "{}", reason);
            assert_eq!(reason.as_str().parse::<ClassificationReason>(), Ok(reason));
        }
    }

    #[test]
    fn test_link_source_strings() {
        assert_eq!(LinkSource::ClientInboxFallback.as_str(), "client_inbox_fallback");
        assert_eq!(
            "global_triage_fallback".parse::<LinkSource>(),
            Ok(LinkSource::GlobalTriageFallback)
        );
        assert!("fuzzy".parse::<LinkSource>().is_err());
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_model, crate::models::DEFAULT_MODEL);
        assert!(config.allowed_email_domains.is_none());
        assert!(config.max_chars_override.is_none());
    }
}
