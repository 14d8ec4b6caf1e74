//! Transcript source adapters.
//!
//! Each upstream recorder delivers its own payload shape. An adapter turns it
//! into a [`NormalizedTranscript`] that ingestion understands. `source_id` is
//! the dedup key: `"<source>:<upstream id>"`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::db::NewTranscript;
use crate::error::{GateError, Result};

/// Attendee as delivered by a source, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttendee {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTranscript {
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub date: DateTime<Utc>,
    pub attendees: Vec<RawAttendee>,
}

impl NormalizedTranscript {
    pub fn to_new_transcript(&self) -> NewTranscript {
        NewTranscript {
            source_id: self.source_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            summary: self.summary.clone(),
            meeting_date: Some(self.date.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

pub trait TranscriptSource {
    type Payload;

    fn source_name(&self) -> &'static str;

    fn transform(&self, payload: Self::Payload) -> Result<NormalizedTranscript>;
}

// =============================================================================
// Circleback
// =============================================================================

/// Circleback ids arrive as numbers; older exports used strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CirclebackId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for CirclebackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CirclebackId::Number(n) => write!(f, "{}", n),
            CirclebackId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CirclebackAttendee {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CirclebackUtterance {
    pub speaker: String,
    pub text: String,
    /// Seconds from the start of the recording.
    pub timestamp: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CirclebackPayload {
    pub id: CirclebackId,
    pub name: String,
    pub created_at: String,
    /// Seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub attendees: Vec<CirclebackAttendee>,
    #[serde(default)]
    pub transcript: Vec<CirclebackUtterance>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct CirclebackSource;

impl CirclebackSource {
    pub fn parse(json: &str) -> Result<CirclebackPayload> {
        serde_json::from_str(json)
            .map_err(|e| GateError::InvalidInput(format!("Invalid Circleback payload: {}", e)))
    }
}

impl TranscriptSource for CirclebackSource {
    type Payload = CirclebackPayload;

    fn source_name(&self) -> &'static str {
        "circleback"
    }

    fn transform(&self, payload: CirclebackPayload) -> Result<NormalizedTranscript> {
        let title = payload.name.trim().to_string();
        if title.is_empty() {
            return Err(GateError::InvalidInput("Transcript title is required".to_string()));
        }
        let date = DateTime::parse_from_rfc3339(payload.created_at.trim())
            .map_err(|e| {
                GateError::InvalidInput(format!("Invalid createdAt '{}': {}", payload.created_at, e))
            })?
            .with_timezone(&Utc);

        let people = payload
            .attendees
            .iter()
            .filter_map(|a| a.name.as_deref().map(str::trim).filter(|n| !n.is_empty()))
            .collect::<Vec<_>>()
            .join(", ");
        let body = payload
            .transcript
            .iter()
            .map(|u| format!("[{}] {}: {}", minutes_seconds(u.timestamp), u.speaker, u.text))
            .collect::<Vec<_>>()
            .join("\n");
        let content = format!(
            "# {}\nDate: {}\nDuration: {}\nPeople: {}\n\n{}",
            title,
            date.format("%A, %B %-d, %Y at %-I:%M %p UTC"),
            minutes_seconds(payload.duration),
            people,
            body
        );

        // Rows without an email cannot be classified; ingestion drops the
        // malformed ones.
        let attendees = payload
            .attendees
            .into_iter()
            .filter_map(|a| {
                a.email.map(|email| RawAttendee {
                    email,
                    name: a.name,
                })
            })
            .collect();

        Ok(NormalizedTranscript {
            source_id: format!("{}:{}", self.source_name(), payload.id),
            title,
            content,
            summary: payload.notes.filter(|n| !n.trim().is_empty()),
            date,
            attendees,
        })
    }
}

/// `m:ss` for a second offset. Negative or non-finite input renders as `0:00`.
fn minutes_seconds(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "id": 4812,
        "name": " Client Sync ",
        "createdAt": "2026-01-05T15:00:00Z",
        "duration": 1865.4,
        "attendees": [
            {"name": "Member", "email": "member@oxy.so"},
            {"name": "Client", "email": "Client@Acme.com"},
            {"name": "Dial-in"}
        ],
        "transcript": [
            {"speaker": "Member", "text": "Welcome.", "timestamp": 3.2},
            {"speaker": "Client", "text": "Thanks.", "timestamp": 65}
        ],
        "notes": "Discussed rollout."
    }"#;

    #[test]
    fn test_circleback_transform() {
        let payload = CirclebackSource::parse(PAYLOAD).unwrap();
        let t = CirclebackSource.transform(payload).unwrap();

        assert_eq!(t.source_id, "circleback:4812");
        assert_eq!(t.title, "Client Sync");
        assert_eq!(t.summary.as_deref(), Some("Discussed rollout."));
        assert_eq!(t.attendees.len(), 2);
        assert_eq!(t.attendees[1].email, "Client@Acme.com");
        assert_eq!(
            t.content,
            "# Client Sync\nDate: Monday, January 5, 2026 at 3:00 PM UTC\nDuration: 31:05\n\
People: Member, Client, Dial-in\n\n[0:03] Member: Welcome.\n[1:05] Client: Thanks."
        );
        assert_eq!(
            t.to_new_transcript().meeting_date.as_deref(),
            Some("2026-01-05T15:00:00Z")
        );
    }

    #[test]
    fn test_string_id_and_missing_optionals() {
        let json = r#"{"id": "abc", "name": "Standup", "createdAt": "2026-02-01T09:30:00+01:00"}"#;
        let t = CirclebackSource
            .transform(CirclebackSource::parse(json).unwrap())
            .unwrap();
        assert_eq!(t.source_id, "circleback:abc");
        assert!(t.attendees.is_empty());
        assert!(t.summary.is_none());
        assert!(t.content.contains("Date: Sunday, February 1, 2026 at 8:30 AM UTC"));
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(
            CirclebackSource::parse("{\"id\": 1}"),
            Err(GateError::InvalidInput(_))
        ));
        let json = r#"{"id": 1, "name": "X", "createdAt": "yesterday"}"#;
        let err = CirclebackSource
            .transform(CirclebackSource::parse(json).unwrap())
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidInput(_)));
        let json = r#"{"id": 1, "name": "  ", "createdAt": "2026-01-05T15:00:00Z"}"#;
        assert!(CirclebackSource
            .transform(CirclebackSource::parse(json).unwrap())
            .is_err());
    }

    #[test]
    fn test_minutes_seconds() {
        assert_eq!(minutes_seconds(0.0), "0:00");
        assert_eq!(minutes_seconds(59.9), "0:59");
        assert_eq!(minutes_seconds(3600.0), "60:00");
        assert_eq!(minutes_seconds(-4.0), "0:00");
    }
}
