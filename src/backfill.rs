//! Classification and routing backfill.
//!
//! Pages through every transcript in `(created_at, id)` order and recomputes
//! its classification and project link. Upserts are idempotent, so the run
//! can be restarted at any time. A failing row is counted and skipped; a
//! failing page query aborts the run.

use serde::Serialize;

use crate::db::TranscriptDb;
use crate::error::Result;
use crate::ingest::reconcile;
use crate::normalize::InternalDomains;

pub const DEFAULT_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub scanned: usize,
    pub classified_changed: usize,
    pub routed_changed: usize,
    pub failed: usize,
}

pub fn backfill_transcripts(
    db: &TranscriptDb,
    internal_domains: &InternalDomains,
    batch_size: usize,
) -> Result<BackfillReport> {
    let batch_size = batch_size.max(1);
    let mut report = BackfillReport::default();
    let mut cursor: Option<(String, String)> = None;

    loop {
        let after = cursor.as_ref().map(|(created, id)| (created.as_str(), id.as_str()));
        let page = db.transcript_page(after, batch_size)?;
        if page.is_empty() {
            break;
        }

        for row in &page {
            report.scanned += 1;
            let result = db.with_transaction(|db| reconcile(db, internal_domains, &row.id, &row.title));
            match result {
                Ok(reconciled) => {
                    if reconciled.classification_changed {
                        report.classified_changed += 1;
                    }
                    if reconciled.link_changed {
                        report.routed_changed += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Backfill failed for transcript {}: {}", row.id, e);
                }
            }
        }

        log::info!(
            "Backfill progress: {} scanned, {} reclassified, {} rerouted, {} failed",
            report.scanned,
            report.classified_changed,
            report.routed_changed,
            report.failed
        );

        let last = &page[page.len() - 1];
        cursor = Some((last.created_at.clone(), last.id.clone()));
        if page.len() < batch_size {
            break;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{seed_project, seed_transcript, test_db};
    use crate::error::GateError;
    use crate::types::{ClassificationReason, LinkSource};

    #[test]
    fn test_backfill_classifies_and_routes_everything() {
        let db = test_db();
        seed_project(&db, "c1", "Acme", "p1", "Acme Delivery", false);
        db.add_project_domain("p1", "acme.com").unwrap();
        let ids: Vec<String> = (0..5)
            .map(|i| seed_transcript(&db, &format!("src-{}", i), "Client Sync", &["member@oxy.so", "x@acme.com"]))
            .collect();
        let internal = seed_transcript(&db, "src-internal", "Standup", &["member@oxy.so"]);

        let report = backfill_transcripts(&db, &InternalDomains::defaults(), 2).unwrap();
        assert_eq!(
            report,
            BackfillReport {
                scanned: 6,
                classified_changed: 6,
                routed_changed: 5,
                failed: 0,
            }
        );
        for id in &ids {
            let link = db.get_project_link(id).unwrap().unwrap();
            assert_eq!(link.source, LinkSource::DomainMatch);
        }
        let record = db.get_classification(&internal).unwrap().unwrap();
        assert_eq!(record.reason, ClassificationReason::InternalAttendeesOnly);
    }

    #[test]
    fn test_backfill_is_idempotent() {
        let db = test_db();
        for i in 0..3 {
            seed_transcript(&db, &format!("src-{}", i), "Sync", &["a@oxy.so"]);
        }
        let domains = InternalDomains::defaults();
        backfill_transcripts(&db, &domains, DEFAULT_BATCH_SIZE).unwrap();
        let again = backfill_transcripts(&db, &domains, DEFAULT_BATCH_SIZE).unwrap();
        assert_eq!(again.scanned, 3);
        assert_eq!(again.classified_changed, 0);
        assert_eq!(again.routed_changed, 0);
    }

    #[test]
    fn test_row_failure_is_counted_not_fatal() {
        let db = test_db();
        let ok = seed_transcript(&db, "src-ok", "Sync", &["a@oxy.so"]);
        let bad = seed_transcript(&db, "src-bad", "Sync", &["a@oxy.so"]);
        db.conn_ref()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_one BEFORE INSERT ON transcript_classification
                 WHEN NEW.transcript_id = '{}'
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
                bad
            ))
            .unwrap();

        let report = backfill_transcripts(&db, &InternalDomains::defaults(), 1).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 1);
        assert!(db.get_classification(&ok).unwrap().is_some());
        assert!(db.get_classification(&bad).unwrap().is_none());
    }

    #[test]
    fn test_page_query_failure_aborts() {
        let db = test_db();
        db.conn_ref()
            .execute_batch("PRAGMA foreign_keys = OFF; DROP TABLE transcripts;")
            .unwrap();
        let err = backfill_transcripts(&db, &InternalDomains::defaults(), 10).unwrap_err();
        assert!(matches!(err, GateError::Storage(_)));
    }
}
