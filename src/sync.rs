// =============================================================================
// sync.rs — WRITING THE PARTITIONS BACK
// =============================================================================
//
// Each non-empty partition becomes one store call. Empty partitions are not
// sent at all. A failed call is logged and the remaining calls still run;
// nothing here aborts the process.
// =============================================================================

use tracing::{error, info};

use crate::error::StoreError;
use crate::reconcile::Partition;
use crate::store::RecordStore;

/// Outcome of one store call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub attempted: usize,
    pub applied: usize,
}

/// Outcome of a whole sync pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: StageReport,
    pub closed: StageReport,
    pub updated: StageReport,
}

impl SyncReport {
    pub fn applied(&self) -> usize {
        self.inserted.applied + self.closed.applied + self.updated.applied
    }
}

/// Apply a reconciliation result to the store.
pub async fn apply_partition(store: &impl RecordStore, partition: &Partition) -> SyncReport {
    let mut report = SyncReport::default();

    if !partition.new.is_empty() {
        let result = store.insert(&partition.new).await;
        report.inserted = stage("insert", partition.new.len(), result);
    }

    if !partition.absent.is_empty() {
        let result = store.mark_absent(&partition.absent).await;
        report.closed = stage("mark_absent", partition.absent.len(), result);
    }

    if !partition.changed.is_empty() {
        let result = store.update(&partition.changed).await;
        report.updated = stage("update", partition.changed.len(), result);
    }

    report
}

fn stage(operation: &'static str, attempted: usize, result: Result<usize, StoreError>) -> StageReport {
    match result {
        Ok(applied) => {
            info!(operation, attempted, applied, "{} out of {} records applied", applied, attempted);
            StageReport { attempted, applied }
        }
        Err(e) => {
            error!(operation, attempted, error = %e, "sync stage failed");
            StageReport {
                attempted,
                applied: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record;
    use crate::reconcile::reconcile;
    use crate::store::tests::MemoryStore;

    #[tokio::test]
    async fn test_empty_partition_touches_nothing() {
        let store = MemoryStore::default();
        let report = apply_partition(&store, &Partition::default()).await;

        assert_eq!(report, SyncReport::default());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_only_non_empty_partitions_are_sent() {
        let stored = vec![record("ABS 7", 116.0)];
        let scraped = vec![record("ABS 7", 116.0), record("Optus D3", 156.0)];
        let store = MemoryStore::with_active(&stored);

        let report = apply_partition(&store, &reconcile(&stored, &scraped)).await;

        assert_eq!(store.calls(), vec!["insert"]);
        assert_eq!(report.inserted, StageReport { attempted: 1, applied: 1 });
        assert_eq!(report.closed, StageReport::default());
    }

    #[tokio::test]
    async fn test_full_pass_leaves_store_matching_scrape() {
        let stored = vec![record("ABS 7", 116.0), record("Gone 1", 1.0), record("Optus D3", 156.0)];
        let scraped = vec![record("ABS 7", 116.5), record("Optus D3", 156.0), record("Optus 10", 156.0)];
        let store = MemoryStore::with_active(&stored);

        let report = apply_partition(&store, &reconcile(&stored, &scraped)).await;

        assert_eq!(store.calls(), vec!["insert", "mark_absent", "update"]);
        assert_eq!(report.applied(), 3);

        let mut active = store.load_active().await.unwrap();
        let mut expected = scraped.clone();
        crate::models::sort_by_position_name(&mut active);
        crate::models::sort_by_position_name(&mut expected);
        assert_eq!(active, expected);
        assert!(store.closed.lock().unwrap().contains_key("Gone 1"));
    }

    #[tokio::test]
    async fn test_failed_commit_reports_nothing_and_later_stages_run() {
        let stored = vec![record("ABS 7", 116.0), record("Gone 1", 1.0)];
        let scraped = vec![record("ABS 7", 117.0), record("Fresh 1", 2.0)];
        let store = MemoryStore {
            failing: Some("insert"),
            ..MemoryStore::with_active(&stored)
        };

        let report = apply_partition(&store, &reconcile(&stored, &scraped)).await;

        assert_eq!(store.calls(), vec!["insert", "mark_absent", "update"]);
        assert_eq!(report.inserted, StageReport { attempted: 1, applied: 0 });
        assert_eq!(report.closed, StageReport { attempted: 1, applied: 1 });
        assert_eq!(report.updated, StageReport { attempted: 1, applied: 1 });
    }

    #[tokio::test]
    async fn test_refused_record_is_skipped_and_siblings_counted() {
        let stored = vec![record("ABS 7", 116.0)];
        let scraped = vec![
            record("ABS 7", 116.0),
            record("Optus D3", 156.0),
            record("Optus 10", 156.0),
            record("Galaxy 15", -133.0),
        ];
        let store = MemoryStore {
            rejected: vec!["Optus 10"],
            ..MemoryStore::with_active(&stored)
        };

        let report = apply_partition(&store, &reconcile(&stored, &scraped)).await;

        assert_eq!(report.inserted, StageReport { attempted: 3, applied: 2 });
        let active = store.active.lock().unwrap();
        assert!(active.contains_key("Optus D3"));
        assert!(active.contains_key("Galaxy 15"));
        assert!(!active.contains_key("Optus 10"));
    }
}
