// =============================================================================
// reconcile.rs — WHAT APPEARED, WHAT VANISHED, WHAT MOVED
// =============================================================================
//
// Two record sets, matched by name:
//
//   new      in the scrape, not in the snapshot
//   absent   in the snapshot, not in the scrape
//   changed  in both, with any field other than the name different
//
// Duplicate names are not expected from either side. If they occur, the last
// occurrence wins. The three partitions are independent of each other and are
// computed in parallel; neither input is modified.
// =============================================================================

use std::collections::HashMap;

use crate::models::Record;

/// The three-way split of one reconciliation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Partition {
    pub new: Vec<Record>,
    pub absent: Vec<Record>,
    /// `(stored, scraped)` pairs.
    pub changed: Vec<(Record, Record)>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.absent.is_empty() && self.changed.is_empty()
    }
}

/// Name index over a record slice. Later entries replace earlier ones.
fn index_by_name(records: &[Record]) -> HashMap<&str, &Record> {
    records.iter().map(|r| (r.name.as_str(), r)).collect()
}

/// The records of `records` that survive last-wins deduplication, in order.
fn distinct<'a>(
    records: &'a [Record],
    index: &'a HashMap<&'a str, &'a Record>,
) -> impl Iterator<Item = &'a Record> + 'a {
    records
        .iter()
        .filter(move |r| std::ptr::eq(index[r.name.as_str()], *r))
}

/// Records in `current` whose name does not appear in `snapshot`.
pub fn new_records(snapshot: &[Record], current: &[Record]) -> Vec<Record> {
    let known = index_by_name(snapshot);
    let current_index = index_by_name(current);

    distinct(current, &current_index)
        .filter(|r| !known.contains_key(r.name.as_str()))
        .cloned()
        .collect()
}

/// Records in `snapshot` whose name does not appear in `current`.
pub fn absent_records(snapshot: &[Record], current: &[Record]) -> Vec<Record> {
    new_records(current, snapshot)
}

/// Same name on both sides, different record.
pub fn changed_records(snapshot: &[Record], current: &[Record]) -> Vec<(Record, Record)> {
    let known = index_by_name(snapshot);
    let current_index = index_by_name(current);

    distinct(current, &current_index)
        .filter_map(|scraped| {
            known
                .get(scraped.name.as_str())
                .filter(|stored| **stored != scraped)
                .map(|stored| ((*stored).clone(), scraped.clone()))
        })
        .collect()
}

/// Compute all three partitions.
pub fn reconcile(snapshot: &[Record], current: &[Record]) -> Partition {
    let (new, (absent, changed)) = rayon::join(
        || new_records(snapshot, current),
        || {
            rayon::join(
                || absent_records(snapshot, current),
                || changed_records(snapshot, current),
            )
        },
    );

    Partition {
        new,
        absent,
        changed,
    }
}
