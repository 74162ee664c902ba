//! Final ordering of fetched records

use crate::types::{SortOrder, VersionRecord};

/// Stable sort of `records` by revision in the requested direction
pub fn order_records(records: &mut [VersionRecord], order: SortOrder) {
    match order {
        SortOrder::Ascending => records.sort_by_key(|r| r.revision),
        SortOrder::Descending => records.sort_by(|a, b| b.revision.cmp(&a.revision)),
    }
}
