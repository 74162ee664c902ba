//! Revision range planning
//!
//! The plan is the list of revisions the fetcher reads, already in walk
//! order. A limit trims from the end the walk starts at, so a descending
//! plan with `limit = 3` holds the three newest revisions.

use crate::error::{HistoryError, HistoryResult};
use crate::types::SortOrder;

/// Plan the revisions to read for a key created at `create_revision` and
/// last modified at `mod_revision`
///
/// `limit == 0` means no limit.
pub fn plan_revisions(
    create_revision: i64,
    mod_revision: i64,
    order: SortOrder,
    limit: usize,
) -> HistoryResult<Vec<i64>> {
    if create_revision <= 0 || create_revision > mod_revision {
        return Err(HistoryError::InvalidRevisionRange { create_revision, mod_revision });
    }

    let candidates = (mod_revision - create_revision).unsigned_abs().saturating_add(1);
    let count = match limit {
        0 => candidates,
        limit => candidates.min(limit as u64),
    } as usize;

    let plan = match order {
        SortOrder::Ascending => (create_revision..=mod_revision).take(count).collect(),
        SortOrder::Descending => (create_revision..=mod_revision).rev().take(count).collect(),
    };
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_descending_full_range() {
        assert_eq!(plan_revisions(5, 8, SortOrder::Descending, 0).unwrap(), vec![8, 7, 6, 5]);
    }

    #[test]
    fn test_ascending_full_range() {
        assert_eq!(plan_revisions(5, 8, SortOrder::Ascending, 0).unwrap(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_limit_applies_from_walk_start() {
        assert_eq!(plan_revisions(5, 8, SortOrder::Ascending, 2).unwrap(), vec![5, 6]);
        assert_eq!(plan_revisions(5, 8, SortOrder::Descending, 2).unwrap(), vec![8, 7]);
    }

    #[test]
    fn test_limit_larger_than_range_is_ignored() {
        assert_eq!(plan_revisions(5, 8, SortOrder::Ascending, 100).unwrap(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_single_revision() {
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            for limit in [0, 1, 5] {
                assert_eq!(plan_revisions(5, 5, order, limit).unwrap(), vec![5]);
            }
        }
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(matches!(
            plan_revisions(9, 8, SortOrder::Ascending, 0),
            Err(HistoryError::InvalidRevisionRange { create_revision: 9, mod_revision: 8 })
        ));
        assert!(plan_revisions(0, 8, SortOrder::Ascending, 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_unlimited_plan_covers_range(create in 1i64..10_000, span in 0i64..500) {
            let modr = create + span;

            let asc = plan_revisions(create, modr, SortOrder::Ascending, 0).unwrap();
            let expected: Vec<i64> = (create..=modr).collect();
            prop_assert_eq!(&asc, &expected);

            let mut desc = plan_revisions(create, modr, SortOrder::Descending, 0).unwrap();
            prop_assert!(desc.windows(2).all(|w| w[0] - 1 == w[1]));
            desc.reverse();
            prop_assert_eq!(desc, expected);
        }

        #[test]
        fn prop_limit_trims_from_start(create in 1i64..10_000, span in 1i64..500, limit in 1usize..500) {
            let modr = create + span;
            let total = (span + 1) as usize;
            prop_assume!(limit < total);

            let asc = plan_revisions(create, modr, SortOrder::Ascending, limit).unwrap();
            prop_assert_eq!(asc.len(), limit);
            prop_assert_eq!(asc[0], create);

            let desc = plan_revisions(create, modr, SortOrder::Descending, limit).unwrap();
            prop_assert_eq!(desc.len(), limit);
            prop_assert_eq!(desc[0], modr);
        }
    }
}
