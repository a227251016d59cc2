//! Display ordering of favorite records.

use std::cmp::Ordering;

use super::favorite::FavoriteRecord;

/// Order two records for display: most likes first, then by name, then by
/// place ID so that the order is total.
///
/// Names compare byte-wise and case-sensitively, which matches MongoDB's
/// default collation.
pub fn ranking_order(a: &FavoriteRecord, b: &FavoriteRecord) -> Ordering {
    b.likes
        .cmp(&a.likes)
        .then_with(|| a.place_name.cmp(&b.place_name))
        .then_with(|| a.place_id.cmp(&b.place_id))
}

/// Sort the given records into their ranking.
pub fn rank(mut records: Vec<FavoriteRecord>) -> Vec<FavoriteRecord> {
    records.sort_by(ranking_order);
    records
}
