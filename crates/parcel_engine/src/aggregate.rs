use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;

use crate::merge::fold_with_union;
use crate::unit::ParcelUnit;

/// Collapse every identifier to one unit.
///
/// Groups are emitted in order of each identifier's first appearance and
/// members keep input order, so the first record supplies the passthrough
/// attributes. Geometries of multi-record identifiers are unioned;
/// non-contiguous parts survive as separate polygons.
pub fn aggregate_by_identifier(units: Vec<ParcelUnit>) -> Vec<ParcelUnit> {
    let input = units.len();
    let groups = group_in_order(units.into_iter().map(|unit| (unit.identifier.clone(), unit)));

    let merged: Vec<ParcelUnit> = groups.into_par_iter().filter_map(fold_with_union).collect();

    debug!(
        "identifier aggregation: {} records -> {} identifiers",
        input,
        merged.len()
    );
    merged
}

/// Bucket keyed units, keeping first-seen group order and member order.
pub(crate) fn group_in_order<K, I>(keyed: I) -> Vec<Vec<ParcelUnit>>
where
    K: std::hash::Hash + Eq,
    I: IntoIterator<Item = (K, ParcelUnit)>,
{
    let mut slot_of: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<ParcelUnit>> = Vec::new();

    for (key, unit) in keyed {
        let next = groups.len();
        let slot = *slot_of.entry(key).or_insert(next);
        if slot == next {
            groups.push(Vec::with_capacity(1));
        }
        groups[slot].push(unit);
    }

    groups
}
