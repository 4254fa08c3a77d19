use log::debug;
use rayon::prelude::*;

use crate::aggregate::group_in_order;
use crate::geometry::GeometryKey;
use crate::unit::ParcelUnit;

/// Fold units whose geometries are coordinate-for-coordinate identical.
///
/// Identity is judged by [`GeometryKey`], so the same rings recorded from a
/// different start vertex or in the opposite winding still match.
///
/// The first unit of each group (input order) keeps its geometry and
/// passthrough attributes; monetary figures of the rest are added to it.
/// Shapes that are merely equal in area, or equal up to a tolerance, are
/// left alone for the overlap stage.
pub fn collapse_exact_duplicates(units: Vec<ParcelUnit>) -> Vec<ParcelUnit> {
    let input = units.len();

    let keys: Vec<GeometryKey> = units
        .par_iter()
        .map(|unit| GeometryKey::of(&unit.geometry))
        .collect();
    let groups = group_in_order(keys.into_iter().zip(units));

    let collapsed: Vec<ParcelUnit> = groups
        .into_iter()
        .filter_map(|group| {
            let mut members = group.into_iter();
            let mut keeper = members.next()?;
            for dup in members {
                debug!(
                    "duplicate geometry: {} folded into {}",
                    dup.identifier, keeper.identifier
                );
                keeper.absorb_values(&dup);
            }
            Some(keeper)
        })
        .collect();

    debug!(
        "duplicate collapse: {} units -> {} distinct geometries",
        input,
        collapsed.len()
    );
    collapsed
}
