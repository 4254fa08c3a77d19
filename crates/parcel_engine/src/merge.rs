use log::debug;
use rayon::prelude::*;

use crate::error::EngineError;
use crate::geometry;
use crate::overlap::Components;
use crate::unit::ParcelUnit;

/// Fold an ordered group into its first member, unioning all geometries.
///
/// A one-member group is returned untouched; an empty one yields `None`.
pub(crate) fn fold_with_union(members: Vec<ParcelUnit>) -> Option<ParcelUnit> {
    let mut members = members.into_iter();
    let mut leader = members.next()?;

    let rest: Vec<ParcelUnit> = members.collect();
    if rest.is_empty() {
        return Some(leader);
    }

    let merged = geometry::union_all(
        std::iter::once(&leader.geometry).chain(rest.iter().map(|u| &u.geometry)),
    );
    for other in &rest {
        leader.absorb_values(other);
    }
    leader.geometry = merged;
    Some(leader)
}

/// Replace every multi-member component by one unit.
///
/// Output is ordered by leader index. The leader's identifier and
/// passthrough attributes survive; money is summed; geometry is the union of
/// all members. Singletons pass through unchanged. A component map built for
/// a different unit set is rejected before anything is touched.
pub fn merge_clusters(
    units: Vec<ParcelUnit>,
    components: &Components,
) -> Result<Vec<ParcelUnit>, EngineError> {
    if units.len() != components.len() {
        return Err(EngineError::ComponentMismatch {
            units: units.len(),
            components: components.len(),
        });
    }

    let mut slots: Vec<Option<ParcelUnit>> = units.into_iter().map(Some).collect();
    let groups: Vec<Vec<ParcelUnit>> = components
        .groups()
        .into_iter()
        .map(|members| {
            members
                .into_iter()
                .filter_map(|i| slots[i].take())
                .collect()
        })
        .collect();

    let merged: Vec<ParcelUnit> = groups
        .into_par_iter()
        .filter_map(|group| {
            if group.len() > 1 {
                debug!(
                    "merging cluster led by {} ({} members)",
                    group[0].identifier,
                    group.len()
                );
            }
            fold_with_union(group)
        })
        .collect();

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CancelToken;
    use crate::geometry::area;
    use crate::overlap::detect_overlaps;
    use geo::polygon;

    fn rect(id: &str, x0: f64, y0: f64, x1: f64, y1: f64, value: f64) -> ParcelUnit {
        ParcelUnit::new(
            id,
            polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)],
            value,
        )
    }

    #[test]
    fn overlapping_pair_merges_under_leader() {
        let units = vec![
            rect("a", 0.0, 0.0, 10.0, 10.0, 100.0).with_address("a st"),
            rect("far", 50.0, 50.0, 60.0, 60.0, 1.0),
            rect("b", 5.0, 0.0, 15.0, 10.0, 30.0).with_address("b st"),
        ];
        let comps = detect_overlaps(&units, &CancelToken::new(), 1).unwrap();
        let out = merge_clusters(units, &comps).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].identifier, "a");
        assert_eq!(out[0].address.as_deref(), Some("a st"));
        assert_eq!(out[0].market_value, 130.0);
        assert!((area(&out[0].geometry) - 150.0).abs() < 1e-6);
        assert_eq!(out[1].identifier, "far");
    }

    #[test]
    fn union_area_is_bounded_by_members() {
        let a = rect("a", 0.0, 0.0, 4.0, 4.0, 1.0);
        let b = rect("b", 2.0, 2.0, 7.0, 7.0, 1.0);
        let (area_a, area_b) = (area(&a.geometry), area(&b.geometry));
        let merged = fold_with_union(vec![a, b]).unwrap();
        let merged_area = area(&merged.geometry);

        assert!(merged_area >= area_a.max(area_b));
        assert!(merged_area < area_a + area_b);
    }

    #[test]
    fn mismatched_component_map_is_an_error() {
        let units = vec![rect("a", 0.0, 0.0, 1.0, 1.0, 1.0)];
        assert_eq!(
            merge_clusters(units, &Components::singletons(2)),
            Err(EngineError::ComponentMismatch {
                units: 1,
                components: 2
            })
        );
    }
}
