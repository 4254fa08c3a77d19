use log::warn;
use rayon::prelude::*;

use crate::config::InvalidGeometryPolicy;
use crate::error::EngineError;
use crate::geometry;
use crate::unit::ParcelUnit;

/// Re-check geometry validity before anything merges.
///
/// Under [`InvalidGeometryPolicy::Exclude`] the offending records are dropped
/// and returned as diagnostics; under `Abort` the first one (by input order)
/// fails the run. Survivors keep their input order.
pub fn screen(
    units: Vec<ParcelUnit>,
    policy: InvalidGeometryPolicy,
) -> Result<(Vec<ParcelUnit>, Vec<EngineError>), EngineError> {
    let verdicts: Vec<Option<&'static str>> = units
        .par_iter()
        .map(|unit| geometry::invalidity(&unit.geometry))
        .collect();

    let mut kept = Vec::with_capacity(units.len());
    let mut rejected = Vec::new();

    for (unit, verdict) in units.into_iter().zip(verdicts) {
        let Some(reason) = verdict else {
            kept.push(unit);
            continue;
        };

        let err = EngineError::InvalidGeometry {
            identifier: unit.identifier,
            reason: reason.to_owned(),
        };
        match policy {
            InvalidGeometryPolicy::Abort => return Err(err),
            InvalidGeometryPolicy::Exclude => {
                warn!("{err}; record excluded");
                rejected.push(err);
            }
        }
    }

    Ok((kept, rejected))
}
