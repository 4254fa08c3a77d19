use geo::MultiPolygon;
use rayon::prelude::*;

use crate::config::AreaUnit;
use crate::error::EngineError;
use crate::geometry;
use crate::unit::{ParcelUnit, UnitMetrics};

/// Area below this fraction of the squared bounding-box span is float noise.
///
/// A 1 ft wide strip stays measurable at any realistic length; a 10 ft long
/// sliver 1e-12 ft wide does not.
pub const DEGENERATE_AREA_RATIO: f64 = 1e-9;

/// Smallest area that still yields metrics for `geometry`.
pub fn area_floor(shape: &MultiPolygon<f64>, min_area: f64) -> f64 {
    let span = geometry::span(shape);
    min_area.max(DEGENERATE_AREA_RATIO * span * span)
}

/// Derive the per-area figures of one unit from its current geometry and value.
///
/// Fails with `ZeroAreaResult` when the area is not strictly above
/// [`area_floor`] (or not finite), instead of producing an infinite or
/// meaningless ratio.
pub fn unit_metrics(
    unit: &ParcelUnit,
    area_unit: AreaUnit,
    min_area: f64,
) -> Result<UnitMetrics, EngineError> {
    let area = geometry::area(&unit.geometry);
    if !area.is_finite() || area <= area_floor(&unit.geometry, min_area) {
        return Err(EngineError::ZeroAreaResult {
            identifier: unit.identifier.clone(),
            area,
        });
    }

    let acres = area / area_unit.per_acre();
    let tax = unit.tax.map(|t| t.amount);

    Ok(UnitMetrics {
        area,
        value_per_area: unit.market_value / area,
        acres,
        value_per_acre: unit.market_value / acres,
        tax_per_area: tax.map(|t| t / area),
        effective_tax_rate: tax
            .filter(|_| unit.market_value > 0.0)
            .map(|t| t / unit.market_value),
    })
}

/// Recompute metrics for every unit after all merging is finished.
///
/// Zero-area units keep `metrics = None` and are reported, never dropped.
pub fn recompute_metrics(
    units: &mut [ParcelUnit],
    area_unit: AreaUnit,
    min_area: f64,
) -> Vec<EngineError> {
    units
        .par_iter_mut()
        .filter_map(|unit| match unit_metrics(unit, area_unit, min_area) {
            Ok(metrics) => {
                unit.metrics = Some(metrics);
                None
            }
            Err(err) => {
                unit.metrics = None;
                Some(err)
            }
        })
        .collect()
}
