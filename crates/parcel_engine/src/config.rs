use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What to do with a record whose geometry fails the ingestion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvalidGeometryPolicy {
    /// Fail the whole run on the first invalid record.
    Abort,
    /// Drop the record and keep an `InvalidGeometry` diagnostic.
    #[default]
    Exclude,
}

/// Linear unit of the projected coordinate system, used for acreage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AreaUnit {
    /// State-plane style US survey feet (the Cook County parcel layer).
    #[default]
    SquareFeet,
    SquareMeters,
}

impl AreaUnit {
    pub const SQFT_PER_ACRE: f64 = 43_560.0;
    pub const SQM_PER_ACRE: f64 = 4_046.856_422_4;

    #[inline]
    pub fn per_acre(self) -> f64 {
        match self {
            AreaUnit::SquareFeet => Self::SQFT_PER_ACRE,
            AreaUnit::SquareMeters => Self::SQM_PER_ACRE,
        }
    }
}

/// Tuning knobs for one consolidation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub invalid_geometry: InvalidGeometryPolicy,
    pub area_unit: AreaUnit,
    /// Units whose final area is at or below this value get a `ZeroAreaResult`.
    /// Near-zero areas relative to the unit's own extent are reported even at
    /// the default of `0.0`; see [`crate::metrics::DEGENERATE_AREA_RATIO`].
    pub min_area: f64,
    /// Log a progress line every N units during the overlap scan.
    pub progress_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            invalid_geometry: InvalidGeometryPolicy::default(),
            area_unit: AreaUnit::default(),
            min_area: 0.0,
            progress_every: 100_000,
        }
    }
}

/// Run-level cancellation flag shared between the caller and the engine.
///
/// Cancelling is sticky: once set, every later check reports it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
