//! Parcel consolidation and valuation engine.
//!
//! Turns noisy per-record land parcels into one record per physically and
//! fiscally distinct land unit:
//!
//! 0. ingest     - re-check geometry validity (exclude or abort, caller's call)
//! 1. aggregate  - one unit per identifier, geometries unioned, money summed
//! 2. dedup      - bit-identical geometries under different identifiers folded
//! 3. overlap    - R-tree + interior-intersection predicate + union-find
//! 4. merge      - each overlap cluster unioned under its smallest-index leader
//! 5. metrics    - area, value per area/acre, tax ratios from final state
//!
//! Every stage is a plain function over `Vec<ParcelUnit>` and can be re-run
//! on a persisted intermediate. Monetary figures are only ever summed, so
//! total market value is conserved by every stage. "First" always means
//! first in input order.
//!
//! The engine does no I/O; a batch driver reads and writes the data.

pub mod aggregate;
pub mod config;
pub mod dedup;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod merge;
pub mod metrics;
pub mod overlap;
pub mod unit;
pub mod valuation;

use log::info;

pub use config::{AreaUnit, CancelToken, EngineConfig, InvalidGeometryPolicy};
pub use error::EngineError;
pub use overlap::Components;
pub use unit::{ParcelUnit, TaxRecord, UnitMetrics};

/// Unit counts after each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub input: usize,
    pub excluded: usize,
    pub after_identifier: usize,
    pub after_dedup: usize,
    pub clusters: usize,
    pub output: usize,
}

/// Result of a full run: the consolidated units plus per-record diagnostics
/// (`InvalidGeometry` for excluded records, `ZeroAreaResult` for survivors
/// without metrics).
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub units: Vec<ParcelUnit>,
    pub diagnostics: Vec<EngineError>,
    pub counts: StageCounts,
}

fn check(cancel: &CancelToken, stage: &'static str) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
        Err(EngineError::Cancelled { stage })
    } else {
        Ok(())
    }
}

/// Run every stage over `units`.
pub fn consolidate(
    units: Vec<ParcelUnit>,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<Consolidation, EngineError> {
    let mut counts = StageCounts {
        input: units.len(),
        ..StageCounts::default()
    };

    let (units, mut diagnostics) = ingest::screen(units, config.invalid_geometry)?;
    counts.excluded = diagnostics.len();
    check(cancel, "ingestion")?;

    let units = aggregate::aggregate_by_identifier(units);
    counts.after_identifier = units.len();
    check(cancel, "identifier aggregation")?;

    let units = dedup::collapse_exact_duplicates(units);
    counts.after_dedup = units.len();
    check(cancel, "duplicate collapse")?;

    let components = overlap::detect_overlaps(&units, cancel, config.progress_every)?;
    counts.clusters = components.cluster_count();

    let mut units = merge::merge_clusters(units, &components)?;
    counts.output = units.len();
    check(cancel, "cluster merge")?;

    diagnostics.extend(metrics::recompute_metrics(
        &mut units,
        config.area_unit,
        config.min_area,
    ));

    info!(
        "consolidated {} records -> {} units ({} excluded, {} identifiers, {} distinct shapes, {} overlap clusters, {} diagnostics)",
        counts.input,
        counts.output,
        counts.excluded,
        counts.after_identifier,
        counts.after_dedup,
        counts.clusters,
        diagnostics.len()
    );

    Ok(Consolidation {
        units,
        diagnostics,
        counts,
    })
}
