mod config;
mod geojson;
mod join;
mod report;
mod tables;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use parcel_engine::{consolidate, CancelToken};
use std::time::Instant;

use crate::config::Args;
use crate::join::Tables;
use crate::report::Summary;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    info!(
        "parcelmerge: {} -> {} (units: {}, invalid geometry: {})",
        args.parcels.display(),
        args.output.display(),
        args.units,
        args.on_invalid
    );

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring worker threads")?;
    }

    let started = Instant::now();

    // ---------------------------------------------------------------------
    // Lookup tables
    // ---------------------------------------------------------------------
    let tables = Tables {
        assessor: tables::load_assessor(&args.assessor, args.tax_year)?,
        addresses: match &args.addresses {
            Some(path) => tables::load_addresses(path)?,
            None => Default::default(),
        },
        taxes: args.taxes.as_deref().map(tables::load_taxes).transpose()?,
    };

    // ---------------------------------------------------------------------
    // Parcel geometries, joined and priced
    // ---------------------------------------------------------------------
    let parcels = geojson::read_parcels(&args.parcels, &args.pin_property, &args.secondary_property)?;
    let (units, stats) = join::join(parcels, &tables);
    if stats.matched == 0 {
        warn!("No parcel matched an assessor record; output will be empty");
    }

    // ---------------------------------------------------------------------
    // Consolidate
    // ---------------------------------------------------------------------
    let result = consolidate(units, &args.engine_config(), &CancelToken::new())
        .context("consolidating parcels")?;

    for diagnostic in &result.diagnostics {
        warn!("{diagnostic}");
    }

    geojson::write_units_file(&args.output, &result.units, args.overwrite)?;

    Summary::new(&result, args.top).log();
    info!(
        "Done in {:.1}s: {} parcels -> {} land units",
        started.elapsed().as_secs_f64(),
        stats.matched,
        result.units.len()
    );

    Ok(())
}
