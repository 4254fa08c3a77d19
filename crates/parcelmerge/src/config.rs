use clap::{Parser, ValueEnum};
use parcel_engine::{AreaUnit, EngineConfig, InvalidGeometryPolicy};
use std::path::PathBuf;

/// Linear unit of the parcel layer's projected coordinates.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Units {
    /// US survey feet (Illinois East state plane).
    Feet,
    Meters,
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Units::Feet => "feet",
            Units::Meters => "meters",
        };

        f.write_str(s)
    }
}

/// What to do with parcels whose geometry is self-intersecting or empty.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OnInvalid {
    /// Stop the run at the first invalid parcel.
    Abort,
    /// Drop the parcel and report it.
    Exclude,
}

impl std::fmt::Display for OnInvalid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OnInvalid::Abort => "abort",
            OnInvalid::Exclude => "exclude",
        };

        f.write_str(s)
    }
}

/// `parcelmerge` - consolidate assessor parcels into distinct land units.
///
/// Joins a projected parcel layer with assessed values and addresses, merges
/// split, duplicated and overlapping parcels, and writes value-per-acre
/// figures for every resulting land unit.
#[derive(Parser, Debug, Clone)]
#[command(name = "parcelmerge", version, about, long_about = None)]
pub struct Args {
    /// Parcel FeatureCollection (GeoJSON) in a projected coordinate system.
    #[arg(long, env = "PARCELS_GEOJSON")]
    pub parcels: PathBuf,

    /// Assessed values CSV (`pin`, `board_tot`, `certified_tot`, `class`, `tax_year`).
    #[arg(long, env = "ASSESSOR_CSV")]
    pub assessor: PathBuf,

    /// Parcel addresses CSV (`pin10`, `property_address`, `property_city`, ...).
    #[arg(long, env = "ADDRESSES_CSV")]
    pub addresses: Option<PathBuf>,

    /// Optional tax bills CSV (`pin`, `tax_amount`); enables tax metrics.
    #[arg(long, env = "TAXES_CSV")]
    pub taxes: Option<PathBuf>,

    #[arg(long, default_value = "parcels_final.geojson")]
    pub output: PathBuf,

    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Feature property holding the parcel PIN.
    #[arg(long, default_value = "PIN10")]
    pub pin_property: String,

    /// Feature property carried through as the secondary identifier.
    #[arg(long, default_value = "PIN14")]
    pub secondary_property: String,

    /// Only use assessor rows of this tax year.
    #[arg(long)]
    pub tax_year: Option<i32>,

    #[arg(long, value_enum, default_value_t = Units::Feet)]
    pub units: Units,

    #[arg(long, value_enum, default_value_t = OnInvalid::Exclude)]
    pub on_invalid: OnInvalid,

    /// Consolidated units at or below this area are reported as zero-area.
    #[arg(long, default_value_t = 0.0)]
    pub min_area: f64,

    /// Log an overlap-scan progress line every N units.
    #[arg(long, default_value_t = 100_000)]
    pub progress_every: usize,

    /// Worker threads (default: one per core).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Rows shown in the top-N summary tables.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            invalid_geometry: match self.on_invalid {
                OnInvalid::Abort => InvalidGeometryPolicy::Abort,
                OnInvalid::Exclude => InvalidGeometryPolicy::Exclude,
            },
            area_unit: match self.units {
                Units::Feet => AreaUnit::SquareFeet,
                Units::Meters => AreaUnit::SquareMeters,
            },
            min_area: self.min_area,
            progress_every: self.progress_every,
        }
    }
}
