//! Attach assessed values, addresses and taxes to parcel geometries.

use log::{debug, info, warn};
use parcel_engine::{geometry, valuation, ParcelUnit};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::geojson::RawParcel;
use crate::tables::{clean_pin_10digit, AssessorEntry};

/// Lookup tables keyed by PIN-10.
#[derive(Debug, Default)]
pub struct Tables {
    pub assessor: HashMap<String, AssessorEntry>,
    pub addresses: HashMap<String, String>,
    /// `Some` turns on tax figures for every unit of the run.
    pub taxes: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub features: usize,
    pub matched: usize,
    pub bad_pin: usize,
}

impl JoinStats {
    pub fn match_rate(&self) -> f64 {
        if self.features == 0 {
            0.0
        } else {
            self.matched as f64 / self.features as f64 * 100.0
        }
    }
}

/// Build priced [`ParcelUnit`]s for every parcel with an assessed value.
///
/// Each PIN's assessed value (and tax) is carried by the first feature with
/// that PIN whose geometry passes the engine's validity check; later features
/// of the same PIN bring only their geometry, so the identifier aggregation
/// stage sums each PIN's value exactly once. Invalid features carry nothing,
/// so excluding them never takes a PIN's value along.
pub fn join(parcels: Vec<RawParcel>, tables: &Tables) -> (Vec<ParcelUnit>, JoinStats) {
    let mut stats = JoinStats {
        features: parcels.len(),
        ..JoinStats::default()
    };
    let mut matched: HashSet<String> = HashSet::new();
    let mut valued: HashSet<String> = HashSet::new();
    let mut units = Vec::with_capacity(parcels.len());

    let valid: Vec<bool> = parcels
        .par_iter()
        .map(|parcel| geometry::invalidity(&parcel.geometry).is_none())
        .collect();

    for (parcel, valid) in parcels.into_iter().zip(valid) {
        let Some(pin) = clean_pin_10digit(&parcel.pin) else {
            stats.bad_pin += 1;
            continue;
        };
        let Some(entry) = tables.assessor.get(&pin) else {
            continue;
        };
        stats.matched += 1;
        matched.insert(pin.clone());

        let first = valid && valued.insert(pin.clone());
        let assessed = if first { entry.value } else { 0.0 };
        if !valid {
            debug!("{}: invalid geometry record, value left to a valid one", pin);
        } else if !first {
            debug!("{}: additional geometry record, value already assigned", pin);
        }

        let mut unit = ParcelUnit::new(pin.clone(), parcel.geometry, assessed);
        unit.classification = entry.class.clone();
        unit.address = tables.addresses.get(&pin).cloned();
        unit.secondary_identifier = parcel.secondary.and_then(|s| clean_secondary(&s));
        if let Some(taxes) = &tables.taxes {
            let amount = if first { taxes.get(&pin).copied().unwrap_or(0.0) } else { 0.0 };
            unit = unit.with_tax(amount);
        }
        valuation::price(&mut unit);

        units.push(unit);
    }

    let unvalued = matched.len() - valued.len();
    if unvalued > 0 {
        warn!(
            "{} PINs have no valid geometry; their assessed value is dropped with them",
            unvalued
        );
    }

    info!(
        "Match rate: {:.1}% ({}/{}), {} features with unusable PIN",
        stats.match_rate(),
        stats.matched,
        stats.features,
        stats.bad_pin
    );
    (units, stats)
}

fn clean_secondary(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
    let cleaned = cleaned.split('.').next().unwrap_or_default();
    (!cleaned.is_empty()).then(|| cleaned.to_owned())
}
