//! Tabular inputs keyed by 10-digit PIN: assessed values, addresses, taxes.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Standardise a PIN to its first 10 digits.
///
/// Dashes, spaces and a trailing decimal part (`"1234.0"` from numeric
/// columns) are removed; shorter PINs are zero-padded on the left.
pub fn clean_pin_10digit(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
    let cleaned = cleaned.split('.').next().unwrap_or_default();
    if cleaned.is_empty() {
        return None;
    }

    let head: String = cleaned.chars().take(10).collect();
    Some(format!("{head:0>10}"))
}

/// Parse an amount such as `"$12,345.00"`. Empty or malformed -> `None`.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Deserialize)]
struct AssessorRow {
    pin: String,
    #[serde(default)]
    tax_year: Option<i32>,
    #[serde(default)]
    board_tot: Option<String>,
    #[serde(default)]
    certified_tot: Option<String>,
    #[serde(default)]
    class: Option<String>,
}

/// Assessed value of one PIN-10, summed over its condo units.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessorEntry {
    pub value: f64,
    pub class: Option<String>,
}

/// Load assessed values, preferring the board-of-review total over the
/// certified total, summing per PIN-10 and keeping the first class seen.
pub fn load_assessor(path: &Path, tax_year: Option<i32>) -> Result<HashMap<String, AssessorEntry>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening assessor table {}", path.display()))?;

    let mut out: HashMap<String, AssessorEntry> = HashMap::new();
    let (mut rows, mut other_year, mut unvalued) = (0usize, 0usize, 0usize);

    for row in reader.deserialize::<AssessorRow>() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        rows += 1;

        if let (Some(want), Some(year)) = (tax_year, row.tax_year) {
            if want != year {
                other_year += 1;
                continue;
            }
        }

        let value = row
            .board_tot
            .as_deref()
            .and_then(parse_money)
            .or_else(|| row.certified_tot.as_deref().and_then(parse_money));
        let (Some(value), Some(pin)) = (value, clean_pin_10digit(&row.pin)) else {
            unvalued += 1;
            continue;
        };

        let class = row.class.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty());
        out.entry(pin)
            .and_modify(|e| e.value += value)
            .or_insert(AssessorEntry { value, class });
    }

    info!(
        "Assessor: {} rows, {} PINs ({} other year, {} without value)",
        rows,
        out.len(),
        other_year,
        unvalued
    );
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct AddressRow {
    pin10: String,
    #[serde(default)]
    property_address: Option<String>,
    #[serde(default)]
    property_city: Option<String>,
    #[serde(default)]
    property_state: Option<String>,
    #[serde(default)]
    property_zip: Option<String>,
}

fn full_address(row: &AddressRow) -> String {
    let part = |p: &Option<String>| p.as_deref().unwrap_or("").trim().to_owned();
    let zip = part(&row.property_zip);
    let zip = zip.strip_suffix(".0").unwrap_or(zip.as_str());
    let state_zip = format!("{} {}", part(&row.property_state), zip);

    [part(&row.property_address), part(&row.property_city), state_zip.trim().to_owned()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One formatted street address per PIN-10; the first row wins.
pub fn load_addresses(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening address table {}", path.display()))?;

    let mut out = HashMap::new();
    for row in reader.deserialize::<AddressRow>() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        let Some(pin) = clean_pin_10digit(&row.pin10) else {
            continue;
        };
        out.entry(pin).or_insert_with(|| full_address(&row));
    }

    info!("Addresses: {} PINs", out.len());
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct TaxRow {
    pin: String,
    tax_amount: String,
}

/// Billed tax per PIN-10, summed.
pub fn load_taxes(path: &Path) -> Result<HashMap<String, f64>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening tax table {}", path.display()))?;

    let mut out: HashMap<String, f64> = HashMap::new();
    for row in reader.deserialize::<TaxRow>() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        match (clean_pin_10digit(&row.pin), parse_money(&row.tax_amount)) {
            (Some(pin), Some(amount)) => *out.entry(pin).or_default() += amount,
            _ => debug!("skipping tax row for {:?}", row.pin),
        }
    }

    info!("Taxes: {} PINs", out.len());
    Ok(out)
}
