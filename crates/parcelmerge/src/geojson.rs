//! Minimal GeoJSON FeatureCollection reading and writing for parcel layers.

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use log::{debug, info, warn};
use parcel_engine::ParcelUnit;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// A parcel feature before any joining: its raw PIN and polygonal shape.
#[derive(Debug, Clone)]
pub struct RawParcel {
    pub pin: String,
    pub secondary: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

fn ring(positions: Vec<Vec<f64>>) -> Result<LineString<f64>> {
    positions
        .into_iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => bail!("position with fewer than two ordinates"),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>> {
    let mut rings = rings.into_iter().map(ring);
    let exterior = rings.next().context("polygon without exterior ring")??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn to_multipolygon(geometry: Geometry) -> Result<Option<MultiPolygon<f64>>> {
    match geometry.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(geometry.coordinates)?;
            Ok(Some(MultiPolygon::new(vec![polygon(rings)?])))
        }
        "MultiPolygon" => {
            let polys: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(geometry.coordinates)?;
            let polys = polys.into_iter().map(polygon).collect::<Result<Vec<_>>>()?;
            Ok(Some(MultiPolygon::new(polys)))
        }
        _ => Ok(None),
    }
}

/// Property value as text; numeric PINs become their decimal form.
fn property_text(props: &Map<String, Value>, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First property whose name mentions "pin", case-insensitively.
fn guess_pin_key(props: &Map<String, Value>) -> Option<&str> {
    props
        .keys()
        .find(|k| k.to_ascii_lowercase().contains("pin"))
        .map(String::as_str)
}

/// Parse a parcel FeatureCollection from any reader.
///
/// Features without polygonal geometry or without a PIN are skipped with a
/// warning; malformed coordinates are an error.
pub fn parse_parcels<R: Read>(
    reader: R,
    pin_key: &str,
    secondary_key: &str,
) -> Result<Vec<RawParcel>> {
    let root: FeatureCollection = serde_json::from_reader(reader)?;
    let total = root.features.len();

    let mut parcels = Vec::with_capacity(total);
    let (mut no_geometry, mut no_pin) = (0usize, 0usize);

    for (i, feature) in root.features.into_iter().enumerate() {
        let props = feature.properties.unwrap_or_default();

        let Some(geometry) = feature.geometry else {
            no_geometry += 1;
            continue;
        };
        let Some(geometry) =
            to_multipolygon(geometry).with_context(|| format!("feature #{i}"))?
        else {
            no_geometry += 1;
            continue;
        };

        let pin = property_text(&props, pin_key)
            .or_else(|| guess_pin_key(&props).and_then(|k| property_text(&props, k)));
        let Some(pin) = pin else {
            no_pin += 1;
            continue;
        };

        parcels.push(RawParcel {
            pin,
            secondary: property_text(&props, secondary_key),
            geometry,
        });
    }

    if no_geometry + no_pin > 0 {
        warn!(
            "Skipped {} features without polygon geometry and {} without a PIN",
            no_geometry, no_pin
        );
    }
    debug!("Parsed {} of {} features", parcels.len(), total);
    Ok(parcels)
}

pub fn read_parcels(path: &Path, pin_key: &str, secondary_key: &str) -> Result<Vec<RawParcel>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let parcels = parse_parcels(BufReader::new(file), pin_key, secondary_key)
        .with_context(|| format!("parsing {}", path.display()))?;

    info!("Loaded {} parcels from {}", parcels.len(), path.display());
    Ok(parcels)
}

fn ring_coords(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_coords(poly: &Polygon<f64>) -> Value {
    Value::Array(
        std::iter::once(poly.exterior())
            .chain(poly.interiors())
            .map(ring_coords)
            .collect(),
    )
}

fn geometry_json(geometry: &MultiPolygon<f64>) -> Value {
    match geometry.0.as_slice() {
        [single] => json!({ "type": "Polygon", "coordinates": polygon_coords(single) }),
        many => json!({
            "type": "MultiPolygon",
            "coordinates": many.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
    }
}

/// One output feature. Metric fields are `null` for zero-area units.
pub fn unit_feature(unit: &ParcelUnit) -> Value {
    let m = unit.metrics.as_ref();
    json!({
        "type": "Feature",
        "geometry": geometry_json(&unit.geometry),
        "properties": {
            "pin_10": unit.identifier,
            "pin_14": unit.secondary_identifier,
            "class": unit.classification,
            "full_address": unit.address,
            "assessed_value": unit.assessed_value,
            "market_value": unit.market_value,
            "area": m.map(|m| m.area),
            "acres": m.map(|m| m.acres),
            "value_per_area": m.map(|m| m.value_per_area),
            "value_per_acre": m.map(|m| m.value_per_acre),
            "tax_amount": unit.tax.map(|t| t.amount),
            "tax_per_area": m.and_then(|m| m.tax_per_area),
            "effective_tax_rate": m.and_then(|m| m.effective_tax_rate),
        }
    })
}

pub fn write_units<W: Write>(writer: W, units: &[ParcelUnit]) -> Result<()> {
    let collection = json!({
        "type": "FeatureCollection",
        "features": units.iter().map(unit_feature).collect::<Vec<_>>(),
    });
    serde_json::to_writer(writer, &collection)?;
    Ok(())
}

pub fn write_units_file(path: &Path, units: &[ParcelUnit], overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!("{} exists (pass --overwrite to replace it)", path.display());
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_units(&mut writer, units)?;
    writer.flush()?;

    let size_mb = std::fs::metadata(path)?.len() as f64 / (1024.0 * 1024.0);
    info!("Wrote {} units to {} ({:.1} MB)", units.len(), path.display(), size_mb);
    Ok(())
}
