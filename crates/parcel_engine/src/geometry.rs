//! Thin layer over `geo` holding every geometric decision the stages share.

use geo::{
    Area, BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon, Relate, Validation,
    Winding,
};
use rstar::AABB;

/// Why a geometry was rejected at ingestion, or `None` when it is usable.
pub fn invalidity(geometry: &MultiPolygon<f64>) -> Option<&'static str> {
    if geometry.0.is_empty() {
        return Some("empty geometry");
    }

    let finite = geometry
        .iter()
        .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
        .flat_map(LineString::coords)
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite {
        return Some("non-finite coordinate");
    }

    if !geometry.is_valid() {
        return Some("self-intersecting or malformed ring");
    }

    None
}

/// Union of every member, in order. A single member is returned as is.
///
/// Folding is sequential so the vertex order of the result only depends on
/// input order.
pub fn union_all<'a, I>(members: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    let mut iter = members.into_iter();
    let Some(first) = iter.next() else {
        return MultiPolygon::new(Vec::new());
    };

    iter.fold(first.clone(), |acc, next| acc.union(next))
}

/// Planar area, always non-negative.
#[inline]
pub fn area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Longest side of the bounding box, `0.0` for an empty geometry.
pub fn span(geometry: &MultiPolygon<f64>) -> f64 {
    geometry
        .bounding_rect()
        .map_or(0.0, |r| r.width().max(r.height()))
}

/// Axis-aligned envelope used by the spatial index.
pub fn envelope(geometry: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    geometry
        .bounding_rect()
        .map(|r| AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]))
}

/// True when the two shapes share interior area.
///
/// Shapes that only meet along edges or at vertices are neighbours, not
/// the same land, so this is `intersects && !touches` in DE-9IM terms.
pub fn interiors_intersect(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
    let matrix = a.relate(b);
    matrix.is_intersects() && !matrix.is_touches()
}

/// Bit-exact fingerprint of a geometry, for grouping identical shapes.
///
/// Coordinates are compared exactly, but the recording order is not: each
/// ring is wound counter-clockwise and rotated to start at its smallest
/// vertex, interior rings are sorted, and so are the polygons of a
/// multipolygon. Ring boundaries are encoded so `[[a, b], [c]]` and
/// `[[a], [b, c]]` differ. Negative zero is folded into zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeometryKey(Vec<u64>);

#[inline]
fn zero_folded(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Length-prefixed words of one ring in canonical start and winding.
fn ring_words(ring: &LineString<f64>) -> Vec<u64> {
    let mut coords: Vec<Coord<f64>> = ring
        .coords()
        .map(|c| Coord {
            x: zero_folded(c.x),
            y: zero_folded(c.y),
        })
        .collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if ring.is_cw() {
        coords.reverse();
    }

    let start = coords
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
        .map_or(0, |(i, _)| i);
    coords.rotate_left(start);

    let mut words = Vec::with_capacity(1 + 2 * coords.len());
    words.push(coords.len() as u64);
    for c in &coords {
        words.push(c.x.to_bits());
        words.push(c.y.to_bits());
    }
    words
}

fn polygon_words(poly: &Polygon<f64>) -> Vec<u64> {
    let mut interiors: Vec<Vec<u64>> = poly.interiors().iter().map(ring_words).collect();
    interiors.sort_unstable();

    let mut words = vec![interiors.len() as u64];
    words.extend(ring_words(poly.exterior()));
    words.extend(interiors.into_iter().flatten());
    words
}

impl GeometryKey {
    pub fn of(geometry: &MultiPolygon<f64>) -> Self {
        let mut polygons: Vec<Vec<u64>> = geometry.iter().map(polygon_words).collect();
        polygons.sort_unstable();

        let mut words = vec![polygons.len() as u64];
        words.extend(polygons.into_iter().flatten());
        GeometryKey(words)
    }
}
