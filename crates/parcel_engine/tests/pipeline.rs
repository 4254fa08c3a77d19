use geo::{polygon, MultiPolygon, Polygon};
use parcel_engine::geometry::area;
use parcel_engine::{
    aggregate, consolidate, dedup, merge, overlap, valuation, AreaUnit, CancelToken,
    EngineConfig, EngineError, InvalidGeometryPolicy, ParcelUnit,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
}

fn unit(id: &str, shape: impl Into<MultiPolygon<f64>>, value: f64) -> ParcelUnit {
    ParcelUnit::new(id, shape, value)
}

fn total_value(units: &[ParcelUnit]) -> f64 {
    units.iter().map(|u| u.market_value).sum()
}

/// A messy block: split lots, a re-recorded duplicate, overlapping
/// re-plats and plain neighbours sharing edges.
fn messy_block() -> Vec<ParcelUnit> {
    let mut units = Vec::new();
    for k in 0..30 {
        let x = (k % 6) as f64 * 10.0;
        let y = (k / 6) as f64 * 10.0;
        units.push(unit(&format!("lot{k}"), rect(x, y, x + 10.0, y + 10.0), 100.0 + k as f64));
    }
    // Second record of lot3 far away (non-contiguous sub-parcel).
    units.push(unit("lot3", rect(200.0, 0.0, 205.0, 5.0), 40.0));
    // Same footprint as lot7 under another PIN.
    units.push(unit("dup7", rect(10.0, 10.0, 20.0, 20.0), 12.5));
    // Re-plat straddling lot14 and lot15.
    units.push(unit("replat", rect(25.0, 22.0, 35.0, 28.0), 75.0));
    // Condo pad inside lot29.
    units.push(unit("condo", rect(52.0, 42.0, 55.0, 45.0), 9.0));
    units
}

#[test]
fn market_value_is_conserved() {
    let input = messy_block();
    let before = total_value(&input);

    let result = consolidate(input, &EngineConfig::default(), &CancelToken::new()).unwrap();

    assert!(result.diagnostics.is_empty());
    assert!((total_value(&result.units) - before).abs() < 1e-6);
}

#[test]
fn repeated_runs_are_identical() {
    let config = EngineConfig::default();
    let first = consolidate(messy_block(), &config, &CancelToken::new()).unwrap();
    let second = consolidate(messy_block(), &config, &CancelToken::new()).unwrap();

    assert_eq!(first.units, second.units);
    assert_eq!(first.counts, second.counts);
}

#[test]
fn block_collapses_as_expected() {
    let result =
        consolidate(messy_block(), &EngineConfig::default(), &CancelToken::new()).unwrap();

    assert_eq!(result.counts.input, 34);
    assert_eq!(result.counts.after_identifier, 33);
    assert_eq!(result.counts.after_dedup, 32);
    assert_eq!(result.counts.clusters, 2);
    // lot14 + lot15 + replat, and lot29 + condo.
    assert_eq!(result.counts.output, 29);

    let lot14 = result.units.iter().find(|u| u.identifier == "lot14").unwrap();
    assert_eq!(lot14.market_value, 114.0 + 115.0 + 75.0);
    // The re-plat lies inside the two lots, so it adds value but no land.
    let m = lot14.metrics.unwrap();
    assert!((m.area - 200.0).abs() < 1e-6);

    assert!(result.units.iter().all(|u| u.identifier != "replat" && u.identifier != "condo"));

    let lot7 = result.units.iter().find(|u| u.identifier == "lot7").unwrap();
    assert_eq!(lot7.market_value, 107.0 + 12.5);
}

#[test]
fn edge_neighbours_stay_separate() {
    let result = consolidate(
        vec![
            unit("west", rect(0.0, 0.0, 10.0, 10.0), 1.0),
            unit("east", rect(10.0, 0.0, 20.0, 10.0), 1.0),
        ],
        &EngineConfig::default(),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(result.units.len(), 2);
    assert_eq!(result.counts.clusters, 0);
}

#[test]
fn split_parcel_then_overlapping_footprint() {
    let a = rect(0.0, 0.0, 10.0, 10.0);
    let b = rect(20.0, 0.0, 30.0, 10.0);
    let footprint = MultiPolygon::new(vec![a.clone(), b.clone()]);
    let input = vec![
        unit("1", a, 100.0),
        unit("1", b, 50.0),
        unit("2", footprint, 30.0),
    ];

    let stage1 = aggregate::aggregate_by_identifier(input.clone());
    assert_eq!(stage1.len(), 2);
    assert_eq!(stage1[0].identifier, "1");
    assert_eq!(stage1[0].market_value, 150.0);
    assert_eq!(stage1[0].geometry.0.len(), 2);

    let result = consolidate(input, &EngineConfig::default(), &CancelToken::new()).unwrap();
    assert_eq!(result.units.len(), 1);
    let merged = &result.units[0];
    assert_eq!(merged.identifier, "1");
    assert_eq!(merged.market_value, 180.0);
    assert!((area(&merged.geometry) - 200.0).abs() < 1e-6);
}

#[test]
fn merged_area_lies_between_max_and_sum() {
    let members = [rect(0.0, 0.0, 6.0, 6.0), rect(4.0, 4.0, 9.0, 12.0)];
    let areas: Vec<f64> = members.iter().map(|p| area(&p.clone().into())).collect();

    let result = consolidate(
        members
            .iter()
            .enumerate()
            .map(|(i, p)| unit(&i.to_string(), p.clone(), 1.0))
            .collect(),
        &EngineConfig::default(),
        &CancelToken::new(),
    )
    .unwrap();

    let merged = result.units[0].metrics.unwrap().area;
    assert!(merged >= areas[0].max(areas[1]));
    assert!(merged < areas[0] + areas[1]);
}

#[test]
fn tiny_survivor_is_reported_and_kept() {
    let config = EngineConfig {
        min_area: 1.0,
        ..EngineConfig::default()
    };
    let result = consolidate(
        vec![
            unit("big", rect(0.0, 0.0, 10.0, 10.0), 5.0),
            unit("speck", rect(50.0, 50.0, 50.5, 50.5), 5.0),
        ],
        &config,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(result.units.len(), 2);
    assert_eq!(result.diagnostics.len(), 1);
    assert!(matches!(
        &result.diagnostics[0],
        EngineError::ZeroAreaResult { identifier, .. } if identifier == "speck"
    ));
    let speck = result.units.iter().find(|u| u.identifier == "speck").unwrap();
    assert!(speck.metrics.is_none());
}

#[test]
fn degenerate_and_near_zero_areas_are_reported_by_default() {
    let flat = polygon![(x: 100.0, y: 0.0), (x: 105.0, y: 0.0), (x: 110.0, y: 0.0)];
    let sliver = rect(200.0, 0.0, 210.0, 1e-12);
    let result = consolidate(
        vec![
            unit("lot", rect(0.0, 0.0, 10.0, 10.0), 5.0),
            unit("flat", flat, 5.0),
            unit("sliver", sliver, 5.0),
        ],
        &EngineConfig::default(),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(result.units.len(), 3);
    let mut reported: Vec<&str> = result
        .diagnostics
        .iter()
        .filter_map(|d| match d {
            EngineError::ZeroAreaResult { identifier, .. } => Some(identifier.as_str()),
            _ => None,
        })
        .collect();
    reported.sort_unstable();
    assert_eq!(reported, ["flat", "sliver"]);

    for u in &result.units {
        assert_eq!(u.metrics.is_some(), u.identifier == "lot", "{}", u.identifier);
    }
}

#[test]
fn invalid_record_policy_is_the_callers() {
    let bowtie = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0)];
    let input = vec![
        unit("ok", rect(10.0, 10.0, 12.0, 12.0), 7.0),
        unit("bad", bowtie, 3.0),
    ];

    let excluded = consolidate(input.clone(), &EngineConfig::default(), &CancelToken::new())
        .unwrap();
    assert_eq!(excluded.units.len(), 1);
    assert_eq!(excluded.counts.excluded, 1);
    assert!(excluded.diagnostics[0].is_per_record());

    let strict = EngineConfig {
        invalid_geometry: InvalidGeometryPolicy::Abort,
        ..EngineConfig::default()
    };
    let err = consolidate(input, &strict, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidGeometry { identifier, .. } if identifier == "bad"));
}

#[test]
fn cancelled_run_emits_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = consolidate(messy_block(), &EngineConfig::default(), &cancel).unwrap_err();
    assert!(matches!(err, EngineError::Cancelled { .. }));
}

#[test]
fn stages_rerun_from_persisted_intermediate() {
    let cancel = CancelToken::new();
    let deduped = dedup::collapse_exact_duplicates(aggregate::aggregate_by_identifier(messy_block()));

    let saved = serde_json::to_string(&deduped).unwrap();
    let restored: Vec<ParcelUnit> = serde_json::from_str(&saved).unwrap();
    assert_eq!(restored, deduped);

    let direct = overlap::detect_overlaps_checked(&deduped, &cancel).unwrap();
    let resumed = overlap::detect_overlaps(&restored, &cancel, usize::MAX).unwrap();
    assert_eq!(direct, resumed);
    assert_eq!(
        merge::merge_clusters(deduped, &direct).unwrap(),
        merge::merge_clusters(restored, &resumed).unwrap()
    );
}

#[test]
fn priced_units_flow_through() {
    let mut lots = vec![
        unit("a", rect(0.0, 0.0, 100.0, 100.0), 1000.0).with_classification("2-11"),
        unit("b", rect(0.0, 0.0, 100.0, 100.0), 1000.0).with_classification("5-17"),
        unit("c", rect(500.0, 0.0, 600.0, 100.0), 1000.0).with_classification("EX"),
    ];
    lots.iter_mut().for_each(valuation::price);

    let config = EngineConfig {
        area_unit: AreaUnit::SquareMeters,
        ..EngineConfig::default()
    };
    let result = consolidate(lots, &config, &CancelToken::new()).unwrap();

    assert_eq!(result.units.len(), 2);
    assert_eq!(result.units[0].market_value, 14_000.0);
    assert_eq!(result.units[0].classification.as_deref(), Some("2-11"));
    assert_eq!(result.units[1].market_value, 0.0);
    assert_eq!(result.units[1].metrics.unwrap().value_per_area, 0.0);
}
