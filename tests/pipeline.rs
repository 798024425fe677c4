use std::path::Path;

use geo::{polygon, MultiPolygon};
use urban_sprawl::io::csv::read_csv_bytes;
use urban_sprawl::io::geojson::{read_geojson, write_geojson};
use urban_sprawl::io::raster::write_raster;
use urban_sprawl::io::store::{DatasetSink, DatasetSource, DiskStore, MemStore};
use urban_sprawl::pipeline::{run_monthly, PipelineConfig, RunLayout, RunPeriod, SkipReason, StepOutcome};
use urban_sprawl::{Crs, Feature, FeatureCollection, GeoTransform, RasterMask, SprawlError};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]])
}

fn layer(features: Vec<Feature>) -> Vec<u8> {
    write_geojson(&FeatureCollection::with_features(Crs::MAGNA_ORIGEN_NACIONAL, features)).unwrap()
}

/// 10 x 10 grid of 10 m pixels at (1000, 2000) with a 2 x 2 block covering x 1040..1060, y 1950..1970.
fn block_mask() -> RasterMask {
    let mut data = vec![0.0; 100];
    for r in 3..5 { for c in 4..6 { data[r * 10 + c] = 1.0 } }
    RasterMask::from_row_major(10, 10, data, GeoTransform::north_up(1000.0, 2000.0, 10.0, -10.0), Crs::MAGNA_ORIGEN_NACIONAL).unwrap()
}

fn put_references(store: &mut impl DatasetSink, with_buffer: bool) {
    // Restriction covers exactly the left half of the block.
    store.put("ref/sac.geojson", &layer(vec![Feature::new(rect(1000.0, 1900.0, 1050.0, 2000.0)).with_attr("tipo", "conflicto")])).unwrap();
    store.put("ref/reserva.geojson", &layer(vec![])).unwrap();
    store.put("ref/eep.geojson", &layer(vec![Feature::new(rect(5000.0, 5000.0, 5100.0, 5100.0))])).unwrap();
    store.put("ref/upl.geojson", &layer(vec![
        Feature::new(rect(1000.0, 1900.0, 1100.0, 2000.0)).with_attr("NOMBRE", "Centro"),
        Feature::new(rect(1100.0, 1900.0, 1200.0, 2000.0)).with_attr("NOMBRE", "Norte"),
    ])).unwrap();
    if with_buffer {
        store.put("ref/buffer.geojson", &layer(vec![Feature::new(rect(900.0, 1800.0, 1300.0, 2100.0))])).unwrap();
    }
}

const CONFIG: &str = r#"{
    "output_dir": "out",
    "masks": [ { "label": "new_urban", "path": "dw/new_urban.json" } ],
    "restrictions": [
        { "name": "sac", "path": "ref/sac.geojson" },
        { "name": "reserva", "path": "ref/reserva.geojson" },
        { "name": "eep", "path": "ref/eep.geojson" }
    ],
    "zones": { "path": "ref/upl.geojson" },
    "urban_buffer": "ref/buffer.geojson",
    "cluster_buffer": 100
}"#;

#[test]
fn half_restricted_block_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut inputs = DiskStore::new(dir.path());
    put_references(&mut inputs, true);
    inputs.put("dw/new_urban.json", &write_raster(&block_mask()).unwrap()).unwrap();
    inputs.put("config.json", CONFIG.as_bytes()).unwrap();

    let config = PipelineConfig::load(&dir.path().join("config.json")).unwrap();
    assert_eq!(config.output_dir, dir.path().join("out"));
    let period = RunPeriod::new(2025, 3).unwrap();
    let mut outputs = DiskStore::new(&config.output_dir);

    let summary = run_monthly(&config, period, &inputs, &mut outputs, false).unwrap();
    let run = &summary.masks[0];
    assert_eq!(run.overlay_skip, None);
    assert!((run.intersecting.total_area() - 200.0).abs() < 1e-6);
    assert!((run.non_intersecting.total_area() - 200.0).abs() < 1e-6);

    let centro = run.zonal.get("Centro").unwrap();
    assert!((centro.intersecting_ha - 0.02).abs() < 1e-9);
    assert!((centro.non_intersecting_ha - 0.02).abs() < 1e-9);
    assert!((centro.total_ha - 0.04).abs() < 1e-9);
    assert!(run.zonal.get("Norte").is_none());

    let region = run.region.done().unwrap();
    assert_eq!(region.zone, "urban_buffer");
    assert!((region.total_ha - 0.04).abs() < 1e-9);

    let clusters = run.clusters.done().unwrap();
    assert_eq!(clusters.len(), 1);
    assert!((clusters[0].area_ha - 0.02).abs() < 1e-9);

    let layout = RunLayout::new(period);
    for key in [
        layout.intersections("new_urban"),
        layout.non_intersections("new_urban"),
        layout.clusters("new_urban"),
        layout.cluster_summary("new_urban"),
        layout.zonal_summary("new_urban"),
        layout.region_summary("new_urban"),
        layout.report(),
    ] {
        assert!(outputs.has(&key), "missing {key}");
    }
    assert!(dir.path().join("out/2025_03/stats/resumen_expansion_new_urban.csv").is_file());

    let written = read_geojson(&outputs.get(&layout.intersections("new_urban")).unwrap()).unwrap();
    assert_eq!(written.crs(), &Crs::MAGNA_ORIGEN_NACIONAL);
    assert_eq!(written.features()[0].get("restriction").and_then(|v| v.as_str()), Some("sac"));

    let csv = read_csv_bytes(&outputs.get(&layout.zonal_summary("new_urban")).unwrap()).unwrap();
    assert_eq!(csv.height(), 1);

    let report: serde_json::Value = serde_json::from_slice(&outputs.get(&layout.report()).unwrap()).unwrap();
    assert_eq!(report["period"], "2025_03");
    assert_eq!(report["previous_period"], "2025_02");
    assert_eq!(report["top_zones"][0]["zone"], "Centro");
    assert_eq!(report["top_zones"][0]["total_ha"], 0.04);

    // Second run reuses the overlay outputs unless forced.
    let again = run_monthly(&config, period, &inputs, &mut outputs, false).unwrap();
    assert_eq!(
        again.masks[0].overlay_skip,
        Some(SkipReason::CachedOutput { path: layout.intersections("new_urban") }),
    );
    assert_eq!(again.masks[0].zonal, run.zonal);
    let forced = run_monthly(&config, period, &inputs, &mut outputs, true).unwrap();
    assert_eq!(forced.masks[0].overlay_skip, None);
}

#[test]
fn empty_mask_writes_empty_artifacts() {
    let mut inputs = MemStore::new();
    put_references(&mut inputs, false);
    let empty = RasterMask::from_row_major(4, 4, vec![0.0; 16], GeoTransform::north_up(1000.0, 2000.0, 10.0, -10.0), Crs::MAGNA_ORIGEN_NACIONAL).unwrap();
    inputs.put("dw/new_urban.json", &write_raster(&empty).unwrap()).unwrap();

    let json = CONFIG.replace(r#""urban_buffer": "ref/buffer.geojson","#, "");
    let config = PipelineConfig::from_json(json.as_bytes(), Path::new("/unused")).unwrap();
    let period = RunPeriod::new(2025, 1).unwrap();
    let mut outputs = MemStore::new();

    let summary = run_monthly(&config, period, &inputs, &mut outputs, false).unwrap();
    let run = &summary.masks[0];
    assert!(run.intersecting.is_empty());
    assert!(run.non_intersecting.is_empty());
    assert!(run.zonal.is_empty());
    assert_eq!(run.clusters.skip_reason(), Some(&SkipReason::EmptyInput));
    assert!(matches!(run.region, StepOutcome::Skipped(SkipReason::MissingOptionalInput { .. })));
    assert!(summary.report.top_zones.is_empty());

    let layout = RunLayout::new(period);
    let written = read_geojson(&outputs.get(&layout.intersections("new_urban")).unwrap()).unwrap();
    assert!(written.is_empty());
    assert!(outputs.has(&layout.non_intersections("new_urban")));
    assert!(!outputs.has(&layout.region_summary("new_urban")));

    let csv = String::from_utf8(outputs.get(&layout.zonal_summary("new_urban")).unwrap().to_vec()).unwrap();
    assert_eq!(csv.trim_end(), "zone_name,intersecting_ha,non_intersecting_ha,total_ha");
}

#[test]
fn change_rules_derive_primary_and_strict_masks() {
    let transform = GeoTransform::north_up(1000.0, 2000.0, 10.0, -10.0);
    let before = RasterMask::from_row_major(10, 10, vec![0.1; 100], transform, Crs::MAGNA_ORIGEN_NACIONAL).unwrap();
    let mut current = vec![0.1; 100];
    // Block pixels: two above 0.7, two between 0.5 and 0.7.
    current[34] = 0.9;
    current[35] = 0.6;
    current[44] = 0.8;
    current[45] = 0.6;
    let current = RasterMask::from_row_major(10, 10, current, transform, Crs::MAGNA_ORIGEN_NACIONAL).unwrap();

    let mut inputs = MemStore::new();
    put_references(&mut inputs, false);
    inputs.put("dw/before.json", &write_raster(&before).unwrap()).unwrap();
    inputs.put("dw/current.json", &write_raster(&current).unwrap()).unwrap();

    let json = r#"{
        "output_dir": "/out",
        "change": { "before": "dw/before.json", "current": "dw/current.json" },
        "restrictions": [ { "name": "sac", "path": "ref/sac.geojson" } ],
        "zones": { "path": "ref/upl.geojson" }
    }"#;
    let config = PipelineConfig::from_json(json.as_bytes(), Path::new("/")).unwrap();
    let period = RunPeriod::new(2024, 12).unwrap();
    let mut outputs = MemStore::new();

    let summary = run_monthly(&config, period, &inputs, &mut outputs, false).unwrap();
    assert_eq!(summary.masks.len(), 2);
    assert!((summary.masks[0].intersecting.total_area() - 200.0).abs() < 1e-6);
    // Strict mask keeps only the left column, which lies inside the restriction.
    assert!((summary.masks[1].intersecting.total_area() - 200.0).abs() < 1e-6);
    assert!(summary.masks[1].non_intersecting.is_empty());

    assert_eq!(summary.report.secondary.as_deref(), Some("new_urban_strict"));
    assert_eq!(summary.report.top_zones[0].intersecting_ha_secondary, 0.02);

    let layout = RunLayout::new(period);
    assert!(outputs.has(&layout.derived_mask("new_urban")));
    assert!(outputs.has(&layout.derived_mask("new_urban_strict")));
}

#[test]
fn missing_zone_name_fails_the_run() {
    let mut inputs = MemStore::new();
    put_references(&mut inputs, false);
    inputs.put("dw/new_urban.json", &write_raster(&block_mask()).unwrap()).unwrap();

    let json = CONFIG.replace(r#""zones": { "path": "ref/upl.geojson" }"#, r#""zones": { "path": "ref/upl.geojson", "name_field": "UPL" }"#);
    let config = PipelineConfig::from_json(json.as_bytes(), Path::new("/")).unwrap();

    let err = run_monthly(&config, RunPeriod::new(2025, 3).unwrap(), &inputs, &mut MemStore::new(), false).unwrap_err();
    assert!(matches!(err.downcast_ref::<SprawlError>(), Some(SprawlError::MissingAttribute { field, .. }) if field == "UPL"));
}
