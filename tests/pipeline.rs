//! End-to-end: measurement table -> ratio table -> PNG on disk.

use std::fs;

use overhead_report::chart::{ChartOptions, Grouping};
use overhead_report::{compute_ratios, render_grouped_bars, MeasurementTable, ReportError};

fn scenario() -> MeasurementTable {
    let mut t = MeasurementTable::new();
    t.insert("baseline", "scan", 100.0).unwrap();
    t.insert("treatment", "scan", 150.0).unwrap();
    t.insert("baseline", "join", 50.0).unwrap();
    t.insert("treatment", "join", 25.0).unwrap();
    t
}

fn three_way() -> MeasurementTable {
    let mut t = MeasurementTable::new();
    let rows = [
        ("baseline", [44.4431, 5.8219, 33.4271]),
        ("rls", [81.6566, 47.6920, 75.2548]),
        ("view", [87.4787, 8.9226, 81.0151]),
    ];
    for (cond, values) in rows {
        for (cat, v) in ["scan", "join-filter", "group-agg"].into_iter().zip(values) {
            t.insert(cond, cat, v).unwrap();
        }
    }
    t
}

fn small_chart() -> ChartOptions {
    ChartOptions {
        dpi: 60,
        ..Default::default()
    }
}

#[test]
fn scenario_ratios() {
    let ratios = compute_ratios(&scenario(), "baseline", &["scan", "join"]).unwrap();
    assert_eq!(ratios.len(), 2);
    assert!((ratios.get("treatment", "scan").unwrap() - 1.5).abs() < 1e-9);
    assert!((ratios.get("treatment", "join").unwrap() - 0.5).abs() < 1e-9);
}

#[test]
fn missing_baseline_produces_nothing() {
    let mut t = scenario();
    t.insert("treatment", "sort", 3.0).unwrap();
    let err = compute_ratios(&t, "baseline", &["scan", "sort", "join"]).unwrap_err();
    assert!(matches!(err, ReportError::MissingBaseline { ref category, .. } if category == "sort"));
}

#[test]
fn two_conditions_three_categories_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.png");
    let cats = ["scan", "join-filter", "group-agg"];
    let ratios = compute_ratios(&three_way(), "baseline", &cats).unwrap();

    let first = render_grouped_bars(&ratios, &cats, &["rls", "view"], &path, &small_chart()).unwrap();
    let meta = fs::metadata(&path).unwrap();
    assert!(meta.len() > 0);
    assert_eq!(meta.len(), first.bytes);
    assert_eq!((first.width, first.height), (384, 288));

    // Re-running replaces the file; size and dimensions stay put.
    let second = render_grouped_bars(&ratios, &cats, &["rls", "view"], &path, &small_chart()).unwrap();
    assert_eq!((second.width, second.height), (first.width, first.height));
    assert!(fs::metadata(&path).unwrap().len() > 0);

    // Only the chart remains in the directory; no temporary files linger.
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.png");
    fs::write(&path, b"stale").unwrap();

    let cats = ["scan", "join"];
    let ratios = compute_ratios(&scenario(), "baseline", &cats).unwrap();
    render_grouped_bars(&ratios, &cats, &["treatment"], &path, &small_chart()).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}

#[test]
fn unwritable_destination_is_write_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("chart.png");

    let cats = ["scan", "join"];
    let ratios = compute_ratios(&scenario(), "baseline", &cats).unwrap();
    let err = render_grouped_bars(&ratios, &cats, &["treatment"], &path, &small_chart()).unwrap_err();

    match err {
        ReportError::WriteFailed { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!path.exists());
}

#[test]
fn grouped_by_condition_renders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("by_condition.png");
    let cats = ["scan", "join-filter", "group-agg"];
    let ratios = compute_ratios(&three_way(), "baseline", &cats).unwrap();

    let opts = ChartOptions {
        grouping: Grouping::ByCondition,
        bar_width: 0.25,
        figure_size: (12.0, 5.0),
        rotate_labels_degrees: 35.0,
        ..small_chart()
    };
    let chart = render_grouped_bars(&ratios, &cats, ratios.conditions(), &path, &opts).unwrap();
    assert_eq!((chart.width, chart.height), (720, 300));
    assert!(path.exists());
}

#[test]
fn chart_needs_drawable_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.png");
    let ratios = compute_ratios(&scenario(), "baseline", &["scan"]).unwrap();

    // "join" was not part of the ratio computation.
    let err = render_grouped_bars(&ratios, &["scan", "join"], &["treatment"], &path, &small_chart())
        .unwrap_err();
    assert!(matches!(err, ReportError::MissingMeasurement { .. }));
    assert!(!path.exists());
}
