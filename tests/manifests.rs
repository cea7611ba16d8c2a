//! Report manifests: bundled examples and batch execution.

use std::fs;
use std::path::{Path, PathBuf};

use overhead_report::report::{self, ReportSpec, TableSource};
use overhead_report::{compute_ratios, ReportError};

fn bundled(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("reports").join(name)
}

#[test]
fn bundled_manifests_parse_and_compute() {
    let manifests = report::discover_manifests(Path::new(env!("CARGO_MANIFEST_DIR")).join("reports")).unwrap();
    assert_eq!(manifests.len(), 2);

    for path in &manifests {
        let spec = ReportSpec::from_path(path).unwrap();
        let table = spec.source.load(spec.statistic, &spec.baseline).unwrap();
        let categories = spec.categories.clone().unwrap_or_else(|| table.categories().to_vec());
        let ratios = compute_ratios(&table, &spec.baseline, &categories).unwrap();
        assert_eq!(ratios.len(), categories.len() * 2);
    }
}

#[test]
fn join_profile_ratios() {
    let spec = ReportSpec::from_path(bundled("join_profile.report.json")).unwrap();
    assert_eq!(spec.name.as_deref(), Some("join_profile"));
    assert_eq!(spec.chart.reference_line_at, None);
    assert_eq!(spec.chart.labels["rls"], "RLS / baseline");

    let table = spec.source.load(spec.statistic, &spec.baseline).unwrap();
    let ratios = compute_ratios(&table, "without_rls", &["scan", "join-filter"]).unwrap();
    assert!((ratios.get("rls", "scan").unwrap() - 1951.1054 / 117.9531).abs() < 1e-9);
    assert!((ratios.get("view", "join-filter").unwrap() - 29.2025 / 20.3624).abs() < 1e-9);
}

fn write_manifest(dir: &Path, name: &str, baseline: &str) -> PathBuf {
    let path = dir.join(format!("{name}.report.json"));
    let manifest = serde_json::json!({
        "source": {"kind": "csv", "path": "timings.csv"},
        "baseline": baseline,
        "output": format!("{name}.png"),
        "statistic": "min",
        "chart": {"dpi": 40}
    });
    fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap()).unwrap();
    path
}

#[test]
fn batch_keeps_order_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("timings.csv"),
        "condition,category,min_ms,avg_ms,max_ms\n\
         baseline,scan,90,100,120\n\
         treatment,scan,135,150,170\n\
         baseline,join,40,50,60\n\
         treatment,join,20,25,30\n",
    )
    .unwrap();

    let good = write_manifest(dir.path(), "a_good", "baseline");
    let bad = write_manifest(dir.path(), "b_bad", "nonexistent");
    let also_good = write_manifest(dir.path(), "c_good", "treatment");

    let found = report::discover_manifests(dir.path()).unwrap();
    assert_eq!(found, [good, bad, also_good]);

    let specs = report::load_manifests(&found).unwrap();
    assert!(matches!(specs[0].source, TableSource::Csv(_)));
    let results = report::run_batch(&specs);
    assert_eq!(results.len(), 3);

    let first = results[0].as_ref().unwrap();
    assert_eq!(first.name, "a_good");
    let scan = first
        .ratios
        .iter()
        .find(|e| e.condition == "treatment" && e.category == "scan")
        .unwrap();
    assert!((scan.ratio - 1.5).abs() < 1e-9);
    assert!(dir.path().join("a_good.png").exists());

    assert!(matches!(results[1], Err(ReportError::MissingBaseline { .. })));
    assert!(!dir.path().join("b_bad.png").exists());

    let third = results[2].as_ref().unwrap();
    assert_eq!(third.baseline, "treatment");
    assert!(dir.path().join("c_good.png").exists());
}
