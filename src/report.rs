//! Report manifests and their execution, single or batched.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::chart::{render_grouped_bars, ChartOptions, RenderedChart};
use crate::error::{ReportError, Result};
use crate::input::CsvSource;
use crate::ratio::{compute_ratios, RatioEntry};
use crate::table::MeasurementTable;
use crate::Statistic;

/// Suffix that marks a file as a report manifest during discovery.
pub const MANIFEST_SUFFIX: &str = ".report.json";

/// Where a report's timings come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableSource {
    /// Rows written inline in the manifest.
    Literal { rows: MeasurementTable },
    /// A delimited file.
    Csv(CsvSource),
    /// A delimited file of values already divided by the baseline. The
    /// baseline itself is implied at 1.0 for every category.
    Precomputed(CsvSource),
}

impl TableSource {
    /// Load the measurements; `baseline` is only used to fill in the implied
    /// baseline of precomputed ratios.
    pub fn load(&self, statistic: Statistic, baseline: &str) -> Result<MeasurementTable> {
        match self {
            TableSource::Literal { rows } => Ok(rows.clone()),
            TableSource::Csv(source) => source.load(statistic),
            TableSource::Precomputed(source) => {
                let mut table = source.load(statistic)?;
                if table.contains_condition(baseline) {
                    debug!(baseline, "precomputed baseline row replaced by 1.0");
                }
                for category in table.categories().to_vec() {
                    table.insert(baseline, category, 1.0)?;
                }
                Ok(table)
            }
        }
    }

    fn csv_mut(&mut self) -> Option<&mut CsvSource> {
        match self {
            TableSource::Literal { .. } => None,
            TableSource::Csv(source) | TableSource::Precomputed(source) => Some(source),
        }
    }
}

/// Everything needed to produce one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub source: TableSource,
    pub baseline: String,
    /// Category order; defaults to the order the table was written in.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Bar order; defaults to every non-baseline condition in table order.
    #[serde(default)]
    pub conditions: Option<Vec<String>>,
    pub output: PathBuf,
    #[serde(default)]
    pub statistic: Statistic,
    #[serde(default)]
    pub chart: ChartOptions,
}

impl ReportSpec {
    /// Load a manifest. Relative paths inside it resolve against its directory,
    /// and an unnamed report takes the manifest's file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut spec: ReportSpec = serde_json::from_str(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        spec.output = resolve(base, &spec.output);
        if let Some(source) = spec.source.csv_mut() {
            source.path = resolve(base, &source.path);
        }
        if let Some(font) = spec.chart.font_path.take() {
            spec.chart.font_path = Some(resolve(base, &font));
        }
        if spec.name.is_none() {
            spec.name = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.trim_end_matches(MANIFEST_SUFFIX).trim_end_matches(".json").to_string());
        }
        Ok(spec)
    }

    /// Report name for logs and summaries.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.output.display().to_string())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// A finished report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub name: String,
    pub baseline: String,
    pub chart: RenderedChart,
    pub ratios: Vec<RatioEntry>,
}

/// Load the table, compute ratios and render the chart for one report.
pub fn run_report(spec: &ReportSpec) -> Result<ReportOutcome> {
    let name = spec.display_name();
    debug!(report = %name, "running report");

    let table = spec.source.load(spec.statistic, &spec.baseline)?;
    let categories = spec
        .categories
        .clone()
        .unwrap_or_else(|| table.categories().to_vec());
    let ratios = compute_ratios(&table, &spec.baseline, &categories)?;
    let conditions = spec
        .conditions
        .clone()
        .unwrap_or_else(|| ratios.conditions().to_vec());

    let chart = render_grouped_bars(&ratios, &categories, &conditions, &spec.output, &spec.chart)?;
    info!(report = %name, path = %chart.path.display(), "report complete");

    Ok(ReportOutcome {
        name,
        baseline: spec.baseline.clone(),
        chart,
        ratios: ratios.entries(),
    })
}

/// Run independent reports in parallel.
///
/// Results come back in the order of `specs`; a failing report does not stop
/// the others.
pub fn run_batch(specs: &[ReportSpec]) -> Vec<Result<ReportOutcome>> {
    specs.par_iter().map(run_report).collect()
}

/// Find every `*.report.json` below `dir`, sorted by path.
pub fn discover_manifests(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX))
        {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

/// Load every manifest, failing on the first that does not parse.
pub fn load_manifests<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ReportSpec>> {
    paths
        .iter()
        .map(|p| {
            ReportSpec::from_path(p).map_err(|e| match e {
                ReportError::Json(err) => ReportError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{}: {err}", p.as_ref().display()),
                )),
                other => other,
            })
        })
        .collect()
}
