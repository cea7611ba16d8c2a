//! Loading measurement tables from delimited files.
//!
//! Two layouts are understood:
//!
//! ```text
//! long:  condition,category,min_ms,avg_ms,max_ms     one row per (condition, category)
//! wide:  attack,min_ms,avg_ms,max_ms                 one row per condition,
//!                                                    each listed column is a category
//! ```

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ReportError, Result};
use crate::table::MeasurementTable;
use crate::Statistic;

/// Column holding each statistic in a long-layout file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticColumns {
    pub min: String,
    pub avg: String,
    pub max: String,
}

impl Default for StatisticColumns {
    fn default() -> Self {
        Self {
            min: "min_ms".to_string(),
            avg: "avg_ms".to_string(),
            max: "max_ms".to_string(),
        }
    }
}

impl StatisticColumns {
    pub fn column(&self, statistic: Statistic) -> &str {
        match statistic {
            Statistic::Min => &self.min,
            Statistic::Avg => &self.avg,
            Statistic::Max => &self.max,
        }
    }
}

/// How rows and columns map onto (condition, category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CsvLayout {
    Long {
        #[serde(default = "default_condition_column")]
        condition_column: String,
        #[serde(default = "default_category_column")]
        category_column: String,
        #[serde(default)]
        value_columns: StatisticColumns,
    },
    Wide {
        id_column: String,
        /// Every column except `id_column` when empty.
        #[serde(default)]
        category_columns: Vec<String>,
    },
}

fn default_condition_column() -> String {
    "condition".to_string()
}

fn default_category_column() -> String {
    "category".to_string()
}

impl Default for CsvLayout {
    fn default() -> Self {
        CsvLayout::Long {
            condition_column: default_condition_column(),
            category_column: default_category_column(),
            value_columns: StatisticColumns::default(),
        }
    }
}

/// A delimited file and the layout to read it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvSource {
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub layout: CsvLayout,
}

fn default_delimiter() -> char {
    ','
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, layout: CsvLayout) -> Self {
        Self {
            path: path.into(),
            delimiter: default_delimiter(),
            layout,
        }
    }

    /// Read the file into a measurement table.
    pub fn load(&self, statistic: Statistic) -> Result<MeasurementTable> {
        let file = File::open(&self.path)?;
        let table = read_table(file, &self.path, self.delimiter, &self.layout, statistic)?;
        debug!(
            path = %self.path.display(),
            conditions = table.conditions().len(),
            categories = table.categories().len(),
            "loaded measurement table"
        );
        Ok(table)
    }
}

fn column_index(headers: &StringRecord, name: &str, origin: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ReportError::MissingColumn {
            path: origin.to_path_buf(),
            column: name.to_string(),
        })
}

fn parse_cell(record: &StringRecord, idx: usize, column: &str) -> Result<f64> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<f64>().map_err(|_| ReportError::InvalidNumber {
        line: record.position().map(|p| p.line()).unwrap_or_default(),
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Parse delimited text into a measurement table.
///
/// `origin` only names the source in errors.
pub fn read_table<R: Read>(
    reader: R,
    origin: &Path,
    delimiter: char,
    layout: &CsvLayout,
    statistic: Statistic,
) -> Result<MeasurementTable> {
    let delimiter = u8::try_from(delimiter).map_err(|_| {
        ReportError::Csv(csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("delimiter '{delimiter}' is not a single byte"),
        )))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut table = MeasurementTable::new();
    match layout {
        CsvLayout::Long {
            condition_column,
            category_column,
            value_columns,
        } => {
            let value_column = value_columns.column(statistic);
            let cond_idx = column_index(&headers, condition_column, origin)?;
            let cat_idx = column_index(&headers, category_column, origin)?;
            let val_idx = column_index(&headers, value_column, origin)?;

            for record in reader.records() {
                let record = record?;
                let condition = record.get(cond_idx).unwrap_or_default();
                let category = record.get(cat_idx).unwrap_or_default();
                let value = parse_cell(&record, val_idx, value_column)?;
                table.insert(condition, category, value)?;
            }
        }
        CsvLayout::Wide {
            id_column,
            category_columns,
        } => {
            if statistic != Statistic::default() {
                warn!(
                    path = %origin.display(),
                    statistic = statistic.as_str(),
                    "wide layout reads every listed column; statistic is ignored"
                );
            }
            let id_idx = column_index(&headers, id_column, origin)?;
            let cols = if category_columns.is_empty() {
                headers
                    .iter()
                    .enumerate()
                    .filter(|&(idx, _)| idx != id_idx)
                    .map(|(idx, name)| (name.to_string(), idx))
                    .collect::<Vec<(String, usize)>>()
            } else {
                category_columns
                    .iter()
                    .map(|name| Ok((name.clone(), column_index(&headers, name, origin)?)))
                    .collect::<Result<Vec<(String, usize)>>>()?
            };

            for record in reader.records() {
                let record = record?;
                let condition = record.get(id_idx).unwrap_or_default();
                for (name, idx) in &cols {
                    table.insert(condition, name.as_str(), parse_cell(&record, *idx, name)?)?;
                }
            }
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str, layout: &CsvLayout, statistic: Statistic) -> Result<MeasurementTable> {
        read_table(text.as_bytes(), Path::new("test.csv"), ',', layout, statistic)
    }

    const LONG: &str = "\
condition,category,min_ms,avg_ms,max_ms
baseline,scan,90,100,120
treatment,scan,140,150,170
baseline,join,45,50,60
treatment,join,20,25,30
";

    #[test]
    fn long_layout_picks_statistic_column() {
        let layout = CsvLayout::default();
        let avg = read(LONG, &layout, Statistic::Avg).unwrap();
        assert_eq!(avg.get("treatment", "scan"), Some(150.0));
        assert_eq!(avg.categories(), ["scan", "join"]);

        let max = read(LONG, &layout, Statistic::Max).unwrap();
        assert_eq!(max.get("baseline", "join"), Some(60.0));
    }

    #[test]
    fn wide_layout_matches_long() {
        let wide = "\
attack , scan , join
baseline, 100, 50
treatment, 150, 25
";
        let layout = CsvLayout::Wide {
            id_column: "attack".to_string(),
            category_columns: vec!["scan".to_string(), "join".to_string()],
        };
        let from_wide = read(wide, &layout, Statistic::Avg).unwrap();
        let from_long = read(LONG, &CsvLayout::default(), Statistic::Avg).unwrap();
        assert_eq!(from_wide, from_long);
    }

    #[test]
    fn per_row_statistics_as_categories() {
        let text = "\
attack,min_ms,avg_ms,max_ms
Baseline scan,1.0,2.0,4.0
Function in policy,3.0,5.0,6.0
";
        let layout = CsvLayout::Wide {
            id_column: "attack".to_string(),
            category_columns: vec!["min_ms".into(), "avg_ms".into(), "max_ms".into()],
        };
        let t = read(text, &layout, Statistic::Avg).unwrap();
        assert_eq!(t.conditions(), ["Baseline scan", "Function in policy"]);
        assert_eq!(t.get("Function in policy", "max_ms"), Some(6.0));
    }

    #[test]
    fn wide_layout_ignores_statistic() {
        let text = "attack,min_ms,avg_ms\nbase,1,2\nmv,3,4\n";
        let layout = CsvLayout::Wide {
            id_column: "attack".to_string(),
            category_columns: Vec::new(),
        };
        let avg = read(text, &layout, Statistic::Avg).unwrap();
        let max = read(text, &layout, Statistic::Max).unwrap();
        assert_eq!(avg, max);
    }

    #[test]
    fn wide_layout_defaults_to_every_other_column() {
        let text = "attack,min_ms,avg_ms\nbase,1,2\nmv,3,4\n";
        let layout = CsvLayout::Wide {
            id_column: "attack".to_string(),
            category_columns: Vec::new(),
        };
        let t = read(text, &layout, Statistic::Avg).unwrap();
        assert_eq!(t.categories(), ["min_ms", "avg_ms"]);
        assert_eq!(t.get("mv", "avg_ms"), Some(4.0));
    }

    #[test]
    fn missing_column_is_named() {
        let err = read("condition,category\na,b\n", &CsvLayout::default(), Statistic::Avg)
            .unwrap_err();
        match err {
            ReportError::MissingColumn { column, .. } => assert_eq!(column, "avg_ms"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_number_reports_line() {
        let text = "condition,category,avg_ms\nbase,scan,10\nbase,join,fast\n";
        let err = read(text, &CsvLayout::default(), Statistic::Avg).unwrap_err();
        match err {
            ReportError::InvalidNumber {
                line,
                column,
                value,
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "avg_ms");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn negative_timing_is_rejected() {
        let text = "condition,category,avg_ms\nbase,scan,-1\n";
        let err = read(text, &CsvLayout::default(), Statistic::Avg).unwrap_err();
        assert!(matches!(err, ReportError::InvalidValue { .. }));
    }

    #[test]
    fn semicolon_delimited_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timings.csv");
        std::fs::write(&path, "condition;category;avg_ms\nbase;scan;2\nmv;scan;3\n").unwrap();

        let mut source = CsvSource::new(&path, CsvLayout::default());
        source.delimiter = ';';
        let t = source.load(Statistic::Avg).unwrap();
        assert_eq!(t.get("mv", "scan"), Some(3.0));
    }

    #[test]
    fn layout_deserializes_from_json() {
        let source: CsvSource = serde_json::from_str(
            r#"{"path": "t.csv", "layout": {"kind": "wide", "id_column": "attack", "category_columns": ["avg_ms"]}}"#,
        )
        .unwrap();
        assert_eq!(source.delimiter, ',');
        assert!(matches!(source.layout, CsvLayout::Wide { .. }));

        let source: CsvSource =
            serde_json::from_str(r#"{"path": "t.csv", "layout": {"kind": "long"}}"#).unwrap();
        assert_eq!(source.layout, CsvLayout::default());
    }
}
