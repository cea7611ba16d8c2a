//! Relative overhead: every condition divided by the baseline, per category.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::table::MeasurementTable;

/// One computed ratio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioEntry {
    pub condition: String,
    pub category: String,
    pub ratio: f64,
}

/// Ratios of each non-baseline condition against the baseline.
///
/// Built once by [`compute_ratios`] and read-only afterwards. The category
/// order is the one the caller asked for; the condition order follows the
/// measurement table.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioTable {
    baseline: String,
    categories: Vec<String>,
    conditions: Vec<String>,
    ratios: HashMap<String, HashMap<String, f64>>,
}

impl RatioTable {
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Non-baseline conditions, in measurement-table order.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn get(&self, condition: &str, category: &str) -> Option<f64> {
        self.ratios.get(condition)?.get(category).copied()
    }

    pub fn len(&self) -> usize {
        self.ratios.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries condition-major, categories in requested order.
    pub fn entries(&self) -> Vec<RatioEntry> {
        let mut out = Vec::with_capacity(self.len());
        for condition in &self.conditions {
            for category in &self.categories {
                if let Some(ratio) = self.get(condition, category) {
                    out.push(RatioEntry {
                        condition: condition.clone(),
                        category: category.clone(),
                        ratio,
                    });
                }
            }
        }
        out
    }
}

fn baseline_value(table: &MeasurementTable, baseline: &str, category: &str) -> Result<f64> {
    let value = table
        .get(baseline, category)
        .ok_or_else(|| ReportError::MissingBaseline {
            baseline: baseline.to_string(),
            category: category.to_string(),
        })?;

    if value <= 0.0 {
        return Err(ReportError::DivisionByZero {
            baseline: baseline.to_string(),
            category: category.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Ratio of a single (condition, category) cell against the baseline.
///
/// The baseline against itself is always 1.0.
pub fn compute_ratio(
    table: &MeasurementTable,
    condition: &str,
    baseline: &str,
    category: &str,
) -> Result<f64> {
    let denom = baseline_value(table, baseline, category)?;
    if condition == baseline {
        return Ok(1.0);
    }

    let value = table
        .get(condition, category)
        .ok_or_else(|| ReportError::MissingMeasurement {
            condition: condition.to_string(),
            category: category.to_string(),
        })?;
    Ok(value / denom)
}

/// Compute `table[cond][cat] / table[baseline][cat]` for every non-baseline
/// condition in `table` and every category in `categories`.
///
/// The whole input is validated before any division happens, so a failure
/// never yields a partially filled table.
pub fn compute_ratios<S: AsRef<str>>(
    table: &MeasurementTable,
    baseline: &str,
    categories: &[S],
) -> Result<RatioTable> {
    let categories: Vec<String> = categories.iter().map(|c| c.as_ref().to_string()).collect();
    for (i, category) in categories.iter().enumerate() {
        if categories[..i].contains(category) {
            return Err(ReportError::DuplicateCategory(category.clone()));
        }
    }

    let denominators = categories
        .iter()
        .map(|category| baseline_value(table, baseline, category))
        .collect::<Result<Vec<f64>>>()?;

    let conditions: Vec<String> = table
        .conditions()
        .iter()
        .filter(|c| c.as_str() != baseline)
        .cloned()
        .collect();

    for condition in &conditions {
        if let Some(category) = categories
            .iter()
            .find(|category| table.get(condition, category).is_none())
        {
            return Err(ReportError::MissingMeasurement {
                condition: condition.clone(),
                category: category.clone(),
            });
        }
    }

    let mut ratios: HashMap<String, HashMap<String, f64>> = HashMap::with_capacity(conditions.len());
    for condition in &conditions {
        let row = ratios.entry(condition.clone()).or_default();
        for (category, denom) in categories.iter().zip(&denominators) {
            // Presence checked above.
            let value = table.get(condition, category).unwrap_or_default();
            let ratio = value / denom;
            debug!(%condition, %category, ratio, "computed ratio");
            row.insert(category.clone(), ratio);
        }
    }

    Ok(RatioTable {
        baseline: baseline.to_string(),
        categories,
        conditions,
        ratios,
    })
}
