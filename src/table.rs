//! Measurement tables: timings keyed by (condition, category).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// One timing cell, the unit literal tables are written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub condition: String,
    pub category: String,
    pub value: f64,
}

/// Timings in milliseconds (or any consistent unit) keyed by (condition, category).
///
/// Conditions and categories remember the order they were first inserted in;
/// reports fall back to that order when the caller does not give one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MeasurementRow>", into = "Vec<MeasurementRow>")]
pub struct MeasurementTable {
    conditions: Vec<String>,
    categories: Vec<String>,
    values: HashMap<String, HashMap<String, f64>>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows, rejecting invalid values.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = MeasurementRow>,
    {
        let mut table = Self::new();
        for row in rows {
            table.insert(row.condition, row.category, row.value)?;
        }
        Ok(table)
    }

    /// Insert or replace a measurement.
    ///
    /// Values must be finite and non-negative.
    pub fn insert(
        &mut self,
        condition: impl Into<String>,
        category: impl Into<String>,
        value: f64,
    ) -> Result<()> {
        let condition = condition.into();
        let category = category.into();

        if !value.is_finite() || value < 0.0 {
            return Err(ReportError::InvalidValue {
                condition,
                category,
                value,
            });
        }

        if !self.conditions.contains(&condition) {
            self.conditions.push(condition.clone());
        }
        if !self.categories.contains(&category) {
            self.categories.push(category.clone());
        }
        self.values
            .entry(condition)
            .or_default()
            .insert(category, value);
        Ok(())
    }

    pub fn get(&self, condition: &str, category: &str) -> Option<f64> {
        self.values.get(condition)?.get(category).copied()
    }

    pub fn contains_condition(&self, condition: &str) -> bool {
        self.conditions.iter().any(|c| c == condition)
    }

    /// Conditions in first-insertion order.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    /// Categories in first-insertion order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of stored measurements.
    pub fn len(&self) -> usize {
        self.values.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All measurements, condition-major in insertion order.
    pub fn rows(&self) -> Vec<MeasurementRow> {
        let mut rows = Vec::with_capacity(self.len());
        for condition in &self.conditions {
            for category in &self.categories {
                if let Some(value) = self.get(condition, category) {
                    rows.push(MeasurementRow {
                        condition: condition.clone(),
                        category: category.clone(),
                        value,
                    });
                }
            }
        }
        rows
    }
}

impl TryFrom<Vec<MeasurementRow>> for MeasurementTable {
    type Error = ReportError;

    fn try_from(rows: Vec<MeasurementRow>) -> Result<Self> {
        Self::from_rows(rows)
    }
}

impl From<MeasurementTable> for Vec<MeasurementRow> {
    fn from(table: MeasurementTable) -> Self {
        table.rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_insertion_order() {
        let mut t = MeasurementTable::new();
        t.insert("with_rls", "scan", 1951.1).unwrap();
        t.insert("baseline", "scan", 117.9).unwrap();
        t.insert("baseline", "join-filter", 20.4).unwrap();
        t.insert("with_rls", "join-filter", 1974.3).unwrap();

        assert_eq!(t.conditions(), ["with_rls", "baseline"]);
        assert_eq!(t.categories(), ["scan", "join-filter"]);
        assert_eq!(t.len(), 4);
        assert_eq!(t.get("baseline", "join-filter"), Some(20.4));
        assert_eq!(t.get("baseline", "sort"), None);
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut t = MeasurementTable::new();
        t.insert("a", "scan", 1.0).unwrap();
        t.insert("a", "scan", 2.0).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get("a", "scan"), Some(2.0));
    }

    #[test]
    fn rejects_negative_and_non_finite_values() {
        let mut t = MeasurementTable::new();
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let err = t.insert("a", "scan", bad).unwrap_err();
            assert!(matches!(err, ReportError::InvalidValue { .. }));
        }
        assert!(t.is_empty());
        assert!(t.conditions().is_empty());
    }

    #[test]
    fn zero_is_a_valid_measurement() {
        let mut t = MeasurementTable::new();
        t.insert("a", "scan", 0.0).unwrap();
        assert_eq!(t.get("a", "scan"), Some(0.0));
    }

    #[test]
    fn deserializes_from_rows() {
        let json = r#"[
            {"condition": "baseline", "category": "scan", "value": 100.0},
            {"condition": "treatment", "category": "scan", "value": 150.0}
        ]"#;
        let t: MeasurementTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.conditions(), ["baseline", "treatment"]);
        assert_eq!(t.get("treatment", "scan"), Some(150.0));

        let back = serde_json::to_value(&t).unwrap();
        assert_eq!(back.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn deserialize_rejects_negative_rows() {
        let json = r#"[{"condition": "a", "category": "scan", "value": -3.0}]"#;
        assert!(serde_json::from_str::<MeasurementTable>(json).is_err());
    }
}
