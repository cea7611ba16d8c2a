use serde::{Deserialize, Serialize};

use crate::ratio::RatioEntry;
use crate::report::ReportOutcome;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub tool_version: String,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

impl RunMeta {
    pub fn current() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp_utc: now_utc_unix(),
            git_sha: git_sha_short(),
        }
    }
}

fn now_utc_unix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Set by CI/build scripts when available.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRecord {
    pub condition: String,
    pub category: String,
    pub ratio: f64,
}

impl From<&RatioEntry> for RatioRecord {
    fn from(e: &RatioEntry) -> Self {
        Self {
            condition: e.condition.clone(),
            category: e.category.clone(),
            ratio: e.ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub name: String,
    pub baseline: String,
    /// Chart path; absent when only ratios were computed.
    pub output: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes: Option<u64>,
    pub ratios: Vec<RatioRecord>,
}

impl From<&ReportOutcome> for ReportRecord {
    fn from(o: &ReportOutcome) -> Self {
        Self {
            name: o.name.clone(),
            baseline: o.baseline.clone(),
            output: Some(o.chart.path.display().to_string()),
            width: Some(o.chart.width),
            height: Some(o.chart.height),
            bytes: Some(o.chart.bytes),
            ratios: o.ratios.iter().map(RatioRecord::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub run: RunMeta,
    pub reports: Vec<ReportRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

impl ReportSummary {
    pub fn new() -> Self {
        Self {
            run: RunMeta::current(),
            reports: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Default for ReportSummary {
    fn default() -> Self {
        Self::new()
    }
}
