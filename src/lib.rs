use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod chart;
pub mod error;
pub mod fonts;
pub mod input;
pub mod ratio;
pub mod report;
pub mod schema;
pub mod table;

pub use chart::{render_grouped_bars, ChartOptions, Grouping, RenderedChart};
pub use error::{ReportError, Result};
pub use ratio::{compute_ratio, compute_ratios, RatioTable};
pub use table::MeasurementTable;

/// Aggregate statistic a loader reads when a source carries several per measurement.
#[derive(
    Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// Fastest observed run.
    Min,
    /// Mean over all runs.
    #[default]
    Avg,
    /// Slowest observed run.
    Max,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Min => "min",
            Statistic::Avg => "avg",
            Statistic::Max => "max",
        }
    }
}
