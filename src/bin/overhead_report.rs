use clap::{Args, Parser, Subcommand, ValueEnum};
use overhead_report::chart::{ChartOptions, Grouping};
use overhead_report::input::{CsvLayout, CsvSource, StatisticColumns};
use overhead_report::report::{self, ReportSpec, TableSource};
use overhead_report::schema::{FailureRecord, RatioRecord, ReportRecord, ReportSummary};
use overhead_report::{compute_ratios, ReportError, Statistic};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    /// One row per (condition, category).
    Long,
    /// One row per condition; columns are categories.
    Wide,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Delimited timings file.
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Condition every other condition is divided by.
    #[arg(short, long, value_name = "ID")]
    baseline: String,

    #[arg(long, value_enum, default_value_t = LayoutArg::Long)]
    layout: LayoutArg,

    /// Condition column (long layout).
    #[arg(long, default_value = "condition")]
    condition_column: String,

    /// Category column (long layout).
    #[arg(long, default_value = "category")]
    category_column: String,

    /// Row id column (wide layout).
    #[arg(long, default_value = "condition")]
    id_column: String,

    /// Category to include, in order. Can be provided multiple times.
    ///
    /// For the wide layout these are also the columns read; all other columns
    /// are read when omitted.
    #[arg(long = "category", value_name = "NAME", action = clap::ArgAction::Append)]
    categories: Vec<String>,

    /// Condition to draw, in legend order. Can be provided multiple times.
    #[arg(long = "condition", value_name = "NAME", action = clap::ArgAction::Append)]
    conditions: Vec<String>,

    /// Which measurement column the long layout reads. The wide layout reads
    /// every category column and ignores this.
    #[arg(long, value_enum, default_value_t = Statistic::Avg)]
    statistic: Statistic,

    /// Column read for `--statistic min` (long layout).
    #[arg(long, value_name = "NAME", default_value = "min_ms")]
    min_column: String,

    /// Column read for `--statistic avg` (long layout).
    #[arg(long, value_name = "NAME", default_value = "avg_ms")]
    avg_column: String,

    /// Column read for `--statistic max` (long layout).
    #[arg(long, value_name = "NAME", default_value = "max_ms")]
    max_column: String,

    /// The file holds ratios already divided by the baseline.
    #[arg(long, default_value_t = false)]
    precomputed: bool,

    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl InputArgs {
    fn source(&self) -> TableSource {
        let layout = match self.layout {
            LayoutArg::Long => CsvLayout::Long {
                condition_column: self.condition_column.clone(),
                category_column: self.category_column.clone(),
                value_columns: StatisticColumns {
                    min: self.min_column.clone(),
                    avg: self.avg_column.clone(),
                    max: self.max_column.clone(),
                },
            },
            LayoutArg::Wide => CsvLayout::Wide {
                id_column: self.id_column.clone(),
                category_columns: self.categories.clone(),
            },
        };
        let mut source = CsvSource::new(&self.input, layout);
        source.delimiter = self.delimiter;
        if self.precomputed {
            TableSource::Precomputed(source)
        } else {
            TableSource::Csv(source)
        }
    }

    fn categories(&self) -> Option<Vec<String>> {
        (!self.categories.is_empty()).then(|| self.categories.clone())
    }

    fn conditions(&self) -> Option<Vec<String>> {
        (!self.conditions.is_empty()).then(|| self.conditions.clone())
    }
}

#[derive(Args, Debug)]
struct ChartArgs {
    /// JSON file with chart options; flags below override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    dpi: Option<u32>,

    #[arg(long)]
    bar_width: Option<f64>,

    #[arg(long, value_name = "TEXT")]
    y_label: Option<String>,

    #[arg(long, value_name = "TEXT")]
    title: Option<String>,

    /// Tick label rotation in degrees, counter-clockwise. Positive angles draw
    /// labels reading upwards, negative ones reading downwards.
    #[arg(long, value_name = "DEGREES")]
    rotate_labels: Option<f64>,

    /// Ratio to draw the dashed reference line at.
    #[arg(long, value_name = "RATIO", conflicts_with = "no_reference_line")]
    reference_line: Option<f64>,

    #[arg(long, default_value_t = false)]
    no_reference_line: bool,

    /// Cluster bars by condition instead of by category.
    #[arg(long, default_value_t = false)]
    by_condition: bool,

    /// TrueType font for chart text.
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,
}

impl ChartArgs {
    fn options(&self) -> Result<ChartOptions, ReportError> {
        let mut opts = match &self.config {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => ChartOptions::default(),
        };

        if let Some(dpi) = self.dpi {
            opts.dpi = dpi;
        }
        if let Some(w) = self.bar_width {
            opts.bar_width = w;
        }
        if let Some(label) = &self.y_label {
            opts.y_axis_label = label.clone();
        }
        if let Some(title) = &self.title {
            opts.title = Some(title.clone());
        }
        if let Some(deg) = self.rotate_labels {
            opts.rotate_labels_degrees = deg;
        }
        if let Some(level) = self.reference_line {
            opts.reference_line_at = Some(level);
        }
        if self.no_reference_line {
            opts.reference_line_at = None;
        }
        if self.by_condition {
            opts.grouping = Grouping::ByCondition;
        }
        if let Some(font) = &self.font {
            opts.font_path = Some(font.clone());
        }
        Ok(opts)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute ratios from a timings file and save a grouped bar chart.
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Where to write the PNG. Overwritten if it exists.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Compute ratios from a timings file without drawing anything.
    Ratios {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Run report manifests (JSON), in parallel.
    Run {
        #[arg(value_name = "MANIFEST", num_args = 1.., required = true)]
        manifests: Vec<PathBuf>,
    },

    /// Run every `*.report.json` manifest found below a directory.
    Batch {
        #[arg(long, value_name = "DIR")]
        dir: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "overhead-report")]
#[command(about = "Relative-overhead charts from benchmark timings (JSON summary output)")]
struct Cli {
    /// Where to write the JSON summary. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing(verbose: bool) {
    let directive = if verbose {
        "overhead_report=debug"
    } else {
        "overhead_report=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(directive.parse().expect("valid log directive")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_specs(specs: &[ReportSpec]) -> ReportSummary {
    let mut summary = ReportSummary::new();
    for (spec, result) in specs.iter().zip(report::run_batch(specs)) {
        match result {
            Ok(outcome) => summary.reports.push(ReportRecord::from(&outcome)),
            Err(err) => {
                error!(report = %spec.display_name(), "{err}");
                summary.failures.push(FailureRecord {
                    name: spec.display_name(),
                    error: err.to_string(),
                });
            }
        }
    }
    summary
}

fn run(cli: &Cli) -> Result<ReportSummary, ReportError> {
    match &cli.cmd {
        Command::Render {
            input,
            output,
            chart,
        } => {
            let spec = ReportSpec {
                name: input
                    .input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string),
                source: input.source(),
                baseline: input.baseline.clone(),
                categories: input.categories(),
                conditions: input.conditions(),
                output: output.clone(),
                statistic: input.statistic,
                chart: chart.options()?,
            };
            let outcome = report::run_report(&spec)?;
            eprintln!("Saved figure: {}", outcome.chart.path.display());

            let mut summary = ReportSummary::new();
            summary.reports.push(ReportRecord::from(&outcome));
            Ok(summary)
        }
        Command::Ratios { input } => {
            let table = input.source().load(input.statistic, &input.baseline)?;
            let categories = input
                .categories()
                .unwrap_or_else(|| table.categories().to_vec());
            let ratios = compute_ratios(&table, &input.baseline, &categories)?;

            let mut summary = ReportSummary::new();
            summary.reports.push(ReportRecord {
                name: input.input.display().to_string(),
                baseline: input.baseline.clone(),
                output: None,
                width: None,
                height: None,
                bytes: None,
                ratios: ratios.entries().iter().map(RatioRecord::from).collect(),
            });
            Ok(summary)
        }
        Command::Run { manifests } => {
            let specs = report::load_manifests(manifests)?;
            Ok(run_specs(&specs))
        }
        Command::Batch { dir } => {
            let manifests = report::discover_manifests(dir)?;
            info!(dir = %dir.display(), count = manifests.len(), "discovered manifests");
            let specs = report::load_manifests(&manifests)?;
            Ok(run_specs(&specs))
        }
    }
}

fn emit(summary: &ReportSummary, out: Option<&Path>) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(summary)?;
    if let Some(out) = out {
        fs::write(out, json)?;
    } else {
        println!("{json}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let summary = match run(&cli) {
        Ok(summary) => summary,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = emit(&summary, cli.out.as_deref()) {
        error!("failed to write summary: {err}");
        return ExitCode::FAILURE;
    }

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
