//! Grouped bar charts of ratio tables.
//!
//! Charts are drawn into an in-memory RGB buffer, encoded as PNG in memory and
//! only then moved into place, so the destination either holds a complete
//! image or is left untouched.

use std::collections::HashMap;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::prelude::*;
use plotters::style::FontTransform;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ReportError, Result};
use crate::fonts::{ensure_font, FONT_FAMILY};
use crate::ratio::RatioTable;

/// Series palette, in legend order.
const PALETTE: &[RGBColor] = &[
    RGBColor(31, 119, 180),  // blue
    RGBColor(255, 127, 14),  // orange
    RGBColor(44, 160, 44),   // green
    RGBColor(214, 39, 40),   // red
    RGBColor(148, 103, 189), // purple
    RGBColor(140, 86, 75),   // brown
    RGBColor(227, 119, 194), // pink
    RGBColor(127, 127, 127), // grey
    RGBColor(188, 189, 34),  // olive
    RGBColor(23, 190, 207),  // cyan
];

/// Headroom above the tallest bar or reference line.
const Y_HEADROOM: f64 = 1.1;

/// Largest image the renderer will allocate, in pixels.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Which dimension forms the clusters along the x axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One cluster per category, one bar per condition.
    #[default]
    ByCategory,
    /// One cluster per condition, one bar per category.
    ByCondition,
}

/// Presentation settings for [`render_grouped_bars`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    /// Bar width in x-axis units; clusters sit 1.0 apart.
    pub bar_width: f64,
    /// Figure size in inches (width, height).
    pub figure_size: (f64, f64),
    pub dpi: u32,
    pub y_axis_label: String,
    pub x_axis_label: Option<String>,
    pub title: Option<String>,
    /// Tick label rotation, counter-clockwise. Any positive angle draws the
    /// labels reading upwards, any negative angle reading downwards.
    pub rotate_labels_degrees: f64,
    /// Draws a dashed horizontal line at this ratio, usually 1.0.
    pub reference_line_at: Option<f64>,
    pub show_legend: bool,
    /// Axis label and legend size in points.
    pub font_size_pt: f64,
    pub tick_font_size_pt: f64,
    /// TrueType font to draw text with; system fonts are probed when unset.
    ///
    /// Fonts are registered once per process: the first chart rendered picks
    /// the font and later charts reuse it whatever they ask for. Batches that
    /// need a specific font should give every report the same `font_path`.
    pub font_path: Option<PathBuf>,
    /// Display names for condition and category ids.
    pub labels: HashMap<String, String>,
    pub grouping: Grouping,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            bar_width: 0.35,
            figure_size: (6.4, 4.8),
            dpi: 300,
            y_axis_label: "Relative Runtime (ratio)".to_string(),
            x_axis_label: None,
            title: None,
            rotate_labels_degrees: 0.0,
            reference_line_at: Some(1.0),
            show_legend: true,
            font_size_pt: 10.0,
            tick_font_size_pt: 10.0,
            font_path: None,
            labels: HashMap::new(),
            grouping: Grouping::ByCategory,
        }
    }
}

impl ChartOptions {
    /// Output size in pixels: figure size times dpi.
    ///
    /// Fails for a zero dpi, a size that is not a positive finite number, or
    /// an image larger than [`MAX_PIXELS`].
    pub fn pixel_size(&self) -> Result<(u32, u32)> {
        let (w, h) = self.figure_size;
        if self.dpi == 0 {
            return Err(ReportError::Render("dpi must be positive".to_string()));
        }
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(ReportError::Render(format!(
                "figure size must be positive, got {w} x {h} in"
            )));
        }

        let dpi = self.dpi as f64;
        let (px_w, px_h) = ((w * dpi).round(), (h * dpi).round());
        if px_w < 1.0 || px_h < 1.0 || px_w * px_h > MAX_PIXELS as f64 {
            return Err(ReportError::Render(format!(
                "{px_w} x {px_h} px is outside 1..={} pixels",
                MAX_PIXELS
            )));
        }
        Ok((px_w as u32, px_h as u32))
    }

    fn points_to_px(&self, pt: f64) -> f64 {
        pt * self.dpi as f64 / 72.0
    }

    fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.labels.get(id).map(String::as_str).unwrap_or(id)
    }

    fn label_transform(&self) -> FontTransform {
        // plotters only rotates clockwise by quarter turns.
        let deg = self.rotate_labels_degrees;
        if deg > 0.0 {
            FontTransform::Rotate270
        } else if deg < 0.0 {
            FontTransform::Rotate90
        } else {
            FontTransform::None
        }
    }
}

/// A chart written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChart {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Size of the encoded PNG.
    pub bytes: u64,
}

/// Horizontal extent of bar `series` within the cluster at `cluster`.
///
/// Bars are laid out symmetrically around the cluster centre: with two bars
/// they sit at `x ± w/2`, with three at `x - w`, `x`, `x + w`.
pub fn bar_span(cluster: usize, series: usize, series_count: usize, bar_width: f64) -> (f64, f64) {
    let offset = (series as f64 - (series_count as f64 - 1.0) / 2.0) * bar_width;
    let centre = cluster as f64 + offset;
    (centre - bar_width / 2.0, centre + bar_width / 2.0)
}

/// Ratio values arranged the way they are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroups {
    /// x-axis cluster ids, left to right.
    pub clusters: Vec<String>,
    /// Bar ids within each cluster, in legend order.
    pub series: Vec<String>,
    /// `values[series][cluster]`.
    pub values: Vec<Vec<f64>>,
}

impl BarGroups {
    /// Arrange `ratios` for drawing. The baseline never becomes a bar.
    pub fn arrange<C, D>(
        ratios: &RatioTable,
        categories: &[C],
        conditions: &[D],
        grouping: Grouping,
    ) -> Result<Self>
    where
        C: AsRef<str>,
        D: AsRef<str>,
    {
        let categories: Vec<String> = categories.iter().map(|c| c.as_ref().to_string()).collect();
        let conditions: Vec<String> = conditions
            .iter()
            .map(|c| c.as_ref().to_string())
            .filter(|c| c != ratios.baseline())
            .collect();

        if categories.is_empty() {
            return Err(ReportError::EmptyChart("categories"));
        }
        if conditions.is_empty() {
            return Err(ReportError::EmptyChart("conditions"));
        }

        let lookup = |condition: &str, category: &str| {
            ratios
                .get(condition, category)
                .ok_or_else(|| ReportError::MissingMeasurement {
                    condition: condition.to_string(),
                    category: category.to_string(),
                })
        };

        let values = match grouping {
            Grouping::ByCategory => conditions
                .iter()
                .map(|cond| {
                    categories
                        .iter()
                        .map(|cat| lookup(cond.as_str(), cat.as_str()))
                        .collect::<Result<Vec<f64>>>()
                })
                .collect::<Result<Vec<Vec<f64>>>>()?,
            Grouping::ByCondition => categories
                .iter()
                .map(|cat| {
                    conditions
                        .iter()
                        .map(|cond| lookup(cond.as_str(), cat.as_str()))
                        .collect::<Result<Vec<f64>>>()
                })
                .collect::<Result<Vec<Vec<f64>>>>()?,
        };

        let (clusters, series) = match grouping {
            Grouping::ByCategory => (categories, conditions),
            Grouping::ByCondition => (conditions, categories),
        };

        Ok(Self {
            clusters,
            series,
            values,
        })
    }

    fn max_value(&self) -> f64 {
        self.values
            .iter()
            .flatten()
            .copied()
            .fold(0.0_f64, f64::max)
    }
}

fn y_upper_bound(groups: &BarGroups, reference: Option<f64>) -> f64 {
    let top = groups.max_value().max(reference.unwrap_or(0.0));
    if top > 0.0 {
        top * Y_HEADROOM
    } else {
        1.0
    }
}

fn draw(
    buf: &mut [u8],
    (width, height): (u32, u32),
    groups: &BarGroups,
    options: &ChartOptions,
    with_text: bool,
) -> std::result::Result<(), Box<dyn Error>> {
    let root = BitMapBackend::with_buffer(buf, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let n_clusters = groups.clusters.len();
    let n_series = groups.series.len();
    let half_span = (n_series as f64 * options.bar_width / 2.0 + 0.1).max(0.5);
    let y_max = y_upper_bound(groups, options.reference_line_at);

    let font_px = options.points_to_px(options.font_size_pt);
    let tick_px = options.points_to_px(options.tick_font_size_pt);
    let margin = (options.dpi as f64 / 10.0).round() as u32;

    let transform = options.label_transform();
    let tick_labels: Vec<&str> = groups.clusters.iter().map(|c| options.label(c)).collect();
    let x_label_area = if !with_text {
        margin
    } else if matches!(transform, FontTransform::None) {
        (tick_px * 1.8 + font_px * 1.6) as u32
    } else {
        let longest = tick_labels.iter().map(|l| l.chars().count()).max().unwrap_or(1);
        (tick_px * 0.65 * longest as f64 + tick_px + font_px * 1.6) as u32
    };
    let y_label_area = if with_text {
        (tick_px * 3.0 + font_px * 2.0) as u32
    } else {
        margin
    };

    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(margin)
        .x_label_area_size(x_label_area)
        .y_label_area_size(y_label_area);
    if let (true, Some(title)) = (with_text, options.title.as_deref()) {
        builder.caption(title, (FONT_FAMILY, font_px * 1.2));
    }
    let mut chart = builder.build_cartesian_2d(
        -half_span..(n_clusters as f64 - 1.0 + half_span),
        0.0..y_max,
    )?;

    if with_text {
        let formatter = |x: &f64| {
            let idx = x.round();
            if idx >= 0.0 && (x - idx).abs() < 0.3 {
                tick_labels
                    .get(idx as usize)
                    .map(|l| l.to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            }
        };

        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh()
            .x_labels(n_clusters)
            .x_label_formatter(&formatter)
            .x_label_style((FONT_FAMILY, tick_px).into_font().transform(transform))
            .y_label_style((FONT_FAMILY, tick_px))
            .y_desc(options.y_axis_label.as_str())
            .axis_desc_style((FONT_FAMILY, font_px));
        if let Some(desc) = options.x_axis_label.as_deref() {
            mesh.x_desc(desc);
        }
        mesh.draw()?;
    } else {
        let axis = BLACK.stroke_width((options.dpi / 100).max(1));
        let x0 = -half_span;
        let x1 = n_clusters as f64 - 1.0 + half_span;
        chart.draw_series([
            PathElement::new(vec![(x0, 0.0), (x1, 0.0)], axis),
            PathElement::new(vec![(x0, 0.0), (x0, y_max)], axis),
        ])?;
    }

    for (series_idx, name) in groups.series.iter().enumerate() {
        let color = PALETTE[series_idx % PALETTE.len()];
        let bars = groups.values[series_idx]
            .iter()
            .enumerate()
            .map(|(cluster_idx, &value)| {
                let (left, right) = bar_span(cluster_idx, series_idx, n_series, options.bar_width);
                Rectangle::new([(left, 0.0), (right, value)], color.filled())
            });

        let legend_px = font_px.round() as i32;
        chart
            .draw_series(bars)?
            .label(options.label(name))
            .legend(move |(x, y)| {
                Rectangle::new(
                    [(x, y - legend_px / 2), (x + legend_px * 2, y + legend_px / 2)],
                    color.filled(),
                )
            });
    }

    if let Some(level) = options.reference_line_at {
        // Dashed: alternate drawn and skipped segments across the plot.
        let x0 = -half_span;
        let x1 = n_clusters as f64 - 1.0 + half_span;
        let dash = (x1 - x0) / 60.0;
        let style = BLACK.stroke_width((options.dpi / 100).max(1));
        let dashes = (0..30).map(|i| {
            let start = x0 + (2 * i) as f64 * dash;
            PathElement::new(vec![(start, level), ((start + dash).min(x1), level)], style)
        });
        chart.draw_series(dashes)?;
    }

    if with_text && options.show_legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT_FAMILY, font_px))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn encode_png(buf: &[u8], (width, height): (u32, u32)) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(buf, width, height, ColorType::Rgb8)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    Ok(png)
}

/// Write `bytes` to `path` through a temporary file in the same directory.
fn commit(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".overhead-report-")
        .suffix(".png.tmp")
        .tempfile_in(dir)
        .map_err(|e| ReportError::write_failed(path, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ReportError::write_failed(path, e))?;
    tmp.persist(path)
        .map_err(|e| ReportError::write_failed(path, e.error))?;
    Ok(())
}

/// Draw one cluster of bars per category (or per condition, see
/// [`Grouping`]) and save it as a PNG at `output_path`.
///
/// `conditions` fixes the bar order inside each cluster and the legend order;
/// the baseline is skipped if present. An existing file at `output_path` is
/// replaced.
pub fn render_grouped_bars<C, D>(
    ratios: &RatioTable,
    categories: &[C],
    conditions: &[D],
    output_path: impl AsRef<Path>,
    options: &ChartOptions,
) -> Result<RenderedChart>
where
    C: AsRef<str>,
    D: AsRef<str>,
{
    let output_path = output_path.as_ref();
    let groups = BarGroups::arrange(ratios, categories, conditions, options.grouping)?;
    if !(options.bar_width > 0.0 && options.bar_width.is_finite()) {
        return Err(ReportError::Render(format!(
            "bar width must be positive, got {}",
            options.bar_width
        )));
    }

    let (width, height) = options.pixel_size()?;
    let with_text = ensure_font(options.font_path.as_deref()).is_some();
    debug!(
        width,
        height,
        clusters = groups.clusters.len(),
        series = groups.series.len(),
        with_text,
        "rendering chart"
    );

    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(3))
        .ok_or_else(|| ReportError::Render(format!("{width} x {height} px does not fit in memory")))?;
    let mut buf = vec![255u8; len];
    draw(&mut buf, (width, height), &groups, options, with_text)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    let png = encode_png(&buf, (width, height))?;

    commit(output_path, &png)?;
    info!(path = %output_path.display(), bytes = png.len(), "wrote chart");

    Ok(RenderedChart {
        path: output_path.to_path_buf(),
        width,
        height,
        bytes: png.len() as u64,
    })
}
