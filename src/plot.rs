//! Hovmöller diagrams rendered as SVG
//!
//! Rows are analysis times (earliest at the top), columns are latitudes.
//! Colours run blue–white–red over the finite data range; NaN cells are grey.

use crate::data_source::HovmollerRenderer;
use crate::errors::{Result, RuEnsError};
use crate::model::VariableSeries;
use crate::statistics::vertical_mean;
use crate::time_window::DISPLAY_FORMAT;
use crate::variables::VariableKind;
use ndarray::{Array2, Axis, Ix2};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const MARGIN_LEFT: usize = 150;
const MARGIN_TOP: usize = 50;
const MARGIN_RIGHT: usize = 100;
const MARGIN_BOTTOM: usize = 60;
const PLOT_WIDTH: usize = 600;
const PLOT_HEIGHT: usize = 400;
const COLORBAR_STEPS: usize = 20;
const NAN_COLOR: &str = "#bdbdbd";

/// Writes `hovmoeller_{3d,2d}_<var>.svg` into a fixed directory
#[derive(Debug, Clone)]
pub struct SvgHovmollerRenderer {
    plot_dir: PathBuf,
    level: Option<usize>,
}

impl SvgHovmollerRenderer {
    pub fn new(plot_dir: impl Into<PathBuf>) -> Self {
        Self {
            plot_dir: plot_dir.into(),
            level: None,
        }
    }

    /// Plot 3-D variables at one level index instead of the vertical mean
    pub fn with_level(mut self, level: Option<usize>) -> Self {
        self.level = level;
        self
    }

    pub fn plot_dir(&self) -> &Path {
        &self.plot_dir
    }

    fn write_plot(
        &self,
        file_name: &str,
        title: &str,
        series: &VariableSeries,
        grid: &Array2<f32>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.plot_dir)?;
        let path = self.plot_dir.join(file_name);
        let svg = render_svg(title, series, grid)
            .map_err(|e| RuEnsError::RenderError(format!("formatting {file_name}: {e}")))?;
        fs::write(&path, svg)?;
        info!(path = %path.display(), "wrote Hovmöller plot");
        Ok(path)
    }
}

impl HovmollerRenderer for SvgHovmollerRenderer {
    fn plot_hovmoeller_3d(&self, series: &VariableSeries, variable: &str) -> Result<PathBuf> {
        check_series(series, variable, VariableKind::ThreeD)?;

        let (grid, position) = match self.level {
            Some(level) => {
                let levels = series.values.shape()[1];
                if level >= levels {
                    return Err(RuEnsError::RenderError(format!(
                        "level {level} out of range for '{variable}' ({levels} levels)"
                    )));
                }
                (
                    series.values.index_axis(Axis(1), level).to_owned(),
                    format!("level {level}"),
                )
            }
            None => (vertical_mean(&series.values)?, "vertical mean".to_string()),
        };
        let grid = grid.into_dimensionality::<Ix2>()?;

        let title = format!("{variable}: zonal mean, {position}");
        self.write_plot(&format!("hovmoeller_3d_{variable}.svg"), &title, series, &grid)
    }

    fn plot_hovmoeller_2d(&self, series: &VariableSeries, variable: &str) -> Result<PathBuf> {
        check_series(series, variable, VariableKind::TwoD)?;

        let grid = series.values.clone().into_dimensionality::<Ix2>()?;
        let title = format!("{variable}: zonal mean");
        self.write_plot(&format!("hovmoeller_2d_{variable}.svg"), &title, series, &grid)
    }
}

fn check_series(series: &VariableSeries, variable: &str, kind: VariableKind) -> Result<()> {
    if series.kind != kind {
        return Err(RuEnsError::RenderError(format!(
            "'{variable}' is a {} variable, cannot draw a {kind} Hovmöller plot",
            series.kind
        )));
    }
    if series.is_empty() {
        return Err(RuEnsError::RenderError(format!(
            "'{variable}' has no timestamps to plot"
        )));
    }
    Ok(())
}

/// Finite min and max, or `None` if every value is NaN
fn finite_range(grid: &Array2<f32>) -> Option<(f32, f32)> {
    grid.iter()
        .filter(|v| v.is_finite())
        .fold(None, |range, &v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Blue (0) through white (0.5) to red (1)
fn diverging_color(t: f32) -> String {
    let t = t.clamp(0.0, 1.0);
    let (r, g, b) = if t < 0.5 {
        let s = t / 0.5;
        (s, s, 1.0)
    } else {
        let s = (1.0 - t) / 0.5;
        (1.0, s, s)
    };
    let byte = |c: f32| (c * 255.0).round() as u8;
    format!("#{:02x}{:02x}{:02x}", byte(r), byte(g), byte(b))
}

fn cell_color(v: f32, range: Option<(f32, f32)>) -> String {
    match range {
        Some(_) if !v.is_finite() => NAN_COLOR.to_string(),
        Some((lo, hi)) if hi > lo => diverging_color((v - lo) / (hi - lo)),
        Some(_) => diverging_color(0.5),
        None => NAN_COLOR.to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_svg(
    title: &str,
    series: &VariableSeries,
    grid: &Array2<f32>,
) -> std::result::Result<String, std::fmt::Error> {
    let (rows, cols) = grid.dim();
    let cell_w = (PLOT_WIDTH / cols.max(1)).max(2);
    let cell_h = (PLOT_HEIGHT / rows.max(1)).max(2);
    let plot_w = cell_w * cols;
    let plot_h = cell_h * rows;
    let width = MARGIN_LEFT + plot_w + MARGIN_RIGHT;
    let height = MARGIN_TOP + plot_h + MARGIN_BOTTOM;
    let range = finite_range(grid);

    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" font-family="sans-serif" font-size="11">"#
    )?;
    writeln!(svg, r#"<rect width="{width}" height="{height}" fill="white"/>"#)?;
    writeln!(
        svg,
        r#"<text x="{}" y="25" font-size="15" text-anchor="middle">{}</text>"#,
        MARGIN_LEFT + plot_w / 2,
        escape(title)
    )?;

    for ((row, col), &v) in grid.indexed_iter() {
        writeln!(
            svg,
            r#"<rect x="{}" y="{}" width="{cell_w}" height="{cell_h}" fill="{}"/>"#,
            MARGIN_LEFT + col * cell_w,
            MARGIN_TOP + row * cell_h,
            cell_color(v, range)
        )?;
    }

    // Time axis: at most ten labels, always including the last row
    let every = rows.div_ceil(10).max(1);
    for row in (0..rows).filter(|r| r % every == 0 || *r + 1 == rows) {
        if let Some(t) = series.times.get(row) {
            writeln!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="end">{}</text>"#,
                MARGIN_LEFT - 6,
                MARGIN_TOP + row * cell_h + cell_h / 2 + 4,
                t.format(DISPLAY_FORMAT)
            )?;
        }
    }

    // Latitude axis: first, middle and last columns
    let mut lat_cols = vec![0, cols / 2, cols.saturating_sub(1)];
    lat_cols.dedup();
    for col in lat_cols {
        let label = series
            .latitudes
            .get(col)
            .map(|lat| format!("{lat:.1}°"))
            .unwrap_or_else(|| col.to_string());
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle">{label}</text>"#,
            MARGIN_LEFT + col * cell_w + cell_w / 2,
            MARGIN_TOP + plot_h + 16
        )?;
    }
    writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle">latitude</text>"#,
        MARGIN_LEFT + plot_w / 2,
        MARGIN_TOP + plot_h + 40
    )?;

    // Colour bar, maximum at the top
    let bar_x = MARGIN_LEFT + plot_w + 20;
    let step_h = plot_h.max(COLORBAR_STEPS) / COLORBAR_STEPS;
    for i in 0..COLORBAR_STEPS {
        let t = 1.0 - i as f32 / (COLORBAR_STEPS - 1) as f32;
        writeln!(
            svg,
            r#"<rect x="{bar_x}" y="{}" width="16" height="{step_h}" fill="{}"/>"#,
            MARGIN_TOP + i * step_h,
            diverging_color(t)
        )?;
    }
    if let Some((lo, hi)) = range {
        writeln!(
            svg,
            r#"<text x="{}" y="{}">{hi:.3}</text>"#,
            bar_x + 20,
            MARGIN_TOP + 10
        )?;
        writeln!(
            svg,
            r#"<text x="{}" y="{}">{lo:.3}</text>"#,
            bar_x + 20,
            MARGIN_TOP + step_h * COLORBAR_STEPS
        )?;
    }

    writeln!(svg, "</svg>")?;
    Ok(svg)
}
