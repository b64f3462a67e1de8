//! Heatmap: correlation matrix or raw expression values.
//!
//! Correlation mode computes pairwise Pearson coefficients over the
//! selected numeric columns. Expression mode paints the values themselves,
//! optionally z-scored along rows (standardise genes) or columns
//! (standardise samples). Cells use a blue-white-red diverging map and are
//! annotated when the matrix is small enough to stay legible.

use crate::config::{HeatmapMode, PlotConfig, ZScoreAxis};
use crate::figure::{style, CorrelationMatrix, FigureSpec};
use crate::stats::{self, Descriptive, GroupDescriptive};
use crate::wrangle::transform::resolve_column;
use anyhow::{anyhow, bail, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::*;

/// Cell annotations are dropped past this edge length.
const ANNOTATION_LIMIT: usize = 20;

pub struct HeatmapFigure {
    columns: Vec<String>,
    rows: Vec<String>,
    /// Row-major; NaN marks a missing cell.
    data: Vec<Vec<f64>>,
    mode: HeatmapMode,
    /// Half-width of the diverging colour scale around its centre.
    centre: f64,
    half_span: f64,
}

impl FigureSpec for HeatmapFigure {
    fn prepare(df: &DataFrame, config: &PlotConfig) -> Result<Self> {
        let options = config.heatmap.clone().unwrap_or_default();
        let columns = select_columns(df, &options.columns)?;
        if columns.len() < 2 {
            bail!("Heatmap requires at least 2 numeric columns");
        }

        match options.mode {
            HeatmapMode::Correlation => {
                let data = correlation_matrix(df, &columns)?;
                Ok(Self {
                    rows: columns.clone(),
                    columns,
                    data,
                    mode: HeatmapMode::Correlation,
                    centre: 0.0,
                    half_span: 1.0,
                })
            }
            HeatmapMode::Expression => {
                let mut data = value_matrix(df, &columns)?;
                if let Some(axis) = options.z_score {
                    z_score(&mut data, axis);
                }
                let rows = row_labels(df, data.len());
                let finite: Vec<f64> = data
                    .iter()
                    .flat_map(|r| r.iter().copied())
                    .filter(|v| v.is_finite())
                    .collect();
                if finite.is_empty() {
                    bail!("Heatmap has no numeric values to plot");
                }
                let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
                let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let centre = if options.z_score.is_some() {
                    0.0
                } else {
                    f64::midpoint(min, max)
                };
                let half_span = (max - centre).abs().max((min - centre).abs()).max(1e-12);
                Ok(Self {
                    columns,
                    rows,
                    data,
                    mode: HeatmapMode::Expression,
                    centre,
                    half_span,
                })
            }
        }
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        config: &PlotConfig,
    ) -> Result<()> {
        let ncols = self.columns.len();
        let nrows = self.rows.len();
        if nrows == 0 {
            bail!("Heatmap matrix is empty");
        }

        let mut builder = ChartBuilder::on(root);
        builder
            .margin(60)
            .x_label_area_size(120)
            .y_label_area_size(160);
        if let Some(title) = &config.title {
            builder.caption(title, (style::FONT, style::TITLE_SIZE));
        }
        let mut chart = builder
            .build_cartesian_2d(0f64..ncols as f64, 0f64..nrows as f64)
            .map_err(|e| anyhow!("{e}"))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_label_formatter(&|_| String::new())
            .y_label_formatter(&|_| String::new())
            .axis_style(BLACK.stroke_width(1))
            .draw()
            .map_err(|e| anyhow!("{e}"))?;

        let annotate = ncols <= ANNOTATION_LIMIT && nrows <= ANNOTATION_LIMIT;

        let mut cells = Vec::new();
        for (r, row) in self.data.iter().enumerate() {
            // Row 0 at the top.
            let y = (nrows - 1 - r) as f64;
            for (c, &value) in row.iter().enumerate() {
                let color = if value.is_finite() {
                    style::diverging_color((value - self.centre) / self.half_span)
                } else {
                    RGBColor(0xEE, 0xEE, 0xEE)
                };
                cells.push(Rectangle::new(
                    [(c as f64, y), (c as f64 + 1.0, y + 1.0)],
                    color.filled(),
                ));
            }
        }
        chart.draw_series(cells).map_err(|e| anyhow!("{e}"))?;

        if annotate {
            for (r, row) in self.data.iter().enumerate() {
                let y = (nrows - 1 - r) as f64 + 0.5;
                for (c, &value) in row.iter().enumerate() {
                    if !value.is_finite() {
                        continue;
                    }
                    let (px, py) = chart.backend_coord(&(c as f64 + 0.5, y));
                    let text_style = (style::FONT, style::ANNOTATION_SIZE)
                        .into_font()
                        .color(&BLACK)
                        .pos(Pos::new(HPos::Center, VPos::Center));
                    root.draw(&Text::new(format!("{value:.2}"), (px, py), text_style))
                        .map_err(|e| anyhow!("{e}"))?;
                }
            }
        }

        // Column labels under the axis, row labels to the left.
        for (c, name) in self.columns.iter().enumerate() {
            let (px, py) = chart.backend_coord(&(c as f64 + 0.5, 0.0));
            let text_style = (style::FONT, style::TICK_SIZE)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Top));
            root.draw(&Text::new(
                style::truncate(name, 15),
                (px, py + 8),
                text_style,
            ))
            .map_err(|e| anyhow!("{e}"))?;
        }
        for (r, name) in self.rows.iter().enumerate() {
            let y = (nrows - 1 - r) as f64 + 0.5;
            let (px, py) = chart.backend_coord(&(0.0, y));
            let text_style = (style::FONT, style::TICK_SIZE)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Right, VPos::Center));
            root.draw(&Text::new(
                style::truncate(name, 15),
                (px - 8, py),
                text_style,
            ))
            .map_err(|e| anyhow!("{e}"))?;
        }

        if config.legend {
            if let Some(name) = &config.legend_name {
                let (px, py) = chart.backend_coord(&(ncols as f64, nrows as f64));
                crate::figure::draw_annotation(root, &[name.clone()], (px - 10, py - 34), true)?;
            }
        }

        Ok(())
    }

    fn matrix(&self) -> Option<CorrelationMatrix> {
        Some(CorrelationMatrix {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
            data: self.data.clone(),
        })
    }

    fn descriptive(&self) -> Vec<GroupDescriptive> {
        if self.mode != HeatmapMode::Correlation {
            return Vec::new();
        }
        // Correlations of a variable with the others, diagonal excluded.
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                let others: Vec<f64> = self
                    .data
                    .get(i)?
                    .iter()
                    .enumerate()
                    .filter(|(j, v)| *j != i && v.is_finite())
                    .map(|(_, v)| *v)
                    .collect();
                Descriptive::compute(&others).map(|stats| GroupDescriptive {
                    label: name.clone(),
                    stats,
                })
            })
            .collect()
    }
}

/// Resolves the configured column selection, or falls back to every numeric
/// column that is not a plotting coordinate.
fn select_columns(df: &DataFrame, requested: &[String]) -> Result<Vec<String>> {
    if !requested.is_empty() {
        let mut out = Vec::new();
        for name in requested {
            match resolve_column(df, name) {
                Some(found) => out.push(found),
                None => bail!("Selected column '{name}' not found in dataset"),
            }
        }
        return Ok(out);
    }

    Ok(df
        .get_columns()
        .iter()
        .filter(|c| c.dtype().is_primitive_numeric())
        .map(|c| c.name().to_string())
        .filter(|n| n != "x" && n != "y")
        .collect())
}

/// Pairwise Pearson correlation over the selected columns.
fn correlation_matrix(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<f64>>> {
    let mut matrix = Vec::with_capacity(columns.len());
    for a in columns {
        let mut row = Vec::with_capacity(columns.len());
        for b in columns {
            if a == b {
                row.push(1.0);
                continue;
            }
            let sa = df
                .column(a)
                .map_err(|e| anyhow!(e))?
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| anyhow!(e))?;
            let sb = df
                .column(b)
                .map_err(|e| anyhow!(e))?
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| anyhow!(e))?;

            let corr = match (sa.f64(), sb.f64()) {
                (Ok(ca), Ok(cb)) => {
                    let pairs: Vec<(f64, f64)> = ca
                        .into_iter()
                        .zip(cb.into_iter())
                        .filter_map(|(x, y)| match (x, y) {
                            (Some(x), Some(y)) => Some((x, y)),
                            _ => None,
                        })
                        .collect();
                    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
                    let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
                    stats::pearson_correlation(&xs, &ys).map(|c| c.r)
                }
                _ => None,
            };
            row.push(corr.unwrap_or(f64::NAN));
        }
        matrix.push(row);
    }
    Ok(matrix)
}

fn value_matrix(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<f64>>> {
    let mut cols = Vec::with_capacity(columns.len());
    for name in columns {
        let series = df
            .column(name)
            .map_err(|e| anyhow!(e))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| anyhow!("Column '{name}' is not numeric: {e}"))?;
        let ca = series.f64().map_err(|e| anyhow!(e))?;
        let values: Vec<f64> = ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        cols.push(values);
    }

    let nrows = cols.first().map(|c| c.len()).unwrap_or(0);
    Ok((0..nrows)
        .map(|r| cols.iter().map(|c| c[r]).collect())
        .collect())
}

/// Row labels come from the first text column, else row numbers.
fn row_labels(df: &DataFrame, nrows: usize) -> Vec<String> {
    let label_col = df
        .get_columns()
        .iter()
        .find(|c| matches!(c.dtype(), DataType::String))
        .map(|c| c.name().to_string());

    if let Some(name) = label_col {
        if let Ok(col) = df.column(&name) {
            if let Ok(ca) = col.as_materialized_series().str() {
                return (0..nrows)
                    .map(|i| {
                        ca.get(i)
                            .map(|s| s.to_owned())
                            .unwrap_or_else(|| i.to_string())
                    })
                    .collect();
            }
        }
    }
    (0..nrows).map(|i| i.to_string()).collect()
}

fn z_score(data: &mut [Vec<f64>], axis: ZScoreAxis) {
    match axis {
        ZScoreAxis::Rows => {
            for row in data.iter_mut() {
                standardize(row);
            }
        }
        ZScoreAxis::Columns => {
            let ncols = data.first().map(|r| r.len()).unwrap_or(0);
            for c in 0..ncols {
                let mut column: Vec<f64> = data.iter().map(|r| r[c]).collect();
                standardize(&mut column);
                for (r, value) in column.into_iter().enumerate() {
                    data[r][c] = value;
                }
            }
        }
    }
}

fn standardize(values: &mut [f64]) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return;
    }
    let m = stats::mean(&finite);
    let s = stats::sample_std(&finite);
    if s <= f64::EPSILON {
        return;
    }
    for v in values.iter_mut() {
        if v.is_finite() {
            *v = (*v - m) / s;
        }
    }
}
