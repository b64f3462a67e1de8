//! Scatter plot with least-squares regression line and 95% CI band.

use crate::config::PlotConfig;
use crate::figure::{draw_annotation, style, FigureSpec};
use crate::stats::hypothesis::format_p;
use crate::stats::{self, Correlation, Descriptive, GroupDescriptive, LinearFit, TestReport};
use anyhow::{anyhow, bail, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use polars::prelude::{DataFrame, DataType};
use statrs::distribution::{ContinuousCDF as _, StudentsT};

const BAND_STEPS: usize = 60;

pub struct ScatterFigure {
    points: Vec<(f64, f64)>,
    fit: Option<LinearFit>,
    correlation: Option<Correlation>,
    /// `(x, lower, upper)` triples of the confidence band.
    band: Vec<(f64, f64, f64)>,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl FigureSpec for ScatterFigure {
    fn prepare(df: &DataFrame, _config: &PlotConfig) -> Result<Self> {
        for required in ["x", "y"] {
            if df.column(required).is_err() {
                bail!("Scatter plot requires both an independent and a dependent variable");
            }
        }

        let points = paired_values(df)?;
        if points.len() < 2 {
            bail!("Scatter plot needs at least 2 paired numeric observations");
        }

        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();

        let correlation = stats::pearson_correlation(&xs, &ys);
        let fit = stats::linear_fit(&xs, &ys);
        let band = fit.map(|f| confidence_band(&f, &xs)).unwrap_or_default();

        let x_range = style::padded_range(
            xs.iter().copied().fold(f64::INFINITY, f64::min),
            xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        );
        let y_min = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let y_max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Leave room for the band where it bulges past the data.
        let band_min = band.iter().map(|b| b.1).fold(y_min, f64::min);
        let band_max = band.iter().map(|b| b.2).fold(y_max, f64::max);
        let y_range = style::padded_range(band_min, band_max);

        Ok(Self {
            points,
            fit,
            correlation,
            band,
            x_range,
            y_range,
        })
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        config: &PlotConfig,
    ) -> Result<()> {
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;

        let mut builder = ChartBuilder::on(root);
        builder
            .margin(40)
            .x_label_area_size(90)
            .y_label_area_size(110);
        if let Some(title) = &config.title {
            builder.caption(title, (style::FONT, style::TITLE_SIZE));
        }
        let mut chart = builder
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(|e| anyhow!("{e}"))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(config.xlabel_or("X-Axis"))
            .y_desc(config.ylabel_or("Y-Axis"))
            .axis_desc_style((style::FONT, style::LABEL_SIZE))
            .label_style((style::FONT, style::TICK_SIZE))
            .axis_style(BLACK.stroke_width(1))
            .draw()
            .map_err(|e| anyhow!("{e}"))?;

        // 95% CI band under everything else.
        if !self.band.is_empty() {
            let mut polygon: Vec<(f64, f64)> =
                self.band.iter().map(|&(x, _, hi)| (x, hi)).collect();
            polygon.extend(self.band.iter().rev().map(|&(x, lo, _)| (x, lo)));
            chart
                .draw_series(std::iter::once(Polygon::new(
                    polygon,
                    style::NATURE_MUTED.mix(0.35),
                )))
                .map_err(|e| anyhow!("{e}"))?;
        }

        chart
            .draw_series(
                self.points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, BLACK.mix(0.6).filled())),
            )
            .map_err(|e| anyhow!("{e}"))?;

        if let Some(fit) = &self.fit {
            let line: Vec<(f64, f64)> = vec![
                (x0, fit.slope * x0 + fit.intercept),
                (x1, fit.slope * x1 + fit.intercept),
            ];
            chart
                .draw_series(std::iter::once(PathElement::new(
                    line,
                    style::NATURE_RED.stroke_width(2),
                )))
                .map_err(|e| anyhow!("{e}"))?;
        }

        // Keep the annotation away from the regression line: an upward
        // trend occupies bottom-left to top-right, so top-left is free, and
        // vice versa.
        if let Some(corr) = &self.correlation {
            let upward = corr.r >= 0.0;
            let lines = vec![
                format!("R^2 = {:.3}", corr.r_squared),
                format_p(corr.p_value),
            ];
            if upward {
                let (px, py) = chart.backend_coord(&(x0, y1));
                draw_annotation(root, &lines, (px + 10, py + 10), false)?;
            } else {
                let (px, py) = chart.backend_coord(&(x1, y1));
                draw_annotation(root, &lines, (px - 10, py + 10), true)?;
            }
        }

        if config.legend {
            let label = config
                .legend_name
                .clone()
                .unwrap_or_else(|| "Data".to_owned());
            let (px, py) = chart.backend_coord(&(x1, y0));
            draw_annotation(root, &[label], (px - 10, py - 40), true)?;
        }

        Ok(())
    }

    fn tests(&self) -> Vec<TestReport> {
        match &self.correlation {
            Some(c) => vec![TestReport {
                comparison: "Dependent ~ Independent".to_owned(),
                method: "Pearson correlation".to_owned(),
                statistic: Some(c.r),
                p_value: Some(c.p_value),
                sample_sizes: vec![c.n],
                note: None,
            }],
            None => vec![TestReport {
                comparison: "Dependent ~ Independent".to_owned(),
                method: "Pearson correlation".to_owned(),
                statistic: None,
                p_value: None,
                sample_sizes: vec![self.points.len()],
                note: Some("not applicable: insufficient data".to_owned()),
            }],
        }
    }

    fn descriptive(&self) -> Vec<GroupDescriptive> {
        let xs: Vec<f64> = self.points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = self.points.iter().map(|p| p.1).collect();
        let mut rows = Vec::new();
        if let Some(stats) = Descriptive::compute(&xs) {
            rows.push(GroupDescriptive {
                label: "x".to_owned(),
                stats,
            });
        }
        if let Some(stats) = Descriptive::compute(&ys) {
            rows.push(GroupDescriptive {
                label: "y".to_owned(),
                stats,
            });
        }
        rows
    }
}

/// Extracts finite `(x, y)` pairs, dropping rows where either side is
/// missing or non-numeric.
fn paired_values(df: &DataFrame) -> Result<Vec<(f64, f64)>> {
    let xs = df
        .column("x")
        .map_err(|e| anyhow!(e))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| anyhow!("Independent variable is not numeric: {e}"))?;
    let ys = df
        .column("y")
        .map_err(|e| anyhow!(e))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| anyhow!("Dependent variable is not numeric: {e}"))?;

    let xs = xs.f64().map_err(|e| anyhow!(e))?;
    let ys = ys.f64().map_err(|e| anyhow!(e))?;

    Ok(xs
        .into_iter()
        .zip(ys.into_iter())
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        })
        .collect())
}

/// Pointwise 95% confidence band of the regression mean.
fn confidence_band(fit: &LinearFit, xs: &[f64]) -> Vec<(f64, f64, f64)> {
    let df = fit.n.saturating_sub(2) as f64;
    if df < 1.0 {
        return Vec::new();
    }
    let t_crit = match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => dist.inverse_cdf(0.975),
        Err(_) => return Vec::new(),
    };

    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_finite() || max <= min {
        return Vec::new();
    }

    let step = (max - min) / BAND_STEPS as f64;
    (0..=BAND_STEPS)
        .map(|i| {
            let x = min + step * i as f64;
            let predicted = fit.slope * x + fit.intercept;
            let se_mean =
                fit.se * (1.0 / fit.n as f64 + (x - fit.x_mean).powi(2) / fit.sxx).sqrt();
            let margin = t_crit * se_mean;
            (x, predicted - margin, predicted + margin)
        })
        .collect()
}
