//! Volcano plot for differential-expression style data.
//!
//! X is a log2 fold change, Y a p-value column. When the Y column still
//! holds raw p-values (everything at or below 1) it is auto-transformed to
//! -log10. Points are classified Up / Down / NS against fixed thresholds
//! and the thresholds themselves are drawn as dashed guides.

use crate::config::PlotConfig;
use crate::figure::{style, FigureSpec};
use crate::stats::{Descriptive, GroupDescriptive};
use anyhow::{anyhow, bail, Result};
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use polars::prelude::{DataFrame, DataType};

/// -log10(0.05)
const P_THRESHOLD: f64 = 1.3;
/// log2(2)
const FC_THRESHOLD: f64 = 1.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Status {
    Up,
    Down,
    NotSignificant,
}

impl Status {
    fn classify(x: f64, y: f64) -> Self {
        if y > P_THRESHOLD && x > FC_THRESHOLD {
            Self::Up
        } else if y > P_THRESHOLD && x < -FC_THRESHOLD {
            Self::Down
        } else {
            Self::NotSignificant
        }
    }

    fn color(self) -> RGBColor {
        match self {
            Self::Up => style::NATURE_RED,
            Self::Down => style::NATURE_BLUE,
            Self::NotSignificant => style::NATURE_MUTED,
        }
    }
}

pub struct VolcanoFigure {
    points: Vec<(f64, f64, Status)>,
    auto_log: bool,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl FigureSpec for VolcanoFigure {
    fn prepare(df: &DataFrame, _config: &PlotConfig) -> Result<Self> {
        for required in ["x", "y"] {
            if df.column(required).is_err() {
                bail!(
                    "Volcano plot requires an independent variable (fold change) \
                     and a dependent variable (p-value)"
                );
            }
        }

        let xs = numeric_column(df, "x")?;
        let ys = numeric_column(df, "y")?;

        let mut pairs: Vec<(f64, f64)> = xs
            .into_iter()
            .zip(ys)
            .filter_map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
                _ => None,
            })
            .collect();
        if pairs.is_empty() {
            bail!("Volcano plot has no paired numeric observations");
        }

        // Raw p-values live in [0, 1]; anything above 1 means the column was
        // already transformed upstream.
        let y_max = pairs.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let auto_log = y_max <= 1.0;
        if auto_log {
            info!("Auto-transforming Y axis to -log10(p-value)");
            pairs.retain(|p| p.1 > 0.0);
            for p in &mut pairs {
                p.1 = -p.1.log10();
            }
            if pairs.is_empty() {
                bail!("All p-values were non-positive; nothing to plot");
            }
        }

        let points: Vec<(f64, f64, Status)> = pairs
            .into_iter()
            .map(|(x, y)| (x, y, Status::classify(x, y)))
            .collect();

        let x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        // The guides must stay visible even when the data hugs one side.
        let x_reach = x_max.abs().max(x_min.abs()).max(FC_THRESHOLD * 1.2);
        Ok(Self {
            points,
            auto_log,
            x_range: (-x_reach * 1.05, x_reach * 1.05),
            y_range: style::padded_range(y_min.min(0.0), y_max.max(P_THRESHOLD * 1.2)),
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

        let ylabel = if self.auto_log {
            format!("-Log10({})", config.ylabel_or("P-value"))
        } else {
            config.ylabel_or("-Log10 P-value")
        };

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(config.xlabel_or("Log2 Fold Change"))
            .y_desc(ylabel)
            .axis_desc_style((style::FONT, style::LABEL_SIZE))
            .label_style((style::FONT, style::TICK_SIZE))
            .axis_style(BLACK.stroke_width(1))
            .draw()
            .map_err(|e| anyhow!("{e}"))?;

        // NS first so significant points sit on top.
        for status in [Status::NotSignificant, Status::Down, Status::Up] {
            chart
                .draw_series(
                    self.points
                        .iter()
                        .filter(|p| p.2 == status)
                        .map(|&(x, y, s)| Circle::new((x, y), 4, s.color().mix(0.8).filled())),
                )
                .map_err(|e| anyhow!("{e}"))?;
        }

        // Dashed significance guides.
        let guide = BLACK.mix(0.5).stroke_width(1);
        chart
            .draw_series(DashedLineSeries::new(
                vec![(x0, P_THRESHOLD), (x1, P_THRESHOLD)],
                8,
                6,
                guide,
            ))
            .map_err(|e| anyhow!("{e}"))?;
        for fc in [FC_THRESHOLD, -FC_THRESHOLD] {
            chart
                .draw_series(DashedLineSeries::new(
                    vec![(fc, y0), (fc, y1)],
                    8,
                    6,
                    guide,
                ))
                .map_err(|e| anyhow!("{e}"))?;
        }

        Ok(())
    }

    fn descriptive(&self) -> Vec<GroupDescriptive> {
        let xs: Vec<f64> = self.points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = self.points.iter().map(|p| p.1).collect();
        let mut rows = Vec::new();
        if let Some(stats) = Descriptive::compute(&xs) {
            rows.push(GroupDescriptive {
                label: "log2 fold change".to_owned(),
                stats,
            });
        }
        if let Some(stats) = Descriptive::compute(&ys) {
            rows.push(GroupDescriptive {
                label: "-log10 p-value".to_owned(),
                stats,
            });
        }
        rows
    }
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|e| anyhow!(e))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| anyhow!("Column '{name}' is not numeric: {e}"))?;
    let ca = series.f64().map_err(|e| anyhow!(e))?;
    Ok(ca.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphKind;
    use polars::prelude::*;

    fn volcano_df() -> DataFrame {
        // Raw p-values: should trigger the -log10 auto-transform.
        let x = Series::new("x".into(), vec![2.5, -2.5, 0.1, 1.5, -0.2]);
        let y = Series::new("y".into(), vec![0.001, 0.0005, 0.5, 0.2, 0.9]);
        DataFrame::new(vec![Column::from(x), Column::from(y)]).unwrap()
    }

    #[test]
    fn test_auto_log_transform_and_classification() {
        let config = PlotConfig::new(GraphKind::Volcano);
        let fig = VolcanoFigure::prepare(&volcano_df(), &config).unwrap();
        assert!(fig.auto_log);

        let statuses: Vec<Status> = fig.points.iter().map(|p| p.2).collect();
        assert_eq!(statuses[0], Status::Up); // fc 2.5, p 0.001
        assert_eq!(statuses[1], Status::Down); // fc -2.5, p 0.0005
        assert_eq!(statuses[2], Status::NotSignificant);
        assert_eq!(statuses[3], Status::NotSignificant); // below fc threshold
    }

    #[test]
    fn test_pretransformed_y_left_alone() {
        let x = Series::new("x".into(), vec![2.0, -2.0]);
        let y = Series::new("y".into(), vec![3.0, 5.0]); // already -log10
        let df = DataFrame::new(vec![Column::from(x), Column::from(y)]).unwrap();
        let config = PlotConfig::new(GraphKind::Volcano);
        let fig = VolcanoFigure::prepare(&df, &config).unwrap();
        assert!(!fig.auto_log);
        assert_eq!(fig.points[0].2, Status::Up);
    }

    #[test]
    fn test_draw_produces_svg() {
        let config = PlotConfig::new(GraphKind::Volcano);
        let fig = VolcanoFigure::prepare(&volcano_df(), &config).unwrap();

        let mut buffer = String::new();
        {
            let root = SVGBackend::with_string(&mut buffer, style::FIGURE_SIZE)
                .into_drawing_area();
            root.fill(&WHITE).unwrap();
            fig.draw(&root, &config).unwrap();
            root.present().unwrap();
        }
        assert!(buffer.contains("<svg"));
    }
}
