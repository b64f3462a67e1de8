//! Box plot with overlaid strip points and automatic group statistics.
//!
//! Groups are ordered control-first (readers expect the reference on the
//! left), boxes are drawn skeleton-style with a red median, and the raw
//! observations are jittered on top. The first completed hypothesis test is
//! annotated on the canvas.

use crate::config::PlotConfig;
use crate::figure::{draw_annotation, style, FigureSpec};
use crate::stats::hypothesis::{self, format_p};
use crate::stats::{self, Descriptive, GroupDescriptive, TestReport};
use anyhow::{anyhow, bail, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::DataFrame;
use rand::Rng as _;

const BOX_HALF_WIDTH: f64 = 0.3;
const CAP_HALF_WIDTH: f64 = 0.15;
const JITTER: f64 = 0.12;

pub struct BoxFigure {
    groups: Vec<(String, Vec<f64>)>,
    reports: Vec<TestReport>,
    rows: Vec<GroupDescriptive>,
    /// Pre-jittered strip points so the raster and vector outputs agree.
    points: Vec<(f64, f64)>,
    y_range: (f64, f64),
}

impl FigureSpec for BoxFigure {
    fn prepare(df: &DataFrame, config: &PlotConfig) -> Result<Self> {
        if df.column("y").is_err() {
            bail!("Box plot requires a dependent variable (Y axis / value column)");
        }
        if df.column("x").is_err() {
            bail!("Box plot requires a group column (X axis)");
        }

        let mut groups = stats::group_values(df, "x", "y")?;
        groups.retain(|(_, v)| !v.is_empty());
        if groups.is_empty() {
            bail!("Box plot has no numeric observations after cleaning");
        }
        hypothesis::control_first(&mut groups);

        let reports = hypothesis::run_group_tests(&groups, &config.thresholds);

        let rows: Vec<GroupDescriptive> = groups
            .iter()
            .filter_map(|(label, values)| {
                Descriptive::compute(values).map(|stats| GroupDescriptive {
                    label: label.clone(),
                    stats,
                })
            })
            .collect();

        let mut rng = rand::thread_rng();
        let mut points = Vec::new();
        for (i, (_, values)) in groups.iter().enumerate() {
            let centre = i as f64 + 0.5;
            for &v in values {
                points.push((centre + rng.gen_range(-JITTER..JITTER), v));
            }
        }

        let all: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        let min = all.iter().copied().fold(f64::INFINITY, f64::min);
        let max = all.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let y_range = style::padded_range(min, max);

        Ok(Self {
            groups,
            reports,
            rows,
            points,
            y_range,
        })
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        config: &PlotConfig,
    ) -> Result<()> {
        let n = self.groups.len();
        let (y0, y1) = self.y_range;

        let mut builder = ChartBuilder::on(root);
        builder
            .margin(40)
            .x_label_area_size(110)
            .y_label_area_size(110);
        if let Some(title) = &config.title {
            builder.caption(title, (style::FONT, style::TITLE_SIZE));
        }
        let mut chart = builder
            .build_cartesian_2d(0f64..n as f64, y0..y1)
            .map_err(|e| anyhow!("{e}"))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(config.xlabel_or("Group"))
            .y_desc(config.ylabel_or("Value"))
            .axis_desc_style((style::FONT, style::LABEL_SIZE))
            .label_style((style::FONT, style::TICK_SIZE))
            .axis_style(BLACK.stroke_width(1))
            .x_label_formatter(&|_| String::new())
            .draw()
            .map_err(|e| anyhow!("{e}"))?;

        // Skeleton boxes with Tukey whiskers.
        let mut boxes = Vec::new();
        let mut strokes = Vec::new();
        for (i, (_, values)) in self.groups.iter().enumerate() {
            let Some(d) = Descriptive::compute(values) else {
                continue;
            };
            let c = i as f64 + 0.5;
            let iqr = d.q3 - d.q1;
            let lo_fence = d.q1 - 1.5 * iqr;
            let hi_fence = d.q3 + 1.5 * iqr;
            let lo = values
                .iter()
                .copied()
                .filter(|v| *v >= lo_fence)
                .fold(f64::INFINITY, f64::min)
                .min(d.q1);
            let hi = values
                .iter()
                .copied()
                .filter(|v| *v <= hi_fence)
                .fold(f64::NEG_INFINITY, f64::max)
                .max(d.q3);

            boxes.push(Rectangle::new(
                [(c - BOX_HALF_WIDTH, d.q1), (c + BOX_HALF_WIDTH, d.q3)],
                BLACK.stroke_width(2),
            ));
            strokes.push(PathElement::new(
                vec![(c - BOX_HALF_WIDTH, d.median), (c + BOX_HALF_WIDTH, d.median)],
                style::NATURE_RED.stroke_width(2),
            ));
            // Whiskers and caps.
            strokes.push(PathElement::new(
                vec![(c, d.q3), (c, hi)],
                BLACK.stroke_width(1),
            ));
            strokes.push(PathElement::new(
                vec![(c, d.q1), (c, lo)],
                BLACK.stroke_width(1),
            ));
            strokes.push(PathElement::new(
                vec![(c - CAP_HALF_WIDTH, hi), (c + CAP_HALF_WIDTH, hi)],
                BLACK.stroke_width(1),
            ));
            strokes.push(PathElement::new(
                vec![(c - CAP_HALF_WIDTH, lo), (c + CAP_HALF_WIDTH, lo)],
                BLACK.stroke_width(1),
            ));
        }
        chart.draw_series(boxes).map_err(|e| anyhow!("{e}"))?;
        chart.draw_series(strokes).map_err(|e| anyhow!("{e}"))?;

        // Raw observations on top of the boxes.
        chart
            .draw_series(
                self.points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, BLACK.mix(0.6).filled())),
            )
            .map_err(|e| anyhow!("{e}"))?;

        // Group labels, wrapped, centred under each box.
        for (i, (label, _)) in self.groups.iter().enumerate() {
            let c = i as f64 + 0.5;
            let (px, py) = chart.backend_coord(&(c, y0));
            for (line_no, line) in style::wrap_text(label, 15).iter().enumerate() {
                let text_style = (style::FONT, style::TICK_SIZE)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Top));
                root.draw(&Text::new(
                    line.clone(),
                    (px, py + 8 + line_no as i32 * (style::TICK_SIZE as i32 + 4)),
                    text_style,
                ))
                .map_err(|e| anyhow!("{e}"))?;
            }
        }

        // Annotate the headline comparison.
        if let Some(report) = self.reports.iter().find(|r| r.p_value.is_some()) {
            if let Some(p) = report.p_value {
                let (px, py) = chart.backend_coord(&(0.0, y1));
                draw_annotation(
                    root,
                    &[report.method.clone(), format_p(p)],
                    (px + 10, py + 10),
                    false,
                )?;
            }
        }

        // A legend is redundant next to labelled boxes, so it is opt-in.
        if config.legend {
            let header = config
                .legend_name
                .clone()
                .unwrap_or_else(|| config.xlabel_or("Group"));
            let mut lines = vec![header];
            lines.extend(self.groups.iter().map(|(label, _)| format!("  {label}")));
            let (px, py) = chart.backend_coord(&(n as f64, y1));
            draw_annotation(root, &lines, (px - 10, py + 10), true)?;
        }

        Ok(())
    }

    fn tests(&self) -> Vec<TestReport> {
        self.reports.clone()
    }

    fn descriptive(&self) -> Vec<GroupDescriptive> {
        self.rows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphKind;
    use polars::prelude::*;

    fn two_group_df() -> DataFrame {
        let x = Series::new(
            "x".into(),
            vec!["Control", "Control", "Control", "Treated", "Treated", "Treated"],
        );
        let y = Series::new("y".into(), vec![1.0, 1.1, 0.9, 5.0, 5.1, 4.9]);
        DataFrame::new(vec![Column::from(x), Column::from(y)]).unwrap()
    }

    #[test]
    fn test_prepare_orders_control_first() {
        let config = PlotConfig::new(GraphKind::Box);
        let fig = BoxFigure::prepare(&two_group_df(), &config).unwrap();
        assert_eq!(fig.groups[0].0, "Control");
        assert_eq!(fig.reports.len(), 1);
        assert_eq!(fig.rows.len(), 2);
        assert_eq!(fig.points.len(), 6);
    }

    #[test]
    fn test_prepare_requires_value_column() {
        let x = Series::new("x".into(), vec!["a", "b"]);
        let df = DataFrame::new(vec![Column::from(x)]).unwrap();
        let config = PlotConfig::new(GraphKind::Box);
        assert!(BoxFigure::prepare(&df, &config).is_err());
    }

    #[test]
    fn test_draw_produces_svg() {
        let config = PlotConfig::new(GraphKind::Box);
        let fig = BoxFigure::prepare(&two_group_df(), &config).unwrap();

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
