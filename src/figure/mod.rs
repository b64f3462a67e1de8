//! Figure rendering.
//!
//! Every graph follows the same lifecycle: `prepare` validates the
//! dataframe and computes its statistics, `draw` paints onto an abstract
//! drawing area so the same code produces the raster and the vector
//! artifact, and the dispatch below saves both independently - a failed
//! PNG never takes the SVG down with it.

pub mod boxplot;
pub mod heatmap;
pub mod scatter;
pub mod style;
pub mod volcano;

use crate::config::{GraphKind, PlotConfig};
use crate::report::artifacts::ArtifactRegistry;
use crate::stats::{GroupDescriptive, TestReport};
use anyhow::{anyhow, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

/// A labelled square matrix, as produced by the heatmap's correlation mode.
#[derive(Clone, Debug)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

/// Statistics a rendered figure hands to the report exporter.
#[derive(Default)]
pub struct RenderedFigure {
    pub tests: Vec<TestReport>,
    pub descriptive: Vec<GroupDescriptive>,
    /// Present for heatmaps; replaces the long table on the data sheet.
    pub matrix: Option<CorrelationMatrix>,
}

/// The figure lifecycle contract. `prepare` may reject bad data with
/// guidance; `draw` must be deterministic so both backends paint the same
/// picture.
pub trait FigureSpec: Sized {
    fn prepare(df: &polars::prelude::DataFrame, config: &PlotConfig) -> Result<Self>;

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        config: &PlotConfig,
    ) -> Result<()>;

    fn tests(&self) -> Vec<TestReport> {
        Vec::new()
    }

    fn descriptive(&self) -> Vec<GroupDescriptive> {
        Vec::new()
    }

    fn matrix(&self) -> Option<CorrelationMatrix> {
        None
    }
}

/// Renders the configured figure into the artifact bundle.
pub fn render(
    df: &polars::prelude::DataFrame,
    config: &PlotConfig,
    artifacts: &mut ArtifactRegistry,
) -> Result<RenderedFigure> {
    match config.graph {
        GraphKind::Box => run_spec::<boxplot::BoxFigure>(df, config, artifacts),
        GraphKind::Scatter => run_spec::<scatter::ScatterFigure>(df, config, artifacts),
        GraphKind::Volcano => run_spec::<volcano::VolcanoFigure>(df, config, artifacts),
        GraphKind::Heatmap => run_spec::<heatmap::HeatmapFigure>(df, config, artifacts),
    }
}

fn run_spec<F: FigureSpec>(
    df: &polars::prelude::DataFrame,
    config: &PlotConfig,
    artifacts: &mut ArtifactRegistry,
) -> Result<RenderedFigure> {
    let fig = F::prepare(df, config)?;

    // Raster and vector outputs are written independently; a failure in one
    // is reported but does not abandon the other.
    let raster = artifacts.raster_path();
    match draw_to_backend(
        &fig,
        config,
        artifacts.run_id(),
        BitMapBackend::new(&raster, style::FIGURE_SIZE),
    ) {
        Ok(()) => artifacts.record(format!("Artifact saved: {}", file_name(&raster))),
        Err(e) => artifacts.alert(format!("Raster figure failed: {e}")),
    }

    let vector = artifacts.vector_path();
    match draw_to_backend(
        &fig,
        config,
        artifacts.run_id(),
        SVGBackend::new(&vector, style::FIGURE_SIZE),
    ) {
        Ok(()) => artifacts.record(format!("Artifact saved: {}", file_name(&vector))),
        Err(e) => artifacts.alert(format!("Vector figure failed: {e}")),
    }

    Ok(RenderedFigure {
        tests: fig.tests(),
        descriptive: fig.descriptive(),
        matrix: fig.matrix(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn draw_to_backend<F: FigureSpec, DB: DrawingBackend>(
    fig: &F,
    config: &PlotConfig,
    run_id: &str,
    backend: DB,
) -> Result<()> {
    let root = backend.into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow!("{e}"))?;
    fig.draw(&root, config)?;
    stamp_run_id(&root, run_id, config.title.is_some())?;
    root.present().map_err(|e| anyhow!("{e}"))?;
    Ok(())
}

/// Watermarks the figure with the run id so a printed panel can always be
/// traced back to its audit log. Sits top-right unless a title occupies
/// that region, in which case it drops to the bottom-right.
fn stamp_run_id<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    run_id: &str,
    has_title: bool,
) -> Result<()> {
    let (w, h) = root.dim_in_pixel();
    let text = format!("RunID: {run_id} | biodata v1.0");
    let anchor = if has_title {
        Pos::new(HPos::Right, VPos::Bottom)
    } else {
        Pos::new(HPos::Right, VPos::Top)
    };
    let position = if has_title {
        (w as i32 - 8, h as i32 - 6)
    } else {
        (w as i32 - 8, 6)
    };
    let text_style = (style::FONT, style::WATERMARK_SIZE)
        .into_font()
        .color(&style::WATERMARK_GREY)
        .pos(anchor);
    root.draw(&Text::new(text, position, text_style))
        .map_err(|e| anyhow!("{e}"))?;
    Ok(())
}

/// Draws an annotation block (one string per line) at a pixel position.
pub(crate) fn draw_annotation<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    lines: &[String],
    position: (i32, i32),
    align_right: bool,
) -> Result<()> {
    let anchor = if align_right {
        Pos::new(HPos::Right, VPos::Top)
    } else {
        Pos::new(HPos::Left, VPos::Top)
    };
    let line_height = style::ANNOTATION_SIZE as i32 + 6;
    for (i, line) in lines.iter().enumerate() {
        let text_style = (style::FONT, style::ANNOTATION_SIZE)
            .into_font()
            .color(&BLACK)
            .pos(anchor);
        root.draw(&Text::new(
            line.clone(),
            (position.0, position.1 + i as i32 * line_height),
            text_style,
        ))
        .map_err(|e| anyhow!("{e}"))?;
    }
    Ok(())
}
