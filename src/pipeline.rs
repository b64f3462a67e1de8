//! Run orchestration: sanitise, map variables, render, export, seal.
//!
//! One invocation is one batch run over one dataset. The stages execute
//! sequentially and each export artifact is written independently, so a
//! failing spreadsheet never corrupts an already-written figure and the
//! audit log is sealed no matter what happened before it.

use crate::config::{GraphKind, PlotConfig};
use crate::figure;
use crate::report::artifacts::ArtifactRegistry;
use crate::report::workbook;
use crate::wrangle::transform::{self, resolve_column};
use anyhow::{Context as _, Result};
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// What a completed run produced.
pub struct RunSummary {
    pub run_id: String,
    pub output_dir: PathBuf,
}

/// Executes the full pipeline for one dataset and configuration.
pub fn execute(raw: DataFrame, config: &PlotConfig, input_path: &Path) -> Result<RunSummary> {
    let outcome = transform::sanitize(raw, config)?;

    let mut artifacts = ArtifactRegistry::create(config)?;
    for op in &outcome.operations {
        artifacts.record(op.clone());
    }
    for w in &outcome.warnings {
        artifacts.alert(w.clone());
    }
    artifacts.fingerprint(input_path);

    let df = map_axes(outcome.df, config, &mut artifacts)?;

    info!("Generating result...");
    let rendered = figure::render(&df, config, &mut artifacts)?;

    // The spreadsheet is written independently of the figures; failure is
    // recorded and the run continues to seal its audit log.
    let export_df = export_frame(&df, config);
    let workbook_path = artifacts.workbook_path();
    match workbook::write_report(&workbook_path, &export_df, &rendered) {
        Ok(()) => {
            let name = workbook_path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            artifacts.record(format!("Data saved: {name}"));
        }
        Err(e) => artifacts.alert(format!("Spreadsheet export failed: {e}")),
    }

    let run_id = artifacts.run_id().to_owned();
    let output_dir = artifacts.output_dir().to_path_buf();
    artifacts.seal()?;
    info!("Process complete. RunID: {run_id}");

    Ok(RunSummary { run_id, output_dir })
}

/// Renames the mapped independent/dependent columns to the canonical
/// `x`/`y` the figures consume, with the long-form fallbacks (`group` ->
/// `x`, `value` -> `y`) for melted data.
fn map_axes(
    mut df: DataFrame,
    config: &PlotConfig,
    artifacts: &mut ArtifactRegistry,
) -> Result<DataFrame> {
    // Heatmaps work on the column selection, not on an x/y pair.
    if config.graph == GraphKind::Heatmap {
        return Ok(df);
    }

    if let Some(target) = &config.independent {
        match resolve_column(&df, target) {
            Some(found) if found != "x" => {
                artifacts.record(format!("Mapping column '{found}' -> 'x'"));
                df.rename(&found, "x".into())
                    .with_context(|| format!("Failed to map '{found}' to x"))?;
            }
            Some(_) => {}
            None => artifacts.alert(format!("Mapping failed: column '{target}' not found")),
        }
    }

    if let Some(target) = &config.dependent {
        match resolve_column(&df, target) {
            Some(found) if found != "y" => {
                artifacts.record(format!("Mapping column '{found}' -> 'y'"));
                df.rename(&found, "y".into())
                    .with_context(|| format!("Failed to map '{found}' to y"))?;
            }
            Some(_) => {}
            None => artifacts.alert(format!("Mapping failed: column '{target}' not found")),
        }
    }

    // Long-form fallbacks from the melt stage.
    if df.column("x").is_err() && df.column("group").is_ok() {
        df.rename("group", "x".into())
            .context("Failed to rename 'group' to 'x'")?;
    }
    if df.column("y").is_err() && df.column("value").is_ok() {
        df.rename("value", "y".into())
            .context("Failed to rename 'value' to 'y'")?;
    }

    // A box plot of a single unlabelled series still needs a group.
    if config.graph == GraphKind::Box && df.column("x").is_err() {
        let height = df.height();
        let default = Series::new("x".into(), vec!["Default"; height]);
        df.with_column(default)
            .context("Failed to add default group column")?;
        artifacts.record("Auto-assigned 'Default' group to 'x'");
    }

    Ok(df)
}

/// Restores user-facing headers for the spreadsheet: the canonical plot
/// columns go back to their display labels (volcano keeps its
/// domain-specific names).
fn export_frame(df: &DataFrame, config: &PlotConfig) -> DataFrame {
    let mut out = df.clone();

    let (x_name, y_name) = match config.graph {
        GraphKind::Volcano => ("Log2_FoldChange".to_owned(), "P_Value".to_owned()),
        _ => (config.xlabel_or("Group"), config.ylabel_or("Value")),
    };

    if out.column("x").is_ok() && out.column(&x_name).is_err() {
        let _ = out.rename("x", x_name.as_str().into());
    }
    if out.column("y").is_ok() && out.column(&y_name).is_err() {
        let _ = out.rename("y", y_name.as_str().into());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphKind, PlotConfig};

    fn registry_for(config: &PlotConfig) -> ArtifactRegistry {
        ArtifactRegistry::create(config).unwrap()
    }

    #[test]
    fn test_map_axes_renames_mapped_columns() {
        let t = Series::new("treatment".into(), vec!["a", "b"]);
        let c = Series::new("conc".into(), vec![1.0, 2.0]);
        let df = DataFrame::new(vec![Column::from(t), Column::from(c)]).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let mut config = PlotConfig::new(GraphKind::Box);
        config.independent = Some("Treatment".to_owned());
        config.dependent = Some("Conc".to_owned());
        config.output_base = Some(tmp.path().to_path_buf());

        let mut artifacts = registry_for(&config);
        let mapped = map_axes(df, &config, &mut artifacts).unwrap();
        assert!(mapped.column("x").is_ok());
        assert!(mapped.column("y").is_ok());
    }

    #[test]
    fn test_map_axes_falls_back_to_group_value() {
        let g = Series::new("group".into(), vec!["a", "b"]);
        let v = Series::new("value".into(), vec![1.0, 2.0]);
        let df = DataFrame::new(vec![Column::from(g), Column::from(v)]).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let mut config = PlotConfig::new(GraphKind::Box);
        config.output_base = Some(tmp.path().to_path_buf());
        let mut artifacts = registry_for(&config);
        let mapped = map_axes(df, &config, &mut artifacts).unwrap();
        assert!(mapped.column("x").is_ok());
        assert!(mapped.column("y").is_ok());
    }

    #[test]
    fn test_export_frame_restores_labels() {
        let x = Series::new("x".into(), vec!["a", "b"]);
        let y = Series::new("y".into(), vec![1.0, 2.0]);
        let df = DataFrame::new(vec![Column::from(x), Column::from(y)]).unwrap();

        let mut config = PlotConfig::new(GraphKind::Box);
        config.xlabel = Some("Treatment".to_owned());
        config.ylabel = Some("Concentration".to_owned());

        let out = export_frame(&df, &config);
        assert!(out.column("Treatment").is_ok());
        assert!(out.column("Concentration").is_ok());
    }

    #[test]
    fn test_map_axes_adds_default_group_for_box() {
        let v = Series::new("value".into(), vec![1.0, 2.0]);
        let df = DataFrame::new(vec![Column::from(v)]).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let mut config = PlotConfig::new(GraphKind::Box);
        config.output_base = Some(tmp.path().to_path_buf());
        let mut artifacts = registry_for(&config);
        let mapped = map_axes(df, &config, &mut artifacts).unwrap();

        let x = mapped.column("x").unwrap().as_materialized_series().clone();
        let ca = x.str().unwrap();
        assert_eq!(ca.get(0), Some("Default"));
    }
}
