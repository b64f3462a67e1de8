//! The sanitisation pipeline: "dirty in, clean out".
//!
//! Runs the opinionated cleaning sequence every dataset goes through before
//! analysis: transform, header sanitisation, unit-aware value coercion,
//! auto-melt, final type enforcement. Each stage appends an operation line
//! (and any warnings) to the outcome so the audit log records exactly what
//! happened to the data.

use crate::config::{GraphKind, PlotConfig, TransformKind};
use crate::wrangle::infer::profile_columns;
use crate::wrangle::naming;
use crate::wrangle::shape::{self, TableShape};
use crate::wrangle::units::{self, CellValue};
use anyhow::{Context as _, Result};
use log::{info, warn};
use polars::prelude::*;

/// Sanitised dataframe plus the provenance trail.
pub struct SanitizeOutcome {
    pub df: DataFrame,
    /// Ordered operation log for the audit record.
    pub operations: Vec<String>,
    /// Data-quality warnings (unparseable units, ambiguous shape, ...).
    pub warnings: Vec<String>,
    /// True when the table was melted into long form.
    pub melted: bool,
}

/// Runs the full sanitisation pipeline.
pub fn sanitize(df: DataFrame, config: &PlotConfig) -> Result<SanitizeOutcome> {
    let mut run = Sanitizer {
        config,
        operations: Vec::new(),
        warnings: Vec::new(),
        melted: false,
    };
    info!("Starting data sanitisation pipeline");

    let df = run.sanitize_headers(df)?;
    let df = run.sanitize_values(df)?;
    let df = run.apply_transform(df)?;
    let df = run.auto_melt(df)?;
    let df = run.enforce_types(df)?;

    Ok(SanitizeOutcome {
        df,
        operations: run.operations,
        warnings: run.warnings,
        melted: run.melted,
    })
}

/// Finds `target` in `df`, tolerating the header sanitisation the pipeline
/// applies: exact match first, then the sanitised form.
pub fn resolve_column(df: &DataFrame, target: &str) -> Option<String> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    if names.iter().any(|n| n == target) {
        return Some(target.to_owned());
    }
    let sanitized = naming::sanitize_header(target);
    names.into_iter().find(|n| *n == sanitized)
}

struct Sanitizer<'a> {
    config: &'a PlotConfig,
    operations: Vec<String>,
    warnings: Vec<String>,
    melted: bool,
}

impl Sanitizer<'_> {
    fn record(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{msg}");
        self.operations.push(msg);
    }

    fn alert(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{msg}");
        self.warnings.push(msg);
    }

    /// Lowercase, trim, underscore-join every header.
    fn sanitize_headers(&mut self, mut df: DataFrame) -> Result<DataFrame> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let cleaned = naming::sanitize_headers(&names);
        if names != cleaned {
            self.record("Sanitised column headers");
        }
        df.set_column_names(cleaned.iter().map(String::as_str))
            .context("Failed to rename headers")?;
        Ok(df)
    }

    /// Rewrites numeric-leaning string columns as floats: units stripped,
    /// "not detected" markers and unparseable values become missing.
    fn sanitize_values(&mut self, mut df: DataFrame) -> Result<DataFrame> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        for name in names {
            let series = df
                .column(&name)
                .context("Column disappeared mid-pipeline")?
                .as_materialized_series()
                .clone();
            if !matches!(series.dtype(), DataType::String) {
                continue;
            }

            let ca = series.str().map_err(|e| anyhow::anyhow!(e))?;

            let mut numeric = 0usize;
            let mut interpretable = 0usize;
            for value in ca.into_iter().flatten() {
                match units::interpret_cell(value) {
                    CellValue::Missing => {}
                    CellValue::Number(_) => {
                        numeric += 1;
                        interpretable += 1;
                    }
                    CellValue::Text => interpretable += 1,
                }
            }
            if interpretable == 0 {
                continue;
            }
            let rate = numeric as f64 / interpretable as f64;
            if rate <= self.config.thresholds.numeric_leaning {
                continue;
            }

            let mut unparseable = 0usize;
            let values: Vec<Option<f64>> = ca
                .into_iter()
                .map(|opt| match opt {
                    None => None,
                    Some(raw) => match units::interpret_cell(raw) {
                        CellValue::Number(v) => Some(v),
                        CellValue::Missing => None,
                        CellValue::Text => {
                            unparseable += 1;
                            None
                        }
                    },
                })
                .collect();

            let replacement = Series::new(name.as_str().into(), values);
            df.replace(&name, replacement)
                .with_context(|| format!("Failed to coerce column '{name}'"))?;
            self.record(format!("Extracted numeric values in column '{name}'"));
            if unparseable > 0 {
                self.alert(format!(
                    "{unparseable} unparseable value(s) in column '{name}' treated as missing"
                ));
            }
        }
        Ok(df)
    }

    /// Applies the configured log transform to the dependent column.
    fn apply_transform(&mut self, mut df: DataFrame) -> Result<DataFrame> {
        if self.config.transform == TransformKind::Linear {
            return Ok(df);
        }
        let model = self.config.transform;

        let target = self
            .config
            .dependent
            .as_deref()
            .and_then(|t| resolve_column(&df, t));

        let Some(target) = target else {
            self.alert(format!(
                "No dependent variable resolved for {} transform; data left untouched",
                model.as_str()
            ));
            return Ok(df);
        };

        let series = df
            .column(&target)
            .context("Column disappeared mid-pipeline")?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .with_context(|| format!("Cannot apply {} to non-numeric '{target}'", model.as_str()))?;
        let ca = series.f64().map_err(|e| anyhow::anyhow!(e))?;

        let mut dropped = 0usize;
        let values: Vec<Option<f64>> = ca
            .into_iter()
            .map(|opt| {
                let v = opt?;
                let out = model.apply(v);
                if out.is_none() {
                    dropped += 1;
                }
                out
            })
            .collect();

        let replacement = Series::new(target.as_str().into(), values);
        df.replace(&target, replacement)
            .with_context(|| format!("Failed to transform column '{target}'"))?;
        self.record(format!(
            "Applied {} transform to column '{target}'",
            model.as_str()
        ));
        if dropped > 0 {
            self.alert(format!(
                "{dropped} non-positive value(s) in '{target}' have no {} and became missing",
                model.as_str()
            ));
        }
        Ok(df)
    }

    /// Melts wide tables into long form. Scatter and heatmap need the wide
    /// layout and skip this stage.
    fn auto_melt(&mut self, df: DataFrame) -> Result<DataFrame> {
        if self.config.graph.wants_wide_data() {
            self.record(format!(
                "Skipping auto-melt for {} graph (requires wide data)",
                self.config.graph
            ));
            return Ok(df);
        }

        let profiles = profile_columns(&df, &self.config.thresholds)?;
        let report = shape::detect_shape(&df, &profiles, &self.config.thresholds);
        if report.ambiguous {
            self.warnings.push(
                "Table shape was ambiguous; treated as long format".to_owned(),
            );
        }
        if report.shape != TableShape::Wide {
            return Ok(df);
        }

        self.record(format!(
            "Detected wide format ({} measurement vs {} id columns); melting",
            report.measure_cols.len(),
            report.id_cols.len()
        ));
        let melted = shape::melt(&df, &report)?;
        self.melted = true;
        self.record(format!(
            "Data melted to long form: {} rows",
            melted.height()
        ));
        Ok(melted)
    }

    /// Last line of defence before plotting: the `value` column must be
    /// numeric and (scatter aside) a `group` column must exist.
    fn enforce_types(&mut self, mut df: DataFrame) -> Result<DataFrame> {
        if df.column("value").is_ok() {
            let value = df
                .column("value")
                .map_err(|e| anyhow::anyhow!(e))?
                .as_materialized_series()
                .cast(&DataType::Float64)
                .context("Failed to coerce 'value' column to numeric")?;
            df.replace("value", value)
                .context("Failed to replace 'value' column")?;
        }

        let dependent = self
            .config
            .dependent
            .as_deref()
            .and_then(|t| resolve_column(&df, t));

        if let Some(target) = &dependent {
            df = self.enforce_dependent_numeric(df, target)?;
        }

        if df.column("group").is_err() {
            if self.config.graph == GraphKind::Scatter {
                self.record("Skipping group assignment for scatter plot");
                return Ok(df);
            }

            if df.column("variable").is_ok() {
                self.record("Using 'variable' column as 'group'");
                df.rename("variable", "group".into())
                    .context("Failed to rename 'variable' to 'group'")?;
            } else {
                // Fall back to the first text column that is not already
                // mapped to an axis.
                let independent = self
                    .config
                    .independent
                    .as_deref()
                    .and_then(|t| resolve_column(&df, t));
                let candidate = df
                    .get_columns()
                    .iter()
                    .find(|c| {
                        matches!(c.dtype(), DataType::String)
                            && Some(c.name().as_str()) != dependent.as_deref()
                            && Some(c.name().as_str()) != independent.as_deref()
                    })
                    .map(|c| c.name().to_string());
                if let Some(name) = candidate {
                    self.record(format!("Auto-assigned column '{name}' as 'group'"));
                    df.rename(&name, "group".into())
                        .with_context(|| format!("Failed to rename '{name}' to 'group'"))?;
                }
            }
        }

        Ok(df)
    }

    fn enforce_dependent_numeric(&mut self, mut df: DataFrame, target: &str) -> Result<DataFrame> {
        let series = df
            .column(target)
            .map_err(|e| anyhow::anyhow!(e))?
            .as_materialized_series()
            .clone();
        if series.dtype().is_primitive_numeric() {
            return Ok(df);
        }
        if !matches!(series.dtype(), DataType::String) {
            return Ok(df);
        }

        let ca = series.str().map_err(|e| anyhow::anyhow!(e))?;
        let mut numeric = 0usize;
        let mut interpretable = 0usize;
        for value in ca.into_iter().flatten() {
            match units::interpret_cell(value) {
                CellValue::Missing => {}
                CellValue::Number(_) => {
                    numeric += 1;
                    interpretable += 1;
                }
                CellValue::Text => interpretable += 1,
            }
        }
        let leaning = interpretable > 0
            && (numeric as f64 / interpretable as f64) > self.config.thresholds.numeric_leaning;
        let forced = self.config.transform != TransformKind::Linear;

        if !leaning && !forced {
            self.alert(format!(
                "Dependent variable '{target}' appears categorical; skipping numeric enforcement"
            ));
            return Ok(df);
        }

        let mut unparseable = 0usize;
        let values: Vec<Option<f64>> = ca
            .into_iter()
            .map(|opt| match opt {
                None => None,
                Some(raw) => match units::interpret_cell(raw) {
                    CellValue::Number(v) => Some(v),
                    CellValue::Missing => None,
                    CellValue::Text => {
                        unparseable += 1;
                        None
                    }
                },
            })
            .collect();

        let replacement = Series::new(target.into(), values);
        df.replace(target, replacement)
            .with_context(|| format!("Failed to coerce dependent column '{target}'"))?;
        self.record(format!("Enforced numeric type on dependent column '{target}'"));
        if unparseable > 0 {
            self.alert(format!(
                "{unparseable} unparseable value(s) in '{target}' treated as missing"
            ));
        }
        Ok(df)
    }
}
