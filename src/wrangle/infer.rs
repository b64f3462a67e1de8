//! Semantic column typing.
//!
//! Each column gets one of four kinds: plain numeric, unit-bearing numeric,
//! categorical, or identifier/text. The wizard renders these next to the
//! column names and uses them as an advisory guard when the user maps
//! variables; nothing here ever blocks a run.

use crate::config::DetectionThresholds;
use crate::wrangle::units::{self, CellValue};
use anyhow::{Context as _, Result};
use polars::prelude::*;
use std::collections::HashMap;

/// Semantic column type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColumnKind {
    Numeric,
    /// Numeric once the unit suffix is stripped (`10mg`, `1.5 mg/mL`).
    UnitNumeric,
    Categorical,
    /// High-cardinality text: ids, labels, free text.
    Identifier,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::UnitNumeric => "Unit-Numeric",
            Self::Categorical => "Categorical",
            Self::Identifier => "Identifier",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the wizard needs to present and guard one column.
#[derive(Clone, PartialEq, Debug)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    /// Up to 10 head values, stringified, for the preview table.
    pub samples: Vec<String>,
    /// Majority unit, when the column is unit-bearing.
    pub unit: Option<String>,
    /// Fraction of interpretable values that parsed as numbers.
    pub numeric_rate: f64,
    pub distinct: usize,
    pub nulls: usize,
    pub count: usize,
}

impl ColumnProfile {
    /// Numeric enough to be a dependent variable.
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, ColumnKind::Numeric | ColumnKind::UnitNumeric)
    }
}

/// Profiles every column of `df`.
///
/// Pure function of the dataframe and thresholds, so re-profiling an
/// unchanged dataset yields identical profiles.
pub fn profile_columns(
    df: &DataFrame,
    thresholds: &DetectionThresholds,
) -> Result<Vec<ColumnProfile>> {
    df.get_columns()
        .iter()
        .map(|col| {
            profile_column(col, thresholds)
                .with_context(|| format!("Profiling failed for column '{}'", col.name()))
        })
        .collect()
}

fn profile_column(col: &Column, thresholds: &DetectionThresholds) -> Result<ColumnProfile> {
    let series = col.as_materialized_series();
    let name = series.name().to_string();
    let count = series.len();
    let nulls = series.null_count();
    let samples = head_samples(series);
    let distinct = series.n_unique().unwrap_or(0);

    let dtype = series.dtype();

    if dtype.is_primitive_numeric() {
        return Ok(ColumnProfile {
            name,
            kind: ColumnKind::Numeric,
            samples,
            unit: None,
            numeric_rate: 1.0,
            distinct,
            nulls,
            count,
        });
    }

    if dtype.is_bool() {
        return Ok(ColumnProfile {
            name,
            kind: ColumnKind::Categorical,
            samples,
            unit: None,
            numeric_rate: 0.0,
            distinct,
            nulls,
            count,
        });
    }

    // Everything else is profiled through its string form.
    let as_str = if matches!(dtype, DataType::String) {
        series.clone()
    } else {
        series
            .cast(&DataType::String)
            .map_err(|e| anyhow::anyhow!(e))?
    };
    let ca = as_str.str().map_err(|e| anyhow::anyhow!(e))?;

    let mut numeric = 0usize;
    let mut interpretable = 0usize;
    let mut unit_counts: HashMap<String, usize> = HashMap::new();

    for value in ca.into_iter().flatten() {
        match units::interpret_cell(value) {
            CellValue::Missing => {}
            CellValue::Number(_) => {
                interpretable += 1;
                numeric += 1;
                if let Some(uv) = units::extract(value) {
                    if let Some(unit) = uv.unit {
                        *unit_counts.entry(unit).or_insert(0) += 1;
                    }
                }
            }
            CellValue::Text => interpretable += 1,
        }
    }

    let numeric_rate = if interpretable == 0 {
        0.0
    } else {
        numeric as f64 / interpretable as f64
    };

    let kind = if interpretable > 0 && numeric_rate > thresholds.numeric_leaning {
        if unit_counts.is_empty() {
            ColumnKind::Numeric
        } else {
            ColumnKind::UnitNumeric
        }
    } else if distinct > 0
        && (distinct < thresholds.categorical_max_cardinality
            || count > 0 && (distinct as f64 / count as f64) < thresholds.categorical_ratio)
    {
        ColumnKind::Categorical
    } else {
        ColumnKind::Identifier
    };

    // Majority unit, ties broken alphabetically for determinism.
    let unit = if kind == ColumnKind::UnitNumeric {
        let mut entries: Vec<(String, usize)> = unit_counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.into_iter().next().map(|(u, _)| u)
    } else {
        None
    };

    Ok(ColumnProfile {
        name,
        kind,
        samples,
        unit,
        numeric_rate,
        distinct,
        nulls,
        count,
    })
}

fn head_samples(series: &Series) -> Vec<String> {
    let mut head = series.drop_nulls().head(Some(10));
    if head.is_empty() && !series.is_empty() {
        head = series.head(Some(10));
    }
    match head.cast(&DataType::String) {
        Ok(s) => s
            .str()
            .map(|ca| {
                ca.into_iter()
                    .flatten()
                    .map(|s| s.to_owned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
        Err(_) => head.iter().map(|v| v.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> DetectionThresholds {
        DetectionThresholds::default()
    }

    fn string_df(name: &str, values: Vec<&str>) -> DataFrame {
        let s = Series::new(name.into(), values);
        DataFrame::new(vec![Column::from(s)]).unwrap()
    }

    #[test]
    fn test_numeric_dtype_column() {
        let s = Series::new("conc".into(), vec![1.0, 2.0, 3.0]);
        let df = DataFrame::new(vec![Column::from(s)]).unwrap();
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        assert_eq!(profiles[0].kind, ColumnKind::Numeric);
        assert!((profiles[0].numeric_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unit_bearing_column() {
        let df = string_df("dose", vec!["10mg", "20mg", "30mg", "ND"]);
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        assert_eq!(profiles[0].kind, ColumnKind::UnitNumeric);
        assert_eq!(profiles[0].unit.as_deref(), Some("mg"));
        assert!(profiles[0].is_numeric());
    }

    #[test]
    fn test_categorical_column() {
        let df = string_df(
            "group",
            vec!["Control", "Treated", "Control", "Treated", "Control"],
        );
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        assert_eq!(profiles[0].kind, ColumnKind::Categorical);
        assert!(!profiles[0].is_numeric());
    }

    #[test]
    fn test_mostly_numeric_strings_lean_numeric() {
        let df = string_df("reading", vec!["1.5", "2.5", "oops", "4.0"]);
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        assert_eq!(profiles[0].kind, ColumnKind::Numeric);
        assert!(profiles[0].numeric_rate > 0.5);
    }

    #[test]
    fn test_profiles_are_idempotent() {
        let df = string_df("dose", vec!["10mg", "20mg", "Control", "ND", "5 mg"]);
        let first = profile_columns(&df, &thresholds()).unwrap();
        let second = profile_columns(&df, &thresholds()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_samples_capped_at_ten() {
        let values: Vec<String> = (0..50).map(|i| format!("v{i}")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let df = string_df("id", refs);
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        assert_eq!(profiles[0].samples.len(), 10);
    }
}
