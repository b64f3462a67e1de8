//! Wide/long shape detection and the melt engine.
//!
//! Spreadsheet exports from the bench are usually wide: one row per subject
//! and one column per replicate or timepoint. Tidy analysis wants long form
//! with explicit `variable`/`value` columns. The detector decides which one
//! a table is; the melt engine reshapes wide to long.

use crate::config::DetectionThresholds;
use crate::wrangle::infer::ColumnProfile;
use anyhow::{bail, Context as _, Result};
use log::{info, warn};
use polars::prelude::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TableShape {
    Wide,
    Long,
}

/// Outcome of shape detection: the classification plus the column split
/// that a melt would use.
#[derive(Clone, Debug)]
pub struct ShapeReport {
    pub shape: TableShape,
    /// Numeric-leaning measurement columns.
    pub measure_cols: Vec<String>,
    /// Everything else; preserved through a melt.
    pub id_cols: Vec<String>,
    /// True when the split leaned wide but not decisively; such tables
    /// stay long and get a warning.
    pub ambiguous: bool,
}

/// Classifies `df` as wide or long.
///
/// Wide means the numeric-leaning columns outnumber the rest by
/// `thresholds.wide_ratio` and there is no explicit `group` column (a
/// `group` column is a strong signal the data is already tidy). Anything
/// borderline defaults to long.
pub fn detect_shape(
    df: &DataFrame,
    profiles: &[ColumnProfile],
    thresholds: &DetectionThresholds,
) -> ShapeReport {
    let measure_cols: Vec<String> = profiles
        .iter()
        .filter(|p| p.is_numeric())
        .map(|p| p.name.clone())
        .collect();
    let id_cols: Vec<String> = profiles
        .iter()
        .filter(|p| !p.is_numeric())
        .map(|p| p.name.clone())
        .collect();

    let has_group = df
        .get_column_names()
        .iter()
        .any(|n| n.as_str() == "group");

    let is_wide =
        measure_cols.len() as f64 > thresholds.wide_ratio * id_cols.len() as f64 && !has_group;

    let leaning_wide = measure_cols.len() > id_cols.len() && !has_group;
    let ambiguous = !is_wide && leaning_wide;
    if ambiguous {
        warn!(
            "Table shape is ambiguous ({} numeric vs {} other columns); defaulting to long",
            measure_cols.len(),
            id_cols.len()
        );
    }

    ShapeReport {
        shape: if is_wide {
            TableShape::Wide
        } else {
            TableShape::Long
        },
        measure_cols,
        id_cols,
        ambiguous,
    }
}

/// Melts the measurement columns of `df` into `(variable, value)` pairs,
/// preserving identifier columns by block repetition.
///
/// A table with N measurement columns and M rows yields N*M rows. An
/// all-numeric table (a bare matrix) synthesises an `index` id column.
pub fn melt(df: &DataFrame, report: &ShapeReport) -> Result<DataFrame> {
    if report.measure_cols.is_empty() {
        bail!("Cannot melt: no measurement columns detected");
    }

    let height = df.height();

    // A bare matrix has no ids to carry; invent a row index.
    let synthetic_index = report.id_cols.is_empty();
    let index_series = Series::new("index".into(), (0..height as i64).collect::<Vec<i64>>());

    let mut out: Option<DataFrame> = None;
    for measure in &report.measure_cols {
        let mut columns: Vec<Column> = Vec::with_capacity(report.id_cols.len() + 2);

        if synthetic_index {
            columns.push(Column::from(index_series.clone()));
        } else {
            for id in &report.id_cols {
                let col = df
                    .column(id)
                    .with_context(|| format!("Missing id column '{id}'"))?;
                columns.push(col.clone());
            }
        }

        let variable = Series::new("variable".into(), vec![measure.as_str(); height]);
        columns.push(Column::from(variable));

        let mut value = df
            .column(measure)
            .with_context(|| format!("Missing measurement column '{measure}'"))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .with_context(|| format!("Measurement column '{measure}' is not numeric"))?;
        value.rename("value".into());
        columns.push(Column::from(value));

        let part = DataFrame::new(columns).context("Failed to assemble melt block")?;
        out = Some(match out {
            None => part,
            Some(acc) => acc.vstack(&part).context("Failed to stack melt blocks")?,
        });
    }

    let Some(melted) = out else {
        bail!("Cannot melt: no measurement columns detected");
    };
    info!(
        "Data melted: {} measurement columns x {} rows -> {} rows",
        report.measure_cols.len(),
        height,
        melted.height()
    );
    Ok(melted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrangle::infer::profile_columns;

    fn thresholds() -> DetectionThresholds {
        DetectionThresholds::default()
    }

    fn wide_df() -> DataFrame {
        let sample = Series::new("sample".into(), vec!["a", "b", "c", "d"]);
        let rep1 = Series::new("rep1".into(), vec![1.0, 2.0, 3.0, 4.0]);
        let rep2 = Series::new("rep2".into(), vec![5.0, 6.0, 7.0, 8.0]);
        let rep3 = Series::new("rep3".into(), vec![9.0, 10.0, 11.0, 12.0]);
        DataFrame::new(vec![
            Column::from(sample),
            Column::from(rep1),
            Column::from(rep2),
            Column::from(rep3),
        ])
        .unwrap()
    }

    #[test]
    fn test_detects_wide() {
        let df = wide_df();
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        let report = detect_shape(&df, &profiles, &thresholds());
        assert_eq!(report.shape, TableShape::Wide);
        assert_eq!(report.measure_cols.len(), 3);
        assert_eq!(report.id_cols, vec!["sample".to_owned()]);
    }

    #[test]
    fn test_group_column_forces_long() {
        let group = Series::new("group".into(), vec!["x", "y", "x", "y"]);
        let a = Series::new("a".into(), vec![1.0, 2.0, 3.0, 4.0]);
        let b = Series::new("b".into(), vec![1.0, 2.0, 3.0, 4.0]);
        let c = Series::new("c".into(), vec![1.0, 2.0, 3.0, 4.0]);
        let df = DataFrame::new(vec![
            Column::from(group),
            Column::from(a),
            Column::from(b),
            Column::from(c),
        ])
        .unwrap();
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        let report = detect_shape(&df, &profiles, &thresholds());
        assert_eq!(report.shape, TableShape::Long);
    }

    #[test]
    fn test_ambiguous_defaults_to_long() {
        // 2 numeric vs 1 other: leaning wide, but under the 2x ratio.
        let id = Series::new("id".into(), vec!["a", "b"]);
        let x = Series::new("x".into(), vec![1.0, 2.0]);
        let y = Series::new("y".into(), vec![3.0, 4.0]);
        let df =
            DataFrame::new(vec![Column::from(id), Column::from(x), Column::from(y)]).unwrap();
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        let report = detect_shape(&df, &profiles, &thresholds());
        assert_eq!(report.shape, TableShape::Long);
        assert!(report.ambiguous);
    }

    #[test]
    fn test_melt_yields_n_by_m_rows() {
        let df = wide_df();
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        let report = detect_shape(&df, &profiles, &thresholds());
        let melted = melt(&df, &report).unwrap();

        // 3 measurement columns x 4 rows
        assert_eq!(melted.height(), 12);
        assert_eq!(melted.width(), 3); // sample, variable, value

        // Id values preserved blockwise: the first block repeats the
        // original sample column.
        let samples = melted.column("sample").unwrap().as_materialized_series();
        let ca = samples.str().unwrap();
        let first_block: Vec<&str> = ca.into_iter().take(4).flatten().collect();
        assert_eq!(first_block, vec!["a", "b", "c", "d"]);

        let vars = melted.column("variable").unwrap().as_materialized_series();
        let ca = vars.str().unwrap();
        assert_eq!(ca.get(0), Some("rep1"));
        assert_eq!(ca.get(4), Some("rep2"));
        assert_eq!(ca.get(8), Some("rep3"));
    }

    #[test]
    fn test_melt_all_numeric_synthesises_index() {
        let a = Series::new("a".into(), vec![1.0, 2.0]);
        let b = Series::new("b".into(), vec![3.0, 4.0]);
        let df = DataFrame::new(vec![Column::from(a), Column::from(b)]).unwrap();
        let profiles = profile_columns(&df, &thresholds()).unwrap();
        let report = detect_shape(&df, &profiles, &thresholds());
        assert_eq!(report.shape, TableShape::Wide);

        let melted = melt(&df, &report).unwrap();
        assert_eq!(melted.height(), 4);
        assert!(melted.column("index").is_ok());
    }

    #[test]
    fn test_melt_without_measurements_fails() {
        let id = Series::new("id".into(), vec!["a", "b"]);
        let df = DataFrame::new(vec![Column::from(id)]).unwrap();
        let report = ShapeReport {
            shape: TableShape::Long,
            measure_cols: vec![],
            id_cols: vec!["id".to_owned()],
            ambiguous: false,
        };
        assert!(melt(&df, &report).is_err());
    }
}
