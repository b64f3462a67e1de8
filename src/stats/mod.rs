//! Descriptive statistics and hypothesis-test dispatch.
//!
//! Test statistics are computed here; p-values come from `statrs`
//! distributions. Everything degrades gracefully: a group that cannot
//! support a test yields a "not applicable" report, never an abort.

pub mod hypothesis;

pub use hypothesis::{run_group_tests, TestReport};

use anyhow::{Context as _, Result};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Eight-number summary for one set of observations.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptive {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl Descriptive {
    /// Returns `None` for an empty sample.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Some(Self {
            count: values.len(),
            mean: mean(values),
            std: sample_std(values),
            min: sorted[0],
            q1: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            q3: quantile_sorted(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// A labelled [`Descriptive`] row for the report.
#[derive(Clone, Debug)]
pub struct GroupDescriptive {
    pub label: String,
    pub stats: Descriptive,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n-1 denominator). Zero for samples under two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Linear-interpolated quantile over a pre-sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Moment-based sample skewness (g1). `None` when undefined (n < 3 or no
/// spread).
pub fn sample_skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if m2 <= f64::EPSILON {
        return None;
    }
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n as f64;
    Some(m3 / m2.powf(1.5))
}

/// Splits `value_col` into per-group observation vectors keyed by the
/// stringified `group_col`, dropping missing values. Groups come back in
/// alphabetical order for determinism.
pub fn group_values(
    df: &DataFrame,
    group_col: &str,
    value_col: &str,
) -> Result<Vec<(String, Vec<f64>)>> {
    let groups = df
        .column(group_col)
        .with_context(|| format!("Missing group column '{group_col}'"))?
        .as_materialized_series()
        .cast(&DataType::String)
        .context("Group labels could not be stringified")?;
    let group_ca = groups.str().map_err(|e| anyhow::anyhow!(e))?;

    let values = df
        .column(value_col)
        .with_context(|| format!("Missing value column '{value_col}'"))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .with_context(|| format!("Value column '{value_col}' is not numeric"))?;
    let value_ca = values.f64().map_err(|e| anyhow::anyhow!(e))?;

    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (label, value) in group_ca.into_iter().zip(value_ca.into_iter()) {
        let (Some(label), Some(value)) = (label, value) else {
            continue;
        };
        if value.is_finite() {
            grouped.entry(label.to_owned()).or_default().push(value);
        }
    }

    Ok(grouped.into_iter().collect())
}

/// Pearson correlation with a two-sided p-value from the t distribution.
#[derive(Clone, Debug)]
pub struct Correlation {
    pub r: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub n: usize,
}

pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<Correlation> {
    let n = x.len().min(y.len());
    if n < 3 {
        return None;
    }
    let (mx, my) = (mean(&x[..n]), mean(&y[..n]));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);

    let df = (n - 2) as f64;
    let p_value = if (1.0 - r * r) <= f64::EPSILON {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        hypothesis::two_sided_t_pvalue(t, df).unwrap_or(f64::NAN)
    };

    Some(Correlation {
        r,
        r_squared: r * r,
        p_value,
        n,
    })
}

/// Least-squares fit `y = slope * x + intercept`.
#[derive(Clone, Copy, Debug)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Residual standard error.
    pub se: f64,
    pub x_mean: f64,
    pub sxx: f64,
    pub n: usize,
}

pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len().min(y.len());
    if n < 3 {
        return None;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for i in 0..n {
        sxy += (x[i] - mx) * (y[i] - my);
        sxx += (x[i] - mx).powi(2);
    }
    if sxx <= f64::EPSILON {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = my - slope * mx;

    let ss_res: f64 = (0..n)
        .map(|i| {
            let pred = slope * x[i] + intercept;
            (y[i] - pred).powi(2)
        })
        .sum();
    let se = (ss_res / (n - 2) as f64).sqrt();

    Some(LinearFit {
        slope,
        intercept,
        se,
        x_mean: mx,
        sxx,
        n,
    })
}
