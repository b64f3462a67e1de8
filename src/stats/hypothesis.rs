//! Hypothesis tests: Welch t-test, Mann-Whitney U and one-way ANOVA.
//!
//! Test selection follows the group structure: two groups get a t-test when
//! both samples look normal (sample-size and skewness heuristic, thresholds
//! in [`DetectionThresholds`]) and Mann-Whitney U otherwise; three or more
//! groups get a one-way ANOVA plus a supplementary one-vs-control pairwise
//! table. A group with fewer than two observations makes the affected test
//! "not applicable" rather than failing the run.

use crate::config::DetectionThresholds;
use crate::stats::{mean, sample_skewness, sample_variance};
use anyhow::{anyhow, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};

/// One row of the "Hypothesis Test" sheet.
#[derive(Clone, Debug)]
pub struct TestReport {
    /// e.g. `"Treated vs Control"` or `"One-way ANOVA (3 groups)"`.
    pub comparison: String,
    pub method: String,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub sample_sizes: Vec<usize>,
    /// Populated when the test could not run ("not applicable: ...").
    pub note: Option<String>,
}

impl TestReport {
    fn not_applicable(comparison: String, method: &str, sizes: Vec<usize>, reason: &str) -> Self {
        Self {
            comparison,
            method: method.to_owned(),
            statistic: None,
            p_value: None,
            sample_sizes: sizes,
            note: Some(format!("not applicable: {reason}")),
        }
    }
}

/// Keywords that mark a reference group, checked in order.
const CONTROL_KEYWORDS: &[&str] = &["control", "wt", "placebo", "0", "mock", "ctrl"];

/// Index of the reference group: the first keyword match, else 0 (callers
/// pass alphabetically ordered groups, making the fallback deterministic).
pub fn detect_control(names: &[String]) -> usize {
    for (i, name) in names.iter().enumerate() {
        if CONTROL_KEYWORDS.contains(&name.trim().to_lowercase().as_str()) {
            return i;
        }
    }
    0
}

/// Reorders `groups` so the detected control comes first.
pub fn control_first(groups: &mut Vec<(String, Vec<f64>)>) {
    let names: Vec<String> = groups.iter().map(|g| g.0.clone()).collect();
    let idx = detect_control(&names);
    if idx > 0 {
        let control = groups.remove(idx);
        groups.insert(0, control);
    }
}

/// Dispatches the appropriate tests for the given groups (control first).
///
/// Two groups: t-test or Mann-Whitney U. Three or more: one-way ANOVA
/// first, then each group against the control.
pub fn run_group_tests(
    groups: &[(String, Vec<f64>)],
    thresholds: &DetectionThresholds,
) -> Vec<TestReport> {
    let mut reports = Vec::new();

    if groups.len() < 2 {
        reports.push(TestReport::not_applicable(
            "Group comparison".to_owned(),
            "-",
            groups.iter().map(|g| g.1.len()).collect(),
            "needs at least two groups",
        ));
        return reports;
    }

    if groups.len() >= 3 {
        reports.push(anova_report(groups));
    }

    let (control_name, control_data) = &groups[0];
    for (name, data) in &groups[1..] {
        reports.push(pairwise_report(
            control_name,
            control_data,
            name,
            data,
            thresholds,
        ));
    }

    reports
}

fn anova_report(groups: &[(String, Vec<f64>)]) -> TestReport {
    let comparison = format!("One-way ANOVA ({} groups)", groups.len());
    let sizes: Vec<usize> = groups.iter().map(|g| g.1.len()).collect();

    let eligible: Vec<&Vec<f64>> = groups.iter().map(|g| &g.1).filter(|v| v.len() >= 2).collect();
    if eligible.len() < 2 {
        return TestReport::not_applicable(comparison, "ANOVA", sizes, "insufficient data");
    }

    let excluded = groups.len() - eligible.len();
    match one_way_anova(&eligible) {
        Ok((f, p)) => TestReport {
            comparison,
            method: "ANOVA".to_owned(),
            statistic: Some(f),
            p_value: Some(p),
            sample_sizes: sizes,
            note: if excluded > 0 {
                Some(format!("{excluded} group(s) under 2 observations excluded"))
            } else {
                None
            },
        },
        Err(e) => TestReport::not_applicable(comparison, "ANOVA", sizes, &e.to_string()),
    }
}

fn pairwise_report(
    control_name: &str,
    control: &[f64],
    test_name: &str,
    test: &[f64],
    thresholds: &DetectionThresholds,
) -> TestReport {
    let comparison = format!("{test_name} vs {control_name}");
    let sizes = vec![test.len(), control.len()];

    if control.len() < 2 || test.len() < 2 {
        return TestReport::not_applicable(comparison, "-", sizes, "insufficient data");
    }

    let is_normal = looks_normal(control, thresholds) && looks_normal(test, thresholds);
    if is_normal {
        match welch_t_test(test, control) {
            Ok((t, p)) => TestReport {
                comparison,
                method: "T-test".to_owned(),
                statistic: Some(t),
                p_value: Some(p),
                sample_sizes: sizes,
                note: None,
            },
            Err(e) => TestReport::not_applicable(comparison, "T-test", sizes, &e.to_string()),
        }
    } else {
        match mann_whitney_u(test, control) {
            Ok((u, p)) => TestReport {
                comparison,
                method: "Mann-Whitney".to_owned(),
                statistic: Some(u),
                p_value: Some(p),
                sample_sizes: sizes,
                note: None,
            },
            Err(e) => {
                TestReport::not_applicable(comparison, "Mann-Whitney", sizes, &e.to_string())
            }
        }
    }
}

/// Cheap normality screen: enough observations and roughly symmetric.
pub fn looks_normal(values: &[f64], thresholds: &DetectionThresholds) -> bool {
    if values.len() < thresholds.normality_min_n {
        return false;
    }
    match sample_skewness(values) {
        Some(skew) => skew.abs() < thresholds.normality_max_skew,
        None => false,
    }
}

/// Two-sided p-value for a t statistic with `df` degrees of freedom.
pub fn two_sided_t_pvalue(t: f64, df: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| anyhow!("t distribution: {e}"))?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Welch's unequal-variance t-test. Returns `(t, p)`.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    if a.len() < 2 || b.len() < 2 {
        return Err(anyhow!("insufficient data"));
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, m2) = (mean(a), mean(b));
    let (v1, v2) = (sample_variance(a), sample_variance(b));

    let se2 = v1 / n1 + v2 / n2;
    if se2 <= f64::EPSILON {
        // No spread at all: identical constants are a perfect null result.
        return if (m1 - m2).abs() <= f64::EPSILON {
            Ok((0.0, 1.0))
        } else {
            Ok((f64::INFINITY * (m1 - m2).signum(), 0.0))
        };
    }

    let t = (m1 - m2) / se2.sqrt();
    let df_num = se2 * se2;
    let df_den = (v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0);
    let df = if df_den <= f64::EPSILON {
        n1 + n2 - 2.0
    } else {
        df_num / df_den
    };

    let p = two_sided_t_pvalue(t, df)?;
    Ok((t, p))
}

/// Mann-Whitney U with normal approximation, tie correction and continuity
/// correction. Returns `(U, p)`.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    if a.is_empty() || b.is_empty() {
        return Err(anyhow!("insufficient data"));
    }
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let n = n1 + n2;

    // Rank the pooled sample, averaging ties.
    let mut pooled: Vec<(f64, bool)> = a
        .iter()
        .map(|&v| (v, true))
        .chain(b.iter().map(|&v| (v, false)))
        .collect();
    pooled.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut rank_sum_a = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < pooled.len() {
        let mut j = i;
        while j + 1 < pooled.len() && (pooled[j + 1].0 - pooled[i].0).abs() <= f64::EPSILON {
            j += 1;
        }
        // Ranks are 1-based; a run [i, j] shares the average rank.
        let avg_rank = (i + j + 2) as f64 / 2.0;
        let ties = (j - i + 1) as f64;
        if ties > 1.0 {
            tie_term += ties.powi(3) - ties;
        }
        for item in &pooled[i..=j] {
            if item.1 {
                rank_sum_a += avg_rank;
            }
        }
        i = j + 1;
    }

    let u1 = rank_sum_a - n1 * (n1 + 1.0) / 2.0;
    let u2 = n1 * n2 - u1;
    let u = u1.min(u2);

    let mean_u = n1 * n2 / 2.0;
    let var_u = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if var_u <= f64::EPSILON {
        // All observations identical.
        return Ok((u, 1.0));
    }

    let z = (u - mean_u + 0.5) / var_u.sqrt();
    let normal = Normal::new(0.0, 1.0).map_err(|e| anyhow!("normal distribution: {e}"))?;
    let p = (2.0 * normal.cdf(z)).clamp(0.0, 1.0);
    Ok((u, p))
}

/// One-way ANOVA over two or more groups. Returns `(F, p)`.
pub fn one_way_anova(groups: &[&Vec<f64>]) -> Result<(f64, f64)> {
    if groups.len() < 2 {
        return Err(anyhow!("needs at least two groups"));
    }
    if groups.iter().any(|g| g.len() < 2) {
        return Err(anyhow!("insufficient data"));
    }

    let k = groups.len() as f64;
    let total_n: usize = groups.iter().map(|g| g.len()).sum();
    let n = total_n as f64;

    let grand_sum: f64 = groups.iter().flat_map(|g| g.iter()).sum();
    let grand_mean = grand_sum / n;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for g in groups {
        let gm = mean(g);
        ss_between += g.len() as f64 * (gm - grand_mean).powi(2);
        ss_within += g.iter().map(|v| (v - gm).powi(2)).sum::<f64>();
    }

    let df1 = k - 1.0;
    let df2 = n - k;
    if ss_within <= f64::EPSILON {
        // Perfect separation with zero within-group spread.
        return if ss_between <= f64::EPSILON {
            Ok((0.0, 1.0))
        } else {
            Ok((f64::INFINITY, 0.0))
        };
    }

    let f = (ss_between / df1) / (ss_within / df2);
    let dist = FisherSnedecor::new(df1, df2).map_err(|e| anyhow!("F distribution: {e}"))?;
    let p = (1.0 - dist.cdf(f)).clamp(0.0, 1.0);
    Ok((f, p))
}

/// Figure-annotation formatting: bands below 0.05, 4 decimals otherwise.
pub fn format_p(p: f64) -> String {
    if p < 0.001 {
        "p < 0.001".to_owned()
    } else if p < 0.05 {
        "p < 0.05".to_owned()
    } else {
        format!("p = {p:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> DetectionThresholds {
        DetectionThresholds::default()
    }

    #[test]
    fn test_welch_separated_means_significant() {
        let a = [1.0, 1.1, 0.9, 1.05, 0.95, 1.0, 1.02, 0.98];
        let b = [5.0, 5.1, 4.9, 5.05, 4.95, 5.0, 5.02, 4.98];
        let (t, p) = welch_t_test(&a, &b).unwrap();
        assert!(t.abs() > 2.0);
        assert!(p < 0.05, "p = {p}");
    }

    #[test]
    fn test_welch_identical_groups_not_significant() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let (_, p) = welch_t_test(&a, &a).unwrap();
        assert!(p > 0.9, "p = {p}");
    }

    #[test]
    fn test_mann_whitney_separated() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let b = [101.0, 102.0, 103.0, 104.0, 105.0, 106.0, 107.0, 108.0];
        let (_, p) = mann_whitney_u(&a, &b).unwrap();
        assert!(p < 0.05, "p = {p}");
    }

    #[test]
    fn test_mann_whitney_handles_ties() {
        let a = [1.0, 1.0, 2.0, 2.0, 3.0];
        let b = [1.0, 2.0, 2.0, 3.0, 3.0];
        let (_, p) = mann_whitney_u(&a, &b).unwrap();
        assert!(p > 0.05);
    }

    #[test]
    fn test_anova_detects_shifted_group() {
        let a = vec![1.0, 1.2, 0.8, 1.1, 0.9];
        let b = vec![1.05, 1.15, 0.85, 1.0, 0.95];
        let c = vec![9.0, 9.2, 8.8, 9.1, 8.9];
        let (f, p) = one_way_anova(&[&a, &b, &c]).unwrap();
        assert!(f > 10.0);
        assert!(p < 0.05, "p = {p}");
    }

    #[test]
    fn test_anova_null_case() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![1.5, 2.5, 3.5, 0.5];
        let c = vec![2.0, 1.0, 4.0, 3.0];
        let (_, p) = one_way_anova(&[&a, &b, &c]).unwrap();
        assert!(p > 0.05, "p = {p}");
    }

    #[test]
    fn test_control_detection() {
        let names = vec![
            "Treated".to_owned(),
            "control".to_owned(),
            "High dose".to_owned(),
        ];
        assert_eq!(detect_control(&names), 1);

        let names = vec!["Alpha".to_owned(), "Beta".to_owned()];
        assert_eq!(detect_control(&names), 0);
    }

    #[test]
    fn test_insufficient_data_is_not_applicable() {
        let groups = vec![
            ("Control".to_owned(), vec![1.0]),
            ("Treated".to_owned(), vec![2.0, 3.0]),
        ];
        let reports = run_group_tests(&groups, &thresholds());
        assert_eq!(reports.len(), 1);
        assert!(reports[0]
            .note
            .as_deref()
            .unwrap()
            .contains("insufficient data"));
        assert!(reports[0].p_value.is_none());
    }

    #[test]
    fn test_three_groups_get_anova_and_pairwise() {
        let groups = vec![
            ("Control".to_owned(), vec![1.0, 1.1, 0.9, 1.0, 1.05]),
            ("Low".to_owned(), vec![2.0, 2.1, 1.9, 2.0, 2.05]),
            ("High".to_owned(), vec![9.0, 9.1, 8.9, 9.0, 9.05]),
        ];
        let reports = run_group_tests(&groups, &thresholds());
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].method, "ANOVA");
        assert!(reports[0].p_value.unwrap() < 0.05);
        assert!(reports[1].comparison.contains("vs Control"));
    }

    #[test]
    fn test_small_samples_use_mann_whitney() {
        // Under the normality sample floor, the heuristic must refuse the
        // t-test.
        let groups = vec![
            ("Control".to_owned(), vec![1.0, 1.2, 0.8]),
            ("Treated".to_owned(), vec![5.0, 5.2, 4.8]),
        ];
        let reports = run_group_tests(&groups, &thresholds());
        assert_eq!(reports[0].method, "Mann-Whitney");
    }

    #[test]
    fn test_format_p_bands() {
        assert_eq!(format_p(0.0001), "p < 0.001");
        assert_eq!(format_p(0.01), "p < 0.05");
        assert_eq!(format_p(0.1234), "p = 0.1234");
    }
}
