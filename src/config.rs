//! Run configuration: graph selection, variable mapping and detection
//! thresholds.
//!
//! A [`PlotConfig`] is produced either by the interactive wizard or by the
//! `.bd` loader and is treated as immutable once the pipeline starts. Its
//! serialized form is embedded in the audit log so a run can be reproduced
//! from the log alone.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported graph families.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum GraphKind {
    Box,
    Scatter,
    Volcano,
    Heatmap,
}

impl GraphKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Box => "Box",
            Self::Scatter => "Scatter",
            Self::Volcano => "Volcano",
            Self::Heatmap => "Heatmap",
        }
    }

    /// Parses the user-facing graph keyword. Accepts the aliases the `.bd`
    /// format has historically allowed.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "box" | "boxplot" => Some(Self::Box),
            "scatter" | "correlation" => Some(Self::Scatter),
            "volcano" => Some(Self::Volcano),
            "heatmap" => Some(Self::Heatmap),
            _ => None,
        }
    }

    /// Valid keywords, for error messages.
    pub fn valid_keywords() -> &'static [&'static str] {
        &["box", "boxplot", "scatter", "correlation", "volcano", "heatmap"]
    }

    /// Scatter and heatmap need the original wide layout; everything else
    /// gets melted into long form.
    pub fn wants_wide_data(&self) -> bool {
        matches!(self, Self::Scatter | Self::Heatmap)
    }
}

impl std::fmt::Display for GraphKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mathematical model applied to the dependent variable before analysis.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TransformKind {
    #[default]
    Linear,
    Log2,
    Log10,
    Ln,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Log2 => "log2",
            Self::Log10 => "log10",
            Self::Ln => "ln",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "linear" => Some(Self::Linear),
            "log2" => Some(Self::Log2),
            "log10" => Some(Self::Log10),
            "ln" => Some(Self::Ln),
            _ => None,
        }
    }

    /// Applies the transform to a single value. Non-positive inputs have no
    /// logarithm and become `None` (treated as missing downstream).
    pub fn apply(&self, value: f64) -> Option<f64> {
        match self {
            Self::Linear => Some(value),
            _ if value <= 0.0 => None,
            Self::Log2 => Some(value.log2()),
            Self::Log10 => Some(value.log10()),
            Self::Ln => Some(value.ln()),
        }
    }
}

/// Heatmap flavour: sample-sample similarity or raw expression values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum HeatmapMode {
    #[default]
    Correlation,
    Expression,
}

/// Axis along which expression heatmaps are z-scored.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ZScoreAxis {
    Rows,
    Columns,
}

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct HeatmapOptions {
    pub mode: HeatmapMode,
    /// `None` plots raw values.
    pub z_score: Option<ZScoreAxis>,
    /// Columns selected in the wizard; empty means every numeric column.
    pub columns: Vec<String>,
}

/// All shape/type heuristic constants in one place.
///
/// Detection is inherently fuzzy, so none of these are correctness
/// boundaries - they tune when the pipeline melts, coerces or merely warns.
/// Every field can be overridden from a `.bd` file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Fraction of non-null values that must parse as numbers (directly or
    /// via unit extraction) for a column to count as numeric-leaning.
    pub numeric_leaning: f64,
    /// A table is wide when numeric columns outnumber the rest by this
    /// multiplier.
    pub wide_ratio: f64,
    /// Distinct-value ceiling for categorical classification.
    pub categorical_max_cardinality: usize,
    /// Distinct/row ratio below which a column is categorical regardless of
    /// absolute cardinality.
    pub categorical_ratio: f64,
    /// Minimum per-group observations before the normality heuristic will
    /// endorse a t-test.
    pub normality_min_n: usize,
    /// Absolute sample skewness above which a group is treated as
    /// non-normal.
    pub normality_max_skew: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            numeric_leaning: 0.5,
            wide_ratio: 2.0,
            categorical_max_cardinality: 100,
            categorical_ratio: 0.05,
            normality_min_n: 8,
            normality_max_skew: 1.0,
        }
    }
}

/// Complete description of one analysis run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlotConfig {
    pub graph: GraphKind,
    /// Column mapped to the x axis (group / fold-change).
    pub independent: Option<String>,
    /// Column mapped to the y axis (measurement / p-value).
    pub dependent: Option<String>,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub transform: TransformKind,
    pub title: Option<String>,
    pub legend: bool,
    pub legend_name: Option<String>,
    /// Parent directory for the output bundle ("Output data" in `.bd`).
    pub output_base: Option<PathBuf>,
    pub heatmap: Option<HeatmapOptions>,
    /// Pass-through `UNSAFE:` flags; relax downstream validation.
    pub unsafe_flags: Vec<String>,
    pub thresholds: DetectionThresholds,
}

impl PlotConfig {
    pub fn new(graph: GraphKind) -> Self {
        Self {
            graph,
            independent: None,
            dependent: None,
            xlabel: None,
            ylabel: None,
            transform: TransformKind::default(),
            title: None,
            legend: false,
            legend_name: None,
            output_base: None,
            heatmap: None,
            unsafe_flags: Vec::new(),
            thresholds: DetectionThresholds::default(),
        }
    }

    /// Display label for the x axis, falling back to the mapped column.
    pub fn xlabel_or(&self, fallback: &str) -> String {
        self.xlabel
            .clone()
            .or_else(|| self.independent.clone())
            .unwrap_or_else(|| fallback.to_owned())
    }

    /// Display label for the y axis, falling back to the mapped column.
    pub fn ylabel_or(&self, fallback: &str) -> String {
        self.ylabel
            .clone()
            .or_else(|| self.dependent.clone())
            .unwrap_or_else(|| fallback.to_owned())
    }

    /// Appends the transform suffix to the y label, so a log-transformed
    /// axis is never presented as raw data.
    pub fn annotate_transform_label(&mut self) {
        if self.transform == TransformKind::Linear {
            return;
        }
        if let Some(ylabel) = &self.ylabel {
            self.ylabel = Some(format!("{ylabel} ({})", self.transform.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_kind_aliases() {
        assert_eq!(GraphKind::parse("Box"), Some(GraphKind::Box));
        assert_eq!(GraphKind::parse("boxplot"), Some(GraphKind::Box));
        assert_eq!(GraphKind::parse("correlation"), Some(GraphKind::Scatter));
        assert_eq!(GraphKind::parse("HEATMAP"), Some(GraphKind::Heatmap));
        assert_eq!(GraphKind::parse("pie"), None);
    }

    #[test]
    fn test_transform_non_positive_is_missing() {
        assert_eq!(TransformKind::Log2.apply(8.0), Some(3.0));
        assert_eq!(TransformKind::Log2.apply(0.0), None);
        assert_eq!(TransformKind::Log10.apply(-4.0), None);
        assert_eq!(TransformKind::Linear.apply(-4.0), Some(-4.0));
    }

    #[test]
    fn test_transform_label_annotation() {
        let mut config = PlotConfig::new(GraphKind::Box);
        config.ylabel = Some("Concentration".to_owned());
        config.transform = TransformKind::Log2;
        config.annotate_transform_label();
        assert_eq!(config.ylabel.as_deref(), Some("Concentration (log2)"));

        let mut linear = PlotConfig::new(GraphKind::Box);
        linear.ylabel = Some("Concentration".to_owned());
        linear.annotate_transform_label();
        assert_eq!(linear.ylabel.as_deref(), Some("Concentration"));
    }
}
