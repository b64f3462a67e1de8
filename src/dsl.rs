//! Loader for the `.bd` configuration format.
//!
//! `.bd` files are line-oriented `Key: Value` pairs written by hand, often
//! by people who make formatting mistakes. The parser is deliberately
//! forgiving: `:` and `=` both delimit, keys are case- and
//! whitespace-insensitive, unparseable lines are warned about and skipped.
//!
//! ```text
//! # assay.bd
//! Graph: Box
//! Independent Variable: {Treatment}
//! Dependent Variable: {Concentration}
//! YLabel: IL-6 (pg/mL)
//! Output data: results/experiment-12
//! UNSAFE: ALLOW_SMALL_SAMPLE
//! ```
//!
//! A `{Column}` value marks an explicit variable mapping; a bare value is
//! used verbatim. `UNSAFE:` lines collect pass-through flags that relax
//! downstream validation.

use crate::config::{GraphKind, PlotConfig, TransformKind};
use crate::error::BiodataError;
use anyhow::{Context as _, Result};
use log::warn;
use std::path::{Path, PathBuf};

/// Parses a `.bd` file into a [`PlotConfig`].
///
/// Errors are [`BiodataError::Config`] so the CLI can decide whether the
/// failure is fatal (`--config` was explicit) or a wizard fallback.
pub fn load(path: &Path) -> Result<PlotConfig> {
    if !path.exists() {
        return Err(BiodataError::InvalidPath(format!(
            "Config file not found: {}",
            path.display()
        ))
        .into());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse(&text)
}

/// Parses `.bd` text. See the module docs for the accepted grammar.
pub fn parse(text: &str) -> Result<PlotConfig> {
    let mut builder = ConfigBuilder::default();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.to_uppercase().starts_with("UNSAFE:") {
            let flag = line[7..].trim().to_owned();
            warn!("UNSAFE FLAG DETECTED: {flag}");
            builder.unsafe_flags.push(flag);
            continue;
        }

        // Split on the first ':' or '='.
        let delim = line.find([':', '=']);
        let Some(idx) = delim else {
            warn!("Skipping unparseable line: {line}");
            continue;
        };
        let key = normalize_key(&line[..idx]);
        let value = line[idx + 1..].trim();
        builder.set(&key, value)?;
    }

    builder.build()
}

/// Finds a lone `.bd` file in `dir`, if any.
///
/// Used by the CLI as a convenience: a single `.bd` next to the data is
/// picked up without `--config`. More than one is ambiguous and ignored.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("bd"))
        .collect();
    found.sort();
    if found.len() == 1 {
        found.pop()
    } else {
        if found.len() > 1 {
            warn!("Multiple .bd files found; ignoring all. Use --config to pick one.");
        }
        None
    }
}

/// Normalizes keys: trim, lowercase, internal whitespace to underscores.
/// `" Independent Variable "` becomes `"independent_variable"`.
fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Strips the `{Column}` mapping braces, returning the inner name and
/// whether braces were present.
fn unwrap_mapping(value: &str) -> (String, bool) {
    let v = value.trim();
    if v.starts_with('{') && v.ends_with('}') && v.len() >= 2 {
        (v[1..v.len() - 1].trim().to_owned(), true)
    } else {
        (v.to_owned(), false)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "y" | "yes" | "true" | "1")
}

#[derive(Default)]
struct ConfigBuilder {
    graph: Option<GraphKind>,
    independent: Option<String>,
    dependent: Option<String>,
    xlabel: Option<String>,
    ylabel: Option<String>,
    transform: Option<TransformKind>,
    title: Option<String>,
    legend: bool,
    legend_name: Option<String>,
    output_base: Option<PathBuf>,
    unsafe_flags: Vec<String>,
    threshold_overrides: Vec<(String, f64)>,
}

impl ConfigBuilder {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "graph" => {
                let kind = GraphKind::parse(value).ok_or_else(|| {
                    BiodataError::Config(format!(
                        "Unknown graph type: '{value}'. Valid options: {:?}",
                        GraphKind::valid_keywords()
                    ))
                })?;
                self.graph = Some(kind);
            }
            "independent_variable" => {
                let (name, _) = unwrap_mapping(value);
                self.independent = Some(name);
            }
            "dependent_variable" => {
                let (name, _) = unwrap_mapping(value);
                self.dependent = Some(name);
            }
            "xlabel" | "x_label" => self.xlabel = Some(value.to_owned()),
            "ylabel" | "y_label" => self.ylabel = Some(value.to_owned()),
            "model" | "transform" => {
                let kind = TransformKind::parse(value).ok_or_else(|| {
                    BiodataError::Config(format!(
                        "Unknown model: '{value}'. Valid options: linear, log2, log10, ln"
                    ))
                })?;
                self.transform = Some(kind);
            }
            "title" => self.title = Some(value.to_owned()),
            "legend" => self.legend = parse_bool(value),
            "legend_name" => self.legend_name = Some(value.to_owned()),
            "output_data" | "output" => {
                // Hand-written paths often arrive quoted.
                let cleaned = value.trim().trim_matches('"').trim_matches('\'');
                self.output_base = Some(PathBuf::from(cleaned));
            }
            "numeric_leaning" | "wide_ratio" | "categorical_ratio" | "normality_max_skew"
            | "categorical_max_cardinality" | "normality_min_n" => {
                match value.trim().parse::<f64>() {
                    Ok(v) => self.threshold_overrides.push((key.to_owned(), v)),
                    Err(_) => warn!("Ignoring non-numeric threshold '{key}: {value}'"),
                }
            }
            other => {
                warn!("Unknown config key '{other}' - skipped");
            }
        }
        Ok(())
    }

    fn build(self) -> Result<PlotConfig> {
        let graph = match self.graph {
            Some(g) => g,
            None => {
                warn!("No graph type specified. Defaulting to Box.");
                GraphKind::Box
            }
        };

        let mut config = PlotConfig::new(graph);
        config.independent = self.independent;
        config.dependent = self.dependent;
        config.xlabel = self.xlabel;
        config.ylabel = self.ylabel;
        config.transform = self.transform.unwrap_or_default();
        config.title = self.title;
        config.legend = self.legend;
        config.legend_name = self.legend_name;
        config.output_base = self.output_base;
        config.unsafe_flags = self.unsafe_flags;

        for (key, value) in self.threshold_overrides {
            let t = &mut config.thresholds;
            match key.as_str() {
                "numeric_leaning" => t.numeric_leaning = value,
                "wide_ratio" => t.wide_ratio = value,
                "categorical_ratio" => t.categorical_ratio = value,
                "normality_max_skew" => t.normality_max_skew = value,
                "categorical_max_cardinality" => {
                    t.categorical_max_cardinality = value.max(0.0) as usize;
                }
                "normality_min_n" => t.normality_min_n = value.max(0.0) as usize,
                _ => {}
            }
        }

        config.annotate_transform_label();
        Ok(config)
    }
}
