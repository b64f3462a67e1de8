//! # Biodata - Bench Data Analysis and Figure Pipeline
//!
//! Biodata is a one-shot batch tool for bench scientists: it ingests tabular
//! experiment data (CSV or XLSX, wide or long, possibly unit-annotated),
//! normalises it into canonical long form, runs significance tests and emits
//! publication-style figures plus a multi-sheet spreadsheet report and an
//! audit log for reproducibility.
//!
//! ## Quick Start
//!
//! ```no_run
//! use biodata::config::{GraphKind, PlotConfig};
//! use biodata::{pipeline, wrangle};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let df = wrangle::io::load_table(Path::new("assay.csv"))?;
//! let mut config = PlotConfig::new(GraphKind::Box);
//! config.dependent = Some("Concentration".to_owned());
//! let summary = pipeline::execute(df, &config, Path::new("assay.csv"))?;
//! println!("Results in {}", summary.output_dir.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`wrangle`]: shape detection, melting, unit extraction, type inference
//! - [`stats`]: descriptive statistics and hypothesis test dispatch
//! - [`figure`]: publication-styled figure rendering
//! - [`report`]: output bundle (spreadsheet, figures, audit log)
//! - [`wizard`]: interactive terminal configuration
//! - [`dsl`]: the `.bd` key-value configuration format
//!
//! ## Key Concepts
//!
//! The dataset is never mutated silently: every pipeline stage (header
//! sanitisation, unit stripping, transform, melt, type enforcement) records
//! an operation line that ends up in `audit_log.json`, and the input file is
//! fingerprinted so a run can be tied back to the exact bytes it consumed.
//!
//! Shape and type detection are heuristics. All thresholds live in
//! [`config::DetectionThresholds`] rather than being buried as constants,
//! and detection results only ever warn or advise - they never abort a run.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod dsl;
pub mod error;
pub mod figure;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod wizard;
pub mod wrangle;
