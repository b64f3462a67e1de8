//! End-to-end pipeline tests over fixture files.
//!
//! These run the complete flow - load, sanitise, render, export - into a
//! temporary directory and verify the output bundle: both figure formats,
//! the multi-sheet workbook and a sealed audit log.

use biodata::config::{GraphKind, PlotConfig};
use biodata::{dsl, pipeline, wrangle};
use calamine::{open_workbook_auto, Reader as _};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

fn load_fixture(name: &str) -> (DataFrame, PathBuf) {
    let path = Path::new("tests/testdata").join(name);
    let df = wrangle::io::load_table(&path).expect("fixture should load");
    (df, path)
}

fn bundle_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("output dir should exist")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

fn assert_full_bundle(dir: &Path) {
    let files = bundle_files(dir);
    assert!(
        files.iter().any(|f| f.ends_with(".png")),
        "missing raster figure in {files:?}"
    );
    assert!(
        files.iter().any(|f| f.ends_with(".svg")),
        "missing vector figure in {files:?}"
    );
    assert!(
        files.iter().any(|f| f.ends_with(".xlsx")),
        "missing workbook in {files:?}"
    );
    assert!(
        files.iter().any(|f| f == "audit_log.json"),
        "missing audit log in {files:?}"
    );
}

#[test]
fn test_box_run_from_bd_config() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = dsl::load(Path::new("tests/testdata/box.bd")).unwrap();
    config.output_base = Some(tmp.path().to_path_buf());

    let (df, input) = load_fixture("units.csv");
    let summary = pipeline::execute(df, &config, &input).unwrap();

    assert_full_bundle(&summary.output_dir);

    // The directory is named after the graph and labels, with the
    // path-hostile '/' in "pg/mL" stripped and a timestamp qualifier.
    let dir_name = summary
        .output_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(dir_name.starts_with("Box Graph (IL-6 (pg_mL))"), "{dir_name}");
    assert!(dir_name.contains('['), "{dir_name}");

    // Audit log is valid JSON tied to this run.
    let audit: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(summary.output_dir.join("audit_log.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(audit["run_id"], summary.run_id.as_str());
    assert_eq!(audit["input_fingerprint"].as_str().unwrap().len(), 16);
    assert!(!audit["operations"].as_array().unwrap().is_empty());
    // The ND cell in the fixture surfaces as a unit-extraction operation,
    // not a failure.
    assert!(audit["config"]["graph"].is_string());
}

#[test]
fn test_box_run_hypothesis_sheet_has_t_test() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = dsl::load(Path::new("tests/testdata/box.bd")).unwrap();
    config.output_base = Some(tmp.path().to_path_buf());

    let (df, input) = load_fixture("units.csv");
    let summary = pipeline::execute(df, &config, &input).unwrap();

    let files = bundle_files(&summary.output_dir);
    let workbook_name = files.iter().find(|f| f.ends_with(".xlsx")).unwrap();
    let mut workbook =
        open_workbook_auto(summary.output_dir.join(workbook_name)).unwrap();

    let sheets = workbook.sheet_names();
    assert!(sheets.contains(&"Data Analysis".to_owned()), "{sheets:?}");
    assert!(sheets.contains(&"Hypothesis Test".to_owned()), "{sheets:?}");
    assert!(sheets.contains(&"Descriptive Stats".to_owned()), "{sheets:?}");

    // Two clearly separated groups of 8 and 7: the normality heuristic
    // endorses a t-test only at n >= 8, so either way a p-value under 0.05
    // lands in the sheet.
    let range = workbook.worksheet_range("Hypothesis Test").unwrap();
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
    assert!(rows.len() >= 2, "{rows:?}");
    assert!(rows[1][0].contains("vs"), "{rows:?}");
    let p: f64 = rows[1][3].parse().unwrap();
    assert!(p < 0.05, "expected significance, got p = {p}");
}

#[test]
fn test_wide_table_is_melted_in_run() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = PlotConfig::new(GraphKind::Box);
    config.output_base = Some(tmp.path().to_path_buf());

    let (df, input) = load_fixture("wide.csv");
    let summary = pipeline::execute(df, &config, &input).unwrap();

    let audit: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(summary.output_dir.join("audit_log.json")).unwrap(),
    )
    .unwrap();
    let operations = audit["operations"].as_array().unwrap();
    assert!(
        operations
            .iter()
            .any(|op| op.as_str().unwrap_or("").contains("melted")),
        "{operations:?}"
    );
    assert_full_bundle(&summary.output_dir);
}

#[test]
fn test_scatter_run() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = PlotConfig::new(GraphKind::Scatter);
    config.independent = Some("Time".to_owned());
    config.dependent = Some("OD600".to_owned());
    config.output_base = Some(tmp.path().to_path_buf());

    let (df, input) = load_fixture("scatter.csv");
    let summary = pipeline::execute(df, &config, &input).unwrap();
    assert_full_bundle(&summary.output_dir);

    let dir_name = summary
        .output_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(
        dir_name.starts_with("Scatter Graph (OD600 against Time)"),
        "{dir_name}"
    );
}

#[test]
fn test_volcano_run() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = PlotConfig::new(GraphKind::Volcano);
    config.independent = Some("log2fc".to_owned());
    config.dependent = Some("pvalue".to_owned());
    config.output_base = Some(tmp.path().to_path_buf());

    let (df, input) = load_fixture("volcano.csv");
    let summary = pipeline::execute(df, &config, &input).unwrap();
    assert_full_bundle(&summary.output_dir);
}

#[test]
fn test_three_group_run_reports_anova() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = PlotConfig::new(GraphKind::Box);
    config.independent = Some("Group".to_owned());
    config.dependent = Some("Value".to_owned());
    config.output_base = Some(tmp.path().to_path_buf());

    let (df, input) = load_fixture("three_groups.csv");
    let summary = pipeline::execute(df, &config, &input).unwrap();

    let files = bundle_files(&summary.output_dir);
    let workbook_name = files.iter().find(|f| f.ends_with(".xlsx")).unwrap();
    let mut workbook =
        open_workbook_auto(summary.output_dir.join(workbook_name)).unwrap();
    let range = workbook.worksheet_range("Hypothesis Test").unwrap();
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();

    // ANOVA first, then each treatment against the control.
    assert!(rows[1][1].contains("ANOVA"), "{rows:?}");
    let p: f64 = rows[1][3].parse().unwrap();
    assert!(p < 0.05, "ANOVA should flag the shifted group, p = {p}");
    assert!(rows.len() >= 4, "expected pairwise rows too: {rows:?}");
    assert!(rows[2][0].contains("vs Control"), "{rows:?}");
}

#[test]
fn test_heatmap_correlation_run() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = PlotConfig::new(GraphKind::Heatmap);
    config.output_base = Some(tmp.path().to_path_buf());

    let (df, input) = load_fixture("wide.csv");
    let summary = pipeline::execute(df, &config, &input).unwrap();
    assert_full_bundle(&summary.output_dir);

    // Correlation mode fills the data sheet with the matrix: header row
    // plus one row per measurement column.
    let files = bundle_files(&summary.output_dir);
    let workbook_name = files.iter().find(|f| f.ends_with(".xlsx")).unwrap();
    let mut workbook =
        open_workbook_auto(summary.output_dir.join(workbook_name)).unwrap();
    let range = workbook.worksheet_range("Data Analysis").unwrap();
    assert_eq!(range.height(), 7); // 6 rep columns + header
}

#[test]
fn test_missing_config_file_is_error() {
    assert!(dsl::load(Path::new("tests/testdata/absent.bd")).is_err());
}
