//! CLI driver: argument parsing, data discovery and mode selection.
//!
//! `--config` and `--input` pin everything down for scripted runs. With
//! neither, the tool scans the working directory for data, picks up a lone
//! `.bd` file, and otherwise drops into the interactive wizard.

use anyhow::{bail, Context as _, Result};
use biodata::config::{DetectionThresholds, PlotConfig};
use biodata::wizard::{Prompter as _, Reply, StdinPrompter};
use biodata::{dsl, pipeline, wizard, wrangle};
use clap::Parser;
use log::{info, warn};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "biodata",
    about = "Data wrangling, hypothesis testing and publication figures for bench experiment data"
)]
pub struct Cli {
    /// Path to a .bd configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the input data file (csv / xlsx)
    #[arg(long)]
    pub input: Option<PathBuf>,
}

pub fn run(cli: Cli) -> Result<()> {
    loop {
        let (input, interactive_selection) = match &cli.input {
            Some(path) => (path.clone(), false),
            None => discover_input()?,
        };
        info!("Input data: {}", input.display());

        let raw = wrangle::io::load_table(&input)
            .with_context(|| format!("Failed to load {}", input.display()))?;

        let config = match resolve_config(&cli, &raw)? {
            Some(config) => config,
            None => {
                // Wizard cancelled. Without a file-selection step to return
                // to, ask before looping or we spin on the same file.
                println!("\n[System] Wizard cancelled.");
                if !interactive_selection {
                    let mut prompter = StdinPrompter;
                    let retry =
                        prompter.ask("Restart wizard? (y/n, default: n)", false)?;
                    let restart = matches!(retry, Reply::Value(v) if v.trim().eq_ignore_ascii_case("y"));
                    if !restart {
                        return Ok(());
                    }
                }
                println!("\n[System] Restarting...");
                continue;
            }
        };

        let summary = pipeline::execute(raw, &config, &input)?;
        println!("\n{}", "=".repeat(40));
        println!(
            "Run {} complete. Results: {}",
            summary.run_id,
            summary.output_dir.display()
        );
        println!("{}", "=".repeat(40));
        return Ok(());
    }
}

/// Resolves the run configuration: explicit `--config` (malformed is
/// fatal), else a discovered `.bd` (malformed falls back to the wizard),
/// else the wizard. `None` means the wizard was cancelled.
fn resolve_config(cli: &Cli, raw: &DataFrame) -> Result<Option<PlotConfig>> {
    if let Some(path) = &cli.config {
        info!("Loading config from: {}", path.display());
        return dsl::load(path).map(Some);
    }

    if let Some(found) = dsl::discover(Path::new(".")) {
        info!("Auto-detected config: {}", found.display());
        match dsl::load(&found) {
            Ok(config) => return Ok(Some(config)),
            Err(e) => {
                warn!("Discovered .bd file was unusable ({e}); launching wizard instead");
            }
        }
    } else {
        info!("No config provided. Launching interactive wizard...");
    }

    wizard::run(raw, &DetectionThresholds::default())
}

/// Finds a data file when `--input` was not given: `*.csv`/`*.xlsx` in the
/// working directory (Office lock files skipped), falling back to `test/`.
/// Multiple candidates prompt the user; the bool reports whether they were
/// asked.
fn discover_input() -> Result<(PathBuf, bool)> {
    let mut candidates = scan_for_data(Path::new("."))?;
    if candidates.is_empty() {
        candidates = scan_for_data(Path::new("test")).unwrap_or_default();
    }

    match candidates.len() {
        0 => bail!("No data file (.csv/.xlsx) found in the current directory"),
        1 => {
            let found = candidates.remove(0);
            info!("Auto-detected data: {}", found.display());
            Ok((found, false))
        }
        _ => {
            println!("\nMultiple data files detected:");
            for (i, path) in candidates.iter().enumerate() {
                println!(
                    " [{i}] {}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
            }
            let mut prompter = StdinPrompter;
            let reply = prompter.ask(
                &format!("Select data file (0-{})", candidates.len() - 1),
                false,
            )?;
            let Reply::Value(choice) = reply else {
                bail!("Invalid selection");
            };
            let idx: usize = choice
                .trim()
                .parse()
                .context("Invalid selection: expected an index")?;
            if idx >= candidates.len() {
                bail!("Invalid selection: index out of range");
            }
            Ok((candidates.remove(idx), true))
        }
    }
}

fn scan_for_data(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let ext = p.extension().and_then(|s| s.to_str()).unwrap_or("");
            matches!(ext, "csv" | "xlsx")
        })
        // "~$" prefixed files are Office lock files, not data.
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| !n.starts_with("~$"))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    Ok(found)
}
