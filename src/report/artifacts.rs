//! Artifact registry: the per-run output directory and its audit log.
//!
//! Every run gets a fresh, descriptively named directory - graph type,
//! mapped variables and a second-resolution timestamp - so results from
//! repeated runs never overwrite each other. The registry also owns the
//! audit record: a write-once JSON document tying together the
//! configuration snapshot, the input fingerprint and the ordered list of
//! operations the pipeline performed.

use crate::config::{GraphKind, PlotConfig};
use anyhow::{Context as _, Result};
use chrono::Local;
use log::{info, warn};
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use std::fs::File;
use std::io::{BufReader, Read as _};
use std::path::{Path, PathBuf};

const HASH_BUFFER_SIZE: usize = 8192;

/// Write-once reproducibility record, serialized to `audit_log.json`.
#[derive(Serialize, Debug)]
pub struct AuditRecord {
    pub run_id: String,
    pub timestamp: String,
    pub output_mode: String,
    pub environment: String,
    /// Snapshot of the configuration the run executed with.
    pub config: serde_json::Value,
    /// SHA-256 over config snapshot + input bytes, truncated to 16 hex
    /// chars.
    pub input_fingerprint: Option<String>,
    pub operations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Manages the sandbox directory and collects audit entries during a run.
pub struct ArtifactRegistry {
    run_id: String,
    dir: PathBuf,
    base_name: String,
    audit: AuditRecord,
}

impl ArtifactRegistry {
    /// Creates the output directory and seeds the audit record.
    pub fn create(config: &PlotConfig) -> Result<Self> {
        let run_id = short_run_id();
        let timestamp = Local::now().format("%m%d%Y_%H%M%S").to_string();

        let base_name = figure_name(config);
        let folder_name = format!("{base_name} [{timestamp}]");

        let (dir, output_mode) = match &config.output_base {
            Some(parent) => (
                parent.join(&folder_name),
                format!("Custom nested path ({})", parent.display()),
            ),
            None => (PathBuf::from(&folder_name), "Default sandbox".to_owned()),
        };

        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        info!("Sandbox created ({output_mode}): {}", dir.display());

        let config_snapshot =
            serde_json::to_value(config).context("Failed to snapshot configuration")?;

        Ok(Self {
            run_id: run_id.clone(),
            dir,
            base_name,
            audit: AuditRecord {
                run_id,
                timestamp,
                output_mode,
                environment: "CLI".to_owned(),
                config: config_snapshot,
                input_fingerprint: None,
                operations: Vec::new(),
                warnings: Vec::new(),
            },
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn raster_path(&self) -> PathBuf {
        self.dir.join(format!("{}.png", self.base_name))
    }

    pub fn vector_path(&self) -> PathBuf {
        self.dir.join(format!("{}.svg", self.base_name))
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.dir.join(format!("{} Data.xlsx", self.base_name))
    }

    pub fn audit_path(&self) -> PathBuf {
        self.dir.join("audit_log.json")
    }

    /// Appends a timestamped operation line to the audit record.
    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.audit
            .operations
            .push(format!("{} - {message}", Local::now().format("%H:%M:%S")));
    }

    /// Appends a warning to the audit record.
    pub fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.audit.warnings.push(message);
    }

    /// Computes the input fingerprint: SHA-256 over the serialized config
    /// and the raw input bytes, truncated to 16 hex characters.
    ///
    /// A hashing failure downgrades to a warning - reproducibility metadata
    /// must never kill a run that has already produced results.
    pub fn fingerprint(&mut self, input: &Path) -> String {
        match self.compute_fingerprint(input) {
            Ok(signature) => {
                self.audit.input_fingerprint = Some(signature.clone());
                self.record(format!("Input fingerprint: {signature}"));
                signature
            }
            Err(e) => {
                self.alert(format!("Fingerprint calculation failed: {e}"));
                "HASH_FAILED".to_owned()
            }
        }
    }

    fn compute_fingerprint(&self, input: &Path) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.audit.config.to_string().as_bytes());
        hasher.update(b"|");

        let file = File::open(input)
            .with_context(|| format!("Failed to open input for hashing: {}", input.display()))?;
        let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
        let mut buffer = [0u8; HASH_BUFFER_SIZE];
        loop {
            let n = reader
                .read(&mut buffer)
                .with_context(|| format!("Failed to read input: {}", input.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Ok(hex[..16].to_owned())
    }

    /// Seals the run: writes `audit_log.json` and consumes the registry so
    /// nothing can be appended afterwards.
    pub fn seal(self) -> Result<PathBuf> {
        let path = self.audit_path();
        let json = serde_json::to_string_pretty(&self.audit)
            .context("Failed to serialize audit log")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write audit log: {}", path.display()))?;
        info!("Session closed; audit log sealed");
        Ok(path)
    }
}

fn short_run_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_owned()
}

/// Descriptive artifact name, e.g.
/// `Scatter Graph (OD600 against Time)`. Path-hostile characters in the
/// labels are stripped, spaces kept.
fn figure_name(config: &PlotConfig) -> String {
    let ylabel = clean_component(&config.ylabel_or("Y"));
    let xlabel = clean_component(&config.xlabel_or("X"));

    match config.graph {
        GraphKind::Box => format!("Box Graph ({ylabel})"),
        GraphKind::Scatter => format!("Scatter Graph ({ylabel} against {xlabel})"),
        GraphKind::Volcano => format!("Volcano Graph ({ylabel} vs {xlabel})"),
        GraphKind::Heatmap => "Heatmap Graph (Correlation Matrix)".to_owned(),
    }
}

fn clean_component(s: &str) -> String {
    s.replace('/', "_").replace(':', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphKind, PlotConfig};

    fn config_in(dir: &Path, graph: GraphKind) -> PlotConfig {
        let mut config = PlotConfig::new(graph);
        config.output_base = Some(dir.to_path_buf());
        config.ylabel = Some("Concentration".to_owned());
        config.xlabel = Some("Treatment".to_owned());
        config
    }

    #[test]
    fn test_creates_descriptive_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path(), GraphKind::Scatter);
        let registry = ArtifactRegistry::create(&config).unwrap();

        let dir_name = registry
            .output_dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(dir_name.starts_with("Scatter Graph (Concentration against Treatment) ["));
        assert!(registry.output_dir().exists());
    }

    #[test]
    fn test_path_hostile_labels_cleaned() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path(), GraphKind::Box);
        config.ylabel = Some("IL-6 (pg/mL): raw".to_owned());
        let registry = ArtifactRegistry::create(&config).unwrap();
        let name = registry.base_name().to_owned();
        assert!(!name.contains('/'));
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_audit_log_sealed_with_operations() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path(), GraphKind::Box);
        let mut registry = ArtifactRegistry::create(&config).unwrap();
        registry.record("Did a thing");
        registry.alert("Something was off");

        let audit_path = registry.seal().unwrap();
        assert!(audit_path.exists());

        let text = std::fs::read_to_string(&audit_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["environment"], "CLI");
        assert!(json["operations"][0]
            .as_str()
            .unwrap()
            .contains("Did a thing"));
        assert_eq!(json["warnings"][0], "Something was off");
        assert!(json["config"]["graph"].is_string());
    }

    #[test]
    fn test_fingerprint_is_stable_for_same_input() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("data.csv");
        std::fs::write(&input, "a,b\n1,2\n").unwrap();

        let config = config_in(tmp.path(), GraphKind::Box);
        let mut r1 = ArtifactRegistry::create(&config).unwrap();
        let mut r2 = ArtifactRegistry::create(&config).unwrap();

        let f1 = r1.fingerprint(&input);
        let f2 = r2.fingerprint(&input);
        assert_eq!(f1.len(), 16);
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_fingerprint_failure_downgrades_to_warning() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path(), GraphKind::Box);
        let mut registry = ArtifactRegistry::create(&config).unwrap();
        let out = registry.fingerprint(Path::new("does_not_exist.csv"));
        assert_eq!(out, "HASH_FAILED");
    }
}
