//! The wizard's individual steps.
//!
//! Each step is a method on [`Steps`] returning [`Flow`], so the
//! orchestrator can move backwards as well as forwards. Column choices are
//! validated against the inferred profiles: a non-numeric dependent
//! variable gets guidance and a re-prompt.

use crate::config::{
    DetectionThresholds, GraphKind, HeatmapMode, HeatmapOptions, PlotConfig, TransformKind,
    ZScoreAxis,
};
use crate::wizard::{Prompter, Reply};
use crate::wrangle::infer::ColumnProfile;
use anyhow::Result;

/// Where to go after a step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Next,
    Back,
}

/// The configuration being assembled.
#[derive(Default, Debug)]
pub struct Draft {
    pub graph: Option<GraphKind>,
    pub heatmap: Option<HeatmapOptions>,
    pub independent: Option<String>,
    pub dependent: Option<String>,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub transform: TransformKind,
    pub title: Option<String>,
    pub legend: bool,
    pub legend_name: Option<String>,
}

impl Draft {
    pub fn into_config(self, thresholds: DetectionThresholds) -> PlotConfig {
        let mut config = PlotConfig::new(self.graph.unwrap_or(GraphKind::Box));
        config.heatmap = self.heatmap;
        config.independent = self.independent;
        config.dependent = self.dependent;
        config.xlabel = self.xlabel;
        config.ylabel = self.ylabel;
        config.transform = self.transform;
        config.title = self.title;
        config.legend = self.legend;
        config.legend_name = self.legend_name;
        config.thresholds = thresholds;
        config
    }
}

pub struct Steps<'a> {
    profiles: Vec<ColumnProfile>,
    prompter: &'a mut dyn Prompter,
}

impl<'a> Steps<'a> {
    pub fn new(profiles: Vec<ColumnProfile>, prompter: &'a mut dyn Prompter) -> Self {
        Self { profiles, prompter }
    }

    /// The four-step state machine. `None` means the user backed out of
    /// step 1.
    pub fn run(&mut self) -> Result<Option<Draft>> {
        let mut draft = Draft::default();
        let mut step = 1u8;

        while step <= 4 {
            let flow = match step {
                1 => self.select_graph(&mut draft)?,
                2 => self.map_variables(&mut draft)?,
                3 => self.choose_transform(&mut draft)?,
                _ => self.metadata(&mut draft)?,
            };
            match flow {
                Flow::Next => step += 1,
                Flow::Back => {
                    if step == 1 {
                        return Ok(None);
                    }
                    step -= 1;
                }
            }
        }
        Ok(Some(draft))
    }

    fn select_graph(&mut self, draft: &mut Draft) -> Result<Flow> {
        loop {
            self.prompter.say("\n[Step 1/4] Select Graph Type:");
            self.prompter.say(" [1] Box Plot");
            self.prompter.say(" [2] Scatter Plot");
            self.prompter.say(" [3] Volcano Plot");
            self.prompter.say(" [4] Heatmap");

            let value = match self.prompter.ask("Choice (1-4)", true)? {
                Reply::Back => return Ok(Flow::Back),
                Reply::Value(v) => v,
            };

            let graph = match value.trim() {
                "1" => Some(GraphKind::Box),
                "2" => Some(GraphKind::Scatter),
                "3" => Some(GraphKind::Volcano),
                "4" => Some(GraphKind::Heatmap),
                other => GraphKind::parse(other),
            };
            let Some(graph) = graph else {
                self.prompter
                    .say("(!) Invalid choice. Please enter one of: 1/2/3/4");
                continue;
            };

            draft.graph = Some(graph);
            if graph == GraphKind::Heatmap {
                match self.heatmap_options(draft)? {
                    Flow::Next => return Ok(Flow::Next),
                    // Back inside the sub-flow returns to graph selection.
                    Flow::Back => continue,
                }
            }
            // Drop stale heatmap settings when the user changes their mind.
            draft.heatmap = None;
            return Ok(Flow::Next);
        }
    }

    /// Heatmap sub-flow: mode, then normalisation for expression mode.
    fn heatmap_options(&mut self, draft: &mut Draft) -> Result<Flow> {
        let mut step = 0u8;
        loop {
            match step {
                0 => {
                    self.prompter.say("\n[Heatmap Mode]");
                    self.prompter
                        .say(" [1] Correlation Matrix (Sample vs Sample similarity)");
                    self.prompter
                        .say(" [2] Expression Heatmap (Gene vs Sample raw values)");

                    let value = match self.prompter.ask("Choice (1-2, Default 1)", true)? {
                        Reply::Back => return Ok(Flow::Back),
                        Reply::Value(v) => v,
                    };
                    match value.trim() {
                        "" | "1" | "correlation" => {
                            draft.heatmap = Some(HeatmapOptions {
                                mode: HeatmapMode::Correlation,
                                z_score: None,
                                columns: vec![],
                            });
                            return Ok(Flow::Next);
                        }
                        "2" | "expression" => step = 1,
                        _ => self.prompter.say("(!) Invalid choice. Enter 1 or 2."),
                    }
                }
                _ => {
                    self.prompter.say("\n[Normalization]");
                    self.prompter.say(" [0] None (Plot Raw Values)");
                    self.prompter.say(" [1] Z-Score Rows (Standardize Genes)");
                    self.prompter
                        .say(" [2] Z-Score Columns (Standardize Samples)");

                    let value = match self.prompter.ask("Choice (0-2, Default 0)", true)? {
                        Reply::Back => {
                            step = 0;
                            continue;
                        }
                        Reply::Value(v) => v,
                    };
                    let z_score = match value.trim() {
                        "" | "0" => None,
                        "1" => Some(ZScoreAxis::Rows),
                        "2" => Some(ZScoreAxis::Columns),
                        _ => {
                            self.prompter.say("(!) Invalid choice. Enter 0, 1 or 2.");
                            continue;
                        }
                    };
                    // Only the expression path reaches this step.
                    draft.heatmap = Some(HeatmapOptions {
                        mode: HeatmapMode::Expression,
                        z_score,
                        columns: vec![],
                    });
                    return Ok(Flow::Next);
                }
            }
        }
    }

    fn map_variables(&mut self, draft: &mut Draft) -> Result<Flow> {
        let graph = draft.graph.unwrap_or(GraphKind::Box);
        self.prompter
            .say(&format!("\n[Step 2/4] Variable Mapping ({graph})"));
        self.print_column_table();

        if graph == GraphKind::Heatmap {
            return self.select_heatmap_columns(draft);
        }

        let x_idx = match self.select_column("Select X-axis (ID or Name)")? {
            Some(idx) => idx,
            None => return Ok(Flow::Back),
        };

        let y_idx = loop {
            let idx = match self.select_column("Select Y-axis (ID or Name)")? {
                Some(idx) => idx,
                None => return Ok(Flow::Back),
            };
            if self.profiles[idx].is_numeric() {
                break idx;
            }
            self.prompter.say(&format!(
                " [Error] Column '{}' is not numeric ({}). Pick a numeric column.",
                self.profiles[idx].name, self.profiles[idx].kind
            ));
        };

        draft.independent = Some(self.profiles[x_idx].name.clone());
        draft.dependent = Some(self.profiles[y_idx].name.clone());
        draft.xlabel = Some(self.profiles[x_idx].name.clone());
        draft.ylabel = Some(self.profiles[y_idx].name.clone());
        Ok(Flow::Next)
    }

    fn print_column_table(&mut self) {
        self.prompter.say(&format!(
            "{:<4} | {:<25} | {:<12} | {:<10} | {:<20}",
            "ID", "Column Name", "Type", "Unit", "Sample (First Value)"
        ));
        self.prompter.say(&"-".repeat(80));
        for (i, profile) in self.profiles.iter().enumerate() {
            let sample = profile
                .samples
                .first()
                .map(|s| s.chars().take(20).collect::<String>())
                .unwrap_or_default();
            let name: String = profile.name.chars().take(25).collect();
            self.prompter.say(&format!(
                " {:<3} | {:<25} | {:<12} | {:<10} | {:<20}",
                i,
                name,
                profile.kind.as_str(),
                profile.unit.as_deref().unwrap_or("-"),
                sample
            ));
        }
        self.prompter.say(&"-".repeat(80));
    }

    /// Multi-select loop for heatmap columns: ids, names, `all`, ranges,
    /// `undo`, `done`.
    fn select_heatmap_columns(&mut self, draft: &mut Draft) -> Result<Flow> {
        self.prompter.say("\n[Heatmap] Select numeric columns.");
        self.prompter
            .say("Type column ID/Name. Tip: 'all' for all numeric, '1-10' for a range.");
        self.prompter
            .say("Enter 'done' to finish, 'undo' to remove last, 'b' to go back.");

        let mut selected: Vec<String> = Vec::new();
        loop {
            let prompt = format!("Select Column {} (or 'done')", selected.len() + 1);
            let value = match self.prompter.ask(&prompt, true)? {
                Reply::Back => {
                    if !selected.is_empty() {
                        self.prompter
                            .say("(!) Going back will discard the current selection.");
                        if let Reply::Value(confirm) =
                            self.prompter.ask("Confirm go back? (y/n, default: y)", false)?
                        {
                            if confirm.trim().to_lowercase() == "n" {
                                continue;
                            }
                        }
                    }
                    return Ok(Flow::Back);
                }
                Reply::Value(v) => v,
            };
            let value = value.trim().to_owned();

            if value.eq_ignore_ascii_case("undo") {
                match selected.pop() {
                    Some(removed) => self.prompter.say(&format!("Removed '{removed}'.")),
                    None => self.prompter.say("Nothing to undo."),
                }
                continue;
            }

            if value.is_empty() || value.eq_ignore_ascii_case("done") {
                if selected.len() < 2 {
                    self.prompter
                        .say("(!) Heatmap requires at least 2 columns. Please select more.");
                    continue;
                }
                break;
            }

            if value.eq_ignore_ascii_case("all") {
                let mut added = 0;
                for profile in &self.profiles {
                    if profile.is_numeric() && !selected.contains(&profile.name) {
                        selected.push(profile.name.clone());
                        added += 1;
                    }
                }
                self.prompter.say(&format!(
                    "Added {added} new columns. Total: {}.",
                    selected.len()
                ));
                continue;
            }

            if let Some(added) = self.add_index_range(&value, &mut selected) {
                self.prompter.say(&format!("Added {added} columns from range {value}."));
                continue;
            }

            match self.find_column(&value) {
                Some(idx) => {
                    let profile = &self.profiles[idx];
                    if !profile.is_numeric() {
                        self.prompter
                            .say(&format!("(!) Column '{}' is not numeric.", profile.name));
                    } else if selected.contains(&profile.name) {
                        self.prompter.say("(!) Already selected.");
                    } else {
                        selected.push(profile.name.clone());
                        self.prompter.say(&format!("Added: {}", profile.name));
                    }
                }
                None => self.prompter.say("(!) Invalid column ID or Name."),
            }
        }

        let options = draft.heatmap.get_or_insert_with(HeatmapOptions::default);
        options.columns = selected;
        draft.xlabel = Some("Samples".to_owned());
        draft.ylabel = Some("Genes/Variables".to_owned());
        Ok(Flow::Next)
    }

    /// Parses `a-b` index ranges, adding the numeric columns inside.
    /// Returns `None` when the input is not a range.
    fn add_index_range(&mut self, value: &str, selected: &mut Vec<String>) -> Option<usize> {
        let (a, b) = value.split_once('-')?;
        let (start, end) = (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?);
        let (start, end) = if start <= end { (start, end) } else { (end, start) };

        let mut added = 0;
        for idx in start..=end {
            if let Some(profile) = self.profiles.get(idx) {
                if profile.is_numeric() && !selected.contains(&profile.name) {
                    selected.push(profile.name.clone());
                    added += 1;
                }
            }
        }
        Some(added)
    }

    /// Prompts until a valid column index/name arrives. `None` means back.
    fn select_column(&mut self, prompt: &str) -> Result<Option<usize>> {
        loop {
            let value = match self.prompter.ask(prompt, true)? {
                Reply::Back => return Ok(None),
                Reply::Value(v) => v,
            };
            match self.find_column(value.trim()) {
                Some(idx) => return Ok(Some(idx)),
                None => {
                    self.prompter.say(&format!(
                        "(!) Error: enter a valid index (0-{}) or column name.",
                        self.profiles.len().saturating_sub(1)
                    ));
                }
            }
        }
    }

    /// Index lookup first, then case-insensitive name lookup.
    fn find_column(&self, value: &str) -> Option<usize> {
        if let Ok(idx) = value.parse::<usize>() {
            return if idx < self.profiles.len() {
                Some(idx)
            } else {
                None
            };
        }
        self.profiles
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(value))
    }

    fn choose_transform(&mut self, draft: &mut Draft) -> Result<Flow> {
        let graph = draft.graph.unwrap_or(GraphKind::Box);
        if graph == GraphKind::Volcano {
            self.prompter
                .say(&format!("\n[Step 3/4] Data Transformation: auto-skipped for {graph}."));
            draft.transform = TransformKind::Linear;
            return Ok(Flow::Next);
        }

        self.prompter.say("\n[Step 3/4] Data Transformation (Model):");
        self.prompter
            .say(" [1] Linear | [2] Log2 | [3] Log10 | [4] Natural Log (Ln)");
        loop {
            let value = match self.prompter.ask("Choice (1-4, Default Linear)", true)? {
                Reply::Back => return Ok(Flow::Back),
                Reply::Value(v) => v,
            };
            let choice = match value.trim() {
                "" | "1" => Some(TransformKind::Linear),
                "2" => Some(TransformKind::Log2),
                "3" => Some(TransformKind::Log10),
                "4" => Some(TransformKind::Ln),
                other => TransformKind::parse(other),
            };
            match choice {
                Some(t) => {
                    draft.transform = t;
                    return Ok(Flow::Next);
                }
                None => self.prompter.say("(!) Invalid choice."),
            }
        }
    }

    fn metadata(&mut self, draft: &mut Draft) -> Result<Flow> {
        self.prompter.say("\n[Step 4/4] Metadata:");
        let ylabel = draft.ylabel.clone().unwrap_or_default();

        let wants_title = match self.prompter.ask("Show Title? (y/n, default: n)", true)? {
            Reply::Back => return Ok(Flow::Back),
            Reply::Value(v) => v.trim().to_lowercase() == "y",
        };
        draft.title = if wants_title {
            let default = format!("{ylabel} Analysis");
            match self
                .prompter
                .ask(&format!("Enter Title (default: {default})"), true)?
            {
                Reply::Back => return Ok(Flow::Back),
                Reply::Value(v) => {
                    let v = v.trim();
                    Some(if v.is_empty() { default } else { v.to_owned() })
                }
            }
        } else {
            None
        };

        let wants_legend = match self.prompter.ask("Show Legend? (y/n, default: n)", true)? {
            Reply::Back => return Ok(Flow::Back),
            Reply::Value(v) => v.trim().to_lowercase() == "y",
        };
        draft.legend = wants_legend;
        draft.legend_name = if wants_legend {
            match self
                .prompter
                .ask(&format!("Enter Legend Name (default: {ylabel})"), true)?
            {
                Reply::Back => return Ok(Flow::Back),
                Reply::Value(v) => {
                    let v = v.trim();
                    Some(if v.is_empty() { ylabel } else { v.to_owned() })
                }
            }
        } else {
            None
        };

        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::{run_with, ScriptedPrompter};
    use polars::prelude::*;

    fn sample_df() -> DataFrame {
        let group = Series::new(
            "Treatment".into(),
            vec!["Control", "Drug A", "Control", "Drug A"],
        );
        let conc = Series::new("Concentration".into(), vec!["10mg", "20mg", "15mg", "25mg"]);
        let id = Series::new("SampleID".into(), vec!["s1", "s2", "s3", "s4"]);
        DataFrame::new(vec![
            Column::from(group),
            Column::from(conc),
            Column::from(id),
        ])
        .unwrap()
    }

    fn thresholds() -> DetectionThresholds {
        DetectionThresholds::default()
    }

    #[test]
    fn test_box_flow_end_to_end() {
        // graph=box, x=Treatment, y=Concentration, transform=log2,
        // title=n, legend=n
        let mut prompter = ScriptedPrompter::new(["1", "0", "1", "2", "n", "n"]);
        let config = run_with(&sample_df(), &thresholds(), &mut prompter)
            .unwrap()
            .unwrap();

        assert_eq!(config.graph, GraphKind::Box);
        assert_eq!(config.independent.as_deref(), Some("Treatment"));
        assert_eq!(config.dependent.as_deref(), Some("Concentration"));
        assert_eq!(config.transform, TransformKind::Log2);
        // The transform suffix lands on the label.
        assert_eq!(config.ylabel.as_deref(), Some("Concentration (log2)"));
        assert!(!config.legend);
    }

    #[test]
    fn test_numeric_guard_reprompts() {
        // y first points at SampleID (identifier) -> guidance, then a
        // numeric column is accepted.
        let mut prompter =
            ScriptedPrompter::new(["1", "0", "SampleID", "Concentration", "1", "n", "n"]);
        let config = run_with(&sample_df(), &thresholds(), &mut prompter)
            .unwrap()
            .unwrap();
        assert_eq!(config.dependent.as_deref(), Some("Concentration"));
    }

    #[test]
    fn test_back_from_step_one_cancels() {
        let mut prompter = ScriptedPrompter::new(["b"]);
        let result = run_with(&sample_df(), &thresholds(), &mut prompter).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_back_navigation_returns_to_graph_choice() {
        // Enter box, back out of mapping, pick scatter instead.
        let mut prompter = ScriptedPrompter::new(["1", "b", "2", "0", "1", "1", "n", "n"]);
        let config = run_with(&sample_df(), &thresholds(), &mut prompter)
            .unwrap()
            .unwrap();
        assert_eq!(config.graph, GraphKind::Scatter);
    }

    #[test]
    fn test_quit_aborts() {
        let mut prompter = ScriptedPrompter::new(["q"]);
        let err = run_with(&sample_df(), &thresholds(), &mut prompter).unwrap_err();
        assert!(crate::error::is_abort(&err));
    }

    #[test]
    fn test_heatmap_flow_collects_columns() {
        let df = {
            let gene = Series::new("gene".into(), vec!["g1", "g2", "g3"]);
            let s1 = Series::new("s1".into(), vec![1.0, 2.0, 3.0]);
            let s2 = Series::new("s2".into(), vec![4.0, 5.0, 6.0]);
            DataFrame::new(vec![Column::from(gene), Column::from(s1), Column::from(s2)])
                .unwrap()
        };
        // graph=heatmap, mode=expression, zscore=rows, columns=all, done,
        // transform default, title=n, legend=n
        let mut prompter =
            ScriptedPrompter::new(["4", "2", "1", "all", "done", "", "n", "n"]);
        let config = run_with(&df, &thresholds(), &mut prompter).unwrap().unwrap();

        assert_eq!(config.graph, GraphKind::Heatmap);
        let hm = config.heatmap.unwrap();
        assert_eq!(hm.mode, HeatmapMode::Expression);
        assert_eq!(hm.z_score, Some(ZScoreAxis::Rows));
        assert_eq!(hm.columns, vec!["s1".to_owned(), "s2".to_owned()]);
        assert_eq!(config.xlabel.as_deref(), Some("Samples"));
    }

    #[test]
    fn test_heatmap_rejects_single_column_selection() {
        let df = {
            let s1 = Series::new("s1".into(), vec![1.0, 2.0]);
            let s2 = Series::new("s2".into(), vec![3.0, 4.0]);
            DataFrame::new(vec![Column::from(s1), Column::from(s2)]).unwrap()
        };
        // "done" after one column is refused, a second column is required.
        let mut prompter =
            ScriptedPrompter::new(["4", "1", "0", "done", "1", "done", "", "n", "n"]);
        let config = run_with(&df, &thresholds(), &mut prompter).unwrap().unwrap();
        assert_eq!(config.heatmap.unwrap().columns.len(), 2);
    }
}
