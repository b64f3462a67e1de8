//! Interactive terminal wizard.
//!
//! A four-step state machine that walks the user from graph selection to a
//! complete [`PlotConfig`]. Every prompt accepts `b` to step back and `q`
//! to quit; the column table rendered in step 2 is driven by the type
//! inferencer, whose verdicts act as an advisory guard (bad selections get
//! guidance and a re-prompt, never an abort).

pub mod steps;

use crate::config::{DetectionThresholds, PlotConfig};
use crate::error::BiodataError;
use crate::wrangle::infer::profile_columns;
use anyhow::Result;
use polars::prelude::DataFrame;
use std::io::{BufRead as _, Write as _};

/// What a prompt produced: an answer, or a request to go back a step.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Reply {
    Value(String),
    Back,
}

/// Terminal input abstraction so the step logic is testable without a tty.
pub trait Prompter {
    /// Asks one question. Quitting surfaces as [`BiodataError::Aborted`].
    fn ask(&mut self, prompt: &str, allow_back: bool) -> Result<Reply>;

    /// Prints a line of wizard output.
    fn say(&mut self, line: &str);
}

/// Real terminal prompter: stdout for text, stdin for answers.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, prompt: &str, allow_back: bool) -> Result<Reply> {
        let suffix = if allow_back {
            " (or 'b' to back, 'q' to quit): "
        } else {
            " (or 'q' to quit): "
        };
        print!("{prompt}{suffix}");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            // EOF behaves like quitting.
            return Err(BiodataError::Aborted.into());
        }
        let value = line.trim().to_owned();
        match value.to_lowercase().as_str() {
            "q" | "quit" | "exit" => {
                println!("\n[System] Exiting... goodbye!");
                Err(BiodataError::Aborted.into())
            }
            "b" | "back" if allow_back => Ok(Reply::Back),
            _ => Ok(Reply::Value(value)),
        }
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Scripted prompter for tests: feeds canned answers, swallows output.
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, _prompt: &str, allow_back: bool) -> Result<Reply> {
        let Some(value) = self.answers.pop_front() else {
            return Err(BiodataError::Aborted.into());
        };
        match value.to_lowercase().as_str() {
            "q" => Err(BiodataError::Aborted.into()),
            "b" if allow_back => Ok(Reply::Back),
            _ => Ok(Reply::Value(value)),
        }
    }

    fn say(&mut self, _line: &str) {}
}

/// Runs the wizard against the loaded dataset. Returns `None` when the
/// user backs out of the first step (cancelled, not an error).
pub fn run(df: &DataFrame, thresholds: &DetectionThresholds) -> Result<Option<PlotConfig>> {
    run_with(df, thresholds, &mut StdinPrompter)
}

/// Wizard entry point with an injectable prompter.
pub fn run_with(
    df: &DataFrame,
    thresholds: &DetectionThresholds,
    prompter: &mut dyn Prompter,
) -> Result<Option<PlotConfig>> {
    let profiles = profile_columns(df, thresholds)?;

    prompter.say("");
    prompter.say(&"=".repeat(40));
    prompter.say(" BioData Interactive Wizard");
    prompter.say(&"=".repeat(40));

    let mut steps = steps::Steps::new(profiles, &mut *prompter);
    let Some(draft) = steps.run()? else {
        return Ok(None);
    };
    drop(steps);

    prompter.say("");
    prompter.say(&"=".repeat(40));
    prompter.say("Configuration captured! Ready to analyze.");
    prompter.say(&format!("{}\n", "-".repeat(40)));

    let mut config = draft.into_config(thresholds.clone());
    config.annotate_transform_label();
    Ok(Some(config))
}
