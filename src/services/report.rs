// Reporting Sink
// Renders analysis and evaluation results as console text and persists each
// document run under a timestamped directory.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{CandidateReport, DocumentAnalysis, ExperimentOutcome, Label};

const RULE_WIDTH: usize = 80;
pub const NO_CANDIDATES_MESSAGE: &str = "No candidate requirements found (after filtering).";
pub const ALREADY_CLEAR_MESSAGE: &str = "(requirement already clear; no rewrite needed)";

/// Full console text for one analyzed document.
pub fn render_document_report(source: &Path, analysis: &DocumentAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Loaded file: {}", source.display());
    out.push_str("Extracting candidate requirements...\n\n");

    match analysis {
        DocumentAnalysis::NoCandidates => {
            out.push_str(NO_CANDIDATES_MESSAGE);
            out.push('\n');
        }
        DocumentAnalysis::Reports {
            candidates,
            notes,
            show_rewrite,
        } => {
            for note in notes {
                let _ = writeln!(out, "{}", note);
            }
            for report in candidates {
                render_candidate(&mut out, report, *show_rewrite);
            }
        }
    }

    out
}

fn render_candidate(out: &mut String, report: &CandidateReport, show_rewrite: bool) {
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "[{}] Requirement candidate:", report.index);
    let _ = writeln!(out, "{}", report.text);
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    if let Some(verdict) = &report.rule_based {
        let _ = writeln!(out, "Rule-based verdict: {}", verdict.label().as_str().to_uppercase());
        if verdict.reasons.is_empty() {
            out.push_str("  • No issues detected by rule-based detector.\n");
        }
        for reason in &verdict.reasons {
            let _ = writeln!(out, "  • {}", reason);
        }
    }

    if let Some(verdict) = &report.llm {
        let _ = writeln!(out, "\nLLM-based verdict: {}", verdict.label.as_str().to_uppercase());
        if !verdict.reason.is_empty() {
            let _ = writeln!(out, "  • {}", verdict.reason);
        }

        if show_rewrite {
            match (&report.rewrite, verdict.label) {
                (Some(rewrite), _) => {
                    let _ = writeln!(out, "\n  Suggested rewrite:\n    {}", rewrite);
                }
                (None, Label::Clear) => {
                    let _ = writeln!(out, "\n  Suggested rewrite:\n    {}", ALREADY_CLEAR_MESSAGE);
                }
                (None, Label::Ambiguous) => {}
            }
        }
    }

    out.push('\n');
}

/// Both evaluation reports of an experiment, one after the other.
pub fn render_evaluation(outcome: &ExperimentOutcome) -> String {
    format!("{}\n{}", outcome.rule_based, outcome.llm)
}

/// `<root>/<stem>/<YYYY-mm-dd_HH-MM-SS>/` for one analysis run.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    dir: PathBuf,
    stem: String,
}

impl RunDirectory {
    pub fn create(root: &Path, stem: &str) -> std::io::Result<Self> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let dir = root.join(stem).join(timestamp);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            stem: stem.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(format!("analysis_{}.txt", self.stem))
    }

    /// Persist the rendered report; returns the file written.
    pub fn write_analysis(&self, rendered: &str) -> std::io::Result<PathBuf> {
        let path = self.log_path();
        fs::write(&path, rendered)?;
        info!("[ORCHESTRATOR] analysis saved to {}", path.display());
        Ok(path)
    }
}
