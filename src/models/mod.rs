// ReqLens Data Models
// Shared value types for segmentation, detection and evaluation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============ Labels ============

/// Binary requirement label. `Ambiguous` is the positive class.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Clear,
    Ambiguous,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Clear => "clear",
            Label::Ambiguous => "ambiguous",
        }
    }

    /// Integer encoding used by the evaluator: clear = 0, ambiguous = 1.
    pub fn encode(&self) -> u8 {
        match self {
            Label::Clear => 0,
            Label::Ambiguous => 1,
        }
    }

    /// Lenient parse for oracle output: anything not recognisably clear is flagged.
    pub fn normalize(raw: &str) -> Self {
        raw.parse().unwrap_or(Label::Ambiguous)
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clear" => Ok(Label::Clear),
            "ambiguous" => Ok(Label::Ambiguous),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Requirements ============

/// One row of a labeled dataset. `label` is kept as loaded (trimmed,
/// lower-cased) so out-of-vocabulary values reach the evaluator and fail there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabeledRequirement {
    pub id: String,
    pub text: String,
    pub label: String,
}

// ============ Detection Verdicts ============

/// Output of the rule-based detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RuleVerdict {
    pub has_issue: bool,
    pub reasons: Vec<String>,
}

impl RuleVerdict {
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            has_issue: !reasons.is_empty(),
            reasons,
        }
    }

    pub fn label(&self) -> Label {
        if self.has_issue {
            Label::Ambiguous
        } else {
            Label::Clear
        }
    }
}

/// Output of the oracle detector after normalisation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OracleVerdict {
    pub label: Label,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
}

pub const ORACLE_PARSE_FAILURE_REASON: &str = "Failed to parse LLM output.";

impl OracleVerdict {
    /// Safe default substituted whenever the oracle cannot be reached or understood.
    pub fn fallback() -> Self {
        Self {
            label: Label::Ambiguous,
            reason: ORACLE_PARSE_FAILURE_REASON.to_string(),
            rewrite: None,
        }
    }

    /// Rewrite that should be surfaced to the user, if any.
    pub fn suggested_rewrite(&self) -> Option<&str> {
        match (self.label, self.rewrite.as_deref()) {
            (Label::Ambiguous, Some(r)) if !r.trim().is_empty() => Some(r),
            _ => None,
        }
    }
}

// ============ Evaluation ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class breakdown in the shape of a conventional classification report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationReport {
    pub clear: ClassMetrics,
    pub ambiguous: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

/// Aggregate metrics with `ambiguous` as the positive class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub classes: ClassificationReport,
}

// ============ Orchestration Output ============

/// Per-item comparison row of an experiment run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonRow {
    pub id: String,
    pub text: String,
    pub gold: String,
    pub rule_based: Label,
    pub llm: Label,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentOutcome {
    pub rows: Vec<ComparisonRow>,
    pub rule_based: EvaluationReport,
    pub llm: EvaluationReport,
}

/// Verdicts for one segmented candidate, in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    /// 1-based position in the document.
    pub index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_based: Option<RuleVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<OracleVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DocumentAnalysis {
    NoCandidates,
    Reports {
        candidates: Vec<CandidateReport>,
        #[serde(default)]
        notes: Vec<String>,
        show_rewrite: bool,
    },
}
