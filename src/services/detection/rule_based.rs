// Rule-Based Ambiguity Detector
// QuARS-style checks: vague-term lexicon plus two structural heuristics.
// Patterns are compiled once per detector; `analyze` is a pure function.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::models::RuleVerdict;

/// Default vague-term lexicon.
pub const DEFAULT_AMBIGUOUS_TERMS: &[&str] = &[
    "fast",
    "quick",
    "quickly",
    "user-friendly",
    "easy to use",
    "robust",
    "reliable",
    "efficient",
    "flexible",
    "scalable",
    "etc.",
    "as needed",
    "if possible",
    "when appropriate",
    "sufficient",
    "adequate",
    "optimize",
    "minimize",
    "maximize",
];

pub const REASON_UNQUANTIFIED_GOAL: &str = "Optimization goal without numeric target";
pub const REASON_UNSTATED_CONDITION: &str = "Condition depends on unstated criteria";

static OPTIMIZATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:minimize|maximize|optimize)\b").expect("valid regex"));
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));
static UNSTATED_CONDITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bas needed\b|\bwhere appropriate\b").expect("valid regex"));

pub fn default_lexicon() -> Vec<String> {
    DEFAULT_AMBIGUOUS_TERMS.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Clone)]
struct TermPattern {
    term: String,
    pattern: Regex,
}

/// Deterministic detector over an immutable, precompiled lexicon.
#[derive(Debug, Clone)]
pub struct RuleBasedDetector {
    patterns: Vec<TermPattern>,
}

impl Default for RuleBasedDetector {
    fn default() -> Self {
        Self::new(DEFAULT_AMBIGUOUS_TERMS)
    }
}

impl RuleBasedDetector {
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Self {
        let patterns: Vec<TermPattern> = terms
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .filter_map(|term| match compile_term(term) {
                Ok(pattern) => Some(TermPattern {
                    term: term.to_string(),
                    pattern,
                }),
                Err(e) => {
                    warn!("[RULE_DETECTOR] skipping term {:?}: {}", term, e);
                    None
                }
            })
            .collect();

        debug!("[RULE_DETECTOR] compiled {} term patterns", patterns.len());
        Self { patterns }
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.term.as_str())
    }

    /// Run every check in fixed order and report the union of reasons.
    pub fn analyze(&self, text: &str) -> RuleVerdict {
        let mut reasons: Vec<String> = self
            .patterns
            .iter()
            .filter(|p| p.pattern.is_match(text))
            .map(|p| format!("Contains vague term \"{}\"", p.term))
            .collect();

        if OPTIMIZATION_RE.is_match(text) && !DIGIT_RE.is_match(text) {
            reasons.push(REASON_UNQUANTIFIED_GOAL.to_string());
        }

        if UNSTATED_CONDITION_RE.is_match(text) {
            reasons.push(REASON_UNSTATED_CONDITION.to_string());
        }

        RuleVerdict::from_reasons(reasons)
    }
}

/// Case-insensitive whole-word pattern. Word boundaries are only anchored on
/// term ends that are word characters, so `etc.` still matches at end of text.
fn compile_term(term: &str) -> Result<Regex, regex::Error> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut pattern = String::new();
    if term.chars().next().is_some_and(is_word) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(term));
    if term.chars().last().is_some_and(is_word) {
        pattern.push_str(r"\b");
    }

    RegexBuilder::new(&pattern).case_insensitive(true).build()
}
