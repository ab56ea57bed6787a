// Detection Orchestrator
// Sequences dataset/candidates -> detectors -> evaluation or per-candidate report.
// Oracle calls run concurrently under a semaphore; results are re-ordered by
// input position before anything downstream sees them.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{
    CandidateReport, ComparisonRow, DocumentAnalysis, ExperimentOutcome, Label, LabeledRequirement, OracleVerdict,
};
use crate::services::time_savings::TimeSavings;

use super::evaluation::{evaluate, EvaluationError};
use super::oracle::OracleDetector;
use super::rule_based::RuleBasedDetector;

pub const RULE_BASED_REPORT_NAME: &str = "Rule-Based Baseline (QuARS-style)";
pub const LLM_REPORT_NAME: &str = "LLM-based Detector";
pub const REWRITE_ENABLES_LLM_NOTE: &str =
    "Note: --rewrite has no effect without LLM detector; enabling LLM automatically.";

#[derive(Debug, Clone, Copy)]
pub struct OracleRunOptions {
    pub max_concurrency: usize,
    pub timeout: Duration,
}

impl Default for OracleRunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DetectorSelection {
    Rule,
    Llm,
    #[default]
    Both,
}

impl DetectorSelection {
    pub fn uses_rule(&self) -> bool {
        matches!(self, Self::Rule | Self::Both)
    }

    pub fn uses_llm(&self) -> bool {
        matches!(self, Self::Llm | Self::Both)
    }

    /// Rewrites need the oracle: upgrade the selection and explain why.
    pub fn with_rewrite(self, show_rewrite: bool) -> (Self, Option<&'static str>) {
        match (self, show_rewrite) {
            (Self::Rule, true) => (Self::Both, Some(REWRITE_ENABLES_LLM_NOTE)),
            (selection, _) => (selection, None),
        }
    }
}

impl FromStr for DetectorSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rule" => Ok(Self::Rule),
            "llm" => Ok(Self::Llm),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown detector {:?}; use rule, llm or both", other)),
        }
    }
}

/// Rule-based label for every requirement, in input order.
pub fn run_rule_based(detector: &RuleBasedDetector, requirements: &[LabeledRequirement]) -> Vec<Label> {
    requirements.iter().map(|r| detector.analyze(&r.text).label()).collect()
}

/// Classify every text with the oracle. The output is index-aligned with
/// `texts`; a timed-out or crashed call yields the fallback verdict.
pub async fn classify_all(
    oracle: Arc<dyn OracleDetector>,
    texts: &[String],
    options: OracleRunOptions,
) -> Vec<OracleVerdict> {
    let started = Instant::now();
    let total = texts.len();
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut join_set: JoinSet<(usize, OracleVerdict)> = JoinSet::new();

    for (idx, text) in texts.iter().enumerate() {
        let oracle = oracle.clone();
        let semaphore = semaphore.clone();
        let text = text.clone();
        let timeout = options.timeout;

        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return (idx, OracleVerdict::fallback()),
            };
            match tokio::time::timeout(timeout, oracle.classify(&text)).await {
                Ok(verdict) => (idx, verdict),
                Err(_) => {
                    warn!(
                        "[ORCHESTRATOR] oracle timeout for item {} ({}s)",
                        idx,
                        timeout.as_secs()
                    );
                    (idx, OracleVerdict::fallback())
                }
            }
        });
    }

    let mut verdicts = vec![OracleVerdict::fallback(); total];
    let mut done: usize = 0;
    while let Some(res) = join_set.join_next().await {
        done += 1;
        if done == total || done % 10 == 0 {
            info!(
                "[ORCHESTRATOR] oracle progress: {}/{} (elapsed_ms={})",
                done,
                total,
                started.elapsed().as_millis()
            );
        }
        match res {
            Ok((idx, verdict)) => verdicts[idx] = verdict,
            Err(e) => warn!("[ORCHESTRATOR] oracle task failed: {}", e),
        }
    }

    verdicts
}

/// Oracle label for every requirement, in input order.
pub async fn run_llm_based(
    oracle: Arc<dyn OracleDetector>,
    requirements: &[LabeledRequirement],
    options: OracleRunOptions,
) -> Vec<Label> {
    let texts: Vec<String> = requirements.iter().map(|r| r.text.clone()).collect();
    classify_all(oracle, &texts, options)
        .await
        .into_iter()
        .map(|v| v.label)
        .collect()
}

/// Run both detectors over a labeled dataset and score each against gold.
pub async fn run_experiment(
    requirements: &[LabeledRequirement],
    rule_detector: &RuleBasedDetector,
    oracle: Arc<dyn OracleDetector>,
    options: OracleRunOptions,
) -> Result<ExperimentOutcome, EvaluationError> {
    info!(
        "[ORCHESTRATOR] experiment over {} requirements, oracle={}",
        requirements.len(),
        oracle.name()
    );

    let rule_preds = run_rule_based(rule_detector, requirements);
    let rule_labels: Vec<&str> = rule_preds.iter().map(Label::as_str).collect();
    let rule_report = evaluate(RULE_BASED_REPORT_NAME, requirements, &rule_labels)?;

    let llm_preds = run_llm_based(oracle, requirements, options).await;
    let llm_labels: Vec<&str> = llm_preds.iter().map(Label::as_str).collect();
    let llm_report = evaluate(LLM_REPORT_NAME, requirements, &llm_labels)?;

    let rows = requirements
        .iter()
        .zip(rule_preds.iter().zip(&llm_preds))
        .map(|(r, (&rule_based, &llm))| ComparisonRow {
            id: r.id.clone(),
            text: r.text.clone(),
            gold: r.label.clone(),
            rule_based,
            llm,
        })
        .collect();

    Ok(ExperimentOutcome {
        rows,
        rule_based: rule_report,
        llm: llm_report,
    })
}

/// Detectors active for an ad hoc document run.
#[derive(Clone, Default)]
pub struct Detectors {
    pub rule: Option<RuleBasedDetector>,
    pub oracle: Option<Arc<dyn OracleDetector>>,
}

/// Analyze segmented candidates in document order. No candidates is reported
/// explicitly and no detector is called.
pub async fn analyze_document(
    candidates: &[String],
    detectors: &Detectors,
    show_rewrite: bool,
    notes: Vec<String>,
    options: OracleRunOptions,
) -> DocumentAnalysis {
    if candidates.is_empty() {
        info!("[ORCHESTRATOR] no candidate requirements found");
        return DocumentAnalysis::NoCandidates;
    }

    let rule_verdicts: Vec<_> = match &detectors.rule {
        Some(detector) => candidates.iter().map(|c| Some(detector.analyze(c))).collect(),
        None => vec![None; candidates.len()],
    };

    let oracle_verdicts: Vec<Option<OracleVerdict>> = match &detectors.oracle {
        Some(oracle) => classify_all(oracle.clone(), candidates, options)
            .await
            .into_iter()
            .map(Some)
            .collect(),
        None => vec![None; candidates.len()],
    };

    let reports: Vec<CandidateReport> = candidates
        .iter()
        .zip(rule_verdicts.into_iter().zip(oracle_verdicts))
        .enumerate()
        .map(|(i, (text, (rule_based, llm)))| {
            let rewrite = llm
                .as_ref()
                .and_then(|v| v.suggested_rewrite())
                .filter(|_| show_rewrite)
                .map(str::to_string);
            CandidateReport {
                index: i + 1,
                text: text.clone(),
                rule_based,
                llm,
                rewrite,
            }
        })
        .collect();

    let flagged = reports
        .iter()
        .filter(|r| {
            r.rule_based.as_ref().is_some_and(|v| v.has_issue)
                || r.llm.as_ref().is_some_and(|v| v.label == Label::Ambiguous)
        })
        .count();
    info!(
        "[ORCHESTRATOR] analyzed {} candidates, {} flagged",
        reports.len(),
        flagged
    );

    DocumentAnalysis::Reports {
        candidates: reports,
        notes,
        show_rewrite,
    }
}

/// Reading-time savings for every rewrite in an analysis.
pub fn collect_time_savings(analysis: &DocumentAnalysis) -> TimeSavings {
    let mut savings = TimeSavings::new();
    if let DocumentAnalysis::Reports { candidates, .. } = analysis {
        for report in candidates {
            if let Some(rewrite) = &report.rewrite {
                savings.record(&report.text, rewrite);
            }
        }
    }
    savings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::oracle::StubOracle;
    use crate::services::requirement_segmenter::{SegmentMode, Segmenter, SegmenterConfig};
    use async_trait::async_trait;

    fn dataset() -> Vec<LabeledRequirement> {
        [
            ("R1", "The system shall be fast.", "ambiguous"),
            ("R2", "The system shall respond within 200 ms for 99% of requests.", "clear"),
            ("R3", "Backups run as needed.", "ambiguous"),
        ]
        .iter()
        .map(|(id, text, label)| LabeledRequirement {
            id: id.to_string(),
            text: text.to_string(),
            label: label.to_string(),
        })
        .collect()
    }

    /// Sleeps longer for earlier items so completions arrive out of order.
    struct ReverseLatencyOracle;

    #[async_trait]
    impl OracleDetector for ReverseLatencyOracle {
        async fn classify(&self, text: &str) -> OracleVerdict {
            let n: u64 = text.trim_start_matches("item ").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(50 - n * 5)).await;
            OracleVerdict {
                label: if n % 2 == 0 { Label::Clear } else { Label::Ambiguous },
                reason: text.to_string(),
                rewrite: None,
            }
        }

        fn name(&self) -> String {
            "reverse".to_string()
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl OracleDetector for SlowOracle {
        async fn classify(&self, _text: &str) -> OracleVerdict {
            tokio::time::sleep(Duration::from_secs(5)).await;
            OracleVerdict {
                label: Label::Clear,
                reason: "late".to_string(),
                rewrite: None,
            }
        }

        fn name(&self) -> String {
            "slow".to_string()
        }
    }

    #[test]
    fn test_selection_parsing_and_rewrite_upgrade() {
        assert_eq!("LLM".parse::<DetectorSelection>(), Ok(DetectorSelection::Llm));
        assert!("neither".parse::<DetectorSelection>().is_err());

        let (sel, note) = DetectorSelection::Rule.with_rewrite(true);
        assert_eq!(sel, DetectorSelection::Both);
        assert_eq!(note, Some(REWRITE_ENABLES_LLM_NOTE));

        let (sel, note) = DetectorSelection::Llm.with_rewrite(true);
        assert_eq!(sel, DetectorSelection::Llm);
        assert!(note.is_none());
    }

    #[test]
    fn test_run_rule_based_preserves_order() {
        let labels = run_rule_based(&RuleBasedDetector::default(), &dataset());
        assert_eq!(labels, vec![Label::Ambiguous, Label::Clear, Label::Ambiguous]);
    }

    #[tokio::test]
    async fn test_classify_all_preserves_input_order() {
        let texts: Vec<String> = (0..10).map(|i| format!("item {}", i)).collect();
        let options = OracleRunOptions {
            max_concurrency: 10,
            timeout: Duration::from_secs(5),
        };
        let verdicts = classify_all(Arc::new(ReverseLatencyOracle), &texts, options).await;
        let reasons: Vec<_> = verdicts.iter().map(|v| v.reason.clone()).collect();
        assert_eq!(reasons, texts);
        assert_eq!(verdicts[1].label, Label::Ambiguous);
        assert_eq!(verdicts[2].label, Label::Clear);
    }

    #[tokio::test]
    async fn test_classify_all_timeout_yields_fallback() {
        let options = OracleRunOptions {
            max_concurrency: 2,
            timeout: Duration::from_millis(20),
        };
        let verdicts = classify_all(Arc::new(SlowOracle), &["only".to_string()], options).await;
        assert_eq!(verdicts, vec![OracleVerdict::fallback()]);
    }

    #[tokio::test]
    async fn test_run_experiment() {
        let reqs = dataset();
        let oracle = Arc::new(StubOracle::fixed(Label::Ambiguous, "always", None));
        let outcome = run_experiment(&reqs, &RuleBasedDetector::default(), oracle, OracleRunOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.rule_based.name, RULE_BASED_REPORT_NAME);
        assert_eq!(outcome.rule_based.f1, 1.0);
        assert_eq!(outcome.llm.recall, 1.0);
        assert!((outcome.llm.precision - 2.0 / 3.0).abs() < 1e-12);

        assert_eq!(outcome.rows.len(), 3);
        assert_eq!(outcome.rows[1].id, "R2");
        assert_eq!(outcome.rows[1].gold, "clear");
        assert_eq!(outcome.rows[1].rule_based, Label::Clear);
        assert_eq!(outcome.rows[1].llm, Label::Ambiguous);
    }

    #[tokio::test]
    async fn test_run_experiment_rejects_bad_gold_label() {
        let mut reqs = dataset();
        reqs[0].label = "maybe".to_string();
        let oracle = Arc::new(StubOracle::fixed(Label::Clear, "", None));
        let err = run_experiment(&reqs, &RuleBasedDetector::default(), oracle, OracleRunOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, EvaluationError::InvalidLabel("maybe".to_string()));
    }

    #[tokio::test]
    async fn test_analyze_document_no_candidates() {
        let detectors = Detectors {
            rule: Some(RuleBasedDetector::default()),
            oracle: None,
        };
        let analysis = analyze_document(&[], &detectors, false, vec![], OracleRunOptions::default()).await;
        assert!(matches!(analysis, DocumentAnalysis::NoCandidates));
    }

    #[tokio::test]
    async fn test_end_to_end_sentence_segmentation() {
        let segmenter = Segmenter::new(SegmenterConfig {
            mode: SegmentMode::Sentence,
            ..SegmenterConfig::default()
        });
        let candidates = segmenter.segment("The system shall process requests quickly. It must be reliable.");
        assert_eq!(candidates.len(), 2);

        let detectors = Detectors {
            rule: Some(RuleBasedDetector::default()),
            oracle: None,
        };
        let analysis = analyze_document(&candidates, &detectors, false, vec![], OracleRunOptions::default()).await;
        let DocumentAnalysis::Reports { candidates: reports, .. } = analysis else {
            panic!("expected reports");
        };

        let first = reports[0].rule_based.as_ref().unwrap();
        assert!(first.has_issue);
        assert!(first.reasons.contains(&"Contains vague term \"quickly\"".to_string()));
        let second = reports[1].rule_based.as_ref().unwrap();
        assert!(second.has_issue);
        assert!(second.reasons.contains(&"Contains vague term \"reliable\"".to_string()));
        assert_eq!(reports[1].index, 2);
    }

    #[tokio::test]
    async fn test_end_to_end_quantified_requirement_is_clear() {
        let candidates = Segmenter::default().segment("The system shall respond within 200 ms for 99% of requests.");
        let detectors = Detectors {
            rule: Some(RuleBasedDetector::default()),
            oracle: None,
        };
        let analysis = analyze_document(&candidates, &detectors, false, vec![], OracleRunOptions::default()).await;
        let DocumentAnalysis::Reports { candidates: reports, .. } = analysis else {
            panic!("expected reports");
        };
        let verdict = reports[0].rule_based.as_ref().unwrap();
        assert!(!verdict.has_issue);
        assert!(verdict.reasons.is_empty());
    }

    #[tokio::test]
    async fn test_rewrites_attached_only_when_requested_and_ambiguous() {
        let candidates = vec![
            "The dashboard shall load fast.".to_string(),
            "The export shall complete within 10 s.".to_string(),
        ];
        let oracle = StubOracle::scripted(
            [
                (
                    "The dashboard shall load fast.",
                    r#"{"label":"ambiguous","reason":"fast is vague","rewrite":"The dashboard shall load within 2 s."}"#,
                ),
                (
                    "The export shall complete within 10 s.",
                    r#"{"label":"clear","reason":"measurable","rewrite":"unused"}"#,
                ),
            ],
            "",
        );
        let detectors = Detectors {
            rule: None,
            oracle: Some(Arc::new(oracle)),
        };

        let analysis = analyze_document(&candidates, &detectors, true, vec![], OracleRunOptions::default()).await;
        let savings = collect_time_savings(&analysis);
        let DocumentAnalysis::Reports { candidates: reports, .. } = &analysis else {
            panic!("expected reports");
        };
        assert_eq!(reports[0].rewrite.as_deref(), Some("The dashboard shall load within 2 s."));
        assert_eq!(reports[1].rewrite, None);
        assert!(reports[0].rule_based.is_none());
        assert_eq!(savings.total_rewrites(), 1);

        let quiet = analyze_document(&candidates, &detectors, false, vec![], OracleRunOptions::default()).await;
        let DocumentAnalysis::Reports { candidates: reports, .. } = quiet else {
            panic!("expected reports");
        };
        assert_eq!(reports[0].rewrite, None);
    }
}
