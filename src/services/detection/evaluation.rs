// Label Evaluation
// Scores predicted labels against gold labels, `ambiguous` as positive class.

use std::fmt;
use thiserror::Error;
use tracing::info;

use crate::models::{ClassMetrics, ClassificationReport, EvaluationReport, Label, LabeledRequirement};

#[derive(Error, Debug, PartialEq)]
pub enum EvaluationError {
    #[error("Gold and predicted label counts differ: {gold} gold vs {predicted} predicted")]
    LengthMismatch { gold: usize, predicted: usize },
    #[error("Invalid label {0:?}; expected \"clear\" or \"ambiguous\"")]
    InvalidLabel(String),
}

/// Map labels to `clear = 0`, `ambiguous = 1`, rejecting anything else.
/// Matching is exact: callers normalise before evaluating.
pub fn encode_labels<S: AsRef<str>>(labels: &[S]) -> Result<Vec<u8>, EvaluationError> {
    labels
        .iter()
        .map(|l| match l.as_ref() {
            "clear" => Ok(Label::Clear.encode()),
            "ambiguous" => Ok(Label::Ambiguous.encode()),
            other => Err(EvaluationError::InvalidLabel(other.to_string())),
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
struct Confusion {
    tp: usize,
    fp: usize,
    fn_: usize,
    tn: usize,
}

impl Confusion {
    fn tally(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut c = Confusion::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => c.tp += 1,
                (0, 1) => c.fp += 1,
                (1, 0) => c.fn_ += 1,
                _ => c.tn += 1,
            }
        }
        c
    }

    fn positive(&self) -> ClassMetrics {
        class_metrics(self.tp, self.fp, self.fn_)
    }

    /// Metrics for `clear`, i.e. with the roles of the classes swapped.
    fn negative(&self) -> ClassMetrics {
        class_metrics(self.tn, self.fn_, self.fp)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn class_metrics(tp: usize, fp: usize, fn_: usize) -> ClassMetrics {
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    ClassMetrics {
        precision,
        recall,
        f1: f1(precision, recall),
        support: tp + fn_,
    }
}

fn macro_average(a: &ClassMetrics, b: &ClassMetrics) -> ClassMetrics {
    ClassMetrics {
        precision: (a.precision + b.precision) / 2.0,
        recall: (a.recall + b.recall) / 2.0,
        f1: (a.f1 + b.f1) / 2.0,
        support: a.support + b.support,
    }
}

fn weighted_average(a: &ClassMetrics, b: &ClassMetrics) -> ClassMetrics {
    let total = a.support + b.support;
    if total == 0 {
        return ClassMetrics::default();
    }
    let wa = a.support as f64 / total as f64;
    let wb = b.support as f64 / total as f64;
    ClassMetrics {
        precision: a.precision * wa + b.precision * wb,
        recall: a.recall * wa + b.recall * wb,
        f1: a.f1 * wa + b.f1 * wb,
        support: total,
    }
}

/// Evaluate predictions matched to gold requirements by position.
pub fn evaluate<S: AsRef<str>>(
    name: &str,
    gold: &[LabeledRequirement],
    predicted: &[S],
) -> Result<EvaluationReport, EvaluationError> {
    if gold.len() != predicted.len() {
        return Err(EvaluationError::LengthMismatch {
            gold: gold.len(),
            predicted: predicted.len(),
        });
    }

    let gold_labels: Vec<&str> = gold.iter().map(|r| r.label.as_str()).collect();
    let y_true = encode_labels(&gold_labels)?;
    let y_pred = encode_labels(predicted)?;

    let confusion = Confusion::tally(&y_true, &y_pred);
    let ambiguous = confusion.positive();
    let clear = confusion.negative();

    let report = EvaluationReport {
        name: name.to_string(),
        precision: ambiguous.precision,
        recall: ambiguous.recall,
        f1: ambiguous.f1,
        classes: ClassificationReport {
            clear,
            ambiguous,
            accuracy: ratio(confusion.tp + confusion.tn, y_true.len()),
            macro_avg: macro_average(&clear, &ambiguous),
            weighted_avg: weighted_average(&clear, &ambiguous),
        },
    };

    info!(
        "[EVALUATION] {} n={} precision={:.3} recall={:.3} f1={:.3}",
        name,
        y_true.len(),
        report.precision,
        report.recall,
        report.f1
    );
    Ok(report)
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn row(f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics) -> fmt::Result {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, m.precision, m.recall, m.f1, m.support
            )
        }

        writeln!(f, "{:>12} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        row(f, "clear", &self.clear)?;
        row(f, "ambiguous", &self.ambiguous)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.weighted_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.name)?;
        writeln!(f, "Precision (ambiguous): {:.3}", self.precision)?;
        writeln!(f, "Recall    (ambiguous): {:.3}", self.recall)?;
        writeln!(f, "F1        (ambiguous): {:.3}", self.f1)?;
        writeln!(f)?;
        writeln!(f, "Detailed report:")?;
        write!(f, "{}", self.classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold(labels: &[&str]) -> Vec<LabeledRequirement> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| LabeledRequirement {
                id: format!("R{}", i + 1),
                text: format!("Requirement number {}", i + 1),
                label: l.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_perfect_ambiguous_predictions() {
        let labels = ["ambiguous"; 4];
        let report = evaluate("perfect", &gold(&labels), &labels).unwrap();
        assert_eq!(report.precision, 1.0);
        assert_eq!(report.recall, 1.0);
        assert_eq!(report.f1, 1.0);
        assert_eq!(report.classes.ambiguous.support, 4);
        assert_eq!(report.classes.clear.support, 0);
        assert_eq!(report.classes.accuracy, 1.0);
    }

    #[test]
    fn test_complementary_predictions_score_zero() {
        let gold_labels = ["clear", "ambiguous", "clear", "ambiguous"];
        let predicted = ["ambiguous", "clear", "ambiguous", "clear"];
        let report = evaluate("inverse", &gold(&gold_labels), &predicted).unwrap();
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
        assert_eq!(report.classes.accuracy, 0.0);
    }

    #[test]
    fn test_no_predicted_positives_is_zero_not_nan() {
        let gold_labels = ["ambiguous", "clear"];
        let predicted = ["clear", "clear"];
        let report = evaluate("none flagged", &gold(&gold_labels), &predicted).unwrap();
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
        assert!(!report.classes.clear.precision.is_nan());
        assert_eq!(report.classes.clear.precision, 0.5);
        assert_eq!(report.classes.clear.recall, 1.0);
    }

    #[test]
    fn test_mixed_predictions() {
        // tp=2 fp=1 fn=1 tn=1
        let gold_labels = ["ambiguous", "ambiguous", "ambiguous", "clear", "clear"];
        let predicted = ["ambiguous", "ambiguous", "clear", "ambiguous", "clear"];
        let report = evaluate("mixed", &gold(&gold_labels), &predicted).unwrap();
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.f1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.classes.clear.support, 2);
        assert!((report.classes.clear.precision - 0.5).abs() < 1e-12);
        assert!((report.classes.accuracy - 0.6).abs() < 1e-12);
        assert_eq!(report.classes.weighted_avg.support, 5);
    }

    #[test]
    fn test_length_mismatch() {
        let gold_labels = ["clear"; 5];
        let predicted = ["clear"; 4];
        let err = evaluate("short", &gold(&gold_labels), &predicted).unwrap_err();
        assert_eq!(err, EvaluationError::LengthMismatch { gold: 5, predicted: 4 });
    }

    #[test]
    fn test_invalid_labels_rejected() {
        let err = evaluate("bad gold", &gold(&["clear", "unsure"]), &["clear", "clear"]).unwrap_err();
        assert_eq!(err, EvaluationError::InvalidLabel("unsure".to_string()));

        let err = evaluate("bad pred", &gold(&["clear"]), &["maybe"]).unwrap_err();
        assert_eq!(err, EvaluationError::InvalidLabel("maybe".to_string()));
    }

    #[test]
    fn test_labels_must_match_exactly() {
        assert_eq!(encode_labels(&["clear", "ambiguous"]), Ok(vec![0, 1]));
        assert_eq!(encode_labels(&["Clear"]), Err(EvaluationError::InvalidLabel("Clear".to_string())));

        let err = evaluate("padded", &gold(&["ambiguous"]), &["  AMBIGUOUS "]).unwrap_err();
        assert_eq!(err, EvaluationError::InvalidLabel("  AMBIGUOUS ".to_string()));
    }

    #[test]
    fn test_empty_inputs_are_valid() {
        let empty: [&str; 0] = [];
        let report = evaluate("empty", &[], &empty).unwrap();
        assert_eq!(report.f1, 0.0);
        assert_eq!(report.classes.accuracy, 0.0);
    }

    #[test]
    fn test_report_display() {
        let labels = ["ambiguous", "clear"];
        let report = evaluate("Rule-Based Baseline", &gold(&labels), &labels).unwrap();
        let rendered = report.to_string();
        assert!(rendered.starts_with("=== Rule-Based Baseline ==="));
        assert!(rendered.contains("Precision (ambiguous): 1.000"));
        assert!(rendered.contains("weighted avg"));
    }
}
