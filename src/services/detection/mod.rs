// Detection Module
// Ambiguity detection core logic organized into specialized submodules:
// - rule_based: lexicon + pattern detector (QuARS-style baseline)
// - oracle: external classifier boundary, output parser and test stub
// - llm_analyzer: production oracle over a chat-completion provider
// - evaluation: precision/recall/F1 against gold labels
// - orchestrator: experiment and document pipelines

pub mod rule_based;
pub mod oracle;
pub mod llm_analyzer;
pub mod evaluation;
pub mod orchestrator;

pub use rule_based::{default_lexicon, RuleBasedDetector, DEFAULT_AMBIGUOUS_TERMS};
pub use oracle::{parse_oracle_output, OracleDetector, StubOracle};
pub use llm_analyzer::LlmOracle;
pub use evaluation::{encode_labels, evaluate, EvaluationError};
pub use orchestrator::{
    analyze_document,
    classify_all,
    collect_time_savings,
    run_experiment,
    run_llm_based,
    run_rule_based,
    DetectorSelection,
    Detectors,
    OracleRunOptions,
};
