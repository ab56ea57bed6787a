// ReqLens Core Services

pub mod text_processor;
pub mod config_store;
pub mod providers;
pub mod detection;
pub mod requirement_segmenter;
pub mod document_loader;
pub mod dataset;
pub mod report;
pub mod time_savings;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;
pub use requirement_segmenter::*;

pub use document_loader::{load_document, LoadError};
pub use dataset::{load_requirements, write_comparison_tsv, DatasetError};
pub use report::{render_document_report, render_evaluation, RunDirectory};
pub use time_savings::TimeSavings;

pub use detection::{
    analyze_document,
    evaluate,
    run_experiment,
    DetectorSelection,
    Detectors,
    LlmOracle,
    OracleDetector,
    OracleRunOptions,
    RuleBasedDetector,
    StubOracle,
};
