use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use reqlens::services::detection::collect_time_savings;
use reqlens::services::{
    analyze_document, load_default_config, load_document, load_requirements, render_document_report,
    render_evaluation, run_experiment, write_comparison_tsv, AppConfig, DetectorSelection, Detectors, LlmOracle,
    OracleDetector, OracleRunOptions, RuleBasedDetector, RunDirectory, SegmentMode, Segmenter,
};

#[derive(Parser)]
#[command(name = "reqlens")]
#[command(about = "Flag ambiguous natural-language requirements")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a .txt, .pdf or .docx file of requirements
    Analyze {
        /// Path to the document
        file: PathBuf,

        /// Which detector to run: rule, llm or both
        #[arg(long, default_value = "both")]
        detector: DetectorSelection,

        /// Show LLM rewrite suggestions (enables the LLM detector)
        #[arg(long)]
        rewrite: bool,

        /// Oracle provider as name[:model]
        #[arg(long)]
        provider: Option<String>,

        /// Segmentation mode (defaults to the configured one)
        #[arg(long, value_enum)]
        mode: Option<SegmentMode>,

        /// Root directory for saved analyses
        #[arg(long, default_value = "analyze_results")]
        out_dir: PathBuf,
    },
    /// Score both detectors against a labeled CSV dataset
    Experiment {
        /// Labeled CSV with id,text,label columns
        #[arg(long, default_value = "data/mixed_requirements.csv")]
        data: PathBuf,

        /// Per-requirement comparison table
        #[arg(long, default_value = "results_comparison.tsv")]
        out: PathBuf,

        /// Oracle provider as name[:model]
        #[arg(long)]
        provider: Option<String>,
    },
}

fn load_config() -> AppConfig {
    match load_default_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("Config unavailable, using defaults: {}", e);
            AppConfig::default()
        }
    }
}

fn oracle_options(config: &AppConfig) -> OracleRunOptions {
    OracleRunOptions {
        max_concurrency: config.oracle.max_concurrency,
        timeout: Duration::from_secs(config.oracle.timeout_secs.max(1)),
    }
}

fn build_oracle(provider: Option<&str>, config: &AppConfig) -> anyhow::Result<Arc<dyn OracleDetector>> {
    match LlmOracle::from_config(provider, config) {
        Ok(oracle) => Ok(Arc::new(oracle)),
        Err(e) => bail!(
            "LLM detector unavailable: {}. Set OPENAI_API_KEY (or DEEPSEEK_API_KEY, GLM_API_KEY, ANTHROPIC_API_KEY) or run with --detector rule",
            e
        ),
    }
}

async fn analyze(
    file: &Path,
    detector: DetectorSelection,
    rewrite: bool,
    provider: Option<&str>,
    mode: Option<SegmentMode>,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let config = load_config();
    let raw_text = load_document(file).with_context(|| format!("Failed to load {}", file.display()))?;

    let mut segmenter_config = config.detection.segmenter_config();
    if let Some(mode) = mode {
        segmenter_config.mode = mode;
    }
    let candidates = Segmenter::new(segmenter_config).segment(&raw_text);

    let (selection, note) = detector.with_rewrite(rewrite);
    let notes: Vec<String> = note.into_iter().map(str::to_string).collect();

    let detectors = Detectors {
        rule: selection
            .uses_rule()
            .then(|| RuleBasedDetector::new(&config.detection.lexicon)),
        oracle: if selection.uses_llm() && !candidates.is_empty() {
            Some(build_oracle(provider, &config)?)
        } else {
            None
        },
    };

    let analysis = analyze_document(&candidates, &detectors, rewrite, notes, oracle_options(&config)).await;

    let mut rendered = render_document_report(file, &analysis);
    let savings = collect_time_savings(&analysis);
    if savings.total_rewrites() > 0 {
        rendered.push_str(&savings.render_summary());
    }
    print!("{}", rendered);

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let run_dir = RunDirectory::create(out_dir, &stem)
        .with_context(|| format!("Failed to create run directory under {}", out_dir.display()))?;
    let log_path = run_dir.write_analysis(&rendered)?;

    println!("Full analysis output saved to: {}", log_path.display());
    println!("Run directory: {}", run_dir.path().display());
    Ok(())
}

async fn experiment(data: &Path, out: &Path, provider: Option<&str>) -> anyhow::Result<()> {
    let config = load_config();
    let requirements = load_requirements(data)?;
    let rule_detector = RuleBasedDetector::new(&config.detection.lexicon);
    let oracle = build_oracle(provider, &config)?;

    let outcome = run_experiment(&requirements, &rule_detector, oracle, oracle_options(&config)).await?;
    println!("{}", render_evaluation(&outcome));

    write_comparison_tsv(out, &outcome.rows)?;
    println!("\nPer-requirement comparison written to: {}", out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    reqlens::init_logging();

    match cli.command {
        Commands::Analyze {
            file,
            detector,
            rewrite,
            provider,
            mode,
            out_dir,
        } => {
            info!("[ORCHESTRATOR] analyze {} detector={:?}", file.display(), detector);
            analyze(&file, detector, rewrite, provider.as_deref(), mode, &out_dir).await
        }
        Commands::Experiment { data, out, provider } => {
            info!("[ORCHESTRATOR] experiment data={}", data.display());
            experiment(&data, &out, provider.as_deref()).await
        }
    }
}
