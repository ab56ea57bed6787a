use anyhow::Context;
use clap::Parser;
use reqlens::services::text_processor::{normalize_punctuation, preview, word_count};
use reqlens::services::{load_document, SegmentMode, Segmenter, SegmenterConfig};
use serde::Serialize;
use std::path::PathBuf;

/// Show how a document is segmented into candidate requirements.
#[derive(Parser)]
#[command(name = "segment_file")]
struct Args {
    /// .txt, .pdf or .docx file
    path: PathBuf,

    /// Segmentation mode
    #[arg(long, value_enum, default_value = "structural")]
    mode: SegmentMode,

    /// Number of candidates to print
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Write the full candidate list as JSON
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    index: usize,
    chars: usize,
    words: usize,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    file: String,
    mode: SegmentMode,
    extracted_chars: usize,
    extracted_bytes: usize,
    candidates: Vec<Candidate>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let raw = load_document(&args.path).with_context(|| format!("read file failed: {}", args.path.display()))?;
    let text = normalize_punctuation(&raw);
    let config = SegmenterConfig {
        mode: args.mode,
        ..SegmenterConfig::default()
    };
    let mode = config.mode;
    let segments = Segmenter::new(config).segment(&raw);

    println!("File: {}", args.path.display());
    println!("Extracted: {} chars ({} bytes)", text.chars().count(), text.len());
    println!("Mode: {:?}", mode);
    println!();
    println!("Candidates: {}", segments.len());
    for (i, s) in segments.iter().take(args.limit).enumerate() {
        println!("[R{:04}] chars={}  {}", i + 1, s.chars().count(), preview(s, 120));
    }
    if segments.len() > args.limit {
        println!("... ({} more candidates)", segments.len() - args.limit);
    }

    if let Some(out_path) = args.out {
        let out = Output {
            file: args.path.display().to_string(),
            mode,
            extracted_chars: text.chars().count(),
            extracted_bytes: text.len(),
            candidates: segments
                .into_iter()
                .enumerate()
                .map(|(i, text)| Candidate {
                    index: i + 1,
                    chars: text.chars().count(),
                    words: word_count(&text),
                    text,
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&out)?;
        std::fs::write(&out_path, json).with_context(|| format!("write out failed: {}", out_path.display()))?;
        println!();
        println!("Wrote JSON: {}", out_path.display());
    }

    Ok(())
}
