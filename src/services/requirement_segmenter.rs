// Requirement Segmenter
// Turns raw document text into ordered candidate requirements.
// Structural cues (numbered items, bullets, blank lines) drive the split;
// sentence splitting is kept only as a fallback mode.

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use super::text_processor::{normalize_punctuation, split_sentences};

/// Candidates shorter than this (in chars) are treated as headers or noise.
pub const DEFAULT_MIN_CANDIDATE_CHARS: usize = 20;

static NUMBERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s+").expect("valid regex"));
static BULLET_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-\u{2022}*]\s+").expect("valid regex"));
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").expect("valid regex"));

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    /// Numbered/bulleted items and blank-line paragraphs.
    #[default]
    Structural,
    /// Structural paragraphs further split at sentence terminators.
    #[value(alias = "sentences")]
    Sentence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmenterConfig {
    #[serde(default = "default_min_chars")]
    pub min_candidate_chars: usize,
    #[serde(default)]
    pub mode: SegmentMode,
}

fn default_min_chars() -> usize {
    DEFAULT_MIN_CANDIDATE_CHARS
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_candidate_chars: DEFAULT_MIN_CANDIDATE_CHARS,
            mode: SegmentMode::Structural,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment raw text into candidate requirements, preserving document order.
    pub fn segment(&self, raw_text: &str) -> Vec<String> {
        let text = normalize_punctuation(raw_text);
        let mut candidates = Vec::new();
        let mut buffer: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                self.flush(&mut buffer, &mut candidates);
                continue;
            }

            if starts_new_item(line) {
                self.flush(&mut buffer, &mut candidates);
            }
            buffer.push(line);
        }

        self.flush(&mut buffer, &mut candidates);

        debug!(
            "[SEGMENTER] mode={:?} min_chars={} candidates={}",
            self.config.mode,
            self.config.min_candidate_chars,
            candidates.len()
        );
        candidates
    }

    fn flush(&self, buffer: &mut Vec<&str>, out: &mut Vec<String>) {
        if buffer.is_empty() {
            return;
        }

        let joined = buffer.join(" ");
        buffer.clear();
        let stripped = LEADING_NUMBER_RE.replace(joined.trim(), "");
        let paragraph = stripped.trim();

        match self.config.mode {
            SegmentMode::Structural => self.push_if_long_enough(paragraph, out),
            SegmentMode::Sentence => {
                for sentence in split_sentences(paragraph) {
                    self.push_if_long_enough(&sentence, out);
                }
            }
        }
    }

    fn push_if_long_enough(&self, candidate: &str, out: &mut Vec<String>) {
        let candidate = candidate.trim();
        if candidate.chars().count() >= self.config.min_candidate_chars {
            out.push(candidate.to_string());
        }
    }
}

fn starts_new_item(line: &str) -> bool {
    NUMBERED_ITEM_RE.is_match(line) || BULLET_ITEM_RE.is_match(line)
}

/// Segment with the default configuration.
pub fn split_into_candidate_requirements(raw_text: &str) -> Vec<String> {
    Segmenter::default().segment(raw_text)
}
