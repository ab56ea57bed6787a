// Reading-Time Savings
// Tracks how much reading time accepted rewrites would save.

use serde::{Deserialize, Serialize};

/// Average reading speed of a college-educated reader.
pub const WORDS_READ_PER_MINUTE: f64 = 250.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub original_requirement: String,
    pub original_length: usize,
    pub original_reading_time: f64,
    pub suggested_rewrite: String,
    pub suggested_length: usize,
    pub suggested_reading_time: f64,
    pub length_difference: usize,
    /// Minutes; positive when the rewrite is faster to read.
    pub reading_time_difference: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSavings {
    history: Vec<Suggestion>,
}

fn word_len(text: &str) -> usize {
    text.split(' ').count()
}

impl TimeSavings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one rewrite and return the minutes it would save (may be negative).
    pub fn record(&mut self, requirement: &str, rewrite: &str) -> f64 {
        let original_length = word_len(requirement);
        let suggested_length = word_len(rewrite);
        let original_reading_time = original_length as f64 / WORDS_READ_PER_MINUTE;
        let suggested_reading_time = suggested_length as f64 / WORDS_READ_PER_MINUTE;
        let reading_time_difference = original_reading_time - suggested_reading_time;

        self.history.push(Suggestion {
            original_requirement: requirement.to_string(),
            original_length,
            original_reading_time,
            suggested_rewrite: rewrite.to_string(),
            suggested_length,
            suggested_reading_time,
            length_difference: original_length.abs_diff(suggested_length),
            reading_time_difference,
        });

        reading_time_difference
    }

    pub fn total_rewrites(&self) -> usize {
        self.history.len()
    }

    pub fn total_minutes_saved(&self) -> f64 {
        self.history.iter().map(|h| h.reading_time_difference).sum()
    }

    pub fn history(&self) -> &[Suggestion] {
        &self.history
    }

    pub fn render_summary(&self) -> String {
        format!(
            "{}\n\nTime Savings Summary:\n\n{} rewrites were suggested\n\n{:.3} minutes of human reading time could be saved by accepting all suggested edits.\n",
            "=".repeat(80),
            self.total_rewrites(),
            self.total_minutes_saved()
        )
    }
}
