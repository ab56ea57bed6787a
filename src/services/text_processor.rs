// Text Processing Service
// Normalisation and sentence splitting shared by the segmenter

use regex::Regex;
use std::sync::LazyLock;

static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{3000}\u{00A0}\u{2007}\u{202F}]").expect("valid regex"));
static HORIZONTAL_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x0C\x0B]+").expect("valid regex"));

/// Normalize punctuation and whitespace before segmentation.
/// Line structure is preserved; only characters within a line are rewritten.
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text.to_string();

    // Replace smart quotes
    s = s.replace('\u{201c}', "\"")
         .replace('\u{201d}', "\"")
         .replace('\u{2018}', "'")
         .replace('\u{2019}', "'");

    // Bullet variants collapse to the canonical bullet
    s = s.replace('\u{25CF}', "\u{2022}").replace('\u{25E6}', "\u{2022}");

    s = SPACE_RE.replace_all(&s, " ").to_string();

    // Normalize line endings
    s = s.replace("\r\n", "\n").replace('\r', "\n");

    s = HORIZONTAL_WS_RE.replace_all(&s, " ").to_string();

    s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split a paragraph into sentences at `.`, `!` or `?` followed by whitespace.
/// Terminators inside quotes or between digits (decimals) do not split.
pub fn split_sentences(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut buffer = String::new();
    let mut in_quote = false;

    for (i, &ch) in chars.iter().enumerate() {
        buffer.push(ch);

        if ch == '"' {
            in_quote = !in_quote;
            continue;
        }

        if !matches!(ch, '.' | '!' | '?') || in_quote {
            continue;
        }

        let next = chars.get(i + 1).copied();
        if ch == '.' && i > 0 && chars[i - 1].is_ascii_digit() && next.is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }

        if next.is_none_or(|c| c.is_whitespace()) {
            let sentence = buffer.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            buffer.clear();
        }
    }

    let remaining = buffer.trim();
    if !remaining.is_empty() {
        sentences.push(remaining.to_string());
    }

    sentences
}

/// Shorten text for log lines and console previews.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let input = "Hello\u{201c}World\u{201d}";
        let output = normalize_punctuation(input);
        assert_eq!(output, "Hello\"World\"");
    }

    #[test]
    fn test_normalize_keeps_line_structure() {
        let input = "  1.\tFirst\u{00A0}item  \r\n\r\n\u{25CF} second ";
        assert_eq!(normalize_punctuation(input), "1. First item\n\n\u{2022} second");
    }

    #[test]
    fn test_split_sentences_on_terminators() {
        let sentences = split_sentences("The system shall process requests quickly. It must be reliable.");
        assert_eq!(
            sentences,
            vec![
                "The system shall process requests quickly.".to_string(),
                "It must be reliable.".to_string()
            ]
        );
    }

    #[test]
    fn test_split_sentences_keeps_decimals_and_quotes() {
        let sentences = split_sentences("Latency shall stay below 2.5 s. Label it \"Done. Now\" afterwards");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "Latency shall stay below 2.5 s.");
        assert_eq!(sentences[1], "Label it \"Done. Now\" afterwards");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  one two\tthree\n"), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ab\ncd", 10), "ab cd");
    }
}
