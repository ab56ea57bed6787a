// Oracle Detector Boundary
// The external classifier is an opaque capability: text in, verdict out.
// Everything it returns passes through `parse_oracle_output`, which never fails.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::models::{Label, OracleVerdict};

/// A clear/ambiguous classifier backed by something outside this crate.
/// Implementations must absorb their own failures and return
/// [`OracleVerdict::fallback`] instead of erroring.
#[async_trait]
pub trait OracleDetector: Send + Sync {
    async fn classify(&self, text: &str) -> OracleVerdict;

    /// Identifier used in logs and reports, e.g. `openai:gpt-4.1-mini`.
    fn name(&self) -> String;

    /// The rewrite when the requirement is ambiguous and one was proposed,
    /// otherwise the original text.
    async fn rewrite_only(&self, text: &str) -> String {
        let verdict = self.classify(text).await;
        match verdict.suggested_rewrite() {
            Some(rewrite) => rewrite.to_string(),
            None => text.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawVerdict {
    #[serde(default)]
    label: Option<Value>,
    #[serde(default)]
    reason: Option<Value>,
    #[serde(default)]
    rewrite: Option<Value>,
}

/// Parse and normalise a raw oracle response.
pub fn parse_oracle_output(raw: &str) -> OracleVerdict {
    let json_str = match extract_json(raw) {
        Some(s) => s,
        None => {
            warn!("[ORACLE] no JSON object in response: {:?}", crate::services::preview(raw, 80));
            return OracleVerdict::fallback();
        }
    };

    let parsed: RawVerdict = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("[ORACLE] JSON parse error: {}", e);
            return OracleVerdict::fallback();
        }
    };

    let label = parsed
        .label
        .as_ref()
        .map(value_to_string)
        .map(|l| Label::normalize(&l))
        .unwrap_or(Label::Ambiguous);
    let reason = parsed
        .reason
        .as_ref()
        .map(value_to_string)
        .unwrap_or_default()
        .trim()
        .to_string();
    let rewrite = parsed
        .rewrite
        .as_ref()
        .filter(|v| !v.is_null())
        .map(value_to_string)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    OracleVerdict { label, reason, rewrite }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strip Markdown fences and cut out the outermost JSON object.
fn extract_json(content: &str) -> Option<String> {
    let mut trimmed = content.trim();

    if trimmed.starts_with("```") {
        trimmed = trimmed.trim_matches('`').trim();
        if trimmed.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            trimmed = trimmed[4..].trim();
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(trimmed[start..=end].to_string())
}

/// Deterministic oracle used in tests and offline runs.
#[derive(Debug, Clone)]
pub enum StubOracle {
    /// Same verdict for every input.
    Fixed(OracleVerdict),
    /// Raw responses keyed by exact text; unknown texts get `default_raw`.
    Scripted {
        responses: HashMap<String, String>,
        default_raw: String,
    },
}

impl StubOracle {
    pub fn fixed(label: Label, reason: &str, rewrite: Option<&str>) -> Self {
        Self::Fixed(OracleVerdict {
            label,
            reason: reason.to_string(),
            rewrite: rewrite.map(|r| r.to_string()),
        })
    }

    pub fn scripted<I, K, V>(responses: I, default_raw: &str) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Scripted {
            responses: responses.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            default_raw: default_raw.to_string(),
        }
    }
}

#[async_trait]
impl OracleDetector for StubOracle {
    async fn classify(&self, text: &str) -> OracleVerdict {
        match self {
            StubOracle::Fixed(verdict) => verdict.clone(),
            StubOracle::Scripted { responses, default_raw } => {
                let raw = responses.get(text).unwrap_or(default_raw);
                parse_oracle_output(raw)
            }
        }
    }

    fn name(&self) -> String {
        "stub".to_string()
    }
}
