// LLM Analyzer
// Production oracle: asks a chat model whether a requirement is clear or
// ambiguous and for a measurable rewrite. Failures degrade to the fallback verdict.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::OracleVerdict;
use crate::services::config_store::AppConfig;
use crate::services::providers::{resolve_provider, ProviderClient, ProviderError, ResolvedProvider};

use super::oracle::{parse_oracle_output, OracleDetector};

const ORACLE_MAX_TOKENS: i32 = 512;

/// System prompt for single requirement classification
const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are an expert requirements engineer.

Given a single software or ML system requirement, you MUST:

1. Decide whether it is CLEAR or AMBIGUOUS.
2. Give a short explanation (reason).
3. If it is AMBIGUOUS, propose a clearer rewrite that:
   - Uses measurable, testable language.
   - Adds thresholds/units where appropriate.
   - Keeps the original intent.

Output MUST be a JSON object with fields:
- "label": "clear" or "ambiguous"
- "reason": string
- "rewrite": string or null

If the requirement is already clear, set "rewrite" to null."#;

fn user_prompt(text: &str) -> String {
    format!(
        "Requirement:\n\"{}\"\n\nRespond ONLY with the JSON object described above.",
        text
    )
}

pub struct LlmOracle {
    client: ProviderClient,
    provider: ResolvedProvider,
}

impl LlmOracle {
    pub fn new(client: ProviderClient, provider: ResolvedProvider) -> Self {
        Self { client, provider }
    }

    /// Build from config: resolves provider/model/key and applies proxy + timeout.
    pub fn from_config(requested: Option<&str>, config: &AppConfig) -> Result<Self, ProviderError> {
        let provider = resolve_provider(requested, config)?;
        let timeout = Duration::from_secs(config.oracle.timeout_secs.max(1));
        let client = match config.active_proxy() {
            Some(proxy) => ProviderClient::with_proxy(proxy, timeout)?,
            None => ProviderClient::new(timeout),
        };
        info!("[ORACLE] using provider {}", provider.label());
        Ok(Self::new(client, provider))
    }
}

#[async_trait]
impl OracleDetector for LlmOracle {
    async fn classify(&self, text: &str) -> OracleVerdict {
        let result = self
            .client
            .call(&self.provider, CLASSIFY_SYSTEM_PROMPT, &user_prompt(text), ORACLE_MAX_TOKENS)
            .await;

        match result {
            Ok(chat_result) => {
                debug!(
                    "[ORACLE] {} ok latency_ms={}",
                    self.provider.label(),
                    chat_result.latency_ms
                );
                parse_oracle_output(&chat_result.content)
            }
            Err(e) => {
                warn!("[ORACLE] {} call failed: {}", self.provider.label(), e);
                OracleVerdict::fallback()
            }
        }
    }

    fn name(&self) -> String {
        self.provider.label()
    }
}
