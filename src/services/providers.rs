// LLM Provider Service
// HTTP backends for the oracle detector: OpenAI-compatible chat APIs
// (OpenAI, DeepSeek, GLM) and the Anthropic Messages API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::config_store::AppConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const GLM_DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Providers tried in this order when none is requested explicitly.
pub const PROVIDER_PREFERENCE: &[&str] = &["openai", "deepseek", "glm", "anthropic"];

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured for provider {0}")]
    MissingApiKey(String),
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

/// Parse `name[:model]`. Model is empty when omitted.
pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.trim().splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: normalize_provider_name(parts[0]),
            model: parts[1].trim().to_string(),
        }
    } else {
        ProviderSpec {
            name: normalize_provider_name(spec),
            model: String::new(),
        }
    }
}

fn normalize_provider_name(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "claude" => "anthropic".to_string(),
        other => other.to_string(),
    }
}

pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "deepseek" => "deepseek-chat",
        "glm" => "glm-4-flash",
        "anthropic" => "claude-sonnet-4-20250514",
        _ => OPENAI_DEFAULT_MODEL,
    }
}

fn default_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some(OPENAI_DEFAULT_URL),
        "deepseek" => Some(DEEPSEEK_DEFAULT_URL),
        "glm" => Some(GLM_DEFAULT_URL),
        "anthropic" => Some(ANTHROPIC_DEFAULT_URL),
        _ => None,
    }
}

fn env_prefix(provider: &str) -> String {
    provider.to_uppercase()
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// A fully resolved backend: which provider, model, endpoint and key.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub name: String,
    pub model: String,
    pub url: String,
    pub api_key: String,
}

impl ResolvedProvider {
    pub fn label(&self) -> String {
        format!("{}:{}", self.name, self.model)
    }
}

/// Resolve a provider from an explicit spec, the configured default, or the
/// first provider in [`PROVIDER_PREFERENCE`] that has a key.
pub fn resolve_provider(requested: Option<&str>, config: &AppConfig) -> Result<ResolvedProvider, ProviderError> {
    let requested = requested
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| config.oracle.provider.clone().filter(|p| !p.trim().is_empty()));

    let spec = match requested {
        Some(p) => parse_provider(&p),
        None => {
            let name = PROVIDER_PREFERENCE
                .iter()
                .find(|name| get_api_key(name, config).is_some())
                .ok_or_else(|| ProviderError::MissingApiKey("any".to_string()))?;
            ProviderSpec {
                name: name.to_string(),
                model: String::new(),
            }
        }
    };

    let base = default_url(&spec.name).ok_or_else(|| ProviderError::UnsupportedProvider(spec.name.clone()))?;
    let api_key = get_api_key(&spec.name, config).ok_or_else(|| ProviderError::MissingApiKey(spec.name.clone()))?;

    let provider_config = config.providers.get(&spec.name);
    let model = if !spec.model.is_empty() {
        spec.model.clone()
    } else {
        provider_config
            .and_then(|p| p.model.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model(&spec.name).to_string())
    };
    let url = env::var(format!("{}_API_URL", env_prefix(&spec.name)))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| provider_config.and_then(|p| p.base_url.clone()))
        .unwrap_or_else(|| base.to_string());

    Ok(ResolvedProvider {
        name: spec.name,
        model,
        url,
        api_key,
    })
}

pub struct ProviderClient {
    client: Client,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(80))
    }
}

impl ProviderClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { client }
    }

    pub fn with_proxy(proxy_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder().timeout(timeout).proxy(proxy).build()?;
        Ok(Self { client })
    }

    /// Send one system + user exchange to the resolved backend.
    pub async fn call(
        &self,
        provider: &ResolvedProvider,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        match provider.name.as_str() {
            "anthropic" => {
                self.call_anthropic_api(&provider.url, &provider.model, &provider.api_key, system, user, max_tokens)
                    .await
            }
            // GLM and DeepSeek accept json_object; OpenAI does too for chat completions.
            "openai" | "deepseek" | "glm" => {
                self.call_chat_api(&provider.url, &provider.model, &provider.api_key, system, user, max_tokens, true)
                    .await
            }
            other => Err(ProviderError::UnsupportedProvider(other.to_string())),
        }
    }

    async fn call_anthropic_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        #[derive(Serialize)]
        struct AnthropicRequest {
            model: String,
            max_tokens: i32,
            #[serde(skip_serializing_if = "String::is_empty")]
            system: String,
            messages: Vec<ChatMessage>,
            temperature: f64,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Option<Vec<AnthropicContent>>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: Option<String>,
        }

        let request = AnthropicRequest {
            model: model.to_string(),
            max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            temperature: 0.0,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .content
            .and_then(|c| c.into_iter().find_map(|c| c.text))
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    #[allow(clippy::too_many_arguments)]
    async fn call_chat_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
        use_json_format: bool,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature: 0.0,
            response_format: if use_json_format {
                Some(ResponseFormat {
                    r#type: "json_object".to_string(),
                })
            } else {
                None
            },
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

/// Get API key from environment or config
pub fn get_api_key(provider: &str, config: &AppConfig) -> Option<String> {
    let prefix = env_prefix(provider);
    let env_keys = [format!("{}_API_KEY", prefix), format!("REQLENS_{}_API_KEY", prefix)];

    for key in env_keys {
        if let Ok(val) = env::var(&key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    config
        .api_keys
        .get(provider)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
