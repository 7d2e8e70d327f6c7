//! Language model client
//!
//! Talks to the Anthropic Messages API, either directly or through the
//! Martian proxy. Provider selection happens once, in
//! [`ProviderConfig::from_env`], and the resulting value is threaded into
//! every collaborator that needs a model.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::LlmError;
use crate::Result;

/// Martian proxy endpoint
pub const MARTIAN_BASE_URL: &str = "https://api.withmartian.com/v1";

/// Direct Anthropic endpoint
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "claude-opus-4-5-20251101";

/// Value sent in the `anthropic-version` header
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Which API the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Martian,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Martian => "martian",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Martian wants `provider/model`; Anthropic wants the bare name.
    pub fn normalize_model(&self, model: &str) -> String {
        match self {
            Provider::Martian => model.to_string(),
            Provider::Anthropic => match model.split_once('/') {
                Some((_, bare)) => bare.to_string(),
                None => model.to_string(),
            },
        }
    }
}

/// Provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub base_url: String,
    /// API key (never logged)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::from_vars(
            std::env::var("MARTIAN_API_KEY").ok(),
            std::env::var("ANTHROPIC_API_KEY").ok(),
            std::env::var("ARXIVIZ_MODEL").ok(),
        )
    }
}

impl ProviderConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Martian key wins over the Anthropic key; empty values count as unset.
    pub fn from_vars(
        martian_key: Option<String>,
        anthropic_key: Option<String>,
        model: Option<String>,
    ) -> Self {
        let martian_key = martian_key.filter(|k| !k.trim().is_empty());
        let anthropic_key = anthropic_key.filter(|k| !k.trim().is_empty());
        let config = match martian_key {
            Some(key) => Self::new(Provider::Martian, MARTIAN_BASE_URL).with_token(&key),
            None => {
                let config = Self::new(Provider::Anthropic, ANTHROPIC_BASE_URL);
                match anthropic_key {
                    Some(key) => config.with_token(&key),
                    None => config,
                }
            }
        };
        match model.filter(|m| !m.trim().is_empty()) {
            Some(model) => config.with_model(&model),
            None => config,
        }
    }

    /// Create config for a specific endpoint
    pub fn new(provider: Provider, base_url: &str) -> Self {
        ProviderConfig {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 300,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.api_key = Some(token.to_string());
        self
    }

    /// Set the model, normalized for this provider
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = self.provider.normalize_model(model);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Free-text completion service.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// Body of a Messages API request.
pub fn request_body(model: &str, system: &str, prompt: &str, max_tokens: u32) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if !system.is_empty() {
        body["system"] = Value::String(system.to_string());
    }
    body
}

/// First text block of a Messages API response.
pub fn first_text_block(response: &str) -> Result<String> {
    let parsed: MessagesResponse = serde_json::from_str(response)?;
    parsed
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or(LlmError::EmptyResponse)
}

/// Messages API client
pub struct AnthropicClient {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a new client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("arxiviz/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(AnthropicClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ProviderConfig::from_env())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl LlmService for AnthropicClient {
    async fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let api_key = self.config.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/messages", self.config.base_url);
        debug!(
            provider = self.config.provider.as_str(),
            model = %self.config.model,
            max_tokens,
            "sending completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body(&self.config.model, system, prompt, max_tokens))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        first_text_block(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_martian_key_takes_precedence() {
        let config = ProviderConfig::from_vars(
            Some("mk".to_string()),
            Some("ak".to_string()),
            Some("anthropic/claude-sonnet".to_string()),
        );
        assert_eq!(config.provider, Provider::Martian);
        assert_eq!(config.base_url, MARTIAN_BASE_URL);
        assert_eq!(config.api_key.as_deref(), Some("mk"));
        assert_eq!(config.model, "anthropic/claude-sonnet");
    }

    #[test]
    fn test_anthropic_strips_provider_prefix() {
        let config = ProviderConfig::from_vars(
            Some("  ".to_string()),
            Some("ak".to_string()),
            Some("anthropic/claude-sonnet".to_string()),
        );
        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.model, "claude-sonnet");
        assert!(config.is_configured());
    }

    #[test]
    fn test_unconfigured_uses_default_model() {
        let config = ProviderConfig::from_vars(None, None, None);
        assert!(!config.is_configured());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, ANTHROPIC_BASE_URL);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ProviderConfig::new(Provider::Anthropic, ANTHROPIC_BASE_URL)
            .with_token("sk-secret");
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn test_request_body_omits_empty_system() {
        let body = request_body("m", "", "hello", 512);
        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["content"], "hello");

        let body = request_body("m", "be brief", "hello", 512);
        assert_eq!(body["system"], "be brief");
    }

    #[test]
    fn test_first_text_block_skips_other_blocks() {
        let response = r#"{"content": [
            {"type": "thinking", "thinking": "..."},
            {"type": "text", "text": "answer"}
        ]}"#;
        assert_eq!(first_text_block(response).unwrap(), "answer");
        assert!(matches!(
            first_text_block(r#"{"content": []}"#),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = AnthropicClient::new(ProviderConfig::from_vars(None, None, None)).unwrap();
        let err = client.complete("", "hi", 16).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
