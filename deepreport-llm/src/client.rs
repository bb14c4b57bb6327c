//! LLM client integration using siumai
//!
//! One [`ReportLlmClient`] is built per configured role (planner, writer). The rest of the
//! crate talks to it through [`ChatModel`] so prompt handling can be exercised without a
//! live provider.

use crate::azure::AzureOpenAiClient;
use async_trait::async_trait;
use deepreport_core::{with_timeout, ErrorContext, LlmConfig, ReportError, ReportResult};
use siumai::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A chat-capable model that answers a system + user prompt pair with text
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> ReportResult<String>;

    /// `provider/model` label for logs
    fn model_label(&self) -> String;
}

/// Build the chat model for a configured role.
///
/// `azure_openai` is served by [`AzureOpenAiClient`]; every other provider goes through siumai.
pub async fn build_chat_model(config: LlmConfig) -> ReportResult<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "azure_openai" => Ok(Arc::new(AzureOpenAiClient::new(config)?)),
        _ => Ok(Arc::new(ReportLlmClient::new(config).await?)),
    }
}

/// Unified LLM client that supports multiple providers
pub struct ReportLlmClient {
    client: Box<dyn LlmClient>,
    config: LlmConfig,
}

impl ReportLlmClient {
    /// Create a new LLM client
    pub async fn new(config: LlmConfig) -> ReportResult<Self> {
        let client = Self::build_client(&config).await?;

        info!(
            "Created LLM client for provider: {} with model: {}",
            config.provider, config.model
        );

        Ok(Self { client, config })
    }

    /// Environment variable holding the key for a provider, if it needs one
    pub fn api_key_env_var(provider: &str) -> Option<&'static str> {
        match provider {
            "openai" => Some("OPENAI_API_KEY"),
            "anthropic" => Some("ANTHROPIC_API_KEY"),
            "groq" => Some("GROQ_API_KEY"),
            "azure_openai" => Some(crate::azure::API_KEY_ENV),
            _ => None,
        }
    }

    fn resolve_api_key(config: &LlmConfig) -> ReportResult<String> {
        let env_var = Self::api_key_env_var(&config.provider).unwrap_or("API_KEY");
        config
            .api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ReportError::Config {
                message: format!("{} API key not found", config.provider),
                source: None,
                context: ErrorContext::new("llm_client")
                    .with_operation("build_client")
                    .with_suggestion(&format!("Set {} or the api_key field", env_var)),
            })
    }

    fn build_error(config: &LlmConfig, error: impl std::fmt::Display) -> ReportError {
        ReportError::Llm {
            message: format!("Failed to build {} client: {}", config.provider, error),
            provider: Some(config.provider.clone()),
            model: Some(config.model.clone()),
            context: ErrorContext::new("llm_client").with_operation("build_client"),
        }
    }

    /// Build the appropriate siumai client based on configuration
    async fn build_client(config: &LlmConfig) -> ReportResult<Box<dyn LlmClient>> {
        match config.provider.as_str() {
            "openai" => {
                let api_key = Self::resolve_api_key(config)?;

                let mut builder = LlmBuilder::new()
                    .openai()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error(config, e))?;

                Ok(Box::new(client))
            }
            "anthropic" => {
                let api_key = Self::resolve_api_key(config)?;

                let mut builder = LlmBuilder::new()
                    .anthropic()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error(config, e))?;

                Ok(Box::new(client))
            }
            "groq" => {
                let api_key = Self::resolve_api_key(config)?;

                let mut builder = LlmBuilder::new()
                    .groq()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error(config, e))?;

                Ok(Box::new(client))
            }
            "ollama" => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());

                let mut builder = LlmBuilder::new()
                    .ollama()
                    .model(&config.model)
                    .base_url(&base_url)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error(config, e))?;

                Ok(Box::new(client))
            }
            provider => Err(deepreport_core::config_error!(
                format!("Unsupported LLM provider: {}", provider),
                "llm_client"
            )),
        }
    }

    /// Generate a response using the LLM, bounded by the configured request timeout
    pub async fn generate(&self, messages: Vec<ChatMessage>) -> ReportResult<String> {
        let start_time = Instant::now();

        debug!("Generating response with {} messages", messages.len());

        let response = with_timeout(
            self.client.chat(messages),
            self.config.request_timeout_ms,
            "llm_chat",
        )
        .await?
        .map_err(|e| ReportError::Llm {
            message: format!("LLM generation failed: {}", e),
            provider: Some(self.config.provider.clone()),
            model: Some(self.config.model.clone()),
            context: ErrorContext::new("llm_client").with_operation("generate"),
        })?;

        let generation_time = start_time.elapsed();

        match response.content_text() {
            Some(content) => {
                info!(
                    "Generated response in {:?} ({} chars)",
                    generation_time,
                    content.len()
                );
                Ok(content.to_string())
            }
            None => {
                warn!(model = %self.config.model, "LLM response had no text content");
                Err(ReportError::Llm {
                    message: "No text content in LLM response".to_string(),
                    provider: Some(self.config.provider.clone()),
                    model: Some(self.config.model.clone()),
                    context: ErrorContext::new("llm_client").with_operation("generate"),
                })
            }
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Get model information
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.config.provider.clone(),
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for ReportLlmClient {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> ReportResult<String> {
        let messages = vec![system!(system_prompt), user!(user_message)];

        self.generate(messages).await
    }

    fn model_label(&self) -> String {
        self.model_info().summary()
    }
}

/// Information about the current model
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ModelInfo {
    pub fn summary(&self) -> String {
        format!(
            "{}/{} (temp: {:.1})",
            self.provider, self.model, self.temperature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            temperature: 0.0,
            max_tokens: None,
            api_key: None,
            base_url: None,
            request_timeout_ms: 1000,
            azure_endpoint: None,
            deployment_name: None,
            api_version: None,
        }
    }

    #[test]
    fn test_api_key_env_vars() {
        assert_eq!(
            ReportLlmClient::api_key_env_var("openai"),
            Some("OPENAI_API_KEY")
        );
        assert_eq!(
            ReportLlmClient::api_key_env_var("anthropic"),
            Some("ANTHROPIC_API_KEY")
        );
        assert_eq!(
            ReportLlmClient::api_key_env_var("azure_openai"),
            Some("AZURE_OPENAI_API_KEY")
        );
        assert_eq!(ReportLlmClient::api_key_env_var("ollama"), None);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = config("groq");
        config.api_key = Some("explicit".to_string());
        assert_eq!(ReportLlmClient::resolve_api_key(&config).unwrap(), "explicit");
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let result = ReportLlmClient::new(config("carrier-pigeon")).await;
        match result {
            Err(ReportError::Config { message, .. }) => {
                assert!(message.contains("carrier-pigeon"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("unsupported provider should not build"),
        }
    }

    #[tokio::test]
    async fn test_azure_provider_requires_endpoint() {
        let mut config = config("azure_openai");
        config.api_key = Some("az-key".to_string());
        // A blank field counts as unset
        config.azure_endpoint = Some("   ".to_string());

        match build_chat_model(config).await {
            Err(ReportError::Config { message, .. }) => {
                assert!(message.contains("azure_endpoint"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("azure client should not build without an endpoint"),
        }
    }

    #[tokio::test]
    async fn test_azure_provider_builds_from_config() {
        let mut config = config("azure_openai");
        config.api_key = Some("az-key".to_string());
        config.azure_endpoint = Some("https://example.openai.azure.com".to_string());
        config.deployment_name = Some("reports".to_string());

        let model = build_chat_model(config).await.unwrap();
        assert!(model.model_label().starts_with("azure_openai/reports"));
    }

    #[test]
    fn test_model_info_summary() {
        let info = ModelInfo {
            provider: "openai".to_string(),
            model: "o3-mini".to_string(),
            temperature: 0.0,
            max_tokens: None,
        };
        assert_eq!(info.summary(), "openai/o3-mini (temp: 0.0)");
    }
}
