//! Azure OpenAI chat completions
//!
//! Azure routes requests by deployment rather than by model and authenticates with an
//! `api-key` header, so it gets a small HTTP client of its own instead of a siumai builder.

use async_trait::async_trait;
use deepreport_core::{with_timeout, ErrorContext, LlmConfig, ReportError, ReportResult};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::client::{ChatModel, ModelInfo};

/// API version used when neither the config nor the environment names one
pub const DEFAULT_API_VERSION: &str = "2024-10-21";

pub const ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
pub const DEPLOYMENT_ENV: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const API_VERSION_ENV: &str = "AZURE_OPENAI_API_VERSION";
pub const API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

/// Resolved connection settings for one deployment
#[derive(Debug, Clone, PartialEq)]
pub struct AzureDeployment {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
}

impl AzureDeployment {
    /// Resolve settings from the config, falling back to `AZURE_OPENAI_*` values from `lookup`
    pub fn resolve<F>(config: &LlmConfig, lookup: F) -> ReportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |value: &Option<String>, key: &str| {
            value
                .clone()
                .or_else(|| lookup(key))
                .filter(|v| !v.trim().is_empty())
        };

        let missing = |what: &str, key: &str| ReportError::Config {
            message: format!("Azure OpenAI {} not configured", what),
            source: None,
            context: ErrorContext::new("azure_openai")
                .with_operation("resolve")
                .with_suggestion(&format!("Set {} or the {} field", key, what)),
        };

        let endpoint = pick(&config.azure_endpoint, ENDPOINT_ENV)
            .ok_or_else(|| missing("azure_endpoint", ENDPOINT_ENV))?;
        let api_key =
            pick(&config.api_key, API_KEY_ENV).ok_or_else(|| missing("api_key", API_KEY_ENV))?;
        let deployment =
            pick(&config.deployment_name, DEPLOYMENT_ENV).unwrap_or_else(|| config.model.clone());
        let api_version = pick(&config.api_version, API_VERSION_ENV)
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment,
            api_version,
            api_key,
        })
    }

    pub fn chat_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

/// Chat client for an Azure OpenAI deployment
pub struct AzureOpenAiClient {
    client: reqwest::Client,
    deployment: AzureDeployment,
    config: LlmConfig,
}

impl AzureOpenAiClient {
    pub fn new(config: LlmConfig) -> ReportResult<Self> {
        let deployment = AzureDeployment::resolve(&config, |key| std::env::var(key).ok())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ReportError::Config {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("azure_openai").with_operation("create_client"),
            })?;

        info!(
            "Created Azure OpenAI client for deployment: {} ({})",
            deployment.deployment, deployment.endpoint
        );

        Ok(Self {
            client,
            deployment,
            config,
        })
    }

    /// Request body; reasoning models reject a sampling temperature
    pub(crate) fn request_body(config: &LlmConfig, system_prompt: &str, user_message: &str) -> Value {
        let mut body = json!({
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_message},
            ],
        });

        if !is_reasoning_model(&config.model) {
            body["temperature"] = json!(config.temperature);
        }
        if let Some(max_tokens) = config.max_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
        }

        body
    }

    pub(crate) fn parse_response(&self, body: &Value) -> ReportResult<String> {
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .ok_or_else(|| self.llm_error("No text content in Azure OpenAI response".to_string()))
    }

    pub(crate) fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> ReportError {
        let message = format!("Azure OpenAI error {}: {}", status.as_u16(), body);
        match status.as_u16() {
            401 | 403 => ReportError::Config {
                message,
                source: None,
                context: ErrorContext::new("azure_openai")
                    .with_operation("chat")
                    .with_suggestion(&format!("Check {}", API_KEY_ENV)),
            },
            404 => ReportError::Config {
                message,
                source: None,
                context: ErrorContext::new("azure_openai")
                    .with_operation("chat")
                    .with_metadata("deployment", &self.deployment.deployment)
                    .with_suggestion("Check the endpoint and deployment name"),
            },
            429 => ReportError::RateLimit {
                message,
                retry_after_ms: None,
                context: ErrorContext::new("azure_openai").with_operation("chat"),
            },
            500..=599 => ReportError::Network {
                message,
                source: None,
                context: ErrorContext::new("azure_openai").with_operation("chat"),
            },
            _ => self.llm_error(message),
        }
    }

    fn llm_error(&self, message: String) -> ReportError {
        ReportError::Llm {
            message,
            provider: Some(self.config.provider.clone()),
            model: Some(self.config.model.clone()),
            context: ErrorContext::new("azure_openai").with_operation("chat"),
        }
    }

    async fn send(&self, body: &Value) -> ReportResult<String> {
        let url = self.deployment.chat_url();
        debug!(url = %url, "Sending Azure OpenAI completion request");

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.deployment.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ReportError::Network {
                message: format!("Azure OpenAI request failed: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("azure_openai").with_operation("chat"),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ReportError::Network {
            message: format!("Failed to read Azure OpenAI response: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("azure_openai").with_operation("chat"),
        })?;

        if !status.is_success() {
            return Err(self.map_http_error(status, &text));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| self.llm_error(format!("Invalid JSON from Azure OpenAI: {}", e)))?;
        self.parse_response(&json)
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.config.provider.clone(),
            model: self.deployment.deployment.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

fn is_reasoning_model(model: &str) -> bool {
    let mut chars = model.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

#[async_trait]
impl ChatModel for AzureOpenAiClient {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> ReportResult<String> {
        let body = Self::request_body(&self.config, system_prompt, user_message);
        with_timeout(
            self.send(&body),
            self.config.request_timeout_ms,
            "azure_openai_chat",
        )
        .await?
    }

    fn model_label(&self) -> String {
        self.model_info().summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> LlmConfig {
        LlmConfig {
            provider: "azure_openai".to_string(),
            model: "o3-mini".to_string(),
            temperature: 0.0,
            max_tokens: Some(2000),
            api_key: None,
            base_url: None,
            request_timeout_ms: 1000,
            azure_endpoint: None,
            deployment_name: None,
            api_version: None,
        }
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn client(config: LlmConfig) -> AzureOpenAiClient {
        let vars = env(&[
            (ENDPOINT_ENV, "https://example.openai.azure.com"),
            (API_KEY_ENV, "az-key"),
        ]);
        AzureOpenAiClient {
            client: reqwest::Client::new(),
            deployment: AzureDeployment::resolve(&config, |k| vars.get(k).cloned()).unwrap(),
            config,
        }
    }

    #[test]
    fn test_resolve_from_environment() {
        let vars = env(&[
            (ENDPOINT_ENV, "https://example.openai.azure.com/"),
            (DEPLOYMENT_ENV, "reports-o3"),
            (API_VERSION_ENV, "2024-12-01-preview"),
            (API_KEY_ENV, "az-key"),
        ]);

        let deployment = AzureDeployment::resolve(&config(), |k| vars.get(k).cloned()).unwrap();

        assert_eq!(deployment.endpoint, "https://example.openai.azure.com");
        assert_eq!(deployment.api_key, "az-key");
        assert_eq!(
            deployment.chat_url(),
            "https://example.openai.azure.com/openai/deployments/reports-o3/chat/completions?api-version=2024-12-01-preview"
        );
    }

    #[test]
    fn test_config_fields_win_and_defaults_apply() {
        let mut config = config();
        config.azure_endpoint = Some("https://mine.openai.azure.com".to_string());
        config.api_key = Some("explicit".to_string());
        let vars = env(&[(ENDPOINT_ENV, "https://other.openai.azure.com"), (API_KEY_ENV, "env")]);

        let deployment = AzureDeployment::resolve(&config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(deployment.endpoint, "https://mine.openai.azure.com");
        assert_eq!(deployment.api_key, "explicit");
        // Deployment falls back to the model name
        assert_eq!(deployment.deployment, "o3-mini");
        assert_eq!(deployment.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn test_missing_endpoint_is_config_error() {
        let vars = env(&[(API_KEY_ENV, "az-key")]);
        match AzureDeployment::resolve(&config(), |k| vars.get(k).cloned()) {
            Err(ReportError::Config { message, .. }) => assert!(message.contains("azure_endpoint")),
            other => panic!("expected a config error, got {:?}", other.map(|d| d.endpoint)),
        }
    }

    #[test]
    fn test_request_body_omits_temperature_for_reasoning_models() {
        let body = AzureOpenAiClient::request_body(&config(), "system", "user");
        assert!(body.get("temperature").is_none());
        assert_eq!(body["max_completion_tokens"], 2000);
        assert_eq!(body["messages"][1]["content"], "user");

        let mut gpt = config();
        gpt.model = "gpt-4o".to_string();
        let body = AzureOpenAiClient::request_body(&gpt, "system", "user");
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_parse_response() {
        let client = client(config());
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "draft"}}]});
        assert_eq!(client.parse_response(&body).unwrap(), "draft");

        assert!(matches!(
            client.parse_response(&json!({"choices": []})),
            Err(ReportError::Llm { .. })
        ));
    }

    #[test]
    fn test_http_error_mapping() {
        let client = client(config());
        assert!(matches!(
            client.map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ReportError::RateLimit { .. }
        ));
        assert!(matches!(
            client.map_http_error(reqwest::StatusCode::UNAUTHORIZED, ""),
            ReportError::Config { .. }
        ));
        assert!(client
            .map_http_error(reqwest::StatusCode::BAD_GATEWAY, "")
            .is_recoverable());
    }
}
