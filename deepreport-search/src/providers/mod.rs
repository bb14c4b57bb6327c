//! Search backends
//!
//! Each backend answers a single query; [`BackendSearch`] fans a batch of queries out
//! concurrently, retries transient faults, and degrades whatever still fails into an
//! error-shaped result entry.

use async_trait::async_trait;
use deepreport_core::{
    process_concurrently, retry_async, ErrorContext, QueryResults, ReportError, ReportResult,
    RetryConfig, SearchApi, SearchConfig, SearchProvider, SearchResult,
};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod bing;
pub mod perplexity;
pub mod tavily;


pub use bing::BingSearchClient;
pub use perplexity::PerplexitySearchClient;
pub use tavily::TavilySearchClient;

/// Configuration shared by the HTTP search clients
#[derive(Debug, Clone)]
pub struct SearchClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Results requested per query
    pub max_results: usize,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers
    pub headers: HashMap<String, String>,
}

impl Default for SearchClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            max_results: 5,
            timeout_seconds: 30,
            user_agent: "deepreport/0.1".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl SearchClientConfig {
    /// Configuration for the general-purpose backend
    pub fn tavily(api_key: String) -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key,
            ..Default::default()
        }
    }

    /// Configuration for the Q&A-style backend
    pub fn perplexity(api_key: String) -> Self {
        Self {
            base_url: "https://api.perplexity.ai".to_string(),
            api_key,
            ..Default::default()
        }
    }

    /// Configuration for the web search backend
    pub fn bing(api_key: String) -> Self {
        Self {
            base_url: "https://api.bing.microsoft.com/v7.0".to_string(),
            api_key,
            max_results: 10,
            ..Default::default()
        }
    }

    /// Set additional header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set results per query
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

/// A single-query search backend
#[async_trait]
pub trait QueryBackend: Send + Sync + 'static {
    /// Run one query against the backend
    async fn query(&self, query: &str) -> ReportResult<Vec<SearchResult>>;

    /// Backend name used in logs and degraded entries
    fn name(&self) -> &'static str;
}

/// Batch search over a [`QueryBackend`] with bounded fan-out and failure isolation
pub struct BackendSearch<B: QueryBackend> {
    backend: Arc<B>,
    max_concurrent: usize,
    retry: RetryConfig,
}

impl<B: QueryBackend> BackendSearch<B> {
    pub fn new(backend: B, max_concurrent: usize, retry_attempts: usize) -> Self {
        Self {
            backend: Arc::new(backend),
            max_concurrent: max_concurrent.max(1),
            retry: RetryConfig::default().with_max_attempts(retry_attempts),
        }
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl<B: QueryBackend> SearchProvider for BackendSearch<B> {
    async fn search(&self, queries: &[String]) -> Vec<QueryResults> {
        debug!(
            provider = self.backend.name(),
            queries = queries.len(),
            max_concurrent = self.max_concurrent,
            "Issuing search queries"
        );

        let backend = Arc::clone(&self.backend);
        let retry = self.retry.clone();

        let outcomes = process_concurrently(queries.to_vec(), self.max_concurrent, move |query| {
            let backend = Arc::clone(&backend);
            let retry = retry.clone();
            async move {
                retry_async(
                    || {
                        let backend = Arc::clone(&backend);
                        let query = query.clone();
                        async move { backend.query(&query).await }.boxed()
                    },
                    retry,
                    "search_query",
                )
                .await
            }
        })
        .await;

        let mut degraded = 0;
        let results: Vec<QueryResults> = queries
            .iter()
            .zip(outcomes)
            .map(|(query, outcome)| match outcome {
                Ok(results) => QueryResults::new(query.clone(), results),
                Err(e) => {
                    e.log();
                    degraded += 1;
                    QueryResults::degraded(query, self.backend.name(), &e.to_string())
                }
            })
            .collect();

        if degraded > 0 {
            warn!(
                provider = self.backend.name(),
                degraded = degraded,
                total = queries.len(),
                "Some search queries were degraded"
            );
        }

        results
    }

    fn provider_name(&self) -> &str {
        self.backend.name()
    }
}

/// Factory for creating search providers from configuration
pub struct SearchProviderFactory;

impl SearchProviderFactory {
    /// Build the configured backend; selection happens once, here
    pub fn create(config: &SearchConfig) -> ReportResult<Arc<dyn SearchProvider>> {
        let api_key = Self::resolve_api_key(config)?;

        let client_config = match config.api {
            SearchApi::Tavily => SearchClientConfig::tavily(api_key),
            SearchApi::Perplexity => SearchClientConfig::perplexity(api_key),
            SearchApi::Bing => SearchClientConfig::bing(api_key),
        };
        let mut client_config = client_config
            .with_timeout(config.timeout_seconds)
            .with_max_results(config.max_results);
        if let Some(base_url) = &config.base_url {
            client_config = client_config.with_base_url(base_url.clone());
        }

        info!(api = %config.api, "Creating search provider");

        let provider: Arc<dyn SearchProvider> = match config.api {
            SearchApi::Tavily => Arc::new(BackendSearch::new(
                TavilySearchClient::new(client_config)?,
                config.max_concurrent_searches,
                config.retry_attempts,
            )),
            SearchApi::Perplexity => Arc::new(BackendSearch::new(
                PerplexitySearchClient::new(client_config)?,
                config.max_concurrent_searches,
                config.retry_attempts,
            )),
            SearchApi::Bing => Arc::new(BackendSearch::new(
                BingSearchClient::new(client_config)?,
                config.max_concurrent_searches,
                config.retry_attempts,
            )),
        };

        Ok(provider)
    }

    /// Environment variable consulted when no key is configured
    pub fn api_key_env_var(api: SearchApi) -> &'static str {
        match api {
            SearchApi::Tavily => "TAVILY_API_KEY",
            SearchApi::Perplexity => "PERPLEXITY_API_KEY",
            SearchApi::Bing => "BING_API_KEY",
        }
    }

    fn resolve_api_key(config: &SearchConfig) -> ReportResult<String> {
        let env_var = Self::api_key_env_var(config.api);
        config
            .api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ReportError::Config {
                message: format!("No API key found for search api '{}'", config.api),
                source: None,
                context: ErrorContext::new("search_provider_factory")
                    .with_operation("create")
                    .with_suggestion(&format!("Set {} or search.api_key", env_var)),
            })
    }
}

/// Helper function to create HTTP client with common configuration
pub(crate) fn create_http_client(config: &SearchClientConfig) -> ReportResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            ReportError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?,
    );

    for (key, value) in &config.headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            ReportError::Config {
                message: format!("Invalid header name '{}': {}", key, e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?;

        let header_value =
            reqwest::header::HeaderValue::from_str(value).map_err(|e| ReportError::Config {
                message: format!("Invalid header value for '{}': {}", key, e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            })?;

        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| ReportError::Config {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

/// Map a transport failure onto the error taxonomy
pub(crate) fn map_request_error(error: reqwest::Error, provider: &str) -> ReportError {
    if error.is_timeout() {
        ReportError::Timeout {
            operation: format!("{} search", provider),
            duration_ms: 0,
            context: ErrorContext::new("search_client").with_metadata("provider", provider),
        }
    } else if error.is_decode() {
        ReportError::SearchProvider {
            message: format!("Failed to parse {} response: {}", provider, error),
            provider: provider.to_string(),
            source: Some(Box::new(error)),
            context: ErrorContext::new("search_client"),
        }
    } else {
        ReportError::Network {
            message: format!("{} request failed: {}", provider, error),
            source: Some(Box::new(error)),
            context: ErrorContext::new("search_client").with_metadata("provider", provider),
        }
    }
}

/// Helper function to handle HTTP response errors
pub(crate) async fn handle_response_error(response: reqwest::Response, provider: &str) -> ReportError {
    let status = response.status();
    let retry_after_ms = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| secs * 1000);

    let error_body = response.text().await.unwrap_or_default();
    let message = format!(
        "{} API error {}: {}",
        provider,
        status.as_u16(),
        if error_body.is_empty() {
            status.canonical_reason().unwrap_or("Unknown error")
        } else {
            &error_body
        }
    );

    match status.as_u16() {
        429 => ReportError::RateLimit {
            message,
            retry_after_ms,
            context: ErrorContext::new("search_client").with_metadata("provider", provider),
        },
        500..=599 => ReportError::Network {
            message,
            source: None,
            context: ErrorContext::new("search_client").with_metadata("provider", provider),
        },
        code => ReportError::SearchProvider {
            message,
            provider: provider.to_string(),
            source: None,
            context: ErrorContext::new("search_client").with_suggestion(match code {
                401 | 403 => "Check your search API key",
                _ => "Check the search API status",
            }),
        },
    }
}
