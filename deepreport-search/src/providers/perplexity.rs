//! Q&A-style search backend (Perplexity)
//!
//! Perplexity answers with prose plus citations. The answer is attached to the first
//! citation; later citations become secondary results without content of their own.

use async_trait::async_trait;
use deepreport_core::{search_provider_error, ReportResult, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{
    create_http_client, handle_response_error, map_request_error, QueryBackend,
    SearchClientConfig,
};

const MODEL: &str = "sonar-pro";
const FALLBACK_CITATION: &str = "https://perplexity.ai";

/// Perplexity search client
pub struct PerplexitySearchClient {
    client: reqwest::Client,
    config: SearchClientConfig,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Perplexity chat completion response
#[derive(Debug, Deserialize)]
pub(crate) struct PerplexityResponse {
    pub(crate) choices: Vec<PerplexityChoice>,
    #[serde(default)]
    pub(crate) citations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PerplexityChoice {
    pub(crate) message: PerplexityMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PerplexityMessage {
    pub(crate) content: String,
}

impl PerplexitySearchClient {
    /// Create a new Perplexity client
    pub fn new(config: SearchClientConfig) -> ReportResult<Self> {
        let client = create_http_client(&config)?;

        info!("Created Perplexity search client for {}", config.base_url);

        Ok(Self { client, config })
    }
}

impl PerplexityResponse {
    /// A response without an answer is an error so the query degrades instead of citing nothing
    pub(crate) fn into_results(self) -> ReportResult<Vec<SearchResult>> {
        let content = self
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                search_provider_error!(
                    "Response contained no answer",
                    "Perplexity",
                    "perplexity_search"
                )
            })?;

        let citations = self
            .citations
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| vec![FALLBACK_CITATION.to_string()]);

        Ok(citations
            .into_iter()
            .enumerate()
            .map(|(i, citation)| {
                if i == 0 {
                    SearchResult {
                        title: "Perplexity Search, Source 1".to_string(),
                        url: citation,
                        content: content.clone(),
                        score: 1.0,
                        raw_content: Some(content.clone()),
                    }
                } else {
                    SearchResult {
                        title: format!("Perplexity Search, Source {}", i + 1),
                        url: citation,
                        content: "See primary source for full content".to_string(),
                        score: 0.5,
                        raw_content: None,
                    }
                }
            })
            .collect())
    }
}

#[async_trait]
impl QueryBackend for PerplexitySearchClient {
    async fn query(&self, query: &str) -> ReportResult<Vec<SearchResult>> {
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!("Perplexity search: {}", query);

        let payload = json!({
            "model": MODEL,
            "messages": [
                ChatMessage {
                    role: "system",
                    content: "Search the web and provide factual information with sources.",
                },
                ChatMessage { role: "user", content: query },
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.name()))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, self.name()).await);
        }

        let perplexity_response: PerplexityResponse = response
            .json()
            .await
            .map_err(|e| map_request_error(e, self.name()))?;

        perplexity_response.into_results()
    }

    fn name(&self) -> &'static str {
        "Perplexity"
    }
}
