//! General-purpose search backend (Tavily)

use async_trait::async_trait;
use deepreport_core::{ReportResult, SearchResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    create_http_client, handle_response_error, map_request_error, QueryBackend,
    SearchClientConfig,
};

/// Tavily search client
pub struct TavilySearchClient {
    client: reqwest::Client,
    config: SearchClientConfig,
}

/// Tavily API request
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    include_raw_content: bool,
    topic: &'a str,
}

/// Tavily API response
#[derive(Debug, Deserialize)]
pub(crate) struct TavilyResponse {
    #[serde(default)]
    pub(crate) results: Vec<TavilyResult>,
}

/// Individual search result from Tavily
#[derive(Debug, Deserialize)]
pub(crate) struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    raw_content: Option<String>,
}

impl TavilySearchClient {
    /// Create a new Tavily client
    pub fn new(config: SearchClientConfig) -> ReportResult<Self> {
        let client = create_http_client(&config)?;

        info!("Created Tavily search client for {}", config.base_url);

        Ok(Self { client, config })
    }
}

impl TavilyResponse {
    pub(crate) fn into_results(self) -> Vec<SearchResult> {
        self.results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                content: r.content,
                score: r.score,
                raw_content: r.raw_content,
            })
            .collect()
    }
}

#[async_trait]
impl QueryBackend for TavilySearchClient {
    async fn query(&self, query: &str) -> ReportResult<Vec<SearchResult>> {
        let url = format!("{}/search", self.config.base_url);
        debug!("Tavily search: {}", query);

        let request = TavilyRequest {
            api_key: &self.config.api_key,
            query,
            max_results: self.config.max_results,
            include_raw_content: true,
            topic: "general",
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.name()))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, self.name()).await);
        }

        let tavily_response: TavilyResponse = response
            .json()
            .await
            .map_err(|e| map_request_error(e, self.name()))?;

        Ok(tavily_response.into_results())
    }

    fn name(&self) -> &'static str {
        "Tavily"
    }
}
