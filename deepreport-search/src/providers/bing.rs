//! Web search backend (Bing Web Search v7)

use async_trait::async_trait;
use deepreport_core::{ReportResult, SearchResult};
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    create_http_client, handle_response_error, map_request_error, QueryBackend,
    SearchClientConfig,
};

/// Bing search client
pub struct BingSearchClient {
    client: reqwest::Client,
    config: SearchClientConfig,
}

/// Bing search response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BingResponse {
    #[serde(default)]
    pub(crate) web_pages: Option<BingWebPages>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BingWebPages {
    #[serde(default)]
    pub(crate) value: Vec<BingWebPage>,
}

/// Bing web page result
#[derive(Debug, Deserialize)]
pub(crate) struct BingWebPage {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) url: Option<String>,
    #[serde(default)]
    pub(crate) snippet: Option<String>,
}

impl BingSearchClient {
    /// Create a new Bing client
    pub fn new(config: SearchClientConfig) -> ReportResult<Self> {
        let client = create_http_client(&config)?;

        info!("Created Bing search client for {}", config.base_url);

        Ok(Self { client, config })
    }
}

impl BingResponse {
    /// Bing has no relevance score, so rank order is turned into one
    pub(crate) fn into_results(self) -> Vec<SearchResult> {
        self.web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, page)| {
                let snippet = page.snippet.unwrap_or_else(|| "No snippet".to_string());
                SearchResult {
                    title: page.name.unwrap_or_else(|| "No Title".to_string()),
                    url: page.url.unwrap_or_else(|| "No URL".to_string()),
                    content: snippet.clone(),
                    score: (1.0 - i as f64 * 0.1).max(0.0),
                    raw_content: Some(snippet),
                }
            })
            .collect()
    }
}

#[async_trait]
impl QueryBackend for BingSearchClient {
    async fn query(&self, query: &str) -> ReportResult<Vec<SearchResult>> {
        let url = format!("{}/search", self.config.base_url);
        debug!("Bing search: {}", query);

        let count = self.config.max_results.to_string();
        let response = self
            .client
            .get(&url)
            .header("Ocp-Apim-Subscription-Key", &self.config.api_key)
            .query(&[
                ("q", query),
                ("textFormat", "HTML"),
                ("mkt", "en-US"),
                ("responseFilter", "webPages"),
                ("count", count.as_str()),
            ])
            .send()
            .await
            .map_err(|e| map_request_error(e, self.name()))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, self.name()).await);
        }

        let bing_response: BingResponse = response
            .json()
            .await
            .map_err(|e| map_request_error(e, self.name()))?;

        Ok(bing_response.into_results())
    }

    fn name(&self) -> &'static str {
        "Bing"
    }
}
