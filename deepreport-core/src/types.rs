//! Core data type definitions

use serde::{Deserialize, Serialize};

/// One section of the report outline. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Name for this section of the report
    pub name: String,
    /// Brief overview of the topics to be covered in this section
    pub description: String,
    /// Whether to perform web research for this section
    #[serde(alias = "research")]
    pub requires_research: bool,
    /// The content of the section (empty until written)
    #[serde(default)]
    pub content: String,
}

impl Section {
    pub fn new(name: &str, description: &str, requires_research: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            requires_research,
            content: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// A web search query, produced by the planner or by the grader as a follow-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "search_query", alias = "query")]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            rationale: None,
        }
    }
}

impl From<&str> for SearchQuery {
    fn from(query: &str) -> Self {
        SearchQuery::new(query)
    }
}

/// Grader verdict on a section draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::Fail => write!(f, "fail"),
        }
    }
}

/// Evaluation of a section draft against its description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    #[serde(rename = "grade")]
    pub verdict: Verdict,
    #[serde(default)]
    pub follow_up_queries: Vec<SearchQuery>,
}

impl Grade {
    pub fn pass() -> Self {
        Self {
            verdict: Verdict::Pass,
            follow_up_queries: Vec::new(),
        }
    }

    pub fn fail(follow_up_queries: Vec<SearchQuery>) -> Self {
        Self {
            verdict: Verdict::Fail,
            follow_up_queries,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// A single search hit in the uniform shape every backend returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Summary or snippet of the content
    pub content: String,
    /// Relevance score
    pub score: f64,
    /// Full page content if available
    #[serde(default)]
    pub raw_content: Option<String>,
}

/// All results returned for one issued query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub results: Vec<SearchResult>,
    /// Set only by [`QueryResults::degraded`]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl QueryResults {
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            query: query.into(),
            results,
            degraded: false,
        }
    }

    /// Error-shaped entry standing in for a query the backend could not answer
    pub fn degraded(query: &str, provider: &str, error: &str) -> Self {
        Self {
            query: query.to_string(),
            results: vec![SearchResult {
                title: format!("{} Search Error", provider),
                url: String::new(),
                content: format!("An error occurred: {}", error),
                score: 0.0,
                raw_content: None,
            }],
            degraded: true,
        }
    }

    /// Whether this result set is a degraded stand-in for a failed query
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Everything the planner model needs to propose an outline
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub topic: &'a str,
    pub report_structure: &'a str,
    /// Formatted evidence gathered from the planning queries
    pub context: &'a str,
    /// Reviewer feedback on a previous plan
    pub feedback: Option<&'a str>,
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Outline template handed to the planner
    pub report_structure: String,
    /// Number of search queries generated per section (and for planning)
    pub number_of_queries: usize,
    /// Maximum number of search iterations per section before forced acceptance
    pub max_search_depth: usize,
    /// Budget for each source's raw content, in tokens (~4 characters each)
    pub max_tokens_per_source: usize,
    /// Whether raw page content is included in the evidence bundle
    pub include_raw_content: bool,
    /// Maximum number of section branches running at once
    pub max_concurrent_sections: usize,
    pub search: SearchConfig,
    pub planner: LlmConfig,
    pub writer: LlmConfig,
    pub assembly: AssemblyConfig,
}

/// Search backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchApi {
    /// General-purpose search (Tavily)
    Tavily,
    /// Q&A-style search (Perplexity)
    Perplexity,
    /// Web search (Bing)
    Bing,
}

impl std::fmt::Display for SearchApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchApi::Tavily => write!(f, "tavily"),
            SearchApi::Perplexity => write!(f, "perplexity"),
            SearchApi::Bing => write!(f, "bing"),
        }
    }
}

impl std::str::FromStr for SearchApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tavily" => Ok(SearchApi::Tavily),
            "perplexity" => Ok(SearchApi::Perplexity),
            "bing" | "bing_search" => Ok(SearchApi::Bing),
            other => Err(format!("Unknown search api: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub api: SearchApi,
    /// Results requested per query
    pub max_results: usize,
    pub timeout_seconds: u64,
    /// Attempts per query before the failure is degraded into a result entry
    pub retry_attempts: usize,
    /// Cap on concurrent outbound queries within one search step
    pub max_concurrent_searches: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Upper bound on a single model call
    pub request_timeout_ms: u64,
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_endpoint: Option<String>,
    /// Azure OpenAI deployment; the model name is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Text placed between consecutive sections
    pub separator: String,
    /// Prefix each section with a `## name` header
    pub include_headers: bool,
}
