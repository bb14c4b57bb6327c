//! Evidence aggregation: URL deduplication and per-source budgeting

use deepreport_core::{QueryResults, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Rough characters-per-token estimate used for the per-source budget
pub const CHARS_PER_TOKEN: usize = 4;

/// Appended to raw content that was cut to the budget
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Deduplicated, budgeted textual context built from search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Formatted sources, ready to hand to the writer model
    pub text: String,
    /// Number of unique sources in the bundle
    pub source_count: usize,
    /// Non-fatal issues found while building the bundle
    pub warnings: Vec<String>,
}

impl EvidenceBundle {
    pub fn is_empty(&self) -> bool {
        self.source_count == 0
    }
}

/// Builds evidence bundles from raw result sets
#[derive(Debug, Clone)]
pub struct EvidenceAggregator {
    max_tokens_per_source: usize,
    include_raw_content: bool,
}

impl EvidenceAggregator {
    pub fn new(max_tokens_per_source: usize, include_raw_content: bool) -> Self {
        Self {
            max_tokens_per_source,
            include_raw_content,
        }
    }

    /// Character budget for a single source's raw content
    pub fn char_limit(&self) -> usize {
        self.max_tokens_per_source * CHARS_PER_TOKEN
    }

    /// Collapse results to one entry per URL.
    ///
    /// An entry keeps the position where its URL was first seen, but its value is the
    /// most recently observed instance.
    pub fn deduplicate<'a, I>(responses: I) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = &'a QueryResults>,
    {
        let mut unique: Vec<SearchResult> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for result in responses.into_iter().flat_map(|r| r.results.iter()) {
            match positions.get(&result.url) {
                Some(&index) => unique[index] = result.clone(),
                None => {
                    positions.insert(result.url.clone(), unique.len());
                    unique.push(result.clone());
                }
            }
        }

        unique
    }

    /// Cut raw content to the character budget, marking the cut
    pub fn truncate_raw_content(&self, raw_content: &str) -> String {
        let char_limit = self.char_limit();
        match raw_content.char_indices().nth(char_limit) {
            Some((byte_index, _)) => {
                format!("{}{}", &raw_content[..byte_index], TRUNCATION_MARKER)
            }
            None => raw_content.to_string(),
        }
    }

    /// Format every result observed so far into a single bundle
    pub fn aggregate<'a, I>(&self, responses: I) -> EvidenceBundle
    where
        I: IntoIterator<Item = &'a QueryResults>,
    {
        let sources = Self::deduplicate(responses);
        let mut warnings = Vec::new();

        let mut text = String::from("Sources:\n\n");
        for source in &sources {
            text.push_str(&format!("Source {}:\n===\n", source.title));
            text.push_str(&format!("URL: {}\n===\n", source.url));
            text.push_str(&format!(
                "Most relevant content from source: {}\n===\n",
                source.content
            ));

            if self.include_raw_content {
                let raw_content = match &source.raw_content {
                    Some(raw) => raw.as_str(),
                    None => {
                        warn!(url = %source.url, "No raw content found for source");
                        warnings.push(format!("No raw content found for source {}", source.url));
                        ""
                    }
                };
                text.push_str(&format!(
                    "Full source content limited to {} tokens: {}\n\n",
                    self.max_tokens_per_source,
                    self.truncate_raw_content(raw_content)
                ));
            }
        }

        debug!(
            sources = sources.len(),
            warnings = warnings.len(),
            "Aggregated evidence bundle"
        );

        EvidenceBundle {
            text: text.trim().to_string(),
            source_count: sources.len(),
            warnings,
        }
    }
}
