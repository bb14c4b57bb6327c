//! Run-scoped and branch-scoped state

use crate::reducer::CompletedSections;
use chrono::{DateTime, Utc};
use deepreport_core::{AssemblyConfig, QueryResults, ReportConfig, SearchQuery, Section, Verdict};
use deepreport_search::EvidenceBundle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Values the orchestration reads from configuration, resolved once per run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub report_structure: String,
    pub number_of_queries: usize,
    pub max_search_depth: usize,
    pub max_tokens_per_source: usize,
    pub include_raw_content: bool,
    pub max_concurrent_sections: usize,
    pub assembly: AssemblyConfig,
}

impl From<&ReportConfig> for RunSettings {
    fn from(config: &ReportConfig) -> Self {
        Self {
            report_structure: config.report_structure.clone(),
            number_of_queries: config.number_of_queries,
            max_search_depth: config.max_search_depth,
            max_tokens_per_source: config.max_tokens_per_source,
            include_raw_content: config.include_raw_content,
            max_concurrent_sections: config.max_concurrent_sections,
            assembly: config.assembly.clone(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

/// State owned by exactly one research loop
#[derive(Debug, Clone)]
pub struct SectionRunState {
    pub section: Section,
    /// Completed search rounds
    pub iteration: usize,
    /// Queries for the next search round
    pub queries: Vec<SearchQuery>,
    /// Every result set seen by this branch, in arrival order
    pub observed: Vec<QueryResults>,
    /// Evidence built from `observed` in the latest round
    pub evidence: EvidenceBundle,
    pub last_verdict: Option<Verdict>,
}

impl SectionRunState {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            iteration: 0,
            queries: Vec::new(),
            observed: Vec::new(),
            evidence: EvidenceBundle::default(),
            last_verdict: None,
        }
    }
}

/// Result of a finished branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutcome {
    pub section: Section,
    /// Search rounds performed; zero for sections written without research
    pub iterations: usize,
    /// False when the depth bound forced acceptance of a failing draft
    pub passed: bool,
}

/// Run-scoped aggregate, mutated only through the reducer
#[derive(Debug, Clone, Default)]
pub struct ReportState {
    pub topic: String,
    pub plan_feedback: Option<String>,
    /// Planned sections in plan order
    pub sections: Vec<Section>,
    pub completed_sections: CompletedSections,
    pub final_report: String,
}

/// What a finished run hands back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub run_id: Uuid,
    pub topic: String,
    /// Feedback the accepted plan was generated with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_feedback: Option<String>,
    pub final_report: String,
    /// Completed sections in plan order
    pub sections: Vec<Section>,
    /// Search rounds per researched section
    pub section_iterations: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
