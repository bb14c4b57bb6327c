//! Core trait definitions
//!
//! The orchestration layer only sees these two seams. Concrete adapters live in
//! `deepreport-llm` and `deepreport-search`; tests substitute scripted implementations.

use crate::error::ReportResult;
use crate::types::*;
use async_trait::async_trait;

/// Language model adapter: one typed call per prompt kind
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Queries used to gather context before planning the outline
    async fn plan_queries(
        &self,
        topic: &str,
        report_structure: &str,
        count: usize,
    ) -> ReportResult<Vec<SearchQuery>>;

    /// Propose the ordered section outline
    async fn plan_sections(&self, request: &PlanRequest<'_>) -> ReportResult<Vec<Section>>;

    /// Initial search queries for a section that requires research
    async fn section_queries(
        &self,
        topic: &str,
        section: &Section,
        count: usize,
    ) -> ReportResult<Vec<SearchQuery>>;

    /// Draft or revise a section from gathered evidence; `section.content` holds the
    /// previous draft, if any
    async fn write_section(
        &self,
        topic: &str,
        section: &Section,
        evidence: &str,
    ) -> ReportResult<String>;

    /// Grade a drafted section against its description
    async fn grade_section(
        &self,
        topic: &str,
        section: &Section,
        follow_up_count: usize,
    ) -> ReportResult<Grade>;

    /// Write a section that needs no research, using the completed research sections as context
    async fn write_final_section(
        &self,
        topic: &str,
        section: &Section,
        context: &str,
    ) -> ReportResult<String>;
}

/// Search provider adapter
///
/// Never fails: a backend fault for a query is returned as a degraded [`QueryResults`]
/// entry so one unreachable provider cannot abort a research branch.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run every query; the output has one entry per input query, in input order
    async fn search(&self, queries: &[String]) -> Vec<QueryResults>;

    /// Provider name used in logs and degraded entries
    fn provider_name(&self) -> &str;
}
