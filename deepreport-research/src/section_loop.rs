//! Section research loop
//!
//! One loop per section that needs research:
//!
//! ```text
//! GenerateQueries -> Search -> Aggregate -> Draft -> Grade -> Accept
//!                      ^                                 |
//!                      +------- follow-up queries -------+
//! ```
//!
//! The loop accepts when the grader passes the draft or when the number of completed
//! search rounds reaches `max_search_depth`, whichever comes first.

use crate::types::{RunSettings, SectionOutcome, SectionRunState};
use deepreport_core::{LanguageModel, ReportResult, SearchProvider, Section, Verdict};
use deepreport_search::EvidenceAggregator;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    GenerateQueries,
    Search,
    Aggregate,
    Draft,
    Grade,
    Accept,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::GenerateQueries => "generate_queries",
            LoopState::Search => "search",
            LoopState::Aggregate => "aggregate",
            LoopState::Draft => "draft",
            LoopState::Grade => "grade",
            LoopState::Accept => "accept",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct SectionResearchLoop {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    aggregator: EvidenceAggregator,
    number_of_queries: usize,
    max_search_depth: usize,
}

impl SectionResearchLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        settings: &RunSettings,
    ) -> Self {
        Self {
            model,
            search,
            aggregator: EvidenceAggregator::new(
                settings.max_tokens_per_source,
                settings.include_raw_content,
            ),
            number_of_queries: settings.number_of_queries,
            max_search_depth: settings.max_search_depth.max(1),
        }
    }

    /// Drive one section from `GenerateQueries` to `Accept`
    pub async fn run(&self, topic: &str, section: Section) -> ReportResult<SectionOutcome> {
        info!(section = %section.name, "Starting section research");

        let mut state = SectionRunState::new(section);
        let mut current = LoopState::GenerateQueries;

        while current != LoopState::Accept {
            let next = self.step(topic, current, &mut state).await?;
            debug!(
                section = %state.section.name,
                iteration = state.iteration,
                from = %current,
                to = %next,
                "Loop transition"
            );
            current = next;
        }

        let passed = state.last_verdict == Some(Verdict::Pass);
        if passed {
            info!(section = %state.section.name, iterations = state.iteration, "Section passed");
        } else {
            warn!(
                section = %state.section.name,
                iterations = state.iteration,
                "Depth bound reached, accepting section without a passing grade"
            );
        }

        Ok(SectionOutcome {
            section: state.section,
            iterations: state.iteration,
            passed,
        })
    }

    /// Execute one state and return the next one
    pub async fn step(
        &self,
        topic: &str,
        current: LoopState,
        state: &mut SectionRunState,
    ) -> ReportResult<LoopState> {
        match current {
            LoopState::GenerateQueries => {
                state.queries = self
                    .model
                    .section_queries(topic, &state.section, self.number_of_queries)
                    .await?;
                Ok(LoopState::Search)
            }
            LoopState::Search => {
                let queries: Vec<String> = state.queries.iter().map(|q| q.query.clone()).collect();
                let results = self.search.search(&queries).await;

                let degraded = results.iter().filter(|r| r.is_degraded()).count();
                if degraded > 0 {
                    warn!(
                        section = %state.section.name,
                        degraded,
                        total = results.len(),
                        "Continuing with degraded search results"
                    );
                }

                state.observed.extend(results);
                state.iteration += 1;
                Ok(LoopState::Aggregate)
            }
            LoopState::Aggregate => {
                state.evidence = self.aggregator.aggregate(&state.observed);
                Ok(LoopState::Draft)
            }
            LoopState::Draft => {
                let content = self
                    .model
                    .write_section(topic, &state.section, &state.evidence.text)
                    .await?;
                state.section.content = content;
                Ok(LoopState::Grade)
            }
            LoopState::Grade => {
                let grade = self
                    .model
                    .grade_section(topic, &state.section, self.number_of_queries)
                    .await?;
                state.last_verdict = Some(grade.verdict);

                if grade.is_pass() || state.iteration >= self.max_search_depth {
                    return Ok(LoopState::Accept);
                }

                if grade.follow_up_queries.is_empty() {
                    warn!(
                        section = %state.section.name,
                        "Grader failed the draft without follow-up queries"
                    );
                }
                state.queries = grade.follow_up_queries;
                Ok(LoopState::Search)
            }
            LoopState::Accept => Ok(LoopState::Accept),
        }
    }
}
