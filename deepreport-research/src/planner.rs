//! Planner stage: topic (+ optional feedback) to a validated section outline

use crate::types::RunSettings;
use deepreport_core::{
    plan_validation_error, LanguageModel, PlanRequest, ReportResult, SearchProvider, Section,
};
use deepreport_search::EvidenceAggregator;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Produces the report outline
#[derive(Clone)]
pub struct ReportPlanner {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    aggregator: EvidenceAggregator,
    report_structure: String,
    number_of_queries: usize,
}

impl ReportPlanner {
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
            report_structure: settings.report_structure.clone(),
            number_of_queries: settings.number_of_queries,
        }
    }

    /// Plan the report sections.
    ///
    /// Every call regenerates the plan from scratch; passing `feedback` steers the new plan.
    pub async fn plan(&self, topic: &str, feedback: Option<&str>) -> ReportResult<Vec<Section>> {
        if topic.trim().is_empty() {
            return Err(plan_validation_error!("Topic must not be empty", "planner"));
        }

        info!(topic, has_feedback = feedback.is_some(), "Planning report");

        let queries = self
            .model
            .plan_queries(topic, &self.report_structure, self.number_of_queries)
            .await?;
        let query_strings: Vec<String> = queries.into_iter().map(|q| q.query).collect();
        debug!(queries = ?query_strings, "Planning queries");

        let results = self.search.search(&query_strings).await;
        let evidence = self.aggregator.aggregate(&results);

        let request = PlanRequest {
            topic,
            report_structure: &self.report_structure,
            context: &evidence.text,
            feedback,
        };
        let sections = self.model.plan_sections(&request).await?;

        let plan = validate_plan(sections)?;
        info!(
            sections = plan.len(),
            research = plan.iter().filter(|s| s.requires_research).count(),
            "Plan accepted"
        );
        Ok(plan)
    }
}

/// Check the plan contract: non-empty, every name non-empty and unique.
///
/// Returned sections have their content cleared.
pub fn validate_plan(sections: Vec<Section>) -> ReportResult<Vec<Section>> {
    if sections.is_empty() {
        return Err(plan_validation_error!("Plan contains no sections", "planner"));
    }

    let mut seen = HashSet::new();
    for section in &sections {
        let name = section.name.trim();
        if name.is_empty() {
            return Err(plan_validation_error!(
                "Plan contains a section with an empty name",
                "planner"
            ));
        }
        if !seen.insert(name) {
            return Err(plan_validation_error!(
                format!("Duplicate section name in plan: {}", name),
                "planner"
            ));
        }
    }

    Ok(sections
        .into_iter()
        .map(|s| Section {
            content: String::new(),
            ..s
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepreport_core::ReportError;

    #[test]
    fn test_validate_plan_accepts_unique_names() {
        let plan = validate_plan(vec![
            Section::new("Introduction", "intro", false),
            Section::new("Body", "body", true).with_content("leftover"),
        ])
        .unwrap();

        assert_eq!(plan.len(), 2);
        assert!(plan[1].content.is_empty());
    }

    #[test]
    fn test_validate_plan_rejects_empty_and_duplicates() {
        assert!(matches!(
            validate_plan(Vec::new()),
            Err(ReportError::PlanValidation { .. })
        ));

        let duplicate = validate_plan(vec![
            Section::new("Body", "one", true),
            Section::new("Body", "two", true),
        ]);
        match duplicate {
            Err(ReportError::PlanValidation { message, .. }) => assert!(message.contains("Body")),
            other => panic!("expected plan validation error, got {:?}", other),
        }

        assert!(matches!(
            validate_plan(vec![Section::new("  ", "blank", false)]),
            Err(ReportError::PlanValidation { .. })
        ));
    }
}
