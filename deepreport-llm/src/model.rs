//! [`LanguageModel`] implementation over two chat clients
//!
//! The planner client handles planning and grading; the writer client handles query
//! generation and drafting.

use crate::client::{build_chat_model, ChatModel};
use crate::{prompts, structured};
use async_trait::async_trait;
use deepreport_core::{
    Grade, LanguageModel, PlanRequest, ReportConfig, ReportResult, SearchQuery, Section,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct SiumaiReportModel {
    planner: Arc<dyn ChatModel>,
    writer: Arc<dyn ChatModel>,
}

impl SiumaiReportModel {
    pub fn new(planner: Arc<dyn ChatModel>, writer: Arc<dyn ChatModel>) -> Self {
        Self { planner, writer }
    }

    /// Build both clients from configuration
    pub async fn from_config(config: &ReportConfig) -> ReportResult<Self> {
        let planner = build_chat_model(config.planner.clone()).await?;
        let writer = build_chat_model(config.writer.clone()).await?;

        Ok(Self::new(planner, writer))
    }

    fn limit_queries(mut queries: Vec<SearchQuery>, count: usize, call: &str) -> Vec<SearchQuery> {
        if queries.len() > count {
            debug!(call, requested = count, returned = queries.len(), "Truncating queries");
            queries.truncate(count);
        } else if queries.len() < count {
            warn!(
                call,
                requested = count,
                returned = queries.len(),
                "Model returned fewer queries than requested"
            );
        }
        queries
    }
}

#[async_trait]
impl LanguageModel for SiumaiReportModel {
    async fn plan_queries(
        &self,
        topic: &str,
        report_structure: &str,
        count: usize,
    ) -> ReportResult<Vec<SearchQuery>> {
        let (system, user) = prompts::plan_queries(topic, report_structure, count);
        let response = self.planner.complete(&system, &user).await?;
        let queries = structured::parse_queries(&response)?;

        Ok(Self::limit_queries(queries, count, "plan_queries"))
    }

    async fn plan_sections(&self, request: &PlanRequest<'_>) -> ReportResult<Vec<Section>> {
        let (system, user) = prompts::plan_sections(request);
        debug!(model = %self.planner.model_label(), "Requesting report plan");
        let response = self.planner.complete(&system, &user).await?;

        structured::parse_sections(&response)
    }

    async fn section_queries(
        &self,
        topic: &str,
        section: &Section,
        count: usize,
    ) -> ReportResult<Vec<SearchQuery>> {
        let (system, user) = prompts::section_queries(topic, section, count);
        let response = self.writer.complete(&system, &user).await?;
        let queries = structured::parse_queries(&response)?;

        Ok(Self::limit_queries(queries, count, "section_queries"))
    }

    async fn write_section(
        &self,
        topic: &str,
        section: &Section,
        evidence: &str,
    ) -> ReportResult<String> {
        let (system, user) = prompts::write_section(topic, section, evidence);
        let response = self.writer.complete(&system, &user).await?;

        Ok(response.trim().to_string())
    }

    async fn grade_section(
        &self,
        topic: &str,
        section: &Section,
        follow_up_count: usize,
    ) -> ReportResult<Grade> {
        let (system, user) = prompts::grade_section(topic, section, follow_up_count);
        let response = self.planner.complete(&system, &user).await?;

        structured::parse_grade(&response, &section.name)
    }

    async fn write_final_section(
        &self,
        topic: &str,
        section: &Section,
        context: &str,
    ) -> ReportResult<String> {
        let (system, user) = prompts::write_final_section(topic, section, context);
        let response = self.writer.complete(&system, &user).await?;

        Ok(response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned responses and records the system prompts it was given
    struct ScriptedChat {
        label: &'static str,
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn new(label: &'static str, responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                label,
                responses: Mutex::new(responses.iter().rev().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn complete(&self, system_prompt: &str, _user_message: &str) -> ReportResult<String> {
            self.prompts.lock().unwrap().push(system_prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| deepreport_core::ReportError::llm("script exhausted", "scripted_chat"))
        }

        fn model_label(&self) -> String {
            self.label.to_string()
        }
    }

    #[tokio::test]
    async fn test_calls_are_routed_to_planner_or_writer() {
        let planner = ScriptedChat::new(
            "planner",
            &[
                r#"{"queries": ["a", "b", "c"]}"#,
                r#"{"grade": "pass"}"#,
            ],
        );
        let writer = ScriptedChat::new(
            "writer",
            &[r#"{"queries": [{"search_query": "q1"}]}"#, "  ## Draft\nbody  "],
        );
        let model = SiumaiReportModel::new(planner.clone(), writer.clone());
        let section = Section::new("Body", "Main body", true);

        let queries = model.plan_queries("topic", "structure", 2).await.unwrap();
        assert_eq!(queries.len(), 2);

        let queries = model.section_queries("topic", &section, 2).await.unwrap();
        assert_eq!(queries[0].query, "q1");

        let draft = model.write_section("topic", &section, "Sources:").await.unwrap();
        assert_eq!(draft, "## Draft\nbody");

        let grade = model.grade_section("topic", &section, 2).await.unwrap();
        assert!(grade.is_pass());

        assert_eq!(planner.calls(), 2);
        assert_eq!(writer.calls(), 2);
        println!("✅ Planner and writer clients each received their calls");
    }

    #[tokio::test]
    async fn test_plan_sections_parses_outline() {
        let planner = ScriptedChat::new(
            "planner",
            &[r#"Sure! {"sections": [{"name": "Intro", "description": "d", "research": false}]}"#],
        );
        let writer = ScriptedChat::new("writer", &[]);
        let model = SiumaiReportModel::new(planner, writer);

        let request = PlanRequest {
            topic: "topic",
            report_structure: "structure",
            context: "Sources:",
            feedback: None,
        };
        let sections = model.plan_sections(&request).await.unwrap();
        assert_eq!(sections, vec![Section::new("Intro", "d", false)]);
    }
}
