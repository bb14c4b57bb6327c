//! Report engine: plan, fan out, join, reduce, assemble
//!
//! Research branches run as independent tasks bounded by a semaphore. Nothing a branch
//! produces reaches the run state until the join barrier, where the reducer folds the
//! finished contributions in. A failed branch is logged and dropped; the assembler's
//! completeness check then names the missing section. Errors that are fatal to the run
//! (configuration faults, for instance) cancel the remaining branches instead.

use crate::assembler::ReportAssembler;
use crate::planner::{validate_plan, ReportPlanner};
use crate::reducer::{BranchContribution, ReportStore};
use crate::section_loop::SectionResearchLoop;
use crate::types::{ReportOutput, RunSettings, SectionOutcome};
use crate::writer::{format_sections, FinalSectionWriter};
use deepreport_core::{
    log_operation_error, log_operation_start, log_operation_success, performance,
    LanguageModel, ReportConfig, ReportResult, SearchProvider, Section,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct ReportEngine {
    settings: RunSettings,
    planner: ReportPlanner,
    research_loop: SectionResearchLoop,
    writer: FinalSectionWriter,
}

impl ReportEngine {
    /// Create an engine with adapters scoped to this engine's runs
    pub fn new(
        config: &ReportConfig,
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self::with_settings(RunSettings::from(config), model, search)
    }

    pub fn with_settings(
        settings: RunSettings,
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            planner: ReportPlanner::new(Arc::clone(&model), Arc::clone(&search), &settings),
            research_loop: SectionResearchLoop::new(Arc::clone(&model), search, &settings),
            writer: FinalSectionWriter::new(model),
            settings,
        }
    }

    /// Plan, then research and write every section
    pub async fn generate_report(
        &self,
        topic: &str,
        plan_feedback: Option<&str>,
    ) -> ReportResult<ReportOutput> {
        performance::measure_async("generate_report", async {
            let sections = self.plan(topic, plan_feedback).await?;
            self.execute_plan(topic, plan_feedback, sections).await
        })
        .await
    }

    /// Planner stage only. Calling it again with feedback regenerates the plan.
    pub async fn plan(&self, topic: &str, plan_feedback: Option<&str>) -> ReportResult<Vec<Section>> {
        self.planner.plan(topic, plan_feedback).await
    }

    /// Run an accepted plan to a final report.
    ///
    /// `plan_feedback` is the feedback the plan was generated with, if any.
    pub async fn execute_plan(
        &self,
        topic: &str,
        plan_feedback: Option<&str>,
        sections: Vec<Section>,
    ) -> ReportResult<ReportOutput> {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let plan = validate_plan(sections)?;

        log_operation_start!("execute_plan", run_id = %run_id, sections = plan.len());

        let mut store = ReportStore::new(topic, plan_feedback);
        store.set_plan(plan.clone());

        let (research, structural): (Vec<Section>, Vec<Section>) =
            plan.into_iter().partition(|s| s.requires_research);

        // Fan out research branches, join, reduce
        let research_loop = self.research_loop.clone();
        let research_outcomes = self
            .fan_out("research", topic, research, move |topic, section| {
                let research_loop = research_loop.clone();
                async move { research_loop.run(&topic, section).await }
            })
            .await
            .inspect_err(|e| {
                log_operation_error!("execute_plan", e, run_id = %run_id);
            })?;

        let mut section_iterations = BTreeMap::new();
        for outcome in &research_outcomes {
            section_iterations.insert(outcome.section.name.clone(), outcome.iterations);
        }
        store.apply_all(
            research_outcomes
                .into_iter()
                .map(|o| BranchContribution::new(topic, vec![o.section])),
        )?;

        // Structural sections need every research section
        let missing = store.missing_sections();
        let research_missing = missing
            .iter()
            .any(|name| structural.iter().all(|s| &s.name != name));

        if research_missing {
            warn!(
                missing = ?missing,
                "Skipping final sections because research branches failed"
            );
        } else if !structural.is_empty() {
            let accepted: Vec<Section> = store
                .state()
                .sections
                .iter()
                .filter(|s| s.requires_research)
                .filter_map(|s| store.state().completed_sections.get(&s.name).cloned())
                .collect();
            let writer = self.writer.clone();
            let context = Arc::new(format_sections(&accepted));
            let written = self
                .fan_out("write", topic, structural, move |topic, section| {
                    let writer = writer.clone();
                    let context = Arc::clone(&context);
                    async move { writer.write(&topic, section, &context).await }
                })
                .await
                .inspect_err(|e| {
                    log_operation_error!("execute_plan", e, run_id = %run_id);
                })?;

            store.apply_all(
                written
                    .into_iter()
                    .map(|o| BranchContribution::new(topic, vec![o.section])),
            )?;
        }

        let assembler = ReportAssembler::new(self.settings.assembly.clone());
        let final_report = match assembler
            .assemble(&store.state().sections, &store.state().completed_sections)
        {
            Ok(report) => report,
            Err(e) => {
                log_operation_error!("execute_plan", e, run_id = %run_id);
                return Err(e);
            }
        };
        store.set_final_report(final_report);

        let state = store.into_state();
        let sections = state
            .sections
            .iter()
            .filter_map(|s| state.completed_sections.get(&s.name).cloned())
            .collect();

        log_operation_success!(
            "execute_plan",
            run_id = %run_id,
            chars = state.final_report.len()
        );

        Ok(ReportOutput {
            run_id,
            topic: state.topic,
            plan_feedback: state.plan_feedback,
            final_report: state.final_report,
            sections,
            section_iterations,
            started_at,
            completed_at: chrono::Utc::now(),
        })
    }

    /// Run one task per section, at most `max_concurrent_sections` at a time.
    ///
    /// Only successful outcomes are returned; branch failures and panics are logged. An
    /// error that is fatal to the run aborts the remaining branches and is returned.
    async fn fan_out<F, Fut>(
        &self,
        stage: &'static str,
        topic: &str,
        sections: Vec<Section>,
        task: F,
    ) -> ReportResult<Vec<SectionOutcome>>
    where
        F: Fn(String, Section) -> Fut,
        Fut: Future<Output = ReportResult<SectionOutcome>> + Send + 'static,
    {
        if sections.is_empty() {
            return Ok(Vec::new());
        }

        info!(stage, branches = sections.len(), "Fanning out section branches");

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_sections.max(1)));
        let mut branches = JoinSet::new();

        for section in sections {
            let name = section.name.clone();
            let semaphore = Arc::clone(&semaphore);
            let branch = task(topic.to_string(), section);

            branches.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        performance::measure_async("section_branch", branch).await
                    }
                    Err(e) => Err(deepreport_core::ReportError::internal(
                        format!("Branch semaphore closed: {}", e),
                        "report_engine",
                    )),
                };
                (name, result)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = branches.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => outcomes.push(outcome),
                Ok((name, Err(e))) if e.is_fatal_to_run() => {
                    error!(stage, section = %name, error = %e, "Aborting run on fatal branch error");
                    branches.abort_all();
                    return Err(e);
                }
                Ok((name, Err(e))) => {
                    e.log();
                    error!(stage, section = %name, error = %e, "Section branch failed");
                }
                Err(join_error) => {
                    error!(stage, error = %join_error, "Section branch panicked");
                }
            }
        }

        Ok(outcomes)
    }
}
