//! Final report assembly

use crate::reducer::CompletedSections;
use deepreport_core::{AssemblyConfig, ErrorContext, ReportError, ReportResult, Section};
use tracing::{debug, error};

pub struct ReportAssembler {
    config: AssemblyConfig,
}

impl ReportAssembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    /// Concatenate completed sections in plan order.
    ///
    /// Fails with [`ReportError::IncompleteReport`] naming every planned section that has
    /// no completed entry.
    pub fn assemble(&self, plan: &[Section], completed: &CompletedSections) -> ReportResult<String> {
        let missing: Vec<String> = plan
            .iter()
            .filter(|s| !completed.contains_key(&s.name))
            .map(|s| s.name.clone())
            .collect();

        if !missing.is_empty() {
            error!(missing = ?missing, "Planned sections missing after join");
            return Err(ReportError::IncompleteReport {
                missing,
                context: ErrorContext::new("assembler")
                    .with_operation("assemble")
                    .with_suggestion("Check the logs for failed section branches"),
            });
        }

        let parts: Vec<String> = plan
            .iter()
            .filter_map(|planned| completed.get(&planned.name))
            .map(|section| {
                if self.config.include_headers {
                    format!("## {}\n\n{}", section.name, section.content)
                } else {
                    section.content.clone()
                }
            })
            .collect();

        debug!(sections = parts.len(), "Assembled final report");
        Ok(parts.join(&self.config.separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::merge_completed_sections;

    fn plan() -> Vec<Section> {
        vec![
            Section::new("Intro", "i", false),
            Section::new("Body", "b", true),
            Section::new("Conclusion", "c", false),
        ]
    }

    #[test]
    fn test_assemble_uses_plan_order() {
        // completion order differs from plan order
        let completed = merge_completed_sections(
            &CompletedSections::new(),
            &[
                Section::new("Conclusion", "c", false).with_content("C"),
                Section::new("Body", "b", true).with_content("B"),
                Section::new("Intro", "i", false).with_content("I"),
            ],
        )
        .unwrap();

        let assembler = ReportAssembler::new(AssemblyConfig::default());
        assert_eq!(assembler.assemble(&plan(), &completed).unwrap(), "I\n\nB\n\nC");

        let with_headers = ReportAssembler::new(AssemblyConfig {
            separator: "\n".to_string(),
            include_headers: true,
        });
        assert_eq!(
            with_headers.assemble(&plan(), &completed).unwrap(),
            "## Intro\n\nI\n## Body\n\nB\n## Conclusion\n\nC"
        );
    }

    #[test]
    fn test_missing_sections_are_reported_in_plan_order() {
        let completed = merge_completed_sections(
            &CompletedSections::new(),
            &[Section::new("Body", "b", true).with_content("B")],
        )
        .unwrap();

        let result = ReportAssembler::new(AssemblyConfig::default()).assemble(&plan(), &completed);
        match result {
            Err(ReportError::IncompleteReport { missing, .. }) => {
                assert_eq!(missing, vec!["Intro".to_string(), "Conclusion".to_string()])
            }
            other => panic!("expected incomplete report, got {:?}", other),
        }
    }
}
