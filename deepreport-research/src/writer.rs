//! Writer for sections that need no research

use crate::types::SectionOutcome;
use deepreport_core::{LanguageModel, ReportResult, Section};
use std::sync::Arc;
use tracing::info;

/// Render sections as the context block handed to the final writers
pub fn format_sections(sections: &[Section]) -> String {
    let rule = "=".repeat(60);
    let mut formatted = String::new();

    for (idx, section) in sections.iter().enumerate() {
        let content = if section.content.is_empty() {
            "[Not yet written]"
        } else {
            section.content.as_str()
        };
        formatted.push_str(&format!(
            "\n{rule}\nSection {}: {}\n{rule}\nDescription:\n{}\nRequires Research: \n{}\n\nContent:\n{}\n\n",
            idx + 1,
            section.name,
            section.description,
            section.requires_research,
            content,
        ));
    }

    formatted
}

/// Single-shot writer: no search, no grading
#[derive(Clone)]
pub struct FinalSectionWriter {
    model: Arc<dyn LanguageModel>,
}

impl FinalSectionWriter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn write(
        &self,
        topic: &str,
        section: Section,
        context: &str,
    ) -> ReportResult<SectionOutcome> {
        let content = self
            .model
            .write_final_section(topic, &section, context)
            .await?;

        info!(section = %section.name, chars = content.len(), "Final section written");

        Ok(SectionOutcome {
            section: section.with_content(content),
            iterations: 0,
            passed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sections() {
        let sections = vec![
            Section::new("Runtimes", "Compare runtimes", true).with_content("Tokio leads."),
            Section::new("Ecosystem", "Libraries", true),
        ];

        let formatted = format_sections(&sections);

        assert!(formatted.contains("Section 1: Runtimes"));
        assert!(formatted.contains("Description:\nCompare runtimes"));
        assert!(formatted.contains("Requires Research: \ntrue"));
        assert!(formatted.contains("Content:\nTokio leads."));
        assert!(formatted.contains("Section 2: Ecosystem"));
        assert!(formatted.contains("[Not yet written]"));
        assert_eq!(formatted.matches(&"=".repeat(60)).count(), 4);
    }

    #[test]
    fn test_format_no_sections() {
        assert!(format_sections(&[]).is_empty());
    }
}
