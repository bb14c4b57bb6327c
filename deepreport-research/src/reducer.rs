//! Reducer / state store
//!
//! Branches never touch [`ReportState`] directly. Each one returns a
//! [`BranchContribution`], and the orchestrator folds finished contributions into the store
//! at the join barrier through the pure merge functions below.

use crate::types::ReportState;
use deepreport_core::{ErrorContext, ReportError, ReportResult, Section};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Completed sections keyed by name
pub type CompletedSections = BTreeMap<String, Section>;

/// First non-empty writer wins
pub fn merge_topic(old: &str, new: &str) -> String {
    if old.is_empty() {
        new.to_string()
    } else {
        old.to_string()
    }
}

/// Union of completed sections keyed by name.
///
/// Re-adding an identical section is a no-op. A different section under a name that is
/// already present means two branches claimed the same section, and is rejected.
pub fn merge_completed_sections(
    old: &CompletedSections,
    additions: &[Section],
) -> ReportResult<CompletedSections> {
    let mut merged = old.clone();

    for section in additions {
        match merged.get(&section.name) {
            Some(existing) if existing == section => {
                debug!(section = %section.name, "Ignoring identical re-submission");
            }
            Some(_) => {
                error!(section = %section.name, "Section claimed by more than one branch");
                return Err(ReportError::DuplicateSection {
                    section: section.name.clone(),
                    context: ErrorContext::new("reducer")
                        .with_operation("merge_completed_sections")
                        .with_suggestion("Check that section names in the plan are unique"),
                });
            }
            None => {
                merged.insert(section.name.clone(), section.clone());
            }
        }
    }

    Ok(merged)
}

/// Everything one finished branch contributes to the run state
#[derive(Debug, Clone, Default)]
pub struct BranchContribution {
    pub topic: String,
    pub completed: Vec<Section>,
}

impl BranchContribution {
    pub fn new(topic: &str, completed: Vec<Section>) -> Self {
        Self {
            topic: topic.to_string(),
            completed,
        }
    }
}

/// Owner of the run-scoped [`ReportState`]
#[derive(Debug, Default)]
pub struct ReportStore {
    state: ReportState,
}

impl ReportStore {
    pub fn new(topic: &str, plan_feedback: Option<&str>) -> Self {
        Self {
            state: ReportState {
                topic: merge_topic("", topic),
                plan_feedback: plan_feedback.map(str::to_string),
                ..Default::default()
            },
        }
    }

    /// Record the accepted plan; planned sections start empty
    pub fn set_plan(&mut self, sections: Vec<Section>) {
        self.state.sections = sections
            .into_iter()
            .map(|s| Section {
                content: String::new(),
                ..s
            })
            .collect();
    }

    /// Fold one finished contribution into the state.
    ///
    /// The state is left untouched when the merge is rejected.
    pub fn apply(&mut self, contribution: BranchContribution) -> ReportResult<()> {
        let completed =
            merge_completed_sections(&self.state.completed_sections, &contribution.completed)?;
        self.state.topic = merge_topic(&self.state.topic, &contribution.topic);
        self.state.completed_sections = completed;
        Ok(())
    }

    /// Apply contributions in the given order, stopping at the first rejection
    pub fn apply_all(
        &mut self,
        contributions: impl IntoIterator<Item = BranchContribution>,
    ) -> ReportResult<()> {
        contributions
            .into_iter()
            .try_for_each(|contribution| self.apply(contribution))
    }

    pub fn set_final_report(&mut self, report: String) {
        self.state.final_report = report;
    }

    /// Planned sections not yet completed, in plan order
    pub fn missing_sections(&self) -> Vec<String> {
        self.state
            .sections
            .iter()
            .filter(|s| !self.state.completed_sections.contains_key(&s.name))
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn state(&self) -> &ReportState {
        &self.state
    }

    pub fn into_state(self) -> ReportState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(name: &str, content: &str) -> Section {
        Section::new(name, "desc", true).with_content(content)
    }

    #[test]
    fn test_merge_topic_first_writer_wins() {
        for (old, new) in [("", "X"), ("X", "Y"), ("X", ""), ("", "")] {
            let merged = merge_topic(old, new);
            let expected = if old.is_empty() { new } else { old };
            assert_eq!(merged, expected);
            assert_eq!(merge_topic(&merged, new), expected);
        }
    }

    #[test]
    fn test_merge_completed_sections_is_order_independent() {
        let a = done("A", "a");
        let b = done("B", "b");
        let empty = CompletedSections::new();

        let ab = merge_completed_sections(
            &merge_completed_sections(&empty, &[a.clone()]).unwrap(),
            &[b.clone()],
        )
        .unwrap();
        let ba = merge_completed_sections(
            &merge_completed_sections(&empty, &[b]).unwrap(),
            &[a.clone()],
        )
        .unwrap();

        assert_eq!(ab, ba);

        let again = merge_completed_sections(&ab, &[a]).unwrap();
        assert_eq!(again, ab);
    }

    #[test]
    fn test_conflicting_claim_is_rejected() {
        let existing = merge_completed_sections(&CompletedSections::new(), &[done("A", "one")])
            .unwrap();

        let result = merge_completed_sections(&existing, &[done("A", "two")]);
        match result {
            Err(ReportError::DuplicateSection { section, .. }) => assert_eq!(section, "A"),
            other => panic!("expected duplicate section error, got {:?}", other),
        }
        assert_eq!(existing["A"].content, "one");
    }

    #[test]
    fn test_store_leaves_state_untouched_on_rejection() {
        let mut store = ReportStore::new("X", None);
        store.set_plan(vec![
            Section::new("A", "desc", true),
            Section::new("B", "desc", true),
        ]);

        store
            .apply(BranchContribution::new("X", vec![done("A", "one")]))
            .unwrap();
        assert_eq!(store.missing_sections(), vec!["B".to_string()]);

        let result = store.apply(BranchContribution::new(
            "Y",
            vec![done("B", "b"), done("A", "two")],
        ));
        assert!(result.is_err());
        assert_eq!(store.state().topic, "X");
        assert_eq!(store.state().completed_sections.len(), 1);
    }
}
