//! DeepReport Research - report orchestration
//!
//! Planning, the per-section research loop, fan-out/fan-in across sections, the explicit
//! reducer that merges branch contributions, and final assembly.

pub mod assembler;
pub mod engine;
pub mod planner;
pub mod reducer;
pub mod section_loop;
pub mod types;
pub mod writer;

pub use assembler::ReportAssembler;
pub use engine::ReportEngine;
pub use planner::{validate_plan, ReportPlanner};
pub use reducer::{
    merge_completed_sections, merge_topic, BranchContribution, CompletedSections, ReportStore,
};
pub use section_loop::{LoopState, SectionResearchLoop};
pub use types::*;
pub use writer::{format_sections, FinalSectionWriter};
