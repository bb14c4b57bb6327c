//! DeepReport LLM - language model adapter over siumai
//!
//! Turns each orchestration call site into a prompt, sends it to the planner or writer
//! client, and parses the structured answer back into domain types.

pub mod azure;
pub mod client;
pub mod model;
pub mod prompts;
pub mod structured;

pub use azure::{AzureDeployment, AzureOpenAiClient};
pub use client::{build_chat_model, ChatModel, ModelInfo, ReportLlmClient};
pub use model::SiumaiReportModel;
