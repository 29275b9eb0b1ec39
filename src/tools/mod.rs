//! Analysis tools
//!
//! Each tool executes validated arguments against the dataset and produces
//! either text or a durable artifact reference. Failures never escape a tool:
//! [`run_tool`] converts them into a textual [`RunResult`].

pub mod args;
pub mod distribution;
pub mod query;
pub mod summary;
pub mod trend;

pub use args::{DistributionArgs, QueryArgs, SummaryArgs, SummaryMetric, ToolArguments, TrendArgs};
pub use distribution::DistributionTool;
pub use query::QueryTool;
pub use summary::{SummaryRequest, SummaryTool};
pub use trend::TrendTool;

use crate::artifacts::ArtifactStore;
use crate::data_store::DatasetHandle;
use crate::error::{AgentError, Result};
use crate::outcome::RunResult;
use std::time::Instant;
use tracing::{info, warn};

/// What a tool produced on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Text(String),
    Artifact(String),
}

/// Everything a tool needs for one invocation.
pub struct ToolContext<'a> {
    pub dataset: &'a DatasetHandle,
    pub store: &'a dyn ArtifactStore,
    /// Namespace for stored artifacts, usually the uploaded file's id.
    pub logical_id: &'a str,
    pub preview_rows: usize,
}

pub trait AnalysisTool {
    type Args;

    fn name(&self) -> &'static str;

    /// Prefix for unexpected failures, e.g. "Plotting failed".
    fn failure_prefix(&self) -> &'static str;

    fn execute(&self, ctx: &ToolContext<'_>, args: &Self::Args) -> Result<ToolOutput>;
}

pub fn run_tool<T: AnalysisTool>(tool: &T, ctx: &ToolContext<'_>, args: &T::Args) -> RunResult {
    let started = Instant::now();
    match tool.execute(ctx, args) {
        Ok(ToolOutput::Text(text)) => {
            info!("{} finished in {}ms", tool.name(), started.elapsed().as_millis());
            RunResult::text(text)
        }
        Ok(ToolOutput::Artifact(reference)) => {
            info!("{} stored artifact in {}ms", tool.name(), started.elapsed().as_millis());
            RunResult::artifact(reference)
        }
        Err(err) => {
            warn!("{} failed: {}", tool.name(), err);
            match err {
                AgentError::NotInitialized
                | AgentError::Validation(_)
                | AgentError::Persistence(_) => RunResult::from_error(&err),
                other => {
                    let detail = match &other {
                        AgentError::Execution(msg) | AgentError::Polars(msg) => msg.clone(),
                        o => o.to_string(),
                    };
                    RunResult::failure(other.kind(), format!("{}: {}", tool.failure_prefix(), detail))
                }
            }
        }
    }
}
