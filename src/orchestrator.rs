//! Question pipeline
//!
//! Router -> schema snapshot -> extractor -> validation -> tool. Every failure
//! along the way ends the run with a textual [`RunResult`]; nothing is retried.

use crate::artifacts::ArtifactStore;
use crate::data_store::{DatasetHandle, RELATION_NAME};
use crate::error::{AgentError, Result};
use crate::extractors::ArgumentExtractor;
use crate::intent::{IntentRouter, IntentTag};
use crate::llm::TextGenerator;
use crate::outcome::RunResult;
use crate::tools::{
    run_tool, DistributionTool, QueryTool, SummaryRequest, SummaryTool, ToolArguments, ToolContext, TrendTool,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything decided before a tool runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub intent: IntentTag,
    pub schema: Vec<String>,
    pub arguments: ToolArguments,
}

pub struct DataAgent {
    llm: Arc<dyn TextGenerator>,
    store: Arc<dyn ArtifactStore>,
    preview_rows: usize,
}

impl DataAgent {
    pub fn new(llm: Arc<dyn TextGenerator>, store: Arc<dyn ArtifactStore>, preview_rows: usize) -> Self {
        Self {
            llm,
            store,
            preview_rows,
        }
    }

    /// Route, snapshot the schema, extract and validate arguments.
    pub async fn plan(&self, dataset: &DatasetHandle, question: &str) -> Result<Plan> {
        let intent = IntentRouter::new(self.llm.as_ref()).route(question).await?;

        // Fetched per run so the extractor only ever sees live column names.
        let schema = dataset.list_columns(RELATION_NAME)?;
        debug!("Schema snapshot: {} columns", schema.len());

        let raw = ArgumentExtractor::new(self.llm.as_ref())
            .extract(intent, question, &schema)
            .await
            .map_err(|e| match e {
                AgentError::Parse(msg) => AgentError::Parse(format!("Failed to parse {} input: {}", intent, msg)),
                other => other,
            })?;

        let arguments = ToolArguments::build(intent, raw, &schema, dataset)?;
        Ok(Plan {
            intent,
            schema,
            arguments,
        })
    }

    /// Answer one question. Always returns a result, never an error.
    pub async fn run(&self, dataset: &DatasetHandle, question: &str, logical_id: &str) -> RunResult {
        info!("Question: {}", question);
        let plan = match self.plan(dataset, question).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!("Planning failed ({:?}): {}", err.kind(), err);
                return RunResult::from_error(&err);
            }
        };
        info!("Dispatching {} with {} known columns", plan.intent, plan.schema.len());

        let ctx = ToolContext {
            dataset,
            store: self.store.as_ref(),
            logical_id,
            preview_rows: self.preview_rows,
        };
        dispatch(&ctx, &plan.arguments)
    }
}

fn dispatch(ctx: &ToolContext<'_>, arguments: &ToolArguments) -> RunResult {
    match arguments {
        ToolArguments::Query(args) => run_tool(&QueryTool, ctx, args),
        ToolArguments::Distribution(args) => run_tool(&DistributionTool, ctx, args),
        ToolArguments::Trend(args) => run_tool(&TrendTool, ctx, args),
        ToolArguments::Summary { columns, metrics } => run_tool(
            &SummaryTool,
            ctx,
            &SummaryRequest {
                columns: columns.clone(),
                metrics: metrics.clone(),
            },
        ),
    }
}
