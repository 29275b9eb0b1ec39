//! Intent routing
//!
//! Classifies a free-text question into exactly one of four analysis intents
//! with a single constrained generation call. Anything the model answers
//! outside the vocabulary is a routing error, never a silent default.

use crate::error::{AgentError, Result};
use crate::llm::TextGenerator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentTag {
    Query,
    Distribution,
    Trend,
    Summary,
}

impl IntentTag {
    pub const ALL: [IntentTag; 4] = [
        IntentTag::Query,
        IntentTag::Distribution,
        IntentTag::Trend,
        IntentTag::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentTag::Query => "query",
            IntentTag::Distribution => "distribution",
            IntentTag::Trend => "trend",
            IntentTag::Summary => "summary",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            IntentTag::Query => "run a SQL query for lookups, filters, counts, rankings and any grouped aggregation (e.g. \"by region\")",
            IntentTag::Distribution => "plot the distribution (histogram) of one numeric column",
            IntentTag::Trend => "plot how one column changes over time, over another column, or over row order",
            IntentTag::Summary => "compute summary statistics (mean, std, min, max, median) of whole columns",
        }
    }
}

impl fmt::Display for IntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentTag {
    type Err = AgentError;

    /// Trims and case-folds before matching.
    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        IntentTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| AgentError::Routing(format!("Unknown intent '{}'", raw.trim())))
    }
}

/// Builds the router's system instruction.
pub fn router_instruction() -> String {
    let options: Vec<String> = IntentTag::ALL
        .iter()
        .map(|tag| format!("- {}: {}", tag, tag.describe()))
        .collect();

    format!(
        "You are an intelligent tool selector for a CSV analysis agent. \
Given a user question, choose the most appropriate tool to answer it from this list:\n\n\
{}\n\n\
Respond ONLY with one of these tool names: {}. No explanation. No extra words.",
        options.join("\n"),
        IntentTag::ALL.map(|t| t.as_str()).join(", ")
    )
}

pub struct IntentRouter<'a> {
    llm: &'a dyn TextGenerator,
}

impl<'a> IntentRouter<'a> {
    pub fn new(llm: &'a dyn TextGenerator) -> Self {
        Self { llm }
    }

    pub async fn route(&self, question: &str) -> Result<IntentTag> {
        let raw = self.llm.generate(&router_instruction(), question).await?;
        let tag = raw.parse::<IntentTag>()?;
        info!("Intent selected: {}", tag);
        Ok(tag)
    }
}
