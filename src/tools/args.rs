//! Typed tool arguments
//!
//! Extractor output is untrusted. It is checked in two phases: the raw JSON
//! object is screened for column names outside the schema snapshot, then it
//! is deserialized into the intent's argument struct and the remaining
//! invariants are enforced. Both phases report [`AgentError::Validation`].

use crate::data_store::DatasetHandle;
use crate::error::{AgentError, Result};
use crate::intent::IntentTag;
use crate::tools::query::ensure_read_only;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const SUGGESTION_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryArgs {
    #[serde(rename = "query", alias = "statement")]
    pub statement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionArgs {
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendArgs {
    pub y: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub x: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryArgs {
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metrics: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub group_by: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMetric {
    Mean,
    Std,
    Min,
    Max,
    Median,
}

impl SummaryMetric {
    pub const DEFAULT: [SummaryMetric; 2] = [SummaryMetric::Mean, SummaryMetric::Std];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMetric::Mean => "mean",
            SummaryMetric::Std => "std",
            SummaryMetric::Min => "min",
            SummaryMetric::Max => "max",
            SummaryMetric::Median => "median",
        }
    }

    /// Map a requested metric name or synonym onto the closed vocabulary.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "mean" | "average" | "avg" => Some(SummaryMetric::Mean),
            "std" | "standard deviation" | "stddev" => Some(SummaryMetric::Std),
            "min" | "minimum" => Some(SummaryMetric::Min),
            "max" | "maximum" => Some(SummaryMetric::Max),
            "median" => Some(SummaryMetric::Median),
            _ => None,
        }
    }

    /// Normalize a request, dropping unknown names and duplicates.
    /// Falls back to mean and std when nothing usable remains.
    pub fn normalize(requested: &[String]) -> Vec<SummaryMetric> {
        let mut metrics: Vec<SummaryMetric> = Vec::new();
        for metric in requested.iter().filter_map(|m| Self::parse(m)) {
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }
        if metrics.is_empty() {
            metrics.extend(Self::DEFAULT);
        }
        metrics
    }
}

impl fmt::Display for SummaryMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated arguments for exactly one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolArguments {
    Query(QueryArgs),
    Distribution(DistributionArgs),
    Trend(TrendArgs),
    Summary {
        columns: Vec<String>,
        metrics: Vec<SummaryMetric>,
    },
}

impl ToolArguments {
    pub fn intent(&self) -> IntentTag {
        match self {
            ToolArguments::Query(_) => IntentTag::Query,
            ToolArguments::Distribution(_) => IntentTag::Distribution,
            ToolArguments::Trend(_) => IntentTag::Trend,
            ToolArguments::Summary { .. } => IntentTag::Summary,
        }
    }

    /// Validate raw extractor output for `intent` and build the typed arguments.
    pub fn build(
        intent: IntentTag,
        raw: Map<String, Value>,
        schema: &[String],
        dataset: &DatasetHandle,
    ) -> Result<Self> {
        match intent {
            IntentTag::Query => {
                let args: QueryArgs = typed(raw)?;
                ensure_read_only(&args.statement)?;
                Ok(ToolArguments::Query(args))
            }
            IntentTag::Distribution => {
                screen_columns(&raw, &["column"], schema)?;
                let args: DistributionArgs = typed(raw)?;
                let series = dataset.column(&args.column)?;
                if !series.dtype().is_numeric() {
                    return Err(AgentError::Validation(format!(
                        "Column '{}' is not numeric and cannot be plotted as a distribution.",
                        args.column
                    )));
                }
                Ok(ToolArguments::Distribution(args))
            }
            IntentTag::Trend => {
                screen_columns(&raw, &["y", "x"], schema)?;
                let args: TrendArgs = typed(raw)?;
                Ok(ToolArguments::Trend(args))
            }
            IntentTag::Summary => {
                screen_columns(&raw, &["columns", "group_by"], schema)?;
                let args: SummaryArgs = typed(raw)?;
                if args.columns.is_empty() {
                    return Err(AgentError::Validation(
                        "No columns selected for summary stats.".to_string(),
                    ));
                }
                if !args.group_by.is_empty() {
                    return Err(AgentError::Validation(format!(
                        "Summary statistics cannot be grouped (requested grouping by {}). Ask it as a query instead, e.g. \"show the average per {}\".",
                        args.group_by.join(", "),
                        args.group_by[0]
                    )));
                }
                Ok(ToolArguments::Summary {
                    columns: args.columns,
                    metrics: SummaryMetric::normalize(&args.metrics),
                })
            }
        }
    }
}

fn typed<T: DeserializeOwned>(raw: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(raw))
        .map_err(|e| AgentError::Validation(format!("Malformed arguments: {}", e)))
}

/// Every string found under `keys` (directly or inside an array) must name a known column.
fn screen_columns(raw: &Map<String, Value>, keys: &[&str], schema: &[String]) -> Result<()> {
    for key in keys {
        let names: Vec<&str> = match raw.get(*key) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        for name in names.into_iter().filter(|n| !n.trim().is_empty()) {
            ensure_known_column(name, schema)?;
        }
    }
    Ok(())
}

pub fn ensure_known_column(name: &str, schema: &[String]) -> Result<()> {
    if schema.iter().any(|c| c == name) {
        return Ok(());
    }
    let message = match closest_column(name, schema) {
        Some(suggestion) => format!(
            "Column '{}' not found in the data. Did you mean '{}'?",
            name, suggestion
        ),
        None => format!("Column '{}' not found in the data.", name),
    };
    Err(AgentError::Validation(message))
}

fn closest_column<'a>(name: &str, schema: &'a [String]) -> Option<&'a str> {
    let needle = name.to_lowercase();
    schema
        .iter()
        .map(|c| (c, strsim::normalized_levenshtein(&needle, &c.to_lowercase())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c.as_str())
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use serde_json::json;

    fn dataset() -> DatasetHandle {
        DatasetHandle::from_frame(
            df![
                "revenue" => [10.0, 20.0],
                "region" => ["north", "south"],
                "date" => ["2024-01-01", "2024-01-08"]
            ]
            .unwrap(),
        )
    }

    fn schema() -> Vec<String> {
        vec!["revenue".into(), "region".into(), "date".into()]
    }

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_metric_synonyms() {
        let requested: Vec<String> = ["average", "standard deviation", "minimum", "maximum"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            SummaryMetric::normalize(&requested),
            vec![SummaryMetric::Mean, SummaryMetric::Std, SummaryMetric::Min, SummaryMetric::Max]
        );
    }

    #[test]
    fn test_metric_fallback() {
        assert_eq!(SummaryMetric::normalize(&[]), SummaryMetric::DEFAULT.to_vec());
        assert_eq!(
            SummaryMetric::normalize(&["variance".to_string(), "mode".to_string()]),
            SummaryMetric::DEFAULT.to_vec()
        );
        assert_eq!(
            SummaryMetric::normalize(&["MEDIAN".to_string(), "median".to_string()]),
            vec![SummaryMetric::Median]
        );
    }

    #[test]
    fn test_summary_build() {
        let args = ToolArguments::build(
            IntentTag::Summary,
            raw(json!({"columns": ["revenue"], "metrics": ["average"]})),
            &schema(),
            &dataset(),
        )
        .unwrap();
        assert_eq!(
            args,
            ToolArguments::Summary {
                columns: vec!["revenue".into()],
                metrics: vec![SummaryMetric::Mean],
            }
        );
    }

    #[test]
    fn test_summary_null_metrics_default() {
        let args = ToolArguments::build(
            IntentTag::Summary,
            raw(json!({"columns": ["revenue"], "metrics": null})),
            &schema(),
            &dataset(),
        )
        .unwrap();
        assert!(matches!(args, ToolArguments::Summary { ref metrics, .. } if metrics == &SummaryMetric::DEFAULT.to_vec()));
    }

    #[test]
    fn test_summary_rejects_empty_and_grouped() {
        let err = ToolArguments::build(IntentTag::Summary, raw(json!({"columns": []})), &schema(), &dataset())
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: No columns selected for summary stats.");

        let err = ToolArguments::build(
            IntentTag::Summary,
            raw(json!({"columns": ["revenue"], "metrics": ["mean"], "group_by": ["region"]})),
            &schema(),
            &dataset(),
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::Validation(ref m) if m.contains("cannot be grouped")));
    }

    #[test]
    fn test_unknown_column_with_suggestion() {
        let err = ToolArguments::build(
            IntentTag::Trend,
            raw(json!({"y": "revenu", "x": "date"})),
            &schema(),
            &dataset(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Column 'revenu' not found in the data. Did you mean 'revenue'?"
        );
    }

    #[test]
    fn test_trend_optional_x() {
        let args = ToolArguments::build(
            IntentTag::Trend,
            raw(json!({"y": "revenue", "x": ""})),
            &schema(),
            &dataset(),
        )
        .unwrap();
        assert_eq!(
            args,
            ToolArguments::Trend(TrendArgs {
                y: "revenue".into(),
                x: None
            })
        );
    }

    #[test]
    fn test_distribution_requires_numeric() {
        let err = ToolArguments::build(
            IntentTag::Distribution,
            raw(json!({"column": "region"})),
            &schema(),
            &dataset(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("is not numeric"));
    }

    #[test]
    fn test_wrong_shape_is_validation_error() {
        let err = ToolArguments::build(
            IntentTag::Distribution,
            raw(json!({"column": 3})),
            &schema(),
            &dataset(),
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::Validation(ref m) if m.starts_with("Malformed arguments")));

        let err = ToolArguments::build(IntentTag::Query, raw(json!({})), &schema(), &dataset()).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn test_query_must_be_read_only() {
        let err = ToolArguments::build(
            IntentTag::Query,
            raw(json!({"query": "DELETE FROM data"})),
            &schema(),
            &dataset(),
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));

        let ok = ToolArguments::build(
            IntentTag::Query,
            raw(json!({"query": "  select region, avg(revenue) from data group by region"})),
            &schema(),
            &dataset(),
        )
        .unwrap();
        assert_eq!(ok.intent(), IntentTag::Query);
    }
}
