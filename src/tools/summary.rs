//! Descriptive statistics per column.

use crate::data_store::DatasetHandle;
use crate::error::{AgentError, Result};
use crate::tools::args::SummaryMetric;
use crate::tools::{AnalysisTool, ToolContext, ToolOutput};
use itertools::Itertools;
use polars::prelude::*;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

const RESULT_FILENAME: &str = "results.json";

/// One cell of the table: a rounded value or "N/A" when it cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Value(f64),
    NotAvailable,
}

impl CellValue {
    fn from_f64(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => CellValue::Value(round4(v)),
            _ => CellValue::NotAvailable,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Value(v) => write!(f, "{}", v),
            CellValue::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::Value(v) => serializer.serialize_f64(*v),
            CellValue::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    pub cells: Vec<(SummaryMetric, CellValue)>,
}

impl ColumnSummary {
    pub fn get(&self, metric: SummaryMetric) -> Option<CellValue> {
        self.cells.iter().find(|(m, _)| *m == metric).map(|(_, v)| *v)
    }
}

/// Column -> metric -> value, serialized in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable(pub Vec<ColumnSummary>);

impl Serialize for SummaryTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for summary in &self.0 {
            map.serialize_entry(&summary.column, &MetricCells(&summary.cells))?;
        }
        map.end()
    }
}

struct MetricCells<'a>(&'a [(SummaryMetric, CellValue)]);

impl Serialize for MetricCells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (metric, value) in self.0 {
            map.serialize_entry(metric.as_str(), value)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct StoredSummary<'a> {
    summary_statistics: &'a SummaryTable,
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .0
            .iter()
            .map(|summary| {
                let cells = summary
                    .cells
                    .iter()
                    .map(|(metric, value)| format!("{}={}", metric, value))
                    .join(", ");
                format!("{}: {}", summary.column, cells)
            })
            .join("\n");
        f.write_str(&lines)
    }
}

pub struct SummaryTool;

/// Arguments after metric normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub columns: Vec<String>,
    pub metrics: Vec<SummaryMetric>,
}

impl AnalysisTool for SummaryTool {
    type Args = SummaryRequest;

    fn name(&self) -> &'static str {
        "summary"
    }

    fn failure_prefix(&self) -> &'static str {
        "Summary statistics failed"
    }

    fn execute(&self, ctx: &ToolContext<'_>, args: &SummaryRequest) -> Result<ToolOutput> {
        let table = summarize(ctx.dataset, &args.columns, &args.metrics)?;

        let stored = serde_json::to_string_pretty(&StoredSummary {
            summary_statistics: &table,
        })?;
        ctx.store
            .store_text(ctx.logical_id, RESULT_FILENAME, &stored)
            .map_err(|e| AgentError::Persistence(format!("Summary stats calculated but failed to upload: {}", e)))?;

        Ok(ToolOutput::Text(format!("Summary stats:\n{}", table)))
    }
}

/// Compute every requested metric for every requested column.
/// Columns are all checked up front; cells that cannot be computed become "N/A".
pub fn summarize(dataset: &DatasetHandle, columns: &[String], metrics: &[SummaryMetric]) -> Result<SummaryTable> {
    let frame = dataset.frame()?;
    let missing: Vec<&String> = columns
        .iter()
        .filter(|c| frame.column(c.as_str()).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(AgentError::Validation(format!("Invalid columns: {:?}", missing)));
    }

    let mut summaries = Vec::with_capacity(columns.len());
    for column in columns {
        let series = dataset.column(column)?;
        let values = if series.dtype().is_numeric() {
            let casted = series.cast(&DataType::Float64)?;
            let values: Vec<f64> = casted.f64()?.into_iter().flatten().collect();
            Some(values)
        } else {
            None
        };

        let cells = metrics
            .iter()
            .map(|metric| {
                let cell = match &values {
                    Some(values) => CellValue::from_f64(compute(*metric, values)),
                    None => CellValue::NotAvailable,
                };
                (*metric, cell)
            })
            .collect();
        summaries.push(ColumnSummary {
            column: column.clone(),
            cells,
        });
    }
    Ok(SummaryTable(summaries))
}

fn compute(metric: SummaryMetric, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    match metric {
        SummaryMetric::Mean => Some(values.iter().sum::<f64>() / n),
        SummaryMetric::Std => {
            if values.len() < 2 {
                return None;
            }
            let mean = values.iter().sum::<f64>() / n;
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            Some((ss / (n - 1.0)).sqrt())
        }
        SummaryMetric::Min => values.iter().copied().reduce(f64::min),
        SummaryMetric::Max => values.iter().copied().reduce(f64::max),
        SummaryMetric::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                Some((sorted[mid - 1] + sorted[mid]) / 2.0)
            } else {
                Some(sorted[mid])
            }
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DatasetHandle {
        DatasetHandle::from_frame(
            df![
                "revenue" => [Some(10.0), Some(20.0), None, Some(30.0)],
                "single" => [Some(5.0), None, None, None],
                "region" => ["north", "south", "east", "west"]
            ]
            .unwrap(),
        )
    }

    #[test]
    fn test_metrics_rounded() {
        let table = summarize(
            &dataset(),
            &["revenue".to_string()],
            &[SummaryMetric::Mean, SummaryMetric::Std, SummaryMetric::Median],
        )
        .unwrap();
        let revenue = &table.0[0];
        assert_eq!(revenue.get(SummaryMetric::Mean), Some(CellValue::Value(20.0)));
        assert_eq!(revenue.get(SummaryMetric::Std), Some(CellValue::Value(10.0)));
        assert_eq!(revenue.get(SummaryMetric::Median), Some(CellValue::Value(20.0)));
    }

    #[test]
    fn test_uncomputable_cells_are_not_available() {
        let table = summarize(
            &dataset(),
            &["region".to_string(), "single".to_string()],
            &[SummaryMetric::Mean, SummaryMetric::Std],
        )
        .unwrap();
        assert_eq!(table.0[0].get(SummaryMetric::Mean), Some(CellValue::NotAvailable));
        assert_eq!(table.0[1].get(SummaryMetric::Mean), Some(CellValue::Value(5.0)));
        assert_eq!(table.0[1].get(SummaryMetric::Std), Some(CellValue::NotAvailable));
        assert_eq!(table.to_string(), "region: mean=N/A, std=N/A\nsingle: mean=5, std=N/A");
    }

    #[test]
    fn test_invalid_columns() {
        let err = summarize(&dataset(), &["revenue".to_string(), "profit".to_string()], &SummaryMetric::DEFAULT)
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Invalid columns: [\"profit\"]");
    }

    #[test]
    fn test_stored_json_shape() {
        let table = summarize(&dataset(), &["revenue".to_string()], &[SummaryMetric::Max, SummaryMetric::Min]).unwrap();
        let json = serde_json::to_value(StoredSummary {
            summary_statistics: &table,
        })
        .unwrap();
        assert_eq!(json["summary_statistics"]["revenue"]["max"], 30.0);
        assert_eq!(json["summary_statistics"]["revenue"]["min"], 10.0);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(compute(SummaryMetric::Median, &[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(compute(SummaryMetric::Mean, &[]), None);
    }
}
