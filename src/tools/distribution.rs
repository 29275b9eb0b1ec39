//! Histogram of a numeric column.

use crate::data_store::numeric_values;
use crate::error::{AgentError, Result};
use crate::render::{Chart, Figure};
use crate::tools::args::DistributionArgs;
use crate::tools::{AnalysisTool, ToolContext, ToolOutput};

pub const BUCKETS: usize = 30;
const CATEGORY: &str = "dist_plots";

pub struct DistributionTool;

impl AnalysisTool for DistributionTool {
    type Args = DistributionArgs;

    fn name(&self) -> &'static str {
        "distribution"
    }

    fn failure_prefix(&self) -> &'static str {
        "Error generating distribution plot"
    }

    fn execute(&self, ctx: &ToolContext<'_>, args: &DistributionArgs) -> Result<ToolOutput> {
        let figure = distribution_figure(ctx, args)?;
        let reference = ctx
            .store
            .render_and_store(&figure, ctx.logical_id, CATEGORY)
            .map_err(|e| AgentError::Persistence(format!("Plot generated but failed to upload: {}", e)))?;
        Ok(ToolOutput::Artifact(reference))
    }
}

fn distribution_figure(ctx: &ToolContext<'_>, args: &DistributionArgs) -> Result<Figure> {
    let series = ctx.dataset.column(&args.column)?;
    if !series.dtype().is_numeric() {
        return Err(AgentError::Validation(format!(
            "Column '{}' is not numeric and cannot be plotted as a distribution.",
            args.column
        )));
    }

    let values = numeric_values(series)?;
    if values.is_empty() {
        return Err(AgentError::Execution(format!(
            "column '{}' has no non-null values",
            args.column
        )));
    }

    let (edges, counts) = histogram(&values, BUCKETS);
    Ok(Figure {
        title: format!("Distribution of {}", args.column),
        x_label: args.column.clone(),
        y_label: "Frequency".to_string(),
        chart: Chart::Histogram { edges, counts },
    })
}

/// Equal-width buckets over `[min, max]`; the last bucket is closed on the right.
/// A constant column gets the range `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], buckets: usize) -> (Vec<f64>, Vec<usize>) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let buckets = buckets.max(1);

    let (mut lo, mut hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if finite.is_empty() {
        lo = 0.0;
        hi = 1.0;
    } else if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / buckets as f64;
    let edges: Vec<f64> = (0..=buckets).map(|i| lo + width * i as f64).collect();

    let mut counts = vec![0usize; buckets];
    for v in &finite {
        let idx = (((v - lo) / width).floor() as usize).min(buckets - 1);
        counts[idx] += 1;
    }
    (edges, counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_bucket_count_and_total() {
        let values: Vec<f64> = (0..100).map(|v| v as f64).collect();
        let (edges, counts) = histogram(&values, BUCKETS);
        assert_eq!(edges.len(), BUCKETS + 1);
        assert_eq!(counts.len(), BUCKETS);
        assert_eq!(counts.iter().sum::<usize>(), 100);
        assert_eq!(edges[0], 0.0);
        assert!((edges[BUCKETS] - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_max_in_last_bucket() {
        let (_, counts) = histogram(&[0.0, 10.0], 10);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[9], 1);
    }

    #[test]
    fn test_histogram_constant_values() {
        let (edges, counts) = histogram(&[4.0, 4.0, 4.0], 2);
        assert_eq!(edges, vec![3.5, 4.0, 4.5]);
        assert_eq!(counts, vec![0, 3]);
    }
}
