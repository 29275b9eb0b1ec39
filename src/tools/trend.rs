//! Trend plots
//!
//! Rendering depends on the X column:
//! - date-like: weekly sums (weeks end on Sunday), sorted, connected line with markers
//! - numeric: sorted by X, connected line
//! - anything else: mean of Y per X value, bar chart
//! - absent: Y against row position

use crate::data_store::DatasetHandle;
use crate::error::{AgentError, Result};
use crate::render::{Chart, Figure, LinePoint, LineX};
use crate::tools::args::TrendArgs;
use crate::tools::{AnalysisTool, ToolContext, ToolOutput};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

const CATEGORY: &str = "trend_plots";

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y%m%d", "%b %d, %Y", "%d %b %Y",
];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

pub struct TrendTool;

impl AnalysisTool for TrendTool {
    type Args = TrendArgs;

    fn name(&self) -> &'static str {
        "trend"
    }

    fn failure_prefix(&self) -> &'static str {
        "Plotting failed"
    }

    fn execute(&self, ctx: &ToolContext<'_>, args: &TrendArgs) -> Result<ToolOutput> {
        let figure = trend_figure(ctx.dataset, args)?;
        let reference = ctx
            .store
            .render_and_store(&figure, ctx.logical_id, CATEGORY)
            .map_err(|e| AgentError::Persistence(format!("Plot generated but failed to upload: {}", e)))?;
        Ok(ToolOutput::Artifact(reference))
    }
}

/// Build the figure without rendering it. Column lookups happen first.
pub fn trend_figure(dataset: &DatasetHandle, args: &TrendArgs) -> Result<Figure> {
    let y_series = dataset.column(&args.y)?;
    let x_series = match &args.x {
        Some(x) => Some(dataset.column(x)?),
        None => None,
    };

    if !y_series.dtype().is_numeric() {
        return Err(AgentError::Validation(format!(
            "Column '{}' is not numeric and cannot be plotted as a trend.",
            args.y
        )));
    }
    let ys = optional_f64(y_series)?;

    let (title, x_label, chart) = match (args.x.as_deref(), x_series) {
        (Some(x_name), Some(xs)) => {
            let chart = if is_date_like(xs, x_name) {
                debug!("Trend over date column '{}'", x_name);
                let dates = coerce_dates(xs)?;
                let mut pairs: Vec<(NaiveDate, f64)> = dates
                    .into_iter()
                    .zip(ys)
                    .filter_map(|(d, y)| Some((d?, y?)))
                    .collect();
                pairs.sort_by_key(|(d, _)| *d);
                let points = weekly_sum(&pairs)
                    .into_iter()
                    .map(|(week, y)| LinePoint {
                        x: LineX::Date(week),
                        y,
                    })
                    .collect();
                Chart::Line { points, markers: true }
            } else if xs.dtype().is_numeric() {
                let mut pairs: Vec<(f64, f64)> = optional_f64(xs)?
                    .into_iter()
                    .zip(ys)
                    .filter_map(|(x, y)| Some((x?, y?)))
                    .collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
                let points = pairs
                    .into_iter()
                    .map(|(x, y)| LinePoint {
                        x: LineX::Number(x),
                        y,
                    })
                    .collect();
                Chart::Line { points, markers: false }
            } else {
                let keys = optional_strings(xs)?;
                Chart::Bar {
                    bars: group_mean(keys.into_iter().zip(ys)),
                }
            };
            (format!("{} over {}", args.y, x_name), x_name.to_string(), chart)
        }
        _ => {
            let points = ys
                .into_iter()
                .enumerate()
                .filter_map(|(i, y)| {
                    y.map(|y| LinePoint {
                        x: LineX::Number(i as f64),
                        y,
                    })
                })
                .collect();
            (
                format!("{} Trend (Row-wise)", args.y),
                "Index".to_string(),
                Chart::Line { points, markers: false },
            )
        }
    };

    let empty = match &chart {
        Chart::Line { points, .. } => points.is_empty(),
        Chart::Bar { bars } => bars.is_empty(),
        Chart::Histogram { counts, .. } => counts.is_empty(),
    };
    if empty {
        return Err(AgentError::Execution(
            "no rows left to plot after dropping missing values".to_string(),
        ));
    }

    Ok(Figure {
        title,
        x_label,
        y_label: args.y.clone(),
        chart,
    })
}

fn optional_f64(series: &Series) -> Result<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    let values = casted.f64()?.into_iter().collect();
    Ok(values)
}

fn optional_strings(series: &Series) -> Result<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Temporal dtype, a name containing "date", or text whose values all parse as dates.
pub fn is_date_like(series: &Series, name: &str) -> bool {
    match series.dtype() {
        DataType::Date | DataType::Datetime(_, _) => true,
        _ if name.to_lowercase().contains("date") => true,
        DataType::String => match series.str() {
            Ok(ca) => {
                let mut seen = false;
                for value in ca.into_iter().flatten() {
                    if parse_date(value).is_none() {
                        return false;
                    }
                    seen = true;
                }
                seen
            }
            Err(_) => false,
        },
        _ => false,
    }
}

/// Coerce to calendar dates; values that do not parse become null.
pub fn coerce_dates(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
    let as_date = match series.dtype() {
        DataType::Date => Some(series.clone()),
        DataType::Datetime(_, _) => Some(series.cast(&DataType::Date)?),
        _ => None,
    };

    if let Some(dates) = as_date {
        let days = dates.cast(&DataType::Int32)?;
        return Ok(days
            .i32()?
            .into_iter()
            .map(|d| d.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE)))
            .collect());
    }

    Ok(optional_strings(series)?
        .into_iter()
        .map(|v| v.and_then(|s| parse_date(&s)))
        .collect())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// The Sunday closing the week that contains `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let offset = 6 - date.weekday().num_days_from_monday() as i64;
    date + Duration::days(offset)
}

/// Sum values per week, emitting every week between the first and last (empty weeks sum to 0).
pub fn weekly_sum(pairs: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in pairs {
        *buckets.entry(week_ending(*date)).or_insert(0.0) += value;
    }

    let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };

    let mut weeks = Vec::new();
    let mut week = first;
    while week <= last {
        weeks.push((week, buckets.get(&week).copied().unwrap_or(0.0)));
        week = week + Duration::days(7);
    }
    weeks
}

/// Mean of Y per X value, ordered by X.
fn group_mean(pairs: impl Iterator<Item = (Option<String>, Option<f64>)>) -> Vec<(String, f64)> {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (key, value) in pairs {
        if let (Some(key), Some(value)) = (key, value) {
            let entry = groups.entry(key).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    groups
        .into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_ending_is_sunday() {
        // 2024-01-01 is a Monday
        assert_eq!(week_ending(date(2024, 1, 1)), date(2024, 1, 7));
        assert_eq!(week_ending(date(2024, 1, 7)), date(2024, 1, 7));
        assert_eq!(week_ending(date(2024, 1, 8)), date(2024, 1, 14));
    }

    #[test]
    fn test_weekly_sum_fills_gaps() {
        let pairs = vec![
            (date(2024, 1, 2), 1.0),
            (date(2024, 1, 3), 2.0),
            (date(2024, 1, 20), 5.0),
        ];
        assert_eq!(
            weekly_sum(&pairs),
            vec![
                (date(2024, 1, 7), 3.0),
                (date(2024, 1, 14), 0.0),
                (date(2024, 1, 21), 5.0)
            ]
        );
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("03/05/2024"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 10:30:00"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("north"), None);
    }

    #[test]
    fn test_order_date_is_weekly_and_sorted() {
        let df = df![
            "order_date" => ["2024-01-15", "2024-01-02", "2024-01-09", "2024-01-03"],
            "sales" => [4.0, 1.0, 3.0, 2.0]
        ]
        .unwrap();
        let dataset = DatasetHandle::from_frame(df);
        let figure = trend_figure(
            &dataset,
            &TrendArgs {
                y: "sales".into(),
                x: Some("order_date".into()),
            },
        )
        .unwrap();

        assert_eq!(figure.title, "sales over order_date");
        match figure.chart {
            Chart::Line { points, markers } => {
                assert!(markers);
                let weeks: Vec<LineX> = points.iter().map(|p| p.x).collect();
                assert_eq!(
                    weeks,
                    vec![
                        LineX::Date(date(2024, 1, 7)),
                        LineX::Date(date(2024, 1, 14)),
                        LineX::Date(date(2024, 1, 21))
                    ]
                );
                let sums: Vec<f64> = points.iter().map(|p| p.y).collect();
                assert_eq!(sums, vec![3.0, 3.0, 4.0]);
            }
            other => panic!("expected line chart, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_x_sorted_line() {
        let df = df![
            "step" => [Some(3i64), Some(1), None, Some(2)],
            "loss" => [Some(0.3), Some(0.9), Some(0.5), None]
        ]
        .unwrap();
        let figure = trend_figure(
            &DatasetHandle::from_frame(df),
            &TrendArgs {
                y: "loss".into(),
                x: Some("step".into()),
            },
        )
        .unwrap();
        match figure.chart {
            Chart::Line { points, markers } => {
                assert!(!markers);
                assert_eq!(
                    points,
                    vec![
                        LinePoint { x: LineX::Number(1.0), y: 0.9 },
                        LinePoint { x: LineX::Number(3.0), y: 0.3 },
                    ]
                );
            }
            other => panic!("expected line chart, got {:?}", other),
        }
    }

    #[test]
    fn test_categorical_x_bar_of_means() {
        let df = df![
            "region" => ["south", "north", "south"],
            "revenue" => [10.0, 4.0, 20.0]
        ]
        .unwrap();
        let figure = trend_figure(
            &DatasetHandle::from_frame(df),
            &TrendArgs {
                y: "revenue".into(),
                x: Some("region".into()),
            },
        )
        .unwrap();
        assert_eq!(
            figure.chart,
            Chart::Bar {
                bars: vec![("north".to_string(), 4.0), ("south".to_string(), 15.0)]
            }
        );
    }

    #[test]
    fn test_row_index_without_x() {
        let df = df!["revenue" => [Some(1.0), None, Some(3.0)]].unwrap();
        let figure = trend_figure(
            &DatasetHandle::from_frame(df),
            &TrendArgs {
                y: "revenue".into(),
                x: None,
            },
        )
        .unwrap();
        assert_eq!(figure.x_label, "Index");
        match figure.chart {
            Chart::Line { points, .. } => {
                assert_eq!(points.len(), 2);
                assert_eq!(points[1].x, LineX::Number(2.0));
            }
            other => panic!("expected line chart, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_before_render() {
        let df = df!["revenue" => [1.0]].unwrap();
        let err = trend_figure(
            &DatasetHandle::from_frame(df),
            &TrendArgs {
                y: "revenue".into(),
                x: Some("date".into()),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Column 'date' not found in the data");
    }
}
