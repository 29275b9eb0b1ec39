//! Ad-hoc SQL over the `data` relation.

use crate::error::{AgentError, Result};
use crate::tools::args::QueryArgs;
use crate::tools::{AnalysisTool, ToolContext, ToolOutput};
use polars::prelude::*;
use regex::Regex;
use sqlparser::ast::{Expr as SqlExpr, GroupByExpr, Query, SetExpr, Statement, Value as SqlValue};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::io::Cursor;
use std::sync::OnceLock;
use tracing::debug;

const RESULT_FILENAME: &str = "sql_result.json";

fn select_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*select\b").expect("static regex"))
}

/// Reject anything that is not a single retrieval statement.
pub fn ensure_read_only(statement: &str) -> Result<()> {
    if !select_prefix().is_match(statement) {
        return Err(AgentError::Validation(format!(
            "Invalid SQL generated: {}",
            statement.trim()
        )));
    }

    // Statements sqlparser cannot read are left for the engine to report.
    if let Ok(parsed) = Parser::parse_sql(&GenericDialect {}, statement) {
        let query = match parsed.as_slice() {
            [Statement::Query(query)] => query,
            _ => {
                return Err(AgentError::Validation(format!(
                    "Only a single SELECT statement is allowed, got {} statements",
                    parsed.len()
                )))
            }
        };
        if let Some(clause) = unsupported_clause(query) {
            return Err(AgentError::Validation(format!(
                "Unsupported SQL: {} gives wrong results on this engine. Refer to columns by name and do not use HAVING.",
                clause
            )));
        }
    }
    Ok(())
}

/// Clauses the polars SQL engine accepts but evaluates incorrectly.
fn unsupported_clause(query: &Query) -> Option<&'static str> {
    if query.order_by.iter().any(|o| is_ordinal(&o.expr)) {
        return Some("ORDER BY column position");
    }
    if let SetExpr::Select(select) = query.body.as_ref() {
        if let GroupByExpr::Expressions(exprs) = &select.group_by {
            if exprs.iter().any(is_ordinal) {
                return Some("GROUP BY column position");
            }
        }
        if select.having.is_some() {
            return Some("HAVING");
        }
    }
    None
}

fn is_ordinal(expr: &SqlExpr) -> bool {
    matches!(expr, SqlExpr::Value(SqlValue::Number(_, _)))
}

pub struct QueryTool;

impl AnalysisTool for QueryTool {
    type Args = QueryArgs;

    fn name(&self) -> &'static str {
        "query"
    }

    fn failure_prefix(&self) -> &'static str {
        "SQL execution failed"
    }

    fn execute(&self, ctx: &ToolContext<'_>, args: &QueryArgs) -> Result<ToolOutput> {
        ensure_read_only(&args.statement)?;
        debug!("Executing: {}", args.statement);

        let mut result = ctx.dataset.execute(&args.statement)?;

        let records = frame_to_json_records(&mut result)?;
        ctx.store
            .store_text(ctx.logical_id, RESULT_FILENAME, &records)
            .map_err(|e| AgentError::Persistence(format!("Query executed but failed to store the result set: {}", e)))?;

        Ok(ToolOutput::Text(format!(
            "SQL query executed successfully. Result:\n{}",
            format_preview(&result, ctx.preview_rows)
        )))
    }
}

fn frame_to_json_records(frame: &mut DataFrame) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    JsonWriter::new(&mut buffer)
        .with_json_format(JsonFormat::Json)
        .finish(frame)?;
    String::from_utf8(buffer.into_inner())
        .map_err(|e| AgentError::Execution(format!("Result set is not valid UTF-8: {}", e)))
}

fn cell_text(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => "null".to_string(),
        AnyValue::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Plain-text table of the first `max_rows` rows.
pub fn format_preview(frame: &DataFrame, max_rows: usize) -> String {
    let shown = frame.height().min(max_rows);
    let columns = frame.get_columns();

    let mut lines = vec![frame
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" | ")];

    for row in 0..shown {
        let cells: Vec<String> = columns
            .iter()
            .map(|s| s.get(row).map(cell_text).unwrap_or_default())
            .collect();
        lines.push(cells.join(" | "));
    }

    if frame.height() > shown {
        lines.push(format!("... {} more rows ({} total)", frame.height() - shown, frame.height()));
    } else {
        lines.push(format!("({} rows)", frame.height()));
    }
    lines.join("\n")
}
