//! Tabular data store
//!
//! Loads one CSV file into an in-memory relation named `data` and exposes
//! schema introspection plus read queries over it. Loading is tolerant:
//! undecodable bytes fall back to Latin-1 and malformed records are dropped.

use crate::error::{AgentError, Result};
use polars::prelude::*;
use polars::sql::SQLContext;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The only relation name the store answers to.
pub const RELATION_NAME: &str = "data";

const INFER_SCHEMA_ROWS: usize = 1000;

/// Outcome of loading a CSV source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub dropped_rows: usize,
    pub columns: Vec<String>,
    pub lossy_decoding: bool,
}

/// One loaded relation, owned by a single question run.
pub struct DatasetHandle {
    source: Option<PathBuf>,
    frame: Option<DataFrame>,
}

impl DatasetHandle {
    /// A handle with nothing loaded. Every read reports [`AgentError::NotInitialized`].
    pub fn uninitialized() -> Self {
        Self {
            source: None,
            frame: None,
        }
    }

    pub fn from_frame(frame: DataFrame) -> Self {
        Self {
            source: None,
            frame: Some(frame),
        }
    }

    /// Load a CSV file from a local path.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<(Self, LoadReport)> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            AgentError::Execution(format!("Failed to read CSV {}: {}", path.display(), e))
        })?;

        let (frame, report) = parse_csv_bytes(&bytes)?;
        info!(
            "Loaded {} rows x {} columns from {} ({} malformed rows dropped)",
            report.rows,
            report.columns.len(),
            path.display(),
            report.dropped_rows
        );

        Ok((
            Self {
                source: Some(path.to_path_buf()),
                frame: Some(frame),
            },
            report,
        ))
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.frame.is_some()
    }

    pub fn frame(&self) -> Result<&DataFrame> {
        self.frame.as_ref().ok_or(AgentError::NotInitialized)
    }

    /// Ordered column names of `relation`.
    pub fn list_columns(&self, relation: &str) -> Result<Vec<String>> {
        if relation != RELATION_NAME {
            return Err(AgentError::Schema(format!("Unknown relation '{}'", relation)));
        }
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| AgentError::Schema("no dataset is loaded".to_string()))?;

        Ok(frame.get_column_names().iter().map(|s| s.to_string()).collect())
    }

    pub fn column(&self, name: &str) -> Result<&Series> {
        let frame = self.frame()?;
        frame
            .column(name)
            .map_err(|_| AgentError::Validation(format!("Column '{}' not found in the data", name)))
    }

    /// Run a read statement against the `data` relation.
    pub fn execute(&self, statement: &str) -> Result<DataFrame> {
        let frame = self.frame()?;
        let mut ctx = SQLContext::new();
        ctx.register(RELATION_NAME, frame.clone().lazy());

        let result = ctx
            .execute(statement)
            .and_then(|lf| lf.collect())
            .map_err(|e| AgentError::Execution(e.to_string()))?;

        Ok(result)
    }
}

/// Decode, clean and parse raw CSV bytes.
pub fn parse_csv_bytes(bytes: &[u8]) -> Result<(DataFrame, LoadReport)> {
    let (text, lossy_decoding) = decode_tolerant(bytes);
    if lossy_decoding {
        warn!("CSV is not valid UTF-8, decoded as Latin-1");
    }

    let (cleaned, dropped_rows) = drop_malformed_records(&text)?;

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .into_reader_with_file_handle(Cursor::new(cleaned))
        .finish()
        .map_err(|e| AgentError::Execution(format!("Failed to parse CSV: {}", e)))?;

    let report = LoadReport {
        rows: frame.height(),
        dropped_rows,
        columns: frame.get_column_names().iter().map(|s| s.to_string()).collect(),
        lossy_decoding,
    };

    Ok((frame, report))
}

/// UTF-8 when possible, otherwise Latin-1 (every byte maps to one char).
fn decode_tolerant(bytes: &[u8]) -> (String, bool) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), false),
        Err(_) => (bytes.iter().map(|&b| b as char).collect(), true),
    }
}

/// Re-emit the CSV keeping only records with as many fields as the header.
fn drop_malformed_records(text: &str) -> Result<(Vec<u8>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    let mut records = reader.records();
    let header = match records.next() {
        Some(Ok(header)) if !header.is_empty() => header,
        Some(Err(e)) => return Err(AgentError::Execution(format!("Unreadable CSV header: {}", e))),
        _ => return Err(AgentError::Execution("CSV file has no header row".to_string())),
    };
    let width = header.len();
    writer
        .write_record(&header)
        .map_err(|e| AgentError::Execution(e.to_string()))?;

    let mut dropped = 0;
    for record in records {
        match record {
            Ok(record) if record.len() == width => writer
                .write_record(&record)
                .map_err(|e| AgentError::Execution(e.to_string()))?,
            _ => dropped += 1,
        }
    }

    let cleaned = writer
        .into_inner()
        .map_err(|e| AgentError::Execution(format!("Failed to buffer cleaned CSV: {}", e)))?;
    Ok((cleaned, dropped))
}

/// Non-null values of a numeric series as `f64`.
pub fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    if !series.dtype().is_numeric() {
        return Err(AgentError::Validation(format!(
            "Column '{}' is not numeric",
            series.name()
        )));
    }
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().flatten().collect())
}
