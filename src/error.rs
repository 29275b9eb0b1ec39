use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Data store not initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

/// Coarse classification of an [`AgentError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    Parse,
    Validation,
    Execution,
    Persistence,
    Routing,
    /// The generation service could not be reached or answered badly. Worth resubmitting.
    Generation,
    Fatal,
}

impl ErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Generation)
    }
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Schema(_) => ErrorKind::Schema,
            AgentError::Parse(_) | AgentError::Json(_) => ErrorKind::Parse,
            AgentError::Validation(_) => ErrorKind::Validation,
            AgentError::Execution(_) | AgentError::Polars(_) => ErrorKind::Execution,
            AgentError::Llm(_) => ErrorKind::Generation,
            AgentError::Persistence(_) | AgentError::Io(_) => ErrorKind::Persistence,
            AgentError::Routing(_) => ErrorKind::Routing,
            AgentError::NotInitialized | AgentError::Config(_) => ErrorKind::Fatal,
        }
    }
}

impl From<polars::error::PolarsError> for AgentError {
    fn from(err: polars::error::PolarsError) -> Self {
        AgentError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AgentError::Schema("x".into()).kind(), ErrorKind::Schema);
        assert_eq!(AgentError::Polars("x".into()).kind(), ErrorKind::Execution);
        assert_eq!(AgentError::NotInitialized.kind(), ErrorKind::Fatal);
        assert_eq!(AgentError::Llm("connection reset".into()).kind(), ErrorKind::Generation);
        assert!(ErrorKind::Generation.is_transient());
        assert!(!ErrorKind::Validation.is_transient());

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(AgentError::from(json_err).kind(), ErrorKind::Parse);
    }
}
