use crate::error::{AgentError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Final answer of one question run: text, an artifact reference, or a failure. Never more than one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunResult {
    Text { text: String },
    Artifact { reference: String },
    Failure { kind: ErrorKind, message: String },
}

impl RunResult {
    pub fn text(text: impl Into<String>) -> Self {
        RunResult::Text { text: text.into() }
    }

    pub fn artifact(reference: impl Into<String>) -> Self {
        RunResult::Artifact {
            reference: reference.into(),
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        RunResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(err: &AgentError) -> Self {
        let message = match err {
            AgentError::NotInitialized => "Data store not initialized.".to_string(),
            AgentError::Schema(msg) => format!("Failed to fetch columns: {}", msg),
            AgentError::Parse(msg)
            | AgentError::Validation(msg)
            | AgentError::Execution(msg)
            | AgentError::Persistence(msg)
            | AgentError::Routing(msg) => msg.clone(),
            other => other.to_string(),
        };
        Self::failure(err.kind(), message)
    }

    /// The string surfaced to the caller.
    pub fn answer(&self) -> &str {
        match self {
            RunResult::Text { text } => text,
            RunResult::Artifact { reference } => reference,
            RunResult::Failure { message, .. } => message,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunResult::Failure { .. })
    }

    /// A failure the caller may resolve by resubmitting the same question.
    pub fn is_transient(&self) -> bool {
        self.failure_kind().is_some_and(|kind| kind.is_transient())
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            RunResult::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
