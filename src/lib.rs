//! Natural-language questions over a CSV file.
//!
//! A question is routed to one of four analysis intents, its arguments are
//! extracted by a language model against the live column list, validated,
//! and handed to the matching tool.

pub mod artifacts;
pub mod config;
pub mod data_store;
pub mod error;
pub mod extractors;
pub mod intent;
pub mod llm;
pub mod orchestrator;
pub mod outcome;
pub mod render;
pub mod service;
pub mod tools;

pub use artifacts::{AnswerKind, ArtifactStore, LocalArtifactStore};
pub use config::AgentConfig;
pub use data_store::{DatasetHandle, LoadReport};
pub use error::{AgentError, ErrorKind, Result};
pub use intent::IntentTag;
pub use llm::{LlmClient, TextGenerator};
pub use orchestrator::{DataAgent, Plan};
pub use outcome::RunResult;
pub use service::{Answer, AnswerCache, CacheStats, InMemoryAnswerCache, QuestionService};
pub use tools::ToolArguments;
