//! Runtime configuration, read from the environment after `.env` is loaded.

use crate::error::{AgentError, Result};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub artifact_dir: PathBuf,
    /// Prepended to artifact keys when set, e.g. a bucket website URL.
    pub public_url: Option<String>,
    pub preview_rows: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            public_url: None,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests never touch process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let preview_rows = match lookup("TABULAR_AGENT_PREVIEW_ROWS") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                AgentError::Config(format!("TABULAR_AGENT_PREVIEW_ROWS must be a positive integer: {}", e))
            })?,
            None => defaults.preview_rows,
        };
        if preview_rows == 0 {
            return Err(AgentError::Config("TABULAR_AGENT_PREVIEW_ROWS must be greater than zero".to_string()));
        }

        Ok(Self {
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            base_url: lookup("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: lookup("OPENAI_MODEL").unwrap_or(defaults.model),
            artifact_dir: lookup("TABULAR_AGENT_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            public_url: lookup("TABULAR_AGENT_PUBLIC_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            preview_rows,
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AgentError::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = AgentConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.preview_rows, DEFAULT_PREVIEW_ROWS);
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("TABULAR_AGENT_PUBLIC_URL", "https://bucket.s3.amazonaws.com/"),
            ("TABULAR_AGENT_PREVIEW_ROWS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.public_url.as_deref(), Some("https://bucket.s3.amazonaws.com"));
        assert_eq!(config.preview_rows, 5);
    }

    #[test]
    fn test_bad_preview_rows() {
        assert!(AgentConfig::from_lookup(lookup_from(&[("TABULAR_AGENT_PREVIEW_ROWS", "abc")])).is_err());
        assert!(AgentConfig::from_lookup(lookup_from(&[("TABULAR_AGENT_PREVIEW_ROWS", "0")])).is_err());
    }
}
