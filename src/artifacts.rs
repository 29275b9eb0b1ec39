//! Durable artifact storage
//!
//! Tools hand finished figures and result documents to an [`ArtifactStore`]
//! and get back a reference that outlives the question run.

use crate::error::{AgentError, Result};
use crate::render::{render_svg, Figure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".svg", ".jpg", ".jpeg"];
const STORAGE_HOST_MARKER: &str = "s3.amazonaws.com";

pub trait ArtifactStore: Send + Sync {
    /// Render `figure` and persist it under `logical_id/category`, returning its reference.
    fn render_and_store(&self, figure: &Figure, logical_id: &str, category: &str) -> Result<String>;

    /// Persist a text document as `logical_id/filename`.
    fn store_text(&self, logical_id: &str, filename: &str, content: &str) -> Result<()>;
}

/// Filesystem-backed store writing SVG figures and JSON documents.
pub struct LocalArtifactStore {
    root: PathBuf,
    public_url: Option<String>,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn reference_for(&self, key: &str, path: &Path) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}", base, key),
            None => std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.to_path_buf())
                .display()
                .to_string(),
        }
    }

    fn write(&self, key: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AgentError::Persistence(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(&path, content)
            .map_err(|e| AgentError::Persistence(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.contains("..") || segment.contains('/') || segment.contains('\\') {
        return Err(AgentError::Persistence(format!("Invalid artifact path segment '{}'", segment)));
    }
    Ok(())
}

impl ArtifactStore for LocalArtifactStore {
    fn render_and_store(&self, figure: &Figure, logical_id: &str, category: &str) -> Result<String> {
        check_segment(logical_id)?;
        check_segment(category)?;

        let key = format!("{}/{}/{}.svg", logical_id, category, Uuid::new_v4());
        let svg = render_svg(figure);
        let path = self.write(&key, svg.as_bytes())?;
        info!("Stored figure '{}' at {}", figure.title, path.display());

        Ok(self.reference_for(&key, &path))
    }

    fn store_text(&self, logical_id: &str, filename: &str, content: &str) -> Result<()> {
        check_segment(logical_id)?;
        check_segment(filename)?;

        let key = format!("{}/{}", logical_id, filename);
        let path = self.write(&key, content.as_bytes())?;
        info!("Stored text artifact at {}", path.display());
        Ok(())
    }
}

/// How a caller should present a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Image,
    Text,
}

impl AnswerKind {
    pub fn classify(answer: &str) -> Self {
        let trimmed = answer.trim();
        let lower = trimmed.to_lowercase();
        if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) || trimmed.contains(STORAGE_HOST_MARKER) {
            AnswerKind::Image
        } else {
            AnswerKind::Text
        }
    }
}
