//! Persistence of article text under the workspace root.
//!
//! Writes always overwrite: saving the same content to the same path twice
//! leaves one identical file.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Destination for accepted article bodies.
pub trait ArticleSink {
    /// Write `content` at `relative` (resolved against the sink's root).
    /// Returns the written path, or `None` when the write failed.
    async fn save(&self, content: &str, relative: &Path) -> Option<PathBuf>;
}

/// File-system sink rooted at a directory.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    root: PathBuf,
}

impl ArticleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Fallible write; creates missing parent directories.
    pub async fn write(&self, content: &str, relative: &Path) -> Result<PathBuf> {
        let full_path = self.root.join(relative);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, content.as_bytes()).await?;
        Ok(full_path)
    }
}

impl ArticleSink for ArticleStore {
    #[instrument(level = "info", skip_all, fields(path = %relative.display()))]
    async fn save(&self, content: &str, relative: &Path) -> Option<PathBuf> {
        match self.write(content, relative).await {
            Ok(path) => {
                info!(path = %path.display(), bytes = content.len(), "Article saved");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "Failed to write article");
                None
            }
        }
    }
}
