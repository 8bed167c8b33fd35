//! On-disk layout under the configured root directory.
//!
//! ```text
//! <root>/
//! ├── output/
//! │   ├── html/                   # raw article bodies from `crawl`
//! │   ├── extracted_articles/     # header + body from `extract`
//! │   ├── translated_articles/    # 翻译_<title>.txt from `translate`
//! │   └── reports/                # JSON run summaries
//! └── logs/                       # <component>_<YYYYMMDD>.log, error snapshots
//! ```

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Relative directory for raw article bodies.
pub const HTML_DIR: &str = "output/html";
/// Relative directory for batch-extracted articles.
pub const EXTRACTED_DIR: &str = "output/extracted_articles";
/// Relative directory for translated articles.
pub const TRANSLATED_DIR: &str = "output/translated_articles";
/// Relative directory for run reports.
pub const REPORTS_DIR: &str = "output/reports";
/// Relative directory for log files and diagnostic snapshots.
pub const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Use `root` when given, the working directory otherwise.
    pub fn resolve(root: Option<&str>) -> Result<Self> {
        let root = match root {
            Some(r) if !r.trim().is_empty() => PathBuf::from(r),
            _ => std::env::current_dir()?,
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the root; absolute paths pass through.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn html_dir(&self) -> PathBuf {
        self.join(HTML_DIR)
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.join(EXTRACTED_DIR)
    }

    pub fn translated_dir(&self) -> PathBuf {
        self.join(TRANSLATED_DIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.join(REPORTS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.join(LOGS_DIR)
    }
}

/// Fail with [`Error::MissingCredential`] when a required secret is absent or blank.
pub fn require_credential(name: &str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::MissingCredential(name.to_string())),
    }
}
