//! Batch transforms over saved files.
//!
//! Each transform is a stateless pass: list the inputs in a directory that
//! match a glob pattern, process each one independently, and write one output
//! file per input. Neither touches the browsing context.
//!
//! | Transform | Module | Input | Output |
//! |-----------|--------|-------|--------|
//! | Content extraction | [`extract`] | `output/html/*.txt` | `output/extracted_articles/<title>.txt` |
//! | Translation | [`translate`] | `output/extracted_articles/*.txt` | `output/translated_articles/翻译_<title>.txt` |
//!
//! Both outputs start with a header block of `label: value` lines closed by a
//! `=` rule; [`ArticleHeader`] writes and reads it.

pub mod extract;
pub mod translate;

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

pub const TITLE_LABEL: &str = "标题";
pub const SOURCE_LABEL: &str = "来源文件";
pub const EXTRACTION_STATUS_LABEL: &str = "提取状态";
pub const TRANSLATION_STATUS_LABEL: &str = "翻译状态";
pub const TRANSLATED_AT_LABEL: &str = "翻译时间";

/// Header block at the top of extracted and translated article files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleHeader {
    /// `(label, value)` pairs in file order.
    pub fields: Vec<(String, String)>,
}

impl ArticleHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, label: &str, value: impl Into<String>) -> Self {
        self.fields.push((label.to_string(), value.into()));
        self
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Header lines, a rule of `rule_width` `=`, a blank line, then `body`.
    pub fn render(&self, rule_width: usize, body: &str) -> String {
        let mut out = String::new();
        for (label, value) in &self.fields {
            out.push_str(label);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str(&"=".repeat(rule_width));
        out.push_str("\n\n");
        out.push_str(body);
        out
    }

    /// Split a rendered file back into its header and trimmed body.
    ///
    /// Lines before the `===` rule that look like `label: value` become fields;
    /// everything after the rule is the body.
    pub fn parse(text: &str) -> (Self, String) {
        let mut header = Self::new();
        let mut body = String::new();
        let mut in_body = false;

        for line in text.lines() {
            if in_body {
                body.push_str(line);
                body.push('\n');
            } else if line.starts_with("===") {
                in_body = true;
            } else if let Some((label, value)) = line.split_once(':') {
                header
                    .fields
                    .push((label.trim().to_string(), value.trim().to_string()));
            }
        }
        (header, body.trim().to_string())
    }
}

/// Compile a file-name glob (`*` and `?` wildcards) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$"))
        .map_err(|e| Error::Config(format!("invalid file pattern {pattern}: {e}")))
}

/// Files directly inside `dir` whose names match `pattern`, sorted by name.
///
/// A missing directory yields no inputs.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), pattern))]
pub fn discover_inputs(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob_to_regex(pattern)?;
    if !dir.is_dir() {
        warn!("Input directory does not exist");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matcher.is_match(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    info!(count = files.len(), "Discovered input files");
    Ok(files)
}

/// File name of `path` for reports and headers.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
