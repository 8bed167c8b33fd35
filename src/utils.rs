//! Utility functions for filename sanitizing, text cleanup, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Filename sanitizing for persisted articles and batch outputs
//! - Whitespace normalization for extracted text
//! - String truncation for logging
//! - JSON error detection for handling LLM response truncation
//! - File system validation for output directories

use crate::error::Result;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Longest filename stem [`sanitize_filename`] produces, in characters.
pub const MAX_FILENAME_CHARS: usize = 100;

static ILLEGAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static NON_WORD_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static BLANK_LINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Turn an article title into a filename stem that is safe on common file systems.
///
/// Characters reserved on Windows or Unix are dropped, then anything that is not
/// a word character, whitespace, or a hyphen. Whitespace runs become a single
/// underscore and the result is capped at [`MAX_FILENAME_CHARS`] characters.
/// When nothing survives, the article ordinal is used instead
/// (`article_<index + 1>`).
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_filename("Breaking: \"AI\" / News?", 0), "Breaking_AI_News");
/// assert_eq!(sanitize_filename("!!!", 4), "article_5");
/// ```
pub fn sanitize_filename(title: &str, index: usize) -> String {
    let without_reserved = ILLEGAL_CHARS.replace_all(title, "");
    let word_only = NON_WORD_CHARS.replace_all(&without_reserved, "");
    let underscored = WHITESPACE_RUN.replace_all(word_only.trim(), "_");
    let clean: String = underscored.chars().take(MAX_FILENAME_CHARS).collect();

    if clean.is_empty() {
        format!("article_{}", index + 1)
    } else {
        clean
    }
}

/// Sanitized stem for `title` that no earlier call with the same `used` set
/// has returned.
///
/// A taken stem falls back to the ordinal `article_<index + 1>`, then to
/// `article_<index + 1>_2`, `_3` and so on until a free name is found.
pub fn claim_filename(title: &str, index: usize, used: &mut HashSet<String>) -> String {
    let preferred = sanitize_filename(title, index);
    if used.insert(preferred.clone()) {
        return preferred;
    }

    let ordinal = format!("article_{}", index + 1);
    let mut candidate = ordinal.clone();
    let mut suffix = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{ordinal}_{suffix}");
        suffix += 1;
    }
    candidate
}

/// Collapse runs of blank lines to a single blank line and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    BLANK_LINE_RUN.replace_all(text, "\n\n").trim().to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended. Truncation never splits a character.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// `YYYYMMDD` for the local date, used in log file names.
pub fn date_stamp() -> String {
    Local::now().format("%Y%m%d").to_string()
}

/// `YYYYMMDD_HHMMSS` for the local time, used in report file names.
pub fn timestamp_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
