//! Content extraction from saved pages.
//!
//! Each input is parsed with `scraper`; the article body is the text of the
//! first selector, primary then fallbacks in order, whose matched element
//! yields non-empty text. The title comes from `<title>` with the site suffix
//! removed, or from the file name when the page has none.

use super::{
    ArticleHeader, EXTRACTION_STATUS_LABEL, SOURCE_LABEL, TITLE_LABEL, discover_inputs, file_name,
};
use crate::error::{Error, Result};
use crate::models::{BatchEntry, BatchReport, ExtractedArticle, ExtractionStatus};
use crate::storage::{ArticleSink, ArticleStore};
use crate::utils::{claim_filename, normalize_whitespace};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// Width of the `=` rule closing the header of an extracted file.
pub const EXTRACTED_RULE_WIDTH: usize = 50;

/// Selectors used to locate the article body, loadable from YAML.
///
/// ```yaml
/// primary: ".article-content-body"
/// fallbacks: ["article", ".post-content"]
/// title_suffix: " - The Atlantic"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub primary: String,
    pub fallbacks: Vec<String>,
    /// Removed from the end of `<title>` when present.
    pub title_suffix: String,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            primary: ".article-content-body".to_string(),
            fallbacks: [
                "article",
                ".article-body",
                ".post-content",
                ".entry-content",
                r#"[data-event-surface="article"]"#,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            title_suffix: " - The Atlantic".to_string(),
        }
    }
}

impl SelectorSet {
    /// Read a selector set from a YAML file; missing keys keep their defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).await?;
        let set: SelectorSet = serde_yaml::from_str(&text)?;
        info!(path = %path.display(), fallbacks = set.fallbacks.len(), "Loaded selector set");
        Ok(set)
    }

    /// Parse every selector up front so a typo fails the run before any file is read.
    pub fn compile(&self) -> Result<Extractor> {
        let mut selectors = Vec::with_capacity(self.fallbacks.len() + 1);
        for raw in std::iter::once(&self.primary).chain(self.fallbacks.iter()) {
            selectors.push((raw.clone(), parse_selector(raw)?));
        }
        Ok(Extractor {
            selectors,
            title: parse_selector("title")?,
            title_suffix: self.title_suffix.clone(),
        })
    }
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| Error::Config(format!("invalid CSS selector {raw:?}: {e}")))
}

/// Compiled form of a [`SelectorSet`].
#[derive(Debug)]
pub struct Extractor {
    /// Primary first, then fallbacks.
    selectors: Vec<(String, Selector)>,
    title: Selector,
    title_suffix: String,
}

impl Extractor {
    /// Extract the title and body of one saved page.
    pub fn extract(&self, html: &str, filename: &str) -> ExtractedArticle {
        let document = Html::parse_document(html);
        let title = self
            .page_title(&document)
            .unwrap_or_else(|| title_from_filename(filename));

        let mut found = None;
        for (position, (raw, selector)) in self.selectors.iter().enumerate() {
            let text = document
                .select(selector)
                .map(element_text)
                .find(|text| !text.is_empty());
            if let Some(text) = text {
                found = Some((position, raw, text));
                break;
            }
        }

        let (content, status) = match found {
            Some((0, _, text)) => (normalize_whitespace(&text), ExtractionStatus::Success),
            Some((_, raw, text)) => (
                normalize_whitespace(&text),
                ExtractionStatus::FallbackUsed(raw.clone()),
            ),
            None => (String::new(), ExtractionStatus::NoContentFound),
        };

        ExtractedArticle {
            filename: filename.to_string(),
            title,
            content,
            status,
        }
    }

    fn page_title(&self, document: &Html) -> Option<String> {
        let raw = document.select(&self.title).next().map(element_text)?;
        let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let title = if self.title_suffix.is_empty() {
            title.as_str()
        } else {
            title
                .strip_suffix(self.title_suffix.trim_start())
                .map(str::trim_end)
                .unwrap_or(&title)
        };
        (!title.is_empty()).then(|| title.to_string())
    }
}

/// Text nodes under `element`, trimmed, one per line.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// URL-decoded file stem, used when a page has no `<title>`.
fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    urlencoding::decode(&stem)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| stem.clone())
}

/// Rendered output file: header block, blank line, body.
pub fn render_extracted(article: &ExtractedArticle) -> String {
    ArticleHeader::new()
        .field(TITLE_LABEL, article.title.as_str())
        .field(SOURCE_LABEL, article.filename.as_str())
        .field(EXTRACTION_STATUS_LABEL, article.status.to_string())
        .render(EXTRACTED_RULE_WIDTH, &article.content)
}

/// Read and extract one input file. Read failures become an `error` status.
pub async fn extract_file(extractor: &Extractor, path: &Path) -> ExtractedArticle {
    let filename = file_name(path);
    match fs::read(path).await {
        Ok(bytes) => extractor.extract(&String::from_utf8_lossy(&bytes), &filename),
        Err(e) => {
            warn!(file = %filename, error = %e, "Failed to read input file");
            ExtractedArticle {
                title: title_from_filename(&filename),
                filename,
                content: String::new(),
                status: ExtractionStatus::Error(e.to_string()),
            }
        }
    }
}

/// Files read and parsed concurrently; outputs are still written in input order.
const EXTRACT_CONCURRENCY: usize = 8;

/// Extract every input in `input_dir` matching `pattern` into `output_dir`.
///
/// A failure on one file never stops the batch. Only articles with
/// non-empty content are written.
#[instrument(level = "info", skip_all, fields(input_dir = %input_dir.display(), output_dir = %output_dir.display()))]
pub async fn run_batch(
    extractor: &Extractor,
    input_dir: &Path,
    pattern: &str,
    output_dir: &Path,
) -> Result<BatchReport> {
    let started_at = Utc::now().to_rfc3339();
    let inputs = discover_inputs(input_dir, pattern)?;
    if inputs.is_empty() {
        error!(pattern, "No input files found");
    }

    let articles: Vec<ExtractedArticle> = stream::iter(inputs.iter())
        .map(|path| extract_file(extractor, path))
        .buffered(EXTRACT_CONCURRENCY)
        .collect()
        .await;

    let store = ArticleStore::new(output_dir);
    let mut used = HashSet::new();
    let mut entries = Vec::with_capacity(articles.len());

    for (index, article) in articles.into_iter().enumerate() {
        info!(
            file = %article.filename,
            index = index + 1,
            total = inputs.len(),
            status = %article.status,
            chars = article.content.chars().count(),
            "Extraction finished"
        );

        let output: Option<PathBuf> = if article.content.is_empty() {
            warn!(file = %article.filename, "No content extracted; skipping output");
            None
        } else {
            let name = format!("{}.txt", claim_filename(&article.title, index, &mut used));
            store.save(&render_extracted(&article), Path::new(&name)).await
        };

        entries.push(BatchEntry {
            filename: article.filename,
            title: article.title,
            status: article.status.to_string(),
            output,
        });
    }

    let report = BatchReport {
        input_dir: input_dir.display().to_string(),
        started_at,
        entries,
    };
    info!(
        total = report.entries.len(),
        succeeded = report.succeeded(),
        success_rate = %format!("{:.1}%", report.success_rate()),
        "Extraction batch complete"
    );
    Ok(report)
}
