//! Data models shared by the crawler and the batch transforms.
//!
//! - [`ArticleLink`]: one candidate article found on the listing page
//! - [`ArticleRecord`]: the structured result of extracting one article page
//! - [`LinkOutcome`]: how the acquisition loop resolved a link
//! - [`ExtractedArticle`] / [`TranslatedArticle`]: per-file results of the batch jobs
//!
//! Types the AI service fills in implement [`Extractable`], which carries the
//! JSON shape the model is asked to produce.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// A type the extraction service can produce from a loaded page.
pub trait Extractable: DeserializeOwned {
    /// Example JSON document describing the expected reply.
    const SHAPE: &'static str;
}

/// A candidate article on the listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleLink {
    /// Title as shown on the listing page.
    pub title: String,
    /// Absolute article URL.
    pub target: Url,
}

/// A link as the extraction service reports it, before the href is resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredLink {
    pub title: String,
    pub href: String,
}

/// Reply shape for link discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredLinks {
    pub articles: Vec<DiscoveredLink>,
}

impl Extractable for DiscoveredLinks {
    const SHAPE: &'static str =
        r#"{"articles": [{"title": "article title", "href": "https://example.com/article"}]}"#;
}

/// Structured content of a single article page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
}

impl ArticleRecord {
    /// Number of characters in the article body.
    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }

    /// A record is usable only when its body is longer than `min_chars`.
    pub fn is_acceptable(&self, min_chars: usize) -> bool {
        !self.content.trim().is_empty() && self.content_chars() > min_chars
    }
}

impl Extractable for ArticleRecord {
    const SHAPE: &'static str = r#"{"title": "main headline", "subtitle": "standfirst or dek", "author": "byline", "content": "full article body, paragraphs separated by blank lines"}"#;
}

/// An actionable element reported by `observe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordance {
    pub description: String,
    #[serde(default)]
    pub href: Option<String>,
}

/// Terminal state of one link in the acquisition loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// Content was persisted at `path`.
    Saved { path: PathBuf, attempts: usize },
    /// Every attempt failed.
    Exhausted { attempts: usize },
    /// Content was accepted but could not be written.
    WriteFailed { path: PathBuf, attempts: usize },
}

impl LinkOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            LinkOutcome::Saved { attempts, .. }
            | LinkOutcome::Exhausted { attempts }
            | LinkOutcome::WriteFailed { attempts, .. } => *attempts,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, LinkOutcome::Saved { .. })
    }
}

/// Per-link entry of a crawl report.
#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub index: usize,
    pub title: String,
    pub target: String,
    pub outcome: LinkOutcome,
}

/// Summary of one crawl run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub listing_url: String,
    pub started_at: String,
    pub links: Vec<LinkReport>,
}

impl CrawlReport {
    pub fn saved(&self) -> usize {
        self.links.iter().filter(|l| l.outcome.is_saved()).count()
    }

    pub fn failed(&self) -> usize {
        self.links.len() - self.saved()
    }
}

/// How the batch extractor found (or failed to find) an article body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    Success,
    FallbackUsed(String),
    NoContentFound,
    Error(String),
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStatus::Success => write!(f, "success"),
            ExtractionStatus::FallbackUsed(selector) => write!(f, "fallback_used ({selector})"),
            ExtractionStatus::NoContentFound => write!(f, "no_content_found"),
            ExtractionStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

impl Serialize for ExtractionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of extracting one saved page.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedArticle {
    /// Input file name (no directory).
    pub filename: String,
    pub title: String,
    pub content: String,
    pub status: ExtractionStatus,
}

/// Outcome of translating one extracted article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationStatus {
    Success,
    EmptyContent,
    TranslationError(String),
}

impl fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationStatus::Success => write!(f, "success"),
            TranslationStatus::EmptyContent => write!(f, "empty_content"),
            TranslationStatus::TranslationError(msg) => write!(f, "translation_error: {msg}"),
        }
    }
}

impl Serialize for TranslationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of translating one extracted article file.
#[derive(Debug, Clone, Serialize)]
pub struct TranslatedArticle {
    /// Input file name (no directory).
    pub filename: String,
    pub title: String,
    pub translated_title: String,
    #[serde(skip_serializing)]
    pub translated_content: String,
    pub status: TranslationStatus,
}

/// Reply shape for the translation service.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationReply {
    pub title: String,
    pub content: String,
}

/// Per-file entry of a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub filename: String,
    pub title: String,
    pub status: String,
    pub output: Option<PathBuf>,
}

/// Summary of one batch transform run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub input_dir: String,
    pub started_at: String,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.output.is_some()).count()
    }

    /// Percentage of inputs that produced an output file.
    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.succeeded() as f64 / self.entries.len() as f64 * 100.0
        }
    }
}
