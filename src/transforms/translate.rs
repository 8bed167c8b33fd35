//! Translation of extracted articles.
//!
//! Reads the header block written by [`super::extract`], asks the model for
//! the title and body in the target language, and writes
//! `翻译_<title>.txt` with its own header.

use super::{
    ArticleHeader, EXTRACTION_STATUS_LABEL, SOURCE_LABEL, TITLE_LABEL, TRANSLATED_AT_LABEL,
    TRANSLATION_STATUS_LABEL, discover_inputs, file_name,
};
use crate::api::{AskAsync, ask_json};
use crate::error::Result;
use crate::models::{BatchEntry, BatchReport, TranslatedArticle, TranslationReply, TranslationStatus};
use crate::storage::{ArticleSink, ArticleStore};
use crate::utils::sanitize_filename;
use chrono::{Local, Utc};
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument, warn};

pub const DEFAULT_TARGET_LANGUAGE: &str = "中文";
/// Width of the `=` rule closing the header of a translated file.
pub const TRANSLATED_RULE_WIDTH: usize = 80;
pub const TRANSLATED_PREFIX: &str = "翻译_";

/// An extracted article read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArticle {
    pub filename: String,
    pub title: String,
    pub source_file: String,
    pub extraction_status: String,
    pub content: String,
}

impl ParsedArticle {
    pub fn parse(text: &str, filename: &str) -> Self {
        let (header, content) = ArticleHeader::parse(text);
        let field = |label| header.get(label).unwrap_or_default().to_string();
        Self {
            filename: filename.to_string(),
            title: field(TITLE_LABEL),
            source_file: field(SOURCE_LABEL),
            extraction_status: field(EXTRACTION_STATUS_LABEL),
            content,
        }
    }
}

/// Instruction sent with each article.
pub fn translation_prompt(article: &ParsedArticle, target_language: &str) -> String {
    format!(
        "Translate the following article title and body into {target_language}.\n\
         Style requirements:\n\
         - natural {target_language} grammar, lively and easy to read\n\
         - the highest possible fluency\n\
         - a warm, friendly, fresh tone\n\
         - translate sentence by sentence, adding nothing of your own\n\
         - break sentences to suit {target_language} reading habits\n\
         - bold key points and core concepts with **double asterisks**\n\n\
         Reply with JSON only, shaped like {{\"title\": \"translated title\", \"content\": \"translated body\"}}.\n\n\
         Title: {title}\n\nBody:\n{content}",
        title = article.title,
        content = article.content,
    )
}

/// Translate one parsed article. Empty bodies are not sent to the model.
#[instrument(level = "info", skip_all, fields(file = %article.filename))]
pub async fn translate_article<A>(
    ai: &A,
    article: &ParsedArticle,
    target_language: &str,
) -> TranslatedArticle
where
    A: AskAsync<Response = String>,
{
    let mut translated = TranslatedArticle {
        filename: article.filename.clone(),
        title: article.title.clone(),
        translated_title: article.title.clone(),
        translated_content: String::new(),
        status: TranslationStatus::EmptyContent,
    };

    if article.content.trim().is_empty() {
        warn!(title = %article.title, "Article body is empty; skipping translation");
        return translated;
    }

    info!(title = %article.title, chars = article.content.chars().count(), "Translating");
    match ask_json::<TranslationReply, A>(ai, &translation_prompt(article, target_language)).await {
        Ok(reply) => {
            if !reply.title.trim().is_empty() {
                translated.translated_title = reply.title.trim().to_string();
            }
            translated.translated_content = reply.content.trim().to_string();
            translated.status = TranslationStatus::Success;
            info!(chars = translated.translated_content.chars().count(), "Translation finished");
        }
        Err(e) => {
            error!(error = %e, "Translation failed");
            translated.status = TranslationStatus::TranslationError(e.to_string());
        }
    }
    translated
}

/// Rendered output file. `translated_at` is a `%Y-%m-%d %H:%M:%S` local time.
pub fn render_translated(article: &TranslatedArticle, translated_at: &str) -> String {
    let mut text = ArticleHeader::new()
        .field(TITLE_LABEL, article.translated_title.as_str())
        .field(SOURCE_LABEL, article.filename.as_str())
        .field(TRANSLATION_STATUS_LABEL, article.status.to_string())
        .field(TRANSLATED_AT_LABEL, translated_at)
        .render(TRANSLATED_RULE_WIDTH, &article.translated_content);
    text.push('\n');
    text
}

/// Translate every input in `input_dir` matching `pattern` into `output_dir`.
#[instrument(level = "info", skip_all, fields(input_dir = %input_dir.display(), target_language))]
pub async fn run_batch<A>(
    ai: &A,
    input_dir: &Path,
    pattern: &str,
    output_dir: &Path,
    target_language: &str,
) -> Result<BatchReport>
where
    A: AskAsync<Response = String>,
{
    let started_at = Utc::now().to_rfc3339();
    let inputs = discover_inputs(input_dir, pattern)?;
    if inputs.is_empty() {
        error!(pattern, "No extracted articles found");
    }

    let store = ArticleStore::new(output_dir);
    let mut entries = Vec::with_capacity(inputs.len());

    for (index, path) in inputs.iter().enumerate() {
        let filename = file_name(path);
        info!(file = %filename, index = index + 1, total = inputs.len(), "Processing");

        let text = match fs::read(path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(file = %filename, error = %e, "Failed to read extracted article");
                entries.push(BatchEntry {
                    filename,
                    title: String::new(),
                    status: format!("parse_error: {e}"),
                    output: None,
                });
                continue;
            }
        };

        let parsed = ParsedArticle::parse(&text, &filename);
        info!(
            title = %parsed.title,
            source = %parsed.source_file,
            extraction_status = %parsed.extraction_status,
            chars = parsed.content.chars().count(),
            "Parsed extracted article"
        );
        let translated = translate_article(ai, &parsed, target_language).await;

        let output = if translated.translated_content.is_empty() {
            warn!(file = %filename, status = %translated.status, "No translated content; skipping output");
            None
        } else {
            let name = format!(
                "{TRANSLATED_PREFIX}{}.txt",
                sanitize_filename(&translated.translated_title, index)
            );
            let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            store
                .save(&render_translated(&translated, &stamp), Path::new(&name))
                .await
        };

        entries.push(BatchEntry {
            filename: translated.filename,
            title: translated.translated_title,
            status: translated.status.to_string(),
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
        "Translation batch complete"
    );
    Ok(report)
}
