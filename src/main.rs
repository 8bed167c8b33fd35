//! # Article Harvest
//!
//! Collects full-text articles from a news listing page through an
//! authenticated browsing session and an LLM page reader, then post-processes
//! the saved files with independent batch jobs.
//!
//! ## Features
//!
//! - Discovers the newest article links on a listing page and saves each
//!   article's body, retrying every link a bounded number of times
//! - Refuses to crawl when the session is not signed in
//! - Extracts article bodies from saved pages with ordered CSS selectors
//! - Translates extracted articles through an OpenAI-compatible LLM API
//! - Analyzes images with a vision model
//! - Writes a JSON run report and a per-day log file for every command
//!
//! ## Usage
//!
//! ```sh
//! article_harvest crawl
//! article_harvest extract
//! article_harvest translate
//! article_harvest vision image.jpg "Describe this image"
//! ```
//!
//! ## Architecture
//!
//! The crawl follows a fixed pipeline:
//! 1. **Listing**: open the listing page and check the signed-in account link
//! 2. **Discovery**: ask the page reader for the newest article links
//! 3. **Acquisition**: per link, navigate, extract, validate and save, with retries
//! 4. **Output**: write article files under `output/html` and a JSON report
//!
//! Exit codes: `0` success (or user interrupt after cleanup), `1` startup or
//! unexpected failure, `2` link discovery failed, `3` not authenticated.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, instrument, warn};
use url::Url;

mod api;
mod browser;
mod cli;
mod config;
mod crawl;
mod error;
mod logging;
mod models;
mod outputs;
mod storage;
mod transforms;
mod utils;
mod vision;

use browser::http::{HttpPage, HttpPageOptions};
use cli::{Cli, Command, CrawlArgs, ExtractArgs, TranslateArgs, VisionArgs};
use config::{Workspace, require_credential};
use crawl::{CrawlOptions, Crawler, RunEnd, run_to_completion};
use error::Result;
use outputs::json::write_report;
use storage::ArticleStore;
use transforms::extract::SelectorSet;
use utils::ensure_writable_dir;
use vision::VisionClient;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; everything also comes from flags.
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let workspace = match Workspace::resolve(args.root_dir.as_deref()) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("cannot resolve root directory: {e}");
            return ExitCode::from(1);
        }
    };

    let component = args.command.component();
    let log = match logging::init(&workspace.logs_dir(), component) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("cannot initialize logging: {e}");
            return ExitCode::from(1);
        }
    };
    info!(
        root = %workspace.root().display(),
        log_file = %log.path().display(),
        component,
        "article_harvest starting up"
    );

    let code = match dispatch(args.command, &workspace).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "Command failed");
            e.exit_code()
        }
    };

    log.shutdown();
    ExitCode::from(code)
}

async fn dispatch(command: Command, workspace: &Workspace) -> Result<()> {
    match command {
        Command::Crawl(args) => crawl_command(args, workspace).await,
        Command::Extract(args) => extract_command(args, workspace).await,
        Command::Translate(args) => translate_command(args, workspace).await,
        Command::Vision(args) => vision_command(args).await,
    }
}

/// Directory option relative to the root, or the default layout directory.
fn dir_or(option: Option<&str>, workspace: &Workspace, default: PathBuf) -> PathBuf {
    option.map(|p| workspace.join(p)).unwrap_or(default)
}

/// Write a run report; a failure here never changes the command's outcome.
async fn save_report<T: serde::Serialize>(report: &T, workspace: &Workspace, component: &str) {
    if let Err(e) = write_report(report, &workspace.reports_dir(), component).await {
        error!(error = %e, component, "Failed to write run report");
    }
}

/// Resolves when the user presses Ctrl-C; never resolves if the signal
/// handler cannot be installed.
async fn user_interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C; interrupts will not be handled");
        std::future::pending::<()>().await;
    }
}

#[instrument(level = "info", skip_all, fields(listing = %args.listing_url))]
async fn crawl_command(args: CrawlArgs, workspace: &Workspace) -> Result<()> {
    let listing_url = Url::parse(&args.listing_url)?;
    ensure_writable_dir(&workspace.html_dir()).await?;

    // Credentials are checked before anything touches the network.
    let ai = api::load_client(args.ai.ai_config.as_deref(), &args.template, args.ai.ai_retries).await?;
    let mut page = HttpPage::new(
        ai,
        HttpPageOptions {
            session_cookie: args.session_cookie,
            user_agent: args.user_agent,
            ..Default::default()
        },
    )?;

    let mut options = CrawlOptions::new(listing_url);
    options.max_attempts = args.max_attempts as usize;
    options.min_content_chars = args.min_content_chars;
    options.nav_timeout = Duration::from_secs(args.nav_timeout_secs);
    options.snapshot_dir = workspace.logs_dir();
    options.discovery_prompt = args.discovery_prompt;
    options.extraction_prompt = args.extraction_prompt;
    options.auth_prompt = args.auth_prompt;

    let mut crawler = Crawler::new(options, ArticleStore::new(workspace.root()));
    info!(
        max_attempts = crawler.options().max_attempts,
        min_content_chars = crawler.options().min_content_chars,
        nav_timeout = ?crawler.options().nav_timeout,
        "Crawler configured"
    );

    match run_to_completion(&mut crawler, &mut page, user_interrupt()).await {
        RunEnd::Interrupted => {
            warn!("Interrupted by user; browsing context released");
            Ok(())
        }
        RunEnd::Finished(result) => {
            let report = result?;
            save_report(&report, workspace, "crawl").await;
            Ok(())
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn extract_command(args: ExtractArgs, workspace: &Workspace) -> Result<()> {
    let selectors = match args.selectors.as_deref() {
        Some(path) => SelectorSet::load(&workspace.join(path)).await?,
        None => SelectorSet::default(),
    };
    let extractor = selectors.compile()?;

    let input_dir = dir_or(args.input_dir.as_deref(), workspace, workspace.html_dir());
    let output_dir = dir_or(args.output_dir.as_deref(), workspace, workspace.extracted_dir());
    ensure_writable_dir(&output_dir).await?;

    let report = transforms::extract::run_batch(&extractor, &input_dir, &args.pattern, &output_dir).await?;
    save_report(&report, workspace, "extract_articles").await;
    Ok(())
}

#[instrument(level = "info", skip_all, fields(target_language = %args.target_language))]
async fn translate_command(args: TranslateArgs, workspace: &Workspace) -> Result<()> {
    let ai = api::load_client(args.ai.ai_config.as_deref(), &args.template, args.ai.ai_retries).await?;

    let input_dir = dir_or(args.input_dir.as_deref(), workspace, workspace.extracted_dir());
    let output_dir = dir_or(args.output_dir.as_deref(), workspace, workspace.translated_dir());
    ensure_writable_dir(&output_dir).await?;

    let report = transforms::translate::run_batch(
        &ai,
        &input_dir,
        &args.pattern,
        &output_dir,
        &args.target_language,
    )
    .await?;
    save_report(&report, workspace, "translate_articles").await;
    Ok(())
}

#[instrument(level = "info", skip_all, fields(image = %args.image))]
async fn vision_command(args: VisionArgs) -> Result<()> {
    let api_key = require_credential("VISION_API_KEY", args.api_key.as_deref())?;
    let client = VisionClient::new(api_key, args.api_base, args.model)?;

    let answer = client.analyze(Path::new(&args.image), &args.prompt).await?;
    vision::deliver(&answer, args.output.as_deref().map(Path::new)).await
}
