//! The browsing context the crawler drives.
//!
//! [`BrowsingContext`] is the whole contract the acquisition loop relies on:
//! a single page that can be navigated, waited on, read by the extraction
//! service, snapshotted, and closed. Calls are strictly sequential; one
//! context is shared by every link of a run.
//!
//! [`http::HttpPage`] implements it with `reqwest` for loading and the LLM
//! for `extract`/`observe`.

pub mod http;

use crate::error::Result;
use crate::models::{Affordance, Extractable};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub trait BrowsingContext {
    /// Load `url`, failing if it does not complete within `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait until the loaded page is ready to be read.
    async fn wait_for_ready(&mut self) -> Result<()>;

    /// Ask the extraction service for a `T` scoped to the current page.
    async fn extract<T: Extractable>(&mut self, instruction: &str) -> Result<T>;

    /// Ask the extraction service which elements match `instruction`.
    async fn observe(&mut self, instruction: &str) -> Result<Vec<Affordance>>;

    /// Visible text of the current page.
    async fn current_page_text(&mut self) -> Result<String>;

    /// Write a diagnostic capture of the current page to `path`.
    async fn snapshot(&mut self, path: &Path) -> Result<()>;

    /// Release the context. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Run a diagnostic step whose failure must never affect the caller.
pub async fn best_effort<F>(label: &str, step: F) -> bool
where
    F: Future<Output = Result<()>>,
{
    match step.await {
        Ok(()) => true,
        Err(e) => {
            warn!(step = label, error = %e, "Best-effort step failed; ignoring");
            false
        }
    }
}
