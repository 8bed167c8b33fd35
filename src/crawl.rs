//! Article acquisition loop.
//!
//! A run is one linear pass over the links found on a listing page:
//!
//! 1. **Open**: navigate the shared browsing context to the listing page
//! 2. **Authenticate**: observe the account affordance; no affordance ends the run
//! 3. **Discover**: ask the extraction service for the article links
//! 4. **Acquire**: per link, up to `max_attempts` tries of navigate → wait →
//!    extract → validate → save
//! 5. **Barrier**: after every link, navigate back to the listing page
//!
//! Per link the states are `PENDING → (ATTEMPTING ⇄ RETRY) → SAVED | EXHAUSTED`
//! (plus `WRITE_FAILED` when the accepted body cannot be written). Errors
//! inside a link never escape [`Crawler::acquire_article`]; only opening the
//! listing page, authentication, and discovery can end a run early.

use crate::browser::{BrowsingContext, best_effort};
use crate::config::{HTML_DIR, LOGS_DIR};
use crate::error::{Error, Result};
use crate::models::{
    ArticleLink, ArticleRecord, CrawlReport, DiscoveredLinks, LinkOutcome, LinkReport,
};
use crate::storage::ArticleSink;
use crate::utils::{claim_filename, sanitize_filename, truncate_for_log};
use chrono::Utc;
use itertools::Itertools;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

pub const DEFAULT_LISTING_URL: &str = "https://www.theatlantic.com/latest";
pub const DEFAULT_DISCOVERY_PROMPT: &str =
    "extract the title and href of the articles of the newest 2 day";
pub const DEFAULT_EXTRACTION_PROMPT: &str = "Extract the article's title, subtitle, author name and \
     complete body text. The body may be interrupted by advertisements: leave the advertisements out \
     and return the whole article body found on the page.";
pub const DEFAULT_AUTH_PROMPT: &str = "find href:My Account";

/// Knobs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub listing_url: Url,
    /// Attempts per link, including the first.
    pub max_attempts: usize,
    /// Bodies must be strictly longer than this many characters.
    pub min_content_chars: usize,
    pub nav_timeout: Duration,
    /// Directory for saved bodies, relative to the sink root.
    pub output_dir: PathBuf,
    /// Directory for error snapshots.
    pub snapshot_dir: PathBuf,
    pub discovery_prompt: String,
    pub extraction_prompt: String,
    pub auth_prompt: String,
}

impl CrawlOptions {
    pub fn new(listing_url: Url) -> Self {
        Self {
            listing_url,
            max_attempts: 3,
            min_content_chars: 200,
            nav_timeout: Duration::from_secs(60),
            output_dir: PathBuf::from(HTML_DIR),
            snapshot_dir: PathBuf::from(LOGS_DIR),
            discovery_prompt: DEFAULT_DISCOVERY_PROMPT.to_string(),
            extraction_prompt: DEFAULT_EXTRACTION_PROMPT.to_string(),
            auth_prompt: DEFAULT_AUTH_PROMPT.to_string(),
        }
    }
}

/// Why a single attempt did not produce an acceptable record.
#[derive(Debug)]
enum AttemptFailure {
    /// The backend raised; a snapshot is taken.
    Raised(Error),
    /// Extraction returned, but the body is too short to be an article.
    TooShort { chars: usize },
}

/// How a run ended.
#[derive(Debug)]
pub enum RunEnd {
    Finished(Result<CrawlReport>),
    Interrupted,
}

pub struct Crawler<S> {
    options: CrawlOptions,
    sink: S,
    used_names: HashSet<String>,
}

impl<S: ArticleSink> Crawler<S> {
    pub fn new(options: CrawlOptions, sink: S) -> Self {
        Self {
            options,
            sink,
            used_names: HashSet::new(),
        }
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Run the whole pass. Does not close the context; see [`run_to_completion`].
    #[instrument(level = "info", skip_all, fields(listing = %self.options.listing_url))]
    pub async fn run<B: BrowsingContext>(&mut self, page: &mut B) -> Result<CrawlReport> {
        let started_at = Utc::now().to_rfc3339();
        info!("Starting crawl");

        self.open_listing(page)
            .await
            .map_err(|e| Error::Discovery(format!("cannot open listing page: {e}")))?;
        if let Ok(text) = page.current_page_text().await {
            debug!(preview = %truncate_for_log(&text, 1000), "Listing page content");
        }

        self.check_authenticated(page).await?;
        let links = self.discover_links(page).await?;

        let mut reports = Vec::with_capacity(links.len());
        for (index, link) in links.iter().enumerate() {
            let outcome = self.acquire_article(page, link, index).await;
            match &outcome {
                LinkOutcome::Saved { path, attempts } => {
                    info!(index, attempts, path = %path.display(), "Link saved")
                }
                LinkOutcome::Exhausted { attempts } => {
                    error!(index, attempts, url = %link.target, "Link exhausted its retry budget")
                }
                LinkOutcome::WriteFailed { path, .. } => {
                    error!(index, path = %path.display(), "Link content could not be written")
                }
            }
            self.return_to_listing(page).await;
            reports.push(LinkReport {
                index,
                title: link.title.clone(),
                target: link.target.to_string(),
                outcome,
            });
        }

        let report = CrawlReport {
            listing_url: self.options.listing_url.to_string(),
            started_at,
            links: reports,
        };
        info!(
            total = report.links.len(),
            saved = report.saved(),
            failed = report.failed(),
            attempts = report.links.iter().map(|l| l.outcome.attempts()).sum::<usize>(),
            "Crawl finished"
        );
        Ok(report)
    }

    async fn open_listing<B: BrowsingContext>(&self, page: &mut B) -> Result<()> {
        page.navigate(self.options.listing_url.as_str(), self.options.nav_timeout)
            .await?;
        page.wait_for_ready().await
    }

    /// Require the account affordance on the listing page.
    #[instrument(level = "info", skip_all)]
    pub async fn check_authenticated<B: BrowsingContext>(&self, page: &mut B) -> Result<()> {
        let found = page
            .observe(&self.options.auth_prompt)
            .await
            .map_err(|e| Error::Discovery(format!("authentication check failed: {e}")))?;
        debug!(affordances = ?found, "Authentication signal");
        if found.is_empty() {
            error!("Browsing context is not logged in");
            return Err(Error::NotAuthenticated);
        }
        info!("Browsing context is logged in");
        Ok(())
    }

    /// Ask for the article links on the current listing page.
    ///
    /// Relative hrefs are resolved against the listing URL; unresolvable ones
    /// are dropped, and so are repeats of an earlier target.
    #[instrument(level = "info", skip_all)]
    pub async fn discover_links<B: BrowsingContext>(
        &self,
        page: &mut B,
    ) -> Result<Vec<ArticleLink>> {
        let discovered: DiscoveredLinks = page
            .extract(&self.options.discovery_prompt)
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;

        let links: Vec<ArticleLink> = discovered
            .articles
            .into_iter()
            .filter_map(|raw| match self.options.listing_url.join(raw.href.trim()) {
                Ok(target) => Some(ArticleLink {
                    title: raw.title.trim().to_string(),
                    target,
                }),
                Err(e) => {
                    warn!(href = %raw.href, error = %e, "Dropping unresolvable link");
                    None
                }
            })
            .unique_by(|link| link.target.clone())
            .collect();

        info!(count = links.len(), "Discovered article links");
        Ok(links)
    }

    /// Resolve one link to a terminal state. Never fails.
    #[instrument(level = "info", skip_all, fields(index = index, url = %link.target))]
    pub async fn acquire_article<B: BrowsingContext>(
        &mut self,
        page: &mut B,
        link: &ArticleLink,
        index: usize,
    ) -> LinkOutcome {
        let max = self.options.max_attempts.max(1);
        info!(title = %link.title, "Processing article {}", index + 1);

        for attempt in 1..=max {
            match self.attempt(page, link).await {
                Ok(record) => {
                    let relative = self.output_path(&record.title, index);
                    return match self.sink.save(&record.content, &relative).await {
                        Some(path) => LinkOutcome::Saved { path, attempts: attempt },
                        None => LinkOutcome::WriteFailed {
                            path: relative,
                            attempts: attempt,
                        },
                    };
                }
                Err(AttemptFailure::TooShort { chars }) => {
                    warn!(
                        attempt,
                        max,
                        chars,
                        min = self.options.min_content_chars,
                        "Extracted content too short; retrying"
                    );
                }
                Err(AttemptFailure::Raised(e)) => {
                    warn!(attempt, max, error = %e, "Attempt failed");
                    let snapshot = self
                        .options
                        .snapshot_dir
                        .join(format!("error_article_{}_error.html", index + 1));
                    best_effort("snapshot", page.snapshot(&snapshot)).await;
                }
            }
        }

        LinkOutcome::Exhausted { attempts: max }
    }

    async fn attempt<B: BrowsingContext>(
        &self,
        page: &mut B,
        link: &ArticleLink,
    ) -> std::result::Result<ArticleRecord, AttemptFailure> {
        page.navigate(link.target.as_str(), self.options.nav_timeout)
            .await
            .map_err(AttemptFailure::Raised)?;
        page.wait_for_ready().await.map_err(AttemptFailure::Raised)?;

        let record: ArticleRecord = page
            .extract(&self.options.extraction_prompt)
            .await
            .map_err(AttemptFailure::Raised)?;
        debug!(
            title = %record.title,
            author = %record.author,
            chars = record.content_chars(),
            "Extracted article"
        );

        if record.is_acceptable(self.options.min_content_chars) {
            Ok(record)
        } else {
            Err(AttemptFailure::TooShort {
                chars: record.content_chars(),
            })
        }
    }

    /// Relative output path for an accepted record. A title that sanitizes to
    /// a name already written in this run falls back to the link ordinal, and
    /// a taken ordinal gets a numeric suffix.
    fn output_path(&mut self, title: &str, index: usize) -> PathBuf {
        let name = claim_filename(title, index, &mut self.used_names);
        let preferred = sanitize_filename(title, index);
        if name != preferred {
            warn!(%preferred, %name, "Filename already used in this run; falling back to ordinal");
        }
        self.options.output_dir.join(format!("{name}.txt"))
    }

    /// Put the context back on the listing page before the next link.
    async fn return_to_listing<B: BrowsingContext>(&self, page: &mut B) {
        if let Err(e) = self.open_listing(page).await {
            error!(error = %e, "Could not return to the listing page");
        }
    }
}

/// Run the crawl until it finishes or `interrupt` fires, then close the
/// context whatever happened.
pub async fn run_to_completion<B, S, I>(
    crawler: &mut Crawler<S>,
    page: &mut B,
    interrupt: I,
) -> RunEnd
where
    B: BrowsingContext,
    S: ArticleSink,
    I: Future<Output = ()>,
{
    let end = tokio::select! {
        biased;
        _ = interrupt => RunEnd::Interrupted,
        result = crawler.run(page) => RunEnd::Finished(result),
    };
    if best_effort("close", page.close()).await {
        info!("Browsing context released");
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Affordance;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;

    const LISTING: &str = "https://news.example.com/latest";

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Navigate(String),
        Ready,
        Extract,
        Observe,
        Text,
        Snapshot(PathBuf),
        Close,
    }

    /// Scripted backend that records every call.
    #[derive(Default)]
    struct FakeContext {
        ops: Vec<Op>,
        extract_replies: VecDeque<std::result::Result<Value, String>>,
        observe_reply: Vec<Affordance>,
        failing_urls: HashSet<String>,
        fail_snapshot: bool,
    }

    impl FakeContext {
        fn authenticated() -> Self {
            Self {
                observe_reply: vec![Affordance {
                    description: "My Account".into(),
                    href: Some("/account".into()),
                }],
                ..Default::default()
            }
        }

        fn reply(mut self, value: Value) -> Self {
            self.extract_replies.push_back(Ok(value));
            self
        }

        fn fail(mut self, msg: &str) -> Self {
            self.extract_replies.push_back(Err(msg.to_string()));
            self
        }

        fn extract_calls(&self) -> usize {
            self.ops.iter().filter(|op| **op == Op::Extract).count()
        }
    }

    impl BrowsingContext for FakeContext {
        async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
            self.ops.push(Op::Navigate(url.to_string()));
            if self.failing_urls.contains(url) {
                return Err(Error::NavigationTimeout {
                    url: url.to_string(),
                    timeout: Duration::from_secs(60),
                });
            }
            Ok(())
        }

        async fn wait_for_ready(&mut self) -> Result<()> {
            self.ops.push(Op::Ready);
            Ok(())
        }

        async fn extract<T: crate::models::Extractable>(
            &mut self,
            _instruction: &str,
        ) -> Result<T> {
            self.ops.push(Op::Extract);
            match self.extract_replies.pop_front() {
                Some(Ok(value)) => Ok(serde_json::from_value(value)?),
                Some(Err(msg)) => Err(Error::Extraction(msg)),
                None => Err(Error::Extraction("no scripted reply".into())),
            }
        }

        async fn observe(&mut self, _instruction: &str) -> Result<Vec<Affordance>> {
            self.ops.push(Op::Observe);
            Ok(self.observe_reply.clone())
        }

        async fn current_page_text(&mut self) -> Result<String> {
            self.ops.push(Op::Text);
            Ok("listing".into())
        }

        async fn snapshot(&mut self, path: &Path) -> Result<()> {
            self.ops.push(Op::Snapshot(path.to_path_buf()));
            if self.fail_snapshot {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.ops.push(Op::Close);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        saved: RefCell<Vec<(String, PathBuf)>>,
        fail: bool,
    }

    impl ArticleSink for RecordingSink {
        async fn save(&self, content: &str, relative: &Path) -> Option<PathBuf> {
            if self.fail {
                return None;
            }
            self.saved
                .borrow_mut()
                .push((content.to_string(), relative.to_path_buf()));
            Some(relative.to_path_buf())
        }
    }

    fn options() -> CrawlOptions {
        CrawlOptions::new(Url::parse(LISTING).unwrap())
    }

    fn record(title: &str, chars: usize) -> Value {
        json!({"title": title, "subtitle": "", "author": "Staff", "content": "a".repeat(chars)})
    }

    fn link(n: usize) -> ArticleLink {
        ArticleLink {
            title: format!("Story {n}"),
            target: Url::parse(&format!("https://news.example.com/story-{n}")).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_saved_on_last_attempt() {
        let mut page = FakeContext::authenticated()
            .fail("timeout")
            .fail("bad json")
            .reply(record("Third Time Lucky", 250));
        let mut crawler = Crawler::new(options(), RecordingSink::default());

        let outcome = crawler.acquire_article(&mut page, &link(1), 0).await;

        assert_eq!(
            outcome,
            LinkOutcome::Saved {
                path: PathBuf::from("output/html/Third_Time_Lucky.txt"),
                attempts: 3
            }
        );
        assert_eq!(page.extract_calls(), 3);
        assert_eq!(crawler.sink.saved.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_never_persists() {
        let mut page = FakeContext::authenticated().fail("a").fail("b").fail("c").fail("d");
        let mut crawler = Crawler::new(options(), RecordingSink::default());

        let outcome = crawler.acquire_article(&mut page, &link(1), 0).await;

        assert_eq!(outcome, LinkOutcome::Exhausted { attempts: 3 });
        assert_eq!(page.extract_calls(), 3);
        assert!(crawler.sink.saved.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_configurable_budget() {
        let mut opts = options();
        opts.max_attempts = 1;
        let mut page = FakeContext::authenticated().fail("a").reply(record("Late", 250));
        let mut crawler = Crawler::new(opts, RecordingSink::default());

        let outcome = crawler.acquire_article(&mut page, &link(1), 0).await;
        assert_eq!(outcome, LinkOutcome::Exhausted { attempts: 1 });
        assert_eq!(page.extract_calls(), 1);
    }

    #[tokio::test]
    async fn test_min_length_gate() {
        let mut page = FakeContext::authenticated()
            .reply(record("Short", 150))
            .reply(record("Short", 150))
            .reply(record("Short", 150));
        let mut crawler = Crawler::new(options(), RecordingSink::default());
        let outcome = crawler.acquire_article(&mut page, &link(1), 0).await;
        assert_eq!(outcome, LinkOutcome::Exhausted { attempts: 3 });
        assert!(crawler.sink.saved.borrow().is_empty());
        // Too-short bodies are logical failures, not errors: no snapshot.
        assert!(!page.ops.iter().any(|op| matches!(op, Op::Snapshot(_))));

        let mut page = FakeContext::authenticated().reply(record("Long", 250));
        let outcome = crawler.acquire_article(&mut page, &link(2), 1).await;
        assert_eq!(outcome.attempts(), 1);
        assert!(outcome.is_saved());
    }

    #[tokio::test]
    async fn test_navigation_failure_snapshots_and_tolerates_snapshot_errors() {
        let mut page = FakeContext::authenticated();
        page.failing_urls.insert(link(7).target.to_string());
        page.fail_snapshot = true;
        let mut crawler = Crawler::new(options(), RecordingSink::default());

        let outcome = crawler.acquire_article(&mut page, &link(7), 6).await;

        assert_eq!(outcome, LinkOutcome::Exhausted { attempts: 3 });
        let snapshots: Vec<_> = page
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Snapshot(p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0], PathBuf::from("logs/error_article_7_error.html"));
        assert_eq!(page.extract_calls(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_stops_retrying() {
        let mut page = FakeContext::authenticated()
            .reply(record("Unwritable", 300))
            .reply(record("Unwritable", 300));
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut crawler = Crawler::new(options(), sink);
        let outcome = crawler.acquire_article(&mut page, &link(1), 0).await;
        assert!(matches!(outcome, LinkOutcome::WriteFailed { attempts: 1, .. }));
        assert_eq!(page.extract_calls(), 1);
    }

    #[tokio::test]
    async fn test_navigation_barrier_after_every_link() {
        let mut page = FakeContext::authenticated()
            .reply(json!({"articles": [
                {"title": "One", "href": "/story-1"},
                {"title": "Two", "href": "https://news.example.com/story-2"}
            ]}))
            .fail("x")
            .fail("y")
            .fail("z")
            .reply(record("Two", 400));
        let mut crawler = Crawler::new(options(), RecordingSink::default());

        let report = crawler.run(&mut page).await.unwrap();

        assert_eq!(report.links.len(), 2);
        assert_eq!(report.links[0].outcome, LinkOutcome::Exhausted { attempts: 3 });
        assert!(report.links[1].outcome.is_saved());

        // Everything after the first article navigation, split at each return to the listing.
        let listing = Op::Navigate(LISTING.to_string());
        let first_article = page
            .ops
            .iter()
            .position(|op| *op == Op::Navigate("https://news.example.com/story-1".into()))
            .unwrap();
        let after: Vec<&Op> = page.ops[first_article..].iter().collect();
        let barrier_positions: Vec<usize> = after
            .iter()
            .enumerate()
            .filter(|(_, op)| ***op == listing)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(barrier_positions.len(), 2);
        // The barrier directly follows the last attempt of the first link.
        assert!(matches!(after[barrier_positions[0] - 1], Op::Snapshot(_)));
        assert_eq!(
            *after[barrier_positions[0] + 2],
            Op::Navigate("https://news.example.com/story-2".into())
        );
        // The run ends on the listing page.
        assert_eq!(page.ops[page.ops.len() - 2], listing);
        assert_eq!(page.ops[page.ops.len() - 1], Op::Ready);
    }

    #[tokio::test]
    async fn test_auth_gate_halts_before_acquisition() {
        let mut page = FakeContext::default().reply(json!({"articles": [
            {"title": "One", "href": "https://news.example.com/story-1"}
        ]}));
        let mut crawler = Crawler::new(options(), RecordingSink::default());

        let result = crawler.run(&mut page).await;

        assert!(matches!(result, Err(Error::NotAuthenticated)));
        assert_eq!(page.extract_calls(), 0);
        assert!(
            page.ops
                .iter()
                .all(|op| !matches!(op, Op::Navigate(u) if u != LISTING))
        );
    }

    #[tokio::test]
    async fn test_discovery_failure_is_fatal() {
        let mut page = FakeContext::authenticated().fail("model unavailable");
        let mut crawler = Crawler::new(options(), RecordingSink::default());
        let result = crawler.run(&mut page).await;
        assert!(matches!(result, Err(Error::Discovery(_))));
    }

    #[tokio::test]
    async fn test_unreachable_listing_is_fatal() {
        let mut page = FakeContext::authenticated();
        page.failing_urls.insert(LISTING.to_string());
        let mut crawler = Crawler::new(options(), RecordingSink::default());
        let result = crawler.run(&mut page).await;
        assert!(matches!(result, Err(Error::Discovery(_))));
        assert!(!page.ops.contains(&Op::Observe));
    }

    #[tokio::test]
    async fn test_discover_links_resolves_and_dedupes() {
        let mut page = FakeContext::authenticated().reply(json!({"articles": [
            {"title": " One ", "href": "/story-1"},
            {"title": "One again", "href": "https://news.example.com/story-1"},
            {"title": "Two", "href": "story-2"}
        ]}));
        let crawler = Crawler::new(options(), RecordingSink::default());
        let links = crawler.discover_links(&mut page).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].title, "One");
        assert_eq!(links[0].target.as_str(), "https://news.example.com/story-1");
        assert_eq!(links[1].target.as_str(), "https://news.example.com/story-2");
    }

    #[tokio::test]
    async fn test_title_collision_falls_back_to_ordinal() {
        let mut page = FakeContext::authenticated()
            .reply(record("Same Title", 300))
            .reply(record("Same Title", 300));
        let mut crawler = Crawler::new(options(), RecordingSink::default());
        let first = crawler.acquire_article(&mut page, &link(1), 0).await;
        let second = crawler.acquire_article(&mut page, &link(2), 1).await;
        assert_eq!(
            first,
            LinkOutcome::Saved { path: "output/html/Same_Title.txt".into(), attempts: 1 }
        );
        assert_eq!(
            second,
            LinkOutcome::Saved { path: "output/html/article_2.txt".into(), attempts: 1 }
        );
    }

    #[tokio::test]
    async fn test_title_collision_never_overwrites_earlier_article() {
        let mut page = FakeContext::authenticated()
            .reply(record("article 2", 300))
            .reply(record("Same Title", 300))
            .reply(record("Same Title", 300));
        let mut crawler = Crawler::new(options(), RecordingSink::default());
        crawler.acquire_article(&mut page, &link(1), 0).await;
        crawler.acquire_article(&mut page, &link(2), 2).await;
        let third = crawler.acquire_article(&mut page, &link(3), 1).await;
        assert_eq!(
            third,
            LinkOutcome::Saved { path: "output/html/article_2_2.txt".into(), attempts: 1 }
        );

        let saved = crawler.sink.saved.borrow();
        let paths: HashSet<&PathBuf> = saved.iter().map(|(_, p)| p).collect();
        assert_eq!(paths.len(), 3);
        assert_eq!(saved[0].1, PathBuf::from("output/html/article_2.txt"));
    }

    #[tokio::test]
    async fn test_interrupt_still_closes_context() {
        let mut page = FakeContext::authenticated();
        let mut crawler = Crawler::new(options(), RecordingSink::default());
        let end = run_to_completion(&mut crawler, &mut page, std::future::ready(())).await;
        assert!(matches!(end, RunEnd::Interrupted));
        assert_eq!(page.ops.last(), Some(&Op::Close));
    }

    #[tokio::test]
    async fn test_fatal_error_still_closes_context() {
        let mut page = FakeContext::default();
        let mut crawler = Crawler::new(options(), RecordingSink::default());
        let end = run_to_completion(&mut crawler, &mut page, std::future::pending()).await;
        assert!(matches!(end, RunEnd::Finished(Err(Error::NotAuthenticated))));
        assert_eq!(page.ops.last(), Some(&Op::Close));
    }
}
