//! HTTP-backed browsing context.
//!
//! Pages are loaded with `reqwest` (session cookie and user agent sent on
//! every request) and parsed with `scraper`. Structured extraction and
//! observation are delegated to the LLM: the page text or its links are
//! sent along with the instruction and the expected JSON shape.

use super::BrowsingContext;
use crate::api::{AskAsync, ask_json};
use crate::error::{Error, Result};
use crate::models::{Affordance, Extractable};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Connection settings for [`HttpPage`].
#[derive(Debug, Clone)]
pub struct HttpPageOptions {
    /// Raw `Cookie` header value of an authenticated session.
    pub session_cookie: Option<String>,
    pub user_agent: String,
    /// Upper bound on page characters sent to the model per request.
    pub max_prompt_chars: usize,
}

impl Default for HttpPageOptions {
    fn default() -> Self {
        Self {
            session_cookie: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_prompt_chars: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    text: String,
    href: String,
}

#[derive(Debug)]
struct LoadedPage {
    url: Url,
    html: String,
    /// Filled in by `wait_for_ready`.
    text: Option<String>,
    anchors: Vec<Anchor>,
}

pub struct HttpPage<A> {
    client: Client,
    ai: A,
    max_prompt_chars: usize,
    current: Option<LoadedPage>,
}

impl<A> HttpPage<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(ai: A, options: HttpPageOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = options.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| Error::Config(format!("session cookie is not a valid header value: {e}")))?;
            headers.insert(COOKIE, value);
        }
        let client = Client::builder()
            .user_agent(options.user_agent)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            ai,
            max_prompt_chars: options.max_prompt_chars,
            current: None,
        })
    }

    fn ready_page(&mut self) -> Result<&LoadedPage> {
        let page = self.current.as_mut().ok_or(Error::NoPage)?;
        if page.text.is_none() {
            let document = Html::parse_document(&page.html);
            page.text = Some(visible_text(&document));
            page.anchors = collect_anchors(&document, &page.url);
        }
        Ok(page)
    }

    fn clip(&self, text: &str) -> String {
        text.chars().take(self.max_prompt_chars).collect()
    }
}

impl<A> BrowsingContext for HttpPage<A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip(self))]
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let target = Url::parse(url)?;

        // On timeout or a transport error the previous page stays current.
        let (final_url, status, html) =
            match tokio::time::timeout(timeout, fetch_page(&self.client, target)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(Error::NavigationTimeout {
                        url: url.to_string(),
                        timeout,
                    });
                }
            };

        info!(final_url = %final_url, %status, bytes = html.len(), "Page loaded");
        self.current = Some(LoadedPage {
            url: final_url,
            html,
            text: None,
            anchors: Vec::new(),
        });

        // The error page is kept so a snapshot can capture it.
        if !status.is_success() {
            return Err(Error::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        Ok(())
    }

    async fn wait_for_ready(&mut self) -> Result<()> {
        let page = self.ready_page()?;
        debug!(
            chars = page.text.as_deref().map(|t| t.chars().count()).unwrap_or(0),
            anchors = page.anchors.len(),
            "Page ready"
        );
        Ok(())
    }

    #[instrument(level = "info", skip_all)]
    async fn extract<T: Extractable>(&mut self, instruction: &str) -> Result<T> {
        let (url, text) = {
            let page = self.ready_page()?;
            (page.url.to_string(), page.text.clone().unwrap_or_default())
        };
        let prompt = format!(
            "{instruction}\n\nReply with JSON only, shaped like:\n{shape}\n\nPage URL: {url}\nPage text:\n{text}",
            shape = T::SHAPE,
            text = self.clip(&text),
        );
        ask_json::<T, A>(&self.ai, &prompt).await
    }

    #[instrument(level = "info", skip_all)]
    async fn observe(&mut self, instruction: &str) -> Result<Vec<Affordance>> {
        let (url, anchors) = {
            let page = self.ready_page()?;
            (page.url.to_string(), page.anchors.clone())
        };
        let mut listing = String::new();
        for (i, anchor) in anchors.iter().enumerate() {
            let _ = writeln!(listing, "[{i}] {} -> {}", anchor.text, anchor.href);
        }
        let prompt = format!(
            "{instruction}\n\nBelow are the links on {url}. Reply with a JSON array of the matching \
             elements only, shaped like [{{\"description\": \"what the element is\", \"href\": \"its link\"}}]. \
             Reply with [] when nothing matches.\n\n{links}",
            links = self.clip(&listing),
        );
        ask_json::<Vec<Affordance>, A>(&self.ai, &prompt).await
    }

    async fn current_page_text(&mut self) -> Result<String> {
        let page = self.ready_page()?;
        Ok(page.text.clone().unwrap_or_default())
    }

    async fn snapshot(&mut self, path: &Path) -> Result<()> {
        let page = self.current.as_ref().ok_or(Error::NoPage)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, page.html.as_bytes()).await?;
        info!(path = %path.display(), "Saved page snapshot");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.current.take().is_some() {
            info!("Browsing context closed");
        }
        Ok(())
    }
}

/// GET `target` and read the body whatever the status.
async fn fetch_page(client: &Client, target: Url) -> Result<(Url, StatusCode, String)> {
    let response = client.get(target).send().await?;
    let status = response.status();
    let final_url = response.url().clone();
    let html = response.text().await?;
    Ok((final_url, status, html))
}

/// Text nodes outside `script`/`style`/`noscript`/`template`, one per line.
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
        });
        let trimmed = text.trim();
        if hidden || trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Links with their resolved targets, in document order.
fn collect_anchors(document: &Html, base: &Url) -> Vec<Anchor> {
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            let resolved = base.join(href).ok()?;
            let text = el.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            Some(Anchor {
                text,
                href: resolved.to_string(),
            })
        })
        .collect()
}
