//! LLM API interaction with optional exponential backoff retry logic.
//!
//! This module provides the interface the page reader and the translator
//! use to talk to an OpenAI-compatible LLM API through `awful_aj`.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`AskFnWrapper`]: Wraps the `awful_aj` library's `ask` function
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//! - [`ask_json`]: Ask and parse a JSON reply, re-asking once on truncation
//!
//! # Retry Strategy
//!
//! AI calls are not retried unless a retry budget is configured. When it is:
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::{Error, Result};
use crate::utils::{looks_truncated, truncate_for_log};
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up. Zero means a single call.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = AskFnWrapper::new(config, template);
    /// let retry_client = RetryAsk::new(client, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let delay = backoff_delay(self.base_delay, self.max_delay, attempt);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based), without jitter.
///
/// The exponent is clamped so a large retry budget cannot overflow the shift.
fn backoff_delay(base: StdDuration, max: StdDuration, attempt: usize) -> StdDuration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    base.saturating_mul(1u32 << exponent).min(max)
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
///
/// Holds the loaded configuration (API endpoint, key, model) and the chat
/// template that frames every request.
pub struct AskFnWrapper {
    config: Arc<AwfulJadeConfig>,
    template: Arc<ChatTemplate>,
}

impl AskFnWrapper {
    pub fn new(config: Arc<AwfulJadeConfig>, template: Arc<ChatTemplate>) -> Self {
        Self { config, template }
    }
}

impl fmt::Debug for AskFnWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskFnWrapper").finish_non_exhaustive()
    }
}

impl AskAsync for AskFnWrapper {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None)
            .await
            .map_err(|e| Error::Ai(e.to_string()));
        let dt = t0.elapsed();

        if let Err(e) = &res {
            warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "API call failed");
        }
        res
    }
}

/// The LLM client used by the crawler and the translator.
pub type AiClient = RetryAsk<AskFnWrapper>;

/// Load the `awful_aj` configuration and template and build an [`AiClient`].
///
/// `config_path` defaults to `config.yaml` in the `awful_aj` config directory.
/// A configuration that cannot be loaded is a startup failure: it carries the
/// API credentials.
#[instrument(level = "info", skip(config_path))]
pub async fn load_client(
    config_path: Option<&str>,
    template_name: &str,
    max_retries: usize,
) -> Result<AiClient> {
    let config_path = match config_path {
        Some(p) => p.to_string(),
        None => config_dir()
            .map_err(|e| Error::Config(format!("cannot locate awful_aj config dir: {e}")))?
            .join("config.yaml")
            .to_string_lossy()
            .into_owned(),
    };
    let config = config::load_config(&config_path).map_err(|e| {
        Error::MissingCredential(format!("AI configuration at {config_path} could not be loaded: {e}"))
    })?;
    info!(%config_path, "Loaded AI configuration");

    let template = template::load_template(template_name)
        .await
        .map_err(|e| Error::Config(format!("cannot load template {template_name}: {e}")))?;
    info!(template = template_name, "Loaded template");

    let inner = AskFnWrapper::new(Arc::new(config), Arc::new(template));
    Ok(RetryAsk::new(inner, max_retries, StdDuration::from_secs(1)))
}

/// Strip a surrounding markdown code fence from a model reply.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model reply as JSON of type `T`.
pub fn parse_json_reply<T: DeserializeOwned>(
    reply: &str,
) -> std::result::Result<T, serde_json::Error> {
    serde_json::from_str(strip_code_fence(reply))
}

/// Ask the model and parse its reply as `T`.
///
/// If the reply was cut off mid-JSON, the question is asked once more.
#[instrument(level = "info", skip_all)]
pub async fn ask_json<T, A>(ai: &A, text: &str) -> Result<T>
where
    T: DeserializeOwned,
    A: AskAsync<Response = String>,
{
    let t0 = Instant::now();
    let reply = ai.ask(text).await?;
    let mut parsed = parse_json_reply::<T>(&reply);

    if let Err(ref e) = parsed {
        if looks_truncated(e) {
            warn!(error = %e, "EOF while parsing; re-asking once");
            let second = ai.ask(text).await?;
            parsed = parse_json_reply::<T>(&second);
        }
    }

    match parsed {
        Ok(value) => {
            info!(elapsed_ms_total = t0.elapsed().as_millis() as u128, "ask_json succeeded");
            Ok(value)
        }
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&reply, 300),
                "Model returned non-conforming JSON"
            );
            Err(Error::Extraction(format!("model returned non-conforming JSON: {e}")))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies and counts calls.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedAsk {
        pub replies: Mutex<VecDeque<Result<String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAsk {
        pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl AskAsync for ScriptedAsk {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(text.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Ai("no scripted reply".into())))
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: u32,
        b: String,
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[1, 2]\n```\n"), "[1, 2]");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_reply_fenced() {
        let pair: Pair = parse_json_reply("```json\n{\"a\": 7, \"b\": \"x\"}\n```").unwrap();
        assert_eq!(pair, Pair { a: 7, b: "x".into() });
    }

    #[tokio::test]
    async fn test_ask_json_reasks_once_on_truncation() {
        let ai = ScriptedAsk::new(vec![
            Ok(r#"{"a": 1, "b": "cut"#.to_string()),
            Ok(r#"{"a": 1, "b": "whole"}"#.to_string()),
        ]);
        let pair: Pair = ask_json(&ai, "question").await.unwrap();
        assert_eq!(pair.b, "whole");
        assert_eq!(ai.calls(), 2);
    }

    #[tokio::test]
    async fn test_ask_json_does_not_reask_on_bad_json() {
        let ai = ScriptedAsk::new(vec![Ok("not json at all".to_string())]);
        let result: Result<Pair> = ask_json(&ai, "question").await;
        assert!(matches!(result, Err(Error::Extraction(_))));
        assert_eq!(ai.calls(), 1);
    }

    #[test]
    fn test_backoff_delay_is_capped_for_large_attempts() {
        let base = StdDuration::from_millis(500);
        let max = StdDuration::from_secs(30);
        assert_eq!(backoff_delay(base, max, 1), base);
        assert_eq!(backoff_delay(base, max, 3), StdDuration::from_secs(2));
        assert_eq!(backoff_delay(base, max, 40), max);
        assert_eq!(backoff_delay(base, max, usize::MAX), max);
    }

    #[tokio::test]
    async fn test_load_client_without_config_is_missing_credential() {
        let result = load_client(Some("/nonexistent/article_harvest/config.yaml"), "page_reader", 0).await;
        assert!(matches!(result, Err(Error::MissingCredential(_))));
    }

    #[tokio::test]
    async fn test_retry_ask_zero_retries_is_single_call() {
        let inner = ScriptedAsk::new(vec![Err(Error::Ai("down".into())), Ok("late".into())]);
        let api = RetryAsk::new(inner, 0, StdDuration::from_millis(1));
        assert!(api.ask("hi").await.is_err());
        assert_eq!(api.inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_ask_recovers_within_budget() {
        let inner = ScriptedAsk::new(vec![Err(Error::Ai("down".into())), Ok("up".into())]);
        let api = RetryAsk::new(inner, 2, StdDuration::from_millis(1));
        assert_eq!(api.ask("hi").await.unwrap(), "up");
        assert_eq!(api.inner.calls(), 2);
    }
}
