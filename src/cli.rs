//! Command-line interface definitions for Article Harvest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can be provided via a command-line flag or an environment
//! variable (a `.env` file in the working directory is loaded first).

use crate::browser::http::DEFAULT_USER_AGENT;
use crate::crawl::{
    DEFAULT_AUTH_PROMPT, DEFAULT_DISCOVERY_PROMPT, DEFAULT_EXTRACTION_PROMPT, DEFAULT_LISTING_URL,
};
use crate::transforms::translate::DEFAULT_TARGET_LANGUAGE;
use crate::vision::{DEFAULT_VISION_API_BASE, DEFAULT_VISION_MODEL};
use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the Article Harvest application.
///
/// # Examples
///
/// ```sh
/// # Save the newest articles from the listing page
/// article_harvest crawl --session-cookie "$COOKIE"
///
/// # Pull article bodies out of the saved pages, then translate them
/// article_harvest extract
/// article_harvest translate --target-language 中文
///
/// # Ask the vision model about a screenshot
/// article_harvest vision screenshot.png "What is wrong with this layout?" -o result.txt
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Root directory for `output/` and `logs/` (defaults to the working directory)
    #[arg(long, env = "ROOT_DIR", global = true)]
    pub root_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover article links on the listing page and save each article's text
    Crawl(CrawlArgs),
    /// Extract article bodies from saved pages with CSS selectors
    Extract(ExtractArgs),
    /// Translate extracted articles with the LLM
    Translate(TranslateArgs),
    /// Analyze an image with a vision model
    Vision(VisionArgs),
}

impl Command {
    /// Component name used for the log file and the run report.
    pub fn component(&self) -> &'static str {
        match self {
            Command::Crawl(_) => "crawl",
            Command::Extract(_) => "extract_articles",
            Command::Translate(_) => "translate_articles",
            Command::Vision(_) => "vision",
        }
    }
}

/// LLM settings shared by the commands that talk to it.
#[derive(Args, Debug, Clone)]
pub struct AiArgs {
    /// Optional path to the awful_aj config.yaml file
    #[arg(long, env = "AI_CONFIG")]
    pub ai_config: Option<String>,

    /// Retries per AI call after the first failure
    #[arg(long, env = "AI_RETRIES", default_value_t = 0)]
    pub ai_retries: usize,
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Listing page to discover article links on
    #[arg(long, env = "LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// Attempts per article, including the first
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Article bodies must be longer than this many characters
    #[arg(long, env = "MIN_CONTENT_CHARS", default_value_t = 200)]
    pub min_content_chars: usize,

    /// Page navigation timeout in seconds
    #[arg(long, env = "NAV_TIMEOUT_SECS", default_value_t = 60)]
    pub nav_timeout_secs: u64,

    /// `Cookie` header of an authenticated browser session
    #[arg(long, env = "SESSION_COOKIE", hide_env_values = true)]
    pub session_cookie: Option<String>,

    /// User agent sent with every page request
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// awful_aj template used to read pages
    #[arg(long, env = "PAGE_TEMPLATE", default_value = "page_reader")]
    pub template: String,

    #[command(flatten)]
    pub ai: AiArgs,

    /// Instruction used to discover article links on the listing page
    #[arg(long, default_value = DEFAULT_DISCOVERY_PROMPT)]
    pub discovery_prompt: String,

    /// Instruction used to extract an article from its page
    #[arg(long, default_value = DEFAULT_EXTRACTION_PROMPT)]
    pub extraction_prompt: String,

    /// Instruction used to find the signed-in account link
    #[arg(long, default_value = DEFAULT_AUTH_PROMPT)]
    pub auth_prompt: String,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Directory of saved pages (defaults to `<root>/output/html`)
    #[arg(long, env = "EXTRACT_INPUT_DIR")]
    pub input_dir: Option<String>,

    /// File name pattern of the inputs
    #[arg(long, default_value = "*.txt")]
    pub pattern: String,

    /// Output directory (defaults to `<root>/output/extracted_articles`)
    #[arg(long, env = "EXTRACT_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// YAML file overriding the content selectors
    #[arg(long, env = "EXTRACT_SELECTORS")]
    pub selectors: Option<String>,
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Directory of extracted articles (defaults to `<root>/output/extracted_articles`)
    #[arg(long, env = "TRANSLATE_INPUT_DIR")]
    pub input_dir: Option<String>,

    /// File name pattern of the inputs
    #[arg(long, default_value = "*.txt")]
    pub pattern: String,

    /// Output directory (defaults to `<root>/output/translated_articles`)
    #[arg(long, env = "TRANSLATE_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Language to translate into
    #[arg(long, env = "TARGET_LANGUAGE", default_value = DEFAULT_TARGET_LANGUAGE)]
    pub target_language: String,

    /// awful_aj template used for translation
    #[arg(long, env = "TRANSLATE_TEMPLATE", default_value = "article_translator")]
    pub template: String,

    #[command(flatten)]
    pub ai: AiArgs,
}

#[derive(Args, Debug)]
pub struct VisionArgs {
    /// Image file to analyze
    pub image: String,

    /// What to ask about the image
    pub prompt: String,

    /// Save the answer here instead of printing it
    #[arg(short, long)]
    pub output: Option<String>,

    /// API key of the vision service
    #[arg(long, env = "VISION_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "VISION_API_BASE", default_value = DEFAULT_VISION_API_BASE)]
    pub api_base: String,

    /// Vision model name
    #[arg(long, env = "VISION_MODEL", default_value = DEFAULT_VISION_MODEL)]
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_crawl_defaults() {
        let cli = Cli::parse_from(["article_harvest", "crawl"]);
        let Command::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };
        assert_eq!(args.listing_url, "https://www.theatlantic.com/latest");
        assert_eq!(args.max_attempts, 3);
        assert_eq!(args.min_content_chars, 200);
        assert_eq!(args.nav_timeout_secs, 60);
        assert_eq!(args.template, "page_reader");
        assert_eq!(args.auth_prompt, "find href:My Account");
    }

    #[test]
    fn test_crawl_overrides() {
        let cli = Cli::parse_from([
            "article_harvest",
            "--root-dir",
            "/srv/news",
            "crawl",
            "--max-attempts",
            "5",
            "--session-cookie",
            "sid=abc",
            "--ai-retries",
            "2",
        ]);
        assert_eq!(cli.root_dir.as_deref(), Some("/srv/news"));
        assert_eq!(cli.command.component(), "crawl");
        let Command::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };
        assert_eq!(args.max_attempts, 5);
        assert_eq!(args.session_cookie.as_deref(), Some("sid=abc"));
        assert_eq!(args.ai.ai_retries, 2);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = Cli::try_parse_from(["article_harvest", "crawl", "--max-attempts", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_and_translate() {
        let cli = Cli::parse_from(["article_harvest", "extract", "--pattern", "*.html"]);
        assert_eq!(cli.command.component(), "extract_articles");
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.pattern, "*.html");
        assert!(args.input_dir.is_none());

        let cli = Cli::parse_from(["article_harvest", "translate"]);
        let Command::Translate(args) = cli.command else {
            panic!("expected translate");
        };
        assert_eq!(args.target_language, "中文");
        assert_eq!(args.template, "article_translator");
    }

    #[test]
    fn test_vision_positionals() {
        let cli = Cli::parse_from([
            "article_harvest",
            "vision",
            "shot.png",
            "Describe this image",
            "-o",
            "result.txt",
            "--api-key",
            "k",
        ]);
        assert_eq!(cli.command.component(), "vision");
        let Command::Vision(args) = cli.command else {
            panic!("expected vision");
        };
        assert_eq!(args.image, "shot.png");
        assert_eq!(args.prompt, "Describe this image");
        assert_eq!(args.output.as_deref(), Some("result.txt"));
        assert_eq!(args.model, "glm-4.5v");
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["article_harvest"]).is_err());
    }
}
