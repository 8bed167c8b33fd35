//! Image analysis through an OpenAI-compatible vision chat endpoint.
//!
//! The image is sent inline as base64 alongside the prompt; the answer is
//! printed or written to a file. Calls are not retried.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tracing::{info, instrument};

pub const DEFAULT_VISION_API_BASE: &str = "https://open.bigmodel.cn/api/paas/v4/";
pub const DEFAULT_VISION_MODEL: &str = "glm-4.5v";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    thinking: Thinking,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

pub struct VisionClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl VisionClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingCredential("VISION_API_KEY".into()));
        }
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            api_base: api_base.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn build_request(&self, image_base64: String, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_base64 },
                    },
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            thinking: Thinking { kind: "enabled" },
        }
    }

    /// Send the image at `image_path` with `prompt` and return the model's answer.
    #[instrument(level = "info", skip(self, prompt), fields(image = %image_path.display(), model = %self.model))]
    pub async fn analyze(&self, image_path: &Path, prompt: &str) -> Result<String> {
        let image = encode_image(image_path).await?;
        let request = self.build_request(image, prompt);

        info!("Analyzing image");
        let t0 = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("HTTP {status}: {}", body.trim())));
        }
        let parsed: ChatResponse = response.json().await?;
        let answer = answer_from(parsed)?;
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = answer.chars().count(),
            "Image analysis finished"
        );
        Ok(answer)
    }
}

/// Base64 of the file at `path`.
pub async fn encode_image(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::Vision(format!("image file does not exist: {}", path.display())));
    }
    let bytes = fs::read(path).await?;
    Ok(STANDARD.encode(bytes))
}

fn answer_from(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Vision("response contained no answer".into()))
}

/// Terminal rendering of an answer.
pub fn render_answer(answer: &str) -> String {
    let rule = "=".repeat(50);
    format!("\n{rule}\nAnalysis result:\n{rule}\n{answer}")
}

/// Write the answer to `output` when given, print it otherwise.
pub async fn deliver(answer: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await?;
            }
            fs::write(path, answer.as_bytes()).await?;
            info!(path = %path.display(), "Analysis saved");
        }
        None => println!("{}", render_answer(answer)),
    }
    Ok(())
}
