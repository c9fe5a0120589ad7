//! Text completion port and its OpenAI chat-completions adapter.
//!
//! Callers hand over a prompt and get back text that should contain one JSON object. Nothing more
//! is promised: the text may be wrapped in code fences or prose, or be malformed, so it always goes
//! through [`parse_json_object`] before use.
//!
//! ## Setup
//! Set `OPENAI_API_KEY`. `OPENAI_MODEL` overrides the default model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{env, error::Error, fmt, time::Duration};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SYSTEM_PROMPT: &str = "You only reply with ONE valid JSON object. No prose, no code fences.";
const MAX_ATTEMPTS: u32 = 2;
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 1200;

#[derive(Debug)]
pub enum CompletionError {
    HttpError(reqwest::Error),
    ResponseError(String),
    Exhausted(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::HttpError(err) => write!(f, "HTTP error: {}", err),
            CompletionError::ResponseError(msg) => write!(f, "Response error: {}", msg),
            CompletionError::Exhausted(msg) => write!(f, "All attempts failed: {}", msg),
        }
    }
}

impl Error for CompletionError {}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::HttpError(err)
    }
}

#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// The first balanced `{...}` in `raw`, ignoring braces inside JSON strings.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Best-effort decode of a completion into a JSON object; anything unusable becomes `{}`.
pub fn parse_json_object(raw: &str) -> Map<String, Value> {
    let cleaned = strip_code_fences(raw);
    extract_json_object(&cleaned)
        .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiService {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiService {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY environment variable not set")?;
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_once(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http_client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionError::ResponseError(format!(
                "OpenAI returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed = response.json::<ChatResponse>().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::ResponseError("No choices in response".to_string()))?;

        Ok(strip_code_fences(&content))
    }
}

#[async_trait]
impl CompletionPort for OpenAiService {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.request_once(prompt).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    log::warn!("Completion attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, e);
                    last_error = e.to_string();
                }
            }
        }
        Err(CompletionError::Exhausted(last_error))
    }
}
