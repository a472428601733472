//! OpenRouter classifier.
//!
//! Speaks the OpenAI-compatible chat completions API with one image part per
//! request, so any compatible gateway works when pointed at with `base_url`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::prompt::{user_instruction, SYSTEM_PROMPT};
use super::result::parse_reply;
use super::{ClassifyError, CreativeClassifier};
use crate::sheets::CreativeFields;
use crate::upload::CreativeFile;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3-haiku";

const REFERER: &str = "https://creative-naming.vercel.app";
const APP_TITLE: &str = "Creative Naming Tool";

/// Sampling and transport options for a classification request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 800,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct OpenRouterClassifier {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    options: CompletionOptions,
}

impl OpenRouterClassifier {
    pub fn new(
        client: Client,
        model: impl Into<String>,
        api_key: impl Into<String>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            client,
            base_url: OPENROUTER_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            options,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, file: &CreativeFile) -> ChatRequest {
        let data_url = format!(
            "data:{};base64,{}",
            file.content_type,
            STANDARD.encode(&file.data)
        );
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: data_url },
                        },
                        ContentPart::Text {
                            text: user_instruction(&file.name),
                        },
                    ]),
                },
            ],
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        }
    }
}

#[async_trait]
impl CreativeClassifier for OpenRouterClassifier {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn classify(&self, file: &CreativeFile) -> Result<CreativeFields, ClassifyError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.build_request(file);

        debug!(
            "Classifying {} ({}, {} bytes) with {}",
            file.name,
            file.content_type,
            file.data.len(),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .json(&request)
            .timeout(self.options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifyError::Timeout
                } else {
                    ClassifyError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ClassifyError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            ClassifyError::InvalidResponse(format!("Failed to parse completion: {}", e))
        })?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        parse_reply(&content).ok_or_else(|| {
            warn!("Model reply for {} carried no usable JSON: {}", file.name, content);
            ClassifyError::UnparseableReply
        })
    }
}

// Chat completions API types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
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

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
