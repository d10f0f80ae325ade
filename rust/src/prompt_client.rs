//! Client for the hosted multimodal model that turns an image into a prompt.
//!
//! One provider is configured at a time. It speaks the OpenAI-compatible
//! chat-completions protocol: a single user message carrying the fixed
//! instruction and the image as an inline data URL.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;

use crate::data_url::{self, DataUrl, DataUrlError};

pub const PROMPT_INSTRUCTION: &str = "Analyze this image in extreme detail. Generate a high-quality, creative 'prompt' that could be used in an AI image generator (like Midjourney or DALL-E) to recreate this image. Focus on artistic style, camera settings, lighting, color palette, composition, and specific subject details. Keep the output as a single, powerful descriptive paragraph.";

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Failures of a single generation request. `Display` output is shown to the
/// user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Authentication error: no API key was found in the {0} environment variable.")]
    MissingCredential(String),

    #[error("Authentication error: The provided API key is invalid or has expired.")]
    InvalidCredential,

    #[error("An error occurred while generating the prompt. ({message})")]
    Api { status: u16, message: String },

    #[error("An error occurred while generating the prompt. ({0})")]
    Transport(String),

    #[error("An error occurred while generating the prompt. (invalid response: {0})")]
    MalformedResponse(String),

    #[error("Failed to generate a prompt. Please try again.")]
    EmptyResponse,

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] DataUrlError),
}

impl PromptError {
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            PromptError::MissingCredential(_) | PromptError::InvalidCredential
        )
    }
}

#[async_trait]
pub trait PromptProvider: Send + Sync {
    /// Describes the image. `image` is a data URL (or its bare base64 payload).
    async fn generate(&self, image: &str, mime_type: &str) -> Result<String, PromptError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

pub struct ChatCompletionsClient {
    http: Client,
    settings: ProviderSettings,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
            api_key: None,
        }
    }

    /// Uses a fixed key instead of reading the environment on each call.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn resolve_api_key(&self) -> Result<String, PromptError> {
        let key = match &self.api_key {
            Some(key) => key.clone(),
            None => env::var(&self.settings.api_key_env).unwrap_or_default(),
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(PromptError::MissingCredential(
                self.settings.api_key_env.clone(),
            ));
        }
        Ok(key.to_string())
    }

    fn build_body(&self, image: &str, mime_type: &str) -> Result<Value, PromptError> {
        let image = image.trim();
        // The caller's MIME type wins over the one embedded in a data URL.
        let image_url = if image.starts_with("data:") {
            let parsed = DataUrl::parse(image)?;
            DataUrl::parse(&data_url::compose(mime_type, parsed.payload()))?
        } else {
            let payload = data_url::strip_prefix(image);
            if payload.is_empty() {
                return Err(PromptError::InvalidImage(DataUrlError::Empty));
            }
            DataUrl::parse(&data_url::compose(mime_type, payload))?
        };

        Ok(json!({
            "model": self.settings.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": PROMPT_INSTRUCTION },
                        { "type": "image_url", "image_url": { "url": image_url.as_string() } },
                    ],
                },
            ],
            "max_tokens": self.settings.max_tokens,
        }))
    }
}

#[async_trait]
impl PromptProvider for ChatCompletionsClient {
    async fn generate(&self, image: &str, mime_type: &str) -> Result<String, PromptError> {
        let body = self.build_body(image, mime_type)?;
        let api_key = self.resolve_api_key()?;

        log::debug!(
            "requesting prompt from {} (model {})",
            self.settings.endpoint,
            self.settings.model
        );
        let resp = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| PromptError::Transport(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|err| PromptError::MalformedResponse(err.to_string()))?;

        extract_prompt(&json)
    }
}

fn status_error(status: StatusCode, body: &str) -> PromptError {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return PromptError::InvalidCredential;
    }

    let remote_message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ToOwned::to_owned)
        });
    let message = remote_message.unwrap_or_else(|| {
        format!(
            "API error: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string()
    });

    PromptError::Api {
        status: status.as_u16(),
        message,
    }
}

fn extract_prompt(json: &Value) -> Result<String, PromptError> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(PromptError::EmptyResponse);
    }
    Ok(text.to_string())
}
