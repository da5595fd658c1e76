use super::{http_client, request_error, Evaluator, Generator};
use crate::config::ChatSettings;
use crate::error::{PressError, PressResult};
use crate::logger::{LogLevel, LOGGER};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Built-in system prompt for drafting
pub const DEFAULT_GENERATE_PROMPT: &str = "You are a technical writer. Turn the transcript you \
    are given into a well-structured article in Markdown. Start with a single '#' heading, keep \
    the speaker's facts and terminology, drop filler words and repetitions, and do not invent \
    content.";

/// Built-in system prompt for reviewing
pub const DEFAULT_EVALUATE_PROMPT: &str = "You are an editor. Review the Markdown article you \
    are given for accuracy, clarity and structure, fix any problems you find, and reply with the \
    improved article only, without commentary.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion endpoints
pub struct ChatClient {
    provider: &'static str,
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn from_settings(provider: &'static str, settings: &ChatSettings) -> PressResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            provider,
            client: http_client(timeout)?,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: settings.model.clone(),
            timeout,
        })
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some() && !self.api_url.trim().is_empty() && !self.model.trim().is_empty()
    }

    /// Send one system + user exchange and return the first choice
    pub async fn complete(&self, system: &str, user: &str) -> PressResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PressError::NotConfigured(self.provider.to_string()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        LOGGER.log(
            LogLevel::Debug,
            &format!(
                "Requesting completion from {} with model {} ({} chars)",
                self.api_url,
                self.model,
                user.chars().count()
            ),
            "providers::chat",
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(self.provider, self.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(self.provider, self.timeout, e))?;

        if !status.is_success() {
            return Err(PressError::provider(
                self.provider,
                format!("API error ({}): {}", status, body.trim()),
            ));
        }

        parse_completion(self.provider, &body)
    }
}

/// Extract the first choice's content from a chat completion body
fn parse_completion(provider: &str, body: &str) -> PressResult<String> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
        PressError::provider(provider, format!("Failed to parse API response: {}", e))
    })?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(PressError::EmptyResponse(provider.to_string()));
    }
    Ok(content)
}

/// Generator backed by a chat model
pub struct ChatGenerator {
    client: ChatClient,
    prompt: String,
}

impl ChatGenerator {
    pub fn from_settings(settings: &ChatSettings) -> PressResult<Self> {
        Ok(Self {
            client: ChatClient::from_settings("generator", settings)?,
            prompt: settings
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_GENERATE_PROMPT.to_string()),
        })
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    fn name(&self) -> &str {
        "chat-generator"
    }

    fn is_available(&self) -> bool {
        self.client.is_available()
    }

    async fn generate(&self, transcript: &str) -> PressResult<String> {
        self.client.complete(&self.prompt, transcript).await
    }
}

/// Evaluator backed by a chat model
pub struct ChatEvaluator {
    client: ChatClient,
    prompt: String,
}

impl ChatEvaluator {
    pub fn from_settings(settings: &ChatSettings) -> PressResult<Self> {
        Ok(Self {
            client: ChatClient::from_settings("evaluator", settings)?,
            prompt: settings
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EVALUATE_PROMPT.to_string()),
        })
    }
}

#[async_trait]
impl Evaluator for ChatEvaluator {
    fn name(&self) -> &str {
        "chat-evaluator"
    }

    fn is_available(&self) -> bool {
        self.client.is_available()
    }

    async fn evaluate(&self, draft: &str) -> PressResult<String> {
        self.client.complete(&self.prompt, draft).await
    }
}
