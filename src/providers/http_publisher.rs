use super::{http_client, request_error, PublishReceipt, Publisher};
use crate::config::PublisherSettings;
use crate::error::{PressError, PressResult};
use crate::logger::{LogLevel, LOGGER};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const PROVIDER: &str = "http-publisher";
const MAX_TITLE_CHARS: usize = 120;

#[derive(Serialize)]
struct PublishRequest<'a> {
    title: &'a str,
    content: &'a str,
    status: &'a str,
}

/// Publishes by POSTing JSON `{title, content, status}` to a content host
///
/// A non-2xx reply is not an error here: it comes back as a receipt with
/// `success = false` so the caller sees the host's message.
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_token: Option<String>,
    status: String,
    timeout: Duration,
}

impl HttpPublisher {
    pub fn from_settings(settings: &PublisherSettings) -> PressResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: settings.endpoint.clone().filter(|e| !e.trim().is_empty()),
            api_token: settings.api_token.clone().filter(|t| !t.trim().is_empty()),
            status: settings.status.clone(),
            timeout,
        })
    }
}

/// Title for a post: first Markdown heading, else first non-empty line
pub fn derive_title(text: &str) -> String {
    let lines = || text.lines().map(str::trim).filter(|l| !l.is_empty());

    let title = lines()
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim())
        .or_else(|| lines().next())
        .unwrap_or("Untitled");

    if title.chars().count() > MAX_TITLE_CHARS {
        title.chars().take(MAX_TITLE_CHARS).collect::<String>().trim_end().to_string()
    } else {
        title.to_string()
    }
}

/// Locator of the created item from a JSON reply (`url`, `link` or `id`)
fn extract_locator(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["url", "link", "id"].iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn is_available(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn publish(&self, text: &str) -> PressResult<PublishReceipt> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| PressError::NotConfigured(PROVIDER.to_string()))?;

        let title = derive_title(text);
        let request = PublishRequest {
            title: &title,
            content: text,
            status: &self.status,
        };

        LOGGER.log(
            LogLevel::Debug,
            &format!("Publishing '{}' to {} as {}", title, endpoint, self.status),
            "providers::http_publisher",
        );

        let mut builder = self.client.post(endpoint).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, self.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(PROVIDER, self.timeout, e))?;

        if !status.is_success() {
            return Ok(PublishReceipt {
                success: false,
                locator: None,
                message: format!("HTTP {}: {}", status, body.trim()),
            });
        }

        let locator = extract_locator(&body);
        Ok(PublishReceipt {
            success: true,
            message: match &locator {
                Some(locator) => format!("published '{}' at {}", title, locator),
                None => format!("published '{}'", title),
            },
            locator,
        })
    }
}
