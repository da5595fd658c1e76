//! Capability providers backing the pipeline stages
//!
//! Each provider wraps one external capability and exposes a cheap
//! availability check plus a single transform. `is_available` only reflects
//! configuration; it never touches the network or the filesystem.

pub mod chat;
pub mod ffmpeg;
pub mod http_publisher;
pub mod mock;
pub mod process;
pub mod whisper;

pub use chat::{ChatClient, ChatEvaluator, ChatGenerator};
pub use ffmpeg::FfmpegExtractor;
pub use http_publisher::HttpPublisher;
pub use mock::{MockExtractor, MockPublisher, MockTextProvider};
pub use whisper::WhisperTranscriber;

use crate::config::Settings;
use crate::error::{PressError, PressResult};
use crate::pipeline::ResourceRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Pulls an audio track out of a media file
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Extract audio from `source`.
    ///
    /// The output file must be registered with `resources` before the slow
    /// part starts, so a failure or cancellation still cleans it up.
    async fn extract(&self, source: &Path, resources: &ResourceRegistry) -> PressResult<PathBuf>;
}

/// Speech to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn transcribe(&self, audio: &Path) -> PressResult<String>;
}

/// Drafts an article from a transcript
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn generate(&self, transcript: &str) -> PressResult<String>;
}

/// Reviews a draft and returns the final text
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn evaluate(&self, draft: &str) -> PressResult<String>;
}

/// Sends the final text to a content host
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn publish(&self, text: &str) -> PressResult<PublishReceipt>;
}

/// What the content host said about a publish request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub success: bool,
    /// URL or identifier of the published item
    pub locator: Option<String>,
    pub message: String,
}

/// Map a failed HTTP call, keeping the configured bound in timeout errors
pub(crate) fn request_error(provider: &str, timeout: Duration, err: reqwest::Error) -> PressError {
    if err.is_timeout() {
        PressError::Timeout {
            operation: format!("{} request", provider),
            limit: timeout,
        }
    } else {
        PressError::provider(provider, err.to_string())
    }
}

/// Shared HTTP client with a request bound
pub(crate) fn http_client(timeout: Duration) -> PressResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PressError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// One provider per stage of the standard pipeline
#[derive(Clone)]
pub struct ProviderSet {
    pub extractor: Arc<dyn Extractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn Generator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub publisher: Arc<dyn Publisher>,
}

impl ProviderSet {
    /// Create the real providers from settings.
    ///
    /// Unconfigured providers are still created; they report themselves
    /// unavailable and their stage is skipped.
    pub fn from_settings(settings: &Settings) -> PressResult<Self> {
        Ok(Self {
            extractor: Arc::new(FfmpegExtractor::from_settings(&settings.extractor)),
            transcriber: Arc::new(WhisperTranscriber::from_settings(&settings.transcriber)?),
            generator: Arc::new(ChatGenerator::from_settings(&settings.generator)?),
            evaluator: Arc::new(ChatEvaluator::from_settings(&settings.evaluator)?),
            publisher: Arc::new(HttpPublisher::from_settings(&settings.publisher)?),
        })
    }

    /// Deterministic stand-ins that never leave the machine.
    ///
    /// The mock extractor writes a small placeholder file into `work_dir`.
    pub fn mock(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            extractor: Arc::new(MockExtractor::new(work_dir)),
            transcriber: Arc::new(MockTextProvider::fixed(
                "This is a placeholder transcript produced by the dry-run transcriber.",
            )),
            generator: Arc::new(MockTextProvider::prefixing("# Draft\n\n")),
            evaluator: Arc::new(MockTextProvider::prefixing("")),
            publisher: Arc::new(MockPublisher::new()),
        }
    }

    /// Availability of each provider, in stage order
    pub fn availability(&self) -> Vec<(&str, bool)> {
        vec![
            (self.extractor.name(), self.extractor.is_available()),
            (self.transcriber.name(), self.transcriber.is_available()),
            (self.generator.name(), self.generator.is_available()),
            (self.evaluator.name(), self.evaluator.is_available()),
            (self.publisher.name(), self.publisher.is_available()),
        ]
    }
}

/// Local server that accepts connections and never answers
#[cfg(test)]
pub(crate) async fn stalled_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_availability() {
        let providers = ProviderSet::from_settings(&Settings::default()).unwrap();
        let availability = providers.availability();

        assert_eq!(availability.len(), 5);
        // ffmpeg has a usable default, the remote services need credentials
        assert!(availability[0].1);
        assert!(availability[1..].iter().all(|(_, available)| !available));
    }

    #[test]
    fn test_configured_settings_availability() {
        let mut settings = Settings::default();
        settings.apply_env(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "MEDIAPRESS_PUBLISH_ENDPOINT" => Some("https://cms.local/posts".to_string()),
            _ => None,
        });

        let providers = ProviderSet::from_settings(&settings).unwrap();
        assert!(providers.availability().iter().all(|(_, available)| *available));
    }

    #[test]
    fn test_mock_set_is_available() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let providers = ProviderSet::mock(temp_dir.path());
        assert!(providers.availability().iter().all(|(_, available)| *available));
    }
}
