use super::{Evaluator, Extractor, Generator, PublishReceipt, Publisher, Transcriber};
use crate::error::{PressError, PressResult};
use crate::pipeline::{ResourceRegistry, TempArtifact};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

/// Mock extractor for dry runs and tests
///
/// Writes a small placeholder file into its work directory and registers it
/// with the run's resources, exactly like the real extractor does.
pub struct MockExtractor {
    work_dir: PathBuf,
    available: bool,
    failure: Option<String>,
    delay: Duration,
}

impl MockExtractor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            available: true,
            failure: None,
            delay: Duration::ZERO,
        }
    }

    /// Report as not configured
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Fail after the output has been written and registered
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep after registering, before returning
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock-extractor"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn extract(&self, source: &Path, resources: &ResourceRegistry) -> PressResult<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let output = self
            .work_dir
            .join(format!("mock-{}.wav", Uuid::new_v4().simple()));
        resources.register(TempArtifact::new(&output))?;
        tokio::fs::write(&output, format!("mock audio for {}", source.display())).await?;

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match &self.failure {
            Some(message) => Err(PressError::provider("mock-extractor", message.clone())),
            None => Ok(output),
        }
    }
}

enum TextMode {
    Fixed(String),
    Prefix(String),
}

/// Mock text provider, usable as transcriber, generator or evaluator
pub struct MockTextProvider {
    mode: TextMode,
    available: bool,
    failure: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockTextProvider {
    fn with_mode(mode: TextMode) -> Self {
        Self {
            mode,
            available: true,
            failure: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::with_mode(TextMode::Fixed(text.into()))
    }

    /// Answer with `prefix` followed by the input
    pub fn prefixing(prefix: impl Into<String>) -> Self {
        Self::with_mode(TextMode::Prefix(prefix.into()))
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// How many transforms have been requested
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, input: &str) -> PressResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(PressError::provider("mock-text", message.clone()));
        }

        Ok(match &self.mode {
            TextMode::Fixed(text) => text.clone(),
            TextMode::Prefix(prefix) => format!("{}{}", prefix, input),
        })
    }
}

#[async_trait]
impl Transcriber for MockTextProvider {
    fn name(&self) -> &str {
        "mock-transcriber"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn transcribe(&self, audio: &Path) -> PressResult<String> {
        let name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.respond(&name).await
    }
}

#[async_trait]
impl Generator for MockTextProvider {
    fn name(&self) -> &str {
        "mock-generator"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, transcript: &str) -> PressResult<String> {
        self.respond(transcript).await
    }
}

#[async_trait]
impl Evaluator for MockTextProvider {
    fn name(&self) -> &str {
        "mock-evaluator"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn evaluate(&self, draft: &str) -> PressResult<String> {
        self.respond(draft).await
    }
}

/// Mock publisher that accepts everything unless told otherwise
pub struct MockPublisher {
    rejection: Option<String>,
    available: bool,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            rejection: None,
            available: true,
        }
    }

    /// Reply with an unsuccessful receipt carrying `message`
    pub fn rejecting(mut self, message: impl Into<String>) -> Self {
        self.rejection = Some(message.into());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        "mock-publisher"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn publish(&self, text: &str) -> PressResult<PublishReceipt> {
        Ok(match &self.rejection {
            Some(message) => PublishReceipt {
                success: false,
                locator: None,
                message: message.clone(),
            },
            None => {
                let locator = format!("mock://published/{}", Uuid::new_v4());
                PublishReceipt {
                    success: true,
                    message: format!("published {} chars at {}", text.chars().count(), locator),
                    locator: Some(locator),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mock_extractor_registers_file() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = MockExtractor::new(temp_dir.path());
        let registry = ResourceRegistry::new("run-1");

        let audio = extractor.extract(Path::new("talk.mp4"), &registry).await.unwrap();
        assert!(audio.exists());
        assert_eq!(registry.live_count(), 1);

        registry.release_all();
        assert!(!audio.exists());
    }

    #[tokio::test]
    async fn test_mock_extractor_failure_keeps_registration() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = MockExtractor::new(temp_dir.path()).failing("codec missing");
        let registry = ResourceRegistry::new("run-1");

        let err = extractor.extract(Path::new("talk.mp4"), &registry).await.unwrap_err();
        assert!(err.to_string().contains("codec missing"));
        assert_eq!(registry.live_count(), 1);
    }

    #[tokio::test]
    async fn test_text_modes() {
        let fixed = MockTextProvider::fixed("same");
        assert_eq!(Generator::generate(&fixed, "anything").await.unwrap(), "same");

        let prefixing = MockTextProvider::prefixing("# ");
        assert_eq!(Evaluator::evaluate(&prefixing, "Title").await.unwrap(), "# Title");
        assert_eq!(
            Transcriber::transcribe(&prefixing, Path::new("/tmp/a.wav")).await.unwrap(),
            "# a.wav"
        );
        assert_eq!(prefixing.call_count(), 2);
    }

    #[tokio::test]
    async fn test_text_failure_counts_call() {
        let provider = MockTextProvider::fixed("x").failing("rate limited");
        let err = Generator::generate(&provider, "t").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProviderError);
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_text_availability() {
        let provider = MockTextProvider::fixed("x").unavailable();
        assert!(!Generator::is_available(&provider));
        assert!(!Evaluator::is_available(&provider));
        assert_eq!(Transcriber::name(&provider), "mock-transcriber");
    }

    #[tokio::test]
    async fn test_publisher_receipts() {
        let accepted = MockPublisher::new().publish("body").await.unwrap();
        assert!(accepted.success);
        assert!(accepted.locator.unwrap().starts_with("mock://published/"));

        let rejected = MockPublisher::new()
            .rejecting("HTTP 403: forbidden")
            .publish("body")
            .await
            .unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.message, "HTTP 403: forbidden");
    }
}
