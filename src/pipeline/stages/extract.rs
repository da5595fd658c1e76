use crate::error::PressResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ResourceRegistry, Stage, StageValue};
use crate::providers::Extractor;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::EXTRACT;

/// Stage that extracts an audio track from the source media
///
/// # Input
/// - The run input: path to the source media file
///
/// # Output
/// - Path to the extracted audio, registered with the run's resources
pub struct ExtractStage {
    extractor: Arc<dyn Extractor>,
    timeout: Option<Duration>,
}

impl ExtractStage {
    /// Create a new extract stage
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self {
            extractor,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn id(&self) -> &str {
        EXTRACT
    }

    fn name(&self) -> &str {
        "Extract Audio"
    }

    fn upstream(&self) -> Option<&str> {
        None
    }

    fn is_available(&self) -> bool {
        self.extractor.is_available()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn execute(
        &self,
        input: &StageValue,
        resources: &ResourceRegistry,
    ) -> PressResult<StageValue> {
        let source = input.as_path()?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Extracting audio from {} with {} (run: {})",
                source.display(),
                self.extractor.name(),
                resources.run_id()
            ),
            "pipeline::extract",
        );

        let audio = self.extractor.extract(source, resources).await?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Audio extracted to {} (run: {})",
                audio.display(),
                resources.run_id()
            ),
            "pipeline::extract",
        );

        Ok(StageValue::Path(audio))
    }
}
