use crate::error::PressResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ResourceRegistry, Stage, StageValue};
use crate::providers::Transcriber;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{EXTRACT, TRANSCRIBE};

/// Stage that turns extracted audio into a transcript
pub struct TranscribeStage {
    transcriber: Arc<dyn Transcriber>,
    timeout: Option<Duration>,
}

impl TranscribeStage {
    pub fn new(transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            transcriber,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Stage for TranscribeStage {
    fn id(&self) -> &str {
        TRANSCRIBE
    }

    fn name(&self) -> &str {
        "Transcribe"
    }

    fn upstream(&self) -> Option<&str> {
        Some(EXTRACT)
    }

    fn is_available(&self) -> bool {
        self.transcriber.is_available()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn execute(
        &self,
        input: &StageValue,
        resources: &ResourceRegistry,
    ) -> PressResult<StageValue> {
        let audio = input.as_path()?;
        let transcript = self.transcriber.transcribe(audio).await?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Transcribed {} chars with {} (run: {})",
                transcript.chars().count(),
                self.transcriber.name(),
                resources.run_id()
            ),
            "pipeline::transcribe",
        );

        Ok(StageValue::Text(transcript))
    }
}
