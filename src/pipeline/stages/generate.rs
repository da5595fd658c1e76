use crate::error::PressResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ResourceRegistry, Stage, StageValue};
use crate::providers::Generator;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{GENERATE, TRANSCRIBE};

/// Stage that drafts an article from the transcript
pub struct GenerateStage {
    generator: Arc<dyn Generator>,
    timeout: Option<Duration>,
}

impl GenerateStage {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Stage for GenerateStage {
    fn id(&self) -> &str {
        GENERATE
    }

    fn name(&self) -> &str {
        "Generate Draft"
    }

    fn upstream(&self) -> Option<&str> {
        Some(TRANSCRIBE)
    }

    fn is_available(&self) -> bool {
        self.generator.is_available()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn execute(
        &self,
        input: &StageValue,
        resources: &ResourceRegistry,
    ) -> PressResult<StageValue> {
        let transcript = input.as_text()?;
        let draft = self.generator.generate(transcript).await?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Generated draft of {} chars with {} (run: {})",
                draft.chars().count(),
                self.generator.name(),
                resources.run_id()
            ),
            "pipeline::generate",
        );

        Ok(StageValue::Text(draft))
    }
}
