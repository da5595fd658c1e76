use crate::error::PressResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ResourceRegistry, Stage, StageValue};
use crate::providers::Evaluator;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{EVALUATE, GENERATE};

/// Stage that reviews the draft and returns the final text
pub struct EvaluateStage {
    evaluator: Arc<dyn Evaluator>,
    timeout: Option<Duration>,
}

impl EvaluateStage {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Stage for EvaluateStage {
    fn id(&self) -> &str {
        EVALUATE
    }

    fn name(&self) -> &str {
        "Evaluate Draft"
    }

    fn upstream(&self) -> Option<&str> {
        Some(GENERATE)
    }

    fn is_available(&self) -> bool {
        self.evaluator.is_available()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn execute(
        &self,
        input: &StageValue,
        resources: &ResourceRegistry,
    ) -> PressResult<StageValue> {
        let draft = input.as_text()?;
        let final_text = self.evaluator.evaluate(draft).await?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Evaluated draft with {}: {} -> {} chars (run: {})",
                self.evaluator.name(),
                draft.chars().count(),
                final_text.chars().count(),
                resources.run_id()
            ),
            "pipeline::evaluate",
        );

        Ok(StageValue::Text(final_text))
    }
}
