use crate::error::{PressError, PressResult};
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ResourceRegistry, Stage, StageValue};
use crate::providers::Publisher;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{EVALUATE, PUBLISH};

/// Stage that publishes the final text
///
/// Reads from the evaluate stage unless rewired with `with_upstream`. A receipt
/// reporting `success = false` fails the stage with the receipt's message.
pub struct PublishStage {
    publisher: Arc<dyn Publisher>,
    upstream: &'static str,
    timeout: Option<Duration>,
}

impl PublishStage {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            upstream: EVALUATE,
            timeout: None,
        }
    }

    /// Read from a different stage
    pub fn with_upstream(mut self, upstream: &'static str) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn id(&self) -> &str {
        PUBLISH
    }

    fn name(&self) -> &str {
        "Publish"
    }

    fn upstream(&self) -> Option<&str> {
        Some(self.upstream)
    }

    fn is_available(&self) -> bool {
        self.publisher.is_available()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn execute(
        &self,
        input: &StageValue,
        resources: &ResourceRegistry,
    ) -> PressResult<StageValue> {
        let text = input.as_text()?;
        let receipt = self.publisher.publish(text).await?;

        if !receipt.success {
            return Err(PressError::provider(self.publisher.name(), receipt.message));
        }

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Published via {}: {} (run: {})",
                self.publisher.name(),
                receipt.locator.as_deref().unwrap_or(&receipt.message),
                resources.run_id()
            ),
            "pipeline::publish",
        );

        Ok(StageValue::Receipt(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::stages::GENERATE;
    use crate::providers::mock::MockPublisher;

    #[tokio::test]
    async fn test_publish_success() {
        let stage = PublishStage::new(Arc::new(MockPublisher::new()));
        let registry = ResourceRegistry::new("run-1");

        let output = stage
            .execute(&StageValue::Text("# Title\nbody".into()), &registry)
            .await
            .unwrap();
        let receipt = output.as_receipt().unwrap();
        assert!(receipt.success);
        assert!(receipt.locator.is_some());
    }

    #[tokio::test]
    async fn test_rejected_receipt_fails_stage() {
        let publisher = MockPublisher::new().rejecting("HTTP 422: bad status");
        let stage = PublishStage::new(Arc::new(publisher));
        let registry = ResourceRegistry::new("run-1");

        let err = stage
            .execute(&StageValue::Text("body".into()), &registry)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert!(err.to_string().contains("HTTP 422"));
    }

    #[test]
    fn test_upstream_rewiring() {
        let stage = PublishStage::new(Arc::new(MockPublisher::new()));
        assert_eq!(stage.upstream(), Some(EVALUATE));

        let rewired = PublishStage::new(Arc::new(MockPublisher::new())).with_upstream(GENERATE);
        assert_eq!(rewired.upstream(), Some(GENERATE));
    }
}
