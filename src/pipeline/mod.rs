//! Pipeline orchestration for sequential, independently failable stages
//!
//! A pipeline is a declared list of stages. Each stage names the earlier stage
//! whose output it consumes, reports whether its provider is configured, and
//! transforms one value into the next. The executor decides eligibility,
//! catches every failure at the invocation boundary, releases transient
//! resources, and always returns a single `PipelineResult`.
//!
//! # Example
//! ```ignore
//! use mediapress::error::PressResult;
//! use mediapress::events::NoopSink;
//! use mediapress::pipeline::{CancelHandle, Pipeline, ResourceRegistry, Stage, StageValue};
//!
//! struct Upper;
//!
//! #[async_trait::async_trait]
//! impl Stage for Upper {
//!     fn id(&self) -> &str { "upper" }
//!     fn upstream(&self) -> Option<&str> { None }
//!     fn is_available(&self) -> bool { true }
//!
//!     async fn execute(
//!         &self,
//!         input: &StageValue,
//!         _: &ResourceRegistry,
//!     ) -> PressResult<StageValue> {
//!         Ok(StageValue::Text(input.as_path()?.display().to_string().to_uppercase()))
//!     }
//! }
//!
//! let pipeline = Pipeline::builder("my-pipeline").add_stage(Upper).build()?;
//! let result = pipeline.run("talk.mp4", &CancelHandle::new(), &NoopSink).await;
//! ```

pub mod cancel;
pub mod context;
pub mod core;
pub mod eligibility;
pub mod executor;
pub mod registry;
pub mod stages;
pub mod state;

// Re-export main types
pub use cancel::CancelHandle;
pub use context::PipelineContext;
pub use core::{
    FailureInfo, Outcome, PipelineResult, SkipReason, Stage, StageRecord, StageResult, StageValue,
};
pub use eligibility::{evaluate, Eligibility};
pub use executor::{Pipeline, PipelineBuilder};
pub use registry::{Disposable, ReleaseReport, ReleaseStatus, ResourceRegistry, TempArtifact};
pub use state::{RunPhase, RunState};

use crate::config::Settings;
use crate::error::PressResult;
use crate::providers::ProviderSet;
use stages::{EvaluateStage, ExtractStage, GenerateStage, PublishStage, TranscribeStage};
use std::time::Duration;

/// Name of the standard media-to-article pipeline
pub const STANDARD_PIPELINE: &str = "media-to-article";

/// Build the standard five-stage pipeline from a provider set.
///
/// With `publish_unevaluated_draft` enabled and no evaluator configured, the
/// publish stage is wired to the generate stage so the draft is published
/// as is. The evaluate stage is still declared and reported as skipped.
pub fn create_standard_pipeline(
    providers: &ProviderSet,
    settings: &Settings,
) -> PressResult<Pipeline> {
    let stage_timeout = settings.pipeline.stage_timeout_secs.map(Duration::from_secs);

    let draft_fallback =
        settings.pipeline.publish_unevaluated_draft && !providers.evaluator.is_available();
    let publish = if draft_fallback {
        PublishStage::new(providers.publisher.clone()).with_upstream(stages::GENERATE)
    } else {
        PublishStage::new(providers.publisher.clone())
    };

    Pipeline::builder(STANDARD_PIPELINE)
        .add_stage(ExtractStage::new(providers.extractor.clone()).with_timeout(stage_timeout))
        .add_stage(TranscribeStage::new(providers.transcriber.clone()).with_timeout(stage_timeout))
        .add_stage(GenerateStage::new(providers.generator.clone()).with_timeout(stage_timeout))
        .add_stage(EvaluateStage::new(providers.evaluator.clone()).with_timeout(stage_timeout))
        .add_stage(publish.with_timeout(stage_timeout))
        .build()
}
