//! Turn a media recording into a published article.
//!
//! The work is a five-stage pipeline (extract, transcribe, generate, evaluate,
//! publish). Each stage is optional: an unconfigured provider is skipped, a
//! failing one stops the run, and whatever succeeded so far is returned in a
//! single [`pipeline::PipelineResult`].

pub mod config;
pub mod error;
pub mod events;
pub mod logger;
pub mod pipeline;
pub mod providers;
pub mod source;

pub use config::Settings;
pub use error::{ErrorKind, PressError, PressResult};
pub use events::{ChannelSink, EventSink, LoggingSink, NoopSink, PipelineEvent};
pub use pipeline::{
    create_standard_pipeline, CancelHandle, Outcome, Pipeline, PipelineBuilder, PipelineResult,
    SkipReason, Stage, StageResult, StageValue,
};
pub use providers::{ProviderSet, PublishReceipt};
