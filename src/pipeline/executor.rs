use super::cancel::CancelHandle;
use super::context::PipelineContext;
use super::core::{
    FailureInfo, Outcome, PipelineResult, SkipReason, Stage, StageRecord, StageResult, StageValue,
};
use super::eligibility::{self, Eligibility};
use super::state::{RunPhase, RunState};
use crate::error::{ErrorKind, PressError, PressResult};
use crate::events::{EventEmitter, EventSink};
use crate::logger::{LogLevel, LOGGER};
use crate::source::validate_source;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Pipeline executor that runs stages sequentially
///
/// # Example
/// ```ignore
/// use mediapress::events::NoopSink;
/// use mediapress::pipeline::{CancelHandle, Pipeline};
///
/// let pipeline = Pipeline::builder("my-pipeline")
///     .add_stage(Stage1::new())
///     .add_stage(Stage2::new())
///     .build()?;
///
/// let result = pipeline.run("talk.mp4", &CancelHandle::new(), &NoopSink).await;
/// ```
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage identifiers in declaration order
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Run the pipeline on an already validated input.
    ///
    /// Never fails: every problem ends up in the returned result.
    pub async fn run(
        &self,
        source: impl Into<PathBuf>,
        cancel: &CancelHandle,
        events: &dyn EventSink,
    ) -> PipelineResult {
        let context = PipelineContext::new(source);
        self.execute_internal(context, cancel, events).await
    }

    /// Validate `source` first, then run.
    ///
    /// An invalid input yields a `Failed` result with
    /// `InputValidationError` without invoking any stage.
    pub async fn run_file(
        &self,
        source: impl Into<PathBuf>,
        cancel: &CancelHandle,
        events: &dyn EventSink,
    ) -> PipelineResult {
        let source = source.into();
        match validate_source(&source) {
            Ok(path) => self.run(path, cancel, events).await,
            Err(e) => self.reject_input(source, &e, events),
        }
    }

    fn reject_input(
        &self,
        source: PathBuf,
        error: &PressError,
        events: &dyn EventSink,
    ) -> PipelineResult {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let emitter = EventEmitter::new(events, &run_id, &self.name, self.stages.len());

        LOGGER.log(
            LogLevel::Error,
            &format!(
                "Rejected input {} for pipeline '{}': {} (run: {})",
                source.display(),
                self.name,
                error,
                run_id
            ),
            "pipeline",
        );

        emitter.run_started();
        let records = self
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                emitter.stage_skipped(stage.id(), index, SkipReason::UpstreamUnavailable);
                StageRecord::new(
                    stage.id(),
                    stage.name(),
                    StageResult::Skipped(SkipReason::UpstreamUnavailable),
                    Duration::ZERO,
                )
            })
            .collect();

        let failure = FailureInfo {
            stage_id: self.stages.first().map(|s| s.id().to_string()).unwrap_or_default(),
            kind: error.kind(),
            message: error.to_string(),
        };
        let result = PipelineResult::assemble(
            &self.name,
            run_id,
            records,
            Some(failure),
            started.elapsed(),
            Vec::new(),
        );
        emitter.run_finished(result.outcome, 0, result.skipped_stages(), result.total_duration_ms);
        result
    }

    /// Drive the stages, release resources and assemble the report
    async fn execute_internal(
        &self,
        mut context: PipelineContext,
        cancel: &CancelHandle,
        events: &dyn EventSink,
    ) -> PipelineResult {
        let run_id = context.run_id().to_string();
        let emitter = EventEmitter::new(events, &run_id, &self.name, self.stages.len());
        let mut state = RunState::new();

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Starting pipeline '{}' with {} stages (run: {})",
                self.name,
                self.stages.len(),
                run_id
            ),
            "pipeline",
        );
        emitter.run_started();

        let pipeline_start = Instant::now();
        context.set_metadata("pipeline_name", &self.name);

        let forced_failure = self
            .drive(&mut context, &mut state, cancel, &emitter)
            .await;

        // Finalizing: release everything the stages registered
        self.transition(&mut state, RunPhase::Finalizing, &run_id);
        let report = context.resources().release_all();
        for warning in &report.warnings {
            emitter.cleanup_warning(warning);
        }
        if report.released + report.already_gone > 0 {
            LOGGER.log(
                LogLevel::Debug,
                &format!(
                    "Released {} resource(s), {} already gone (run: {})",
                    report.released, report.already_gone, run_id
                ),
                "pipeline",
            );
        }

        let records = context.into_records();
        let total_duration = pipeline_start.elapsed();
        let result = PipelineResult::assemble(
            &self.name,
            &run_id,
            records,
            forced_failure,
            total_duration,
            report.warnings,
        );
        self.transition(&mut state, RunPhase::Done, &run_id);

        let level = match result.outcome {
            Outcome::Success => LogLevel::Info,
            Outcome::PartialSuccess => LogLevel::Warn,
            Outcome::Failed => LogLevel::Error,
        };
        LOGGER.log(
            level,
            &format!(
                "Pipeline '{}' finished with {} in {:.2}s (run: {})",
                self.name,
                result.outcome,
                total_duration.as_secs_f64(),
                run_id
            ),
            "pipeline",
        );

        emitter.run_finished(
            result.outcome,
            result.succeeded_stages(),
            result.skipped_stages(),
            result.total_duration_ms,
        );

        result
    }

    /// Main loop. Returns the failure that forces a `Failed` outcome
    /// (cancellation), if any.
    async fn drive(
        &self,
        context: &mut PipelineContext,
        state: &mut RunState,
        cancel: &CancelHandle,
        emitter: &EventEmitter<'_>,
    ) -> Option<FailureInfo> {
        let total = self.stages.len();
        let run_id = context.run_id().to_string();
        let mut halted = false;
        let mut any_skipped = false;
        let mut forced_failure = None;

        for (index, stage) in self.stages.iter().enumerate() {
            let stage_id = stage.id();

            if halted {
                context.record(StageRecord::new(
                    stage_id,
                    stage.name(),
                    StageResult::Skipped(SkipReason::UpstreamFailed),
                    Duration::ZERO,
                ));
                emitter.stage_skipped(stage_id, index, SkipReason::UpstreamFailed);
                continue;
            }

            if cancel.is_cancelled() {
                LOGGER.log(
                    LogLevel::Warn,
                    &format!(
                        "Cancelled before stage {}/{}: {} (run: {})",
                        index + 1,
                        total,
                        stage_id,
                        run_id
                    ),
                    "pipeline",
                );
                let error = PressError::Cancelled;
                context.record(StageRecord::new(
                    stage_id,
                    stage.name(),
                    StageResult::from_error(&error),
                    Duration::ZERO,
                ));
                emitter.stage_failed(stage_id, index, error.kind(), &error.to_string(), 0);
                forced_failure = Some(FailureInfo {
                    stage_id: stage_id.to_string(),
                    kind: error.kind(),
                    message: error.to_string(),
                });
                self.transition(state, RunPhase::Aborted, &run_id);
                halted = true;
                continue;
            }

            self.transition(state, RunPhase::Running(index), &run_id);

            if let Eligibility::Skip(reason) = eligibility::evaluate(context, stage.as_ref()) {
                LOGGER.log(
                    LogLevel::Info,
                    &format!(
                        "Skipping stage {}/{}: {} ({}) (run: {})",
                        index + 1,
                        total,
                        stage.name(),
                        reason,
                        run_id
                    ),
                    "pipeline",
                );
                context.record(StageRecord::new(
                    stage_id,
                    stage.name(),
                    StageResult::Skipped(reason),
                    Duration::ZERO,
                ));
                emitter.stage_skipped(stage_id, index, reason);
                any_skipped = true;
                continue;
            }

            LOGGER.log(
                LogLevel::Info,
                &format!(
                    "Executing stage {}/{}: {} (run: {})",
                    index + 1,
                    total,
                    stage.name(),
                    run_id
                ),
                "pipeline",
            );
            emitter.stage_started(stage_id, index);

            let stage_start = Instant::now();
            let outcome = Self::invoke(stage.as_ref(), context, cancel).await;
            let duration = stage_start.elapsed();

            match outcome {
                Ok(value) => {
                    LOGGER.log(
                        LogLevel::Info,
                        &format!(
                            "Stage '{}' completed successfully in {:.2}s (run: {})",
                            stage.name(),
                            duration.as_secs_f64(),
                            run_id
                        ),
                        "pipeline",
                    );
                    context.record(StageRecord::new(
                        stage_id,
                        stage.name(),
                        StageResult::Succeeded(value),
                        duration,
                    ));
                    emitter.stage_succeeded(stage_id, index, duration.as_millis() as u64);
                }
                Err(e) => {
                    let kind = e.kind();
                    let message = e.to_string();
                    LOGGER.log(
                        LogLevel::Error,
                        &format!(
                            "Stage '{}' failed ({}): {} (run: {})",
                            stage.name(),
                            kind,
                            message,
                            run_id
                        ),
                        "pipeline",
                    );
                    context.record(StageRecord::new(
                        stage_id,
                        stage.name(),
                        StageResult::Failed {
                            kind,
                            message: message.clone(),
                        },
                        duration,
                    ));
                    emitter.stage_failed(
                        stage_id,
                        index,
                        kind,
                        &message,
                        duration.as_millis() as u64,
                    );

                    if kind == ErrorKind::CancellationError {
                        forced_failure = Some(FailureInfo {
                            stage_id: stage_id.to_string(),
                            kind,
                            message,
                        });
                    }
                    self.transition(state, RunPhase::Aborted, &run_id);
                    halted = true;
                }
            }
        }

        if !halted && any_skipped {
            self.transition(state, RunPhase::SkippedTail, &run_id);
        }

        forced_failure
    }

    /// Invoke one stage, bounded by its timeout and raced against cancellation.
    ///
    /// Dropping the stage future on cancel or timeout also drops any child
    /// process it owns.
    async fn invoke(
        stage: &dyn Stage,
        context: &PipelineContext,
        cancel: &CancelHandle,
    ) -> PressResult<StageValue> {
        let input = context.input_for(stage.upstream()).ok_or_else(|| {
            PressError::Internal(format!("no input available for stage '{}'", stage.id()))
        })?;

        let work = AssertUnwindSafe(stage.execute(input, context.resources())).catch_unwind();
        let bounded = async {
            match stage.timeout() {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(joined) => joined,
                    Err(_) => Ok(Err(PressError::Timeout {
                        operation: format!("stage '{}'", stage.id()),
                        limit,
                    })),
                },
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PressError::Cancelled),
            joined = bounded => match joined {
                Ok(result) => result,
                Err(panic) => Err(PressError::provider(
                    stage.id(),
                    format!("stage panicked: {}", panic_message(panic.as_ref())),
                )),
            },
        }
    }

    fn transition(&self, state: &mut RunState, next: RunPhase, run_id: &str) {
        if let Err(e) = state.advance(next) {
            LOGGER.log(
                LogLevel::Error,
                &format!("{} in pipeline '{}' (run: {})", e, self.name, run_id),
                "pipeline",
            );
            debug_assert!(false, "{}", e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Add a stage to the pipeline
    pub fn add_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Add a boxed stage to the pipeline
    pub fn add_boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validate the definition and build the pipeline
    pub fn build(self) -> PressResult<Pipeline> {
        if self.stages.is_empty() {
            return Err(PressError::BuilderError(format!(
                "pipeline '{}' has no stages",
                self.name
            )));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            let id = stage.id();
            if id.trim().is_empty() {
                return Err(PressError::BuilderError(format!(
                    "stage {} has an empty identifier",
                    index + 1
                )));
            }

            match stage.upstream() {
                None if index > 0 => {
                    return Err(PressError::BuilderError(format!(
                        "stage '{}' declares no upstream; \
                         only the first stage may consume the run input",
                        id
                    )))
                }
                Some(upstream) if !seen.contains(upstream) => {
                    return Err(PressError::BuilderError(format!(
                        "stage '{}' depends on '{}', which is not declared before it",
                        id, upstream
                    )))
                }
                _ => {}
            }

            if !seen.insert(id) {
                return Err(PressError::BuilderError(format!(
                    "duplicate stage identifier '{}'",
                    id
                )));
            }
        }

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopSink;
    use crate::pipeline::ResourceRegistry;
    use async_trait::async_trait;

    enum Behavior {
        Succeed(&'static str),
        Fail,
        Panic,
        Sleep(Duration),
    }

    struct TestStage {
        id: &'static str,
        upstream: Option<&'static str>,
        available: bool,
        behavior: Behavior,
        timeout: Option<Duration>,
    }

    impl TestStage {
        fn new(id: &'static str, upstream: Option<&'static str>, behavior: Behavior) -> Self {
            Self {
                id,
                upstream,
                available: true,
                behavior,
                timeout: None,
            }
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = Some(timeout);
            self
        }
    }

    #[async_trait]
    impl Stage for TestStage {
        fn id(&self) -> &str {
            self.id
        }

        fn upstream(&self) -> Option<&str> {
            self.upstream
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn timeout(&self) -> Option<Duration> {
            self.timeout
        }

        async fn execute(&self, _: &StageValue, _: &ResourceRegistry) -> PressResult<StageValue> {
            match &self.behavior {
                Behavior::Succeed(value) => Ok(StageValue::Text(value.to_string())),
                Behavior::Fail => Err(PressError::provider(self.id, "Stage failed")),
                Behavior::Panic => panic!("provider exploded"),
                Behavior::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(StageValue::Text("late".into()))
                }
            }
        }
    }

    #[tokio::test]
    async fn test_pipeline_success() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_stage(TestStage::new("stage1", None, Behavior::Succeed("a")))
            .add_stage(TestStage::new("stage2", Some("stage1"), Behavior::Succeed("b")))
            .build()
            .unwrap();

        let result = pipeline.run("/tmp/in.mp4", &CancelHandle::new(), &NoopSink).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.stages.len(), 2);
        assert_eq!(result.executed_stages(), 2);
        assert_eq!(result.last_succeeded.as_deref(), Some("stage2"));
    }

    #[tokio::test]
    async fn test_pipeline_failure_skips_tail() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_stage(TestStage::new("stage1", None, Behavior::Succeed("a")))
            .add_stage(TestStage::new("stage2", Some("stage1"), Behavior::Fail))
            .add_stage(TestStage::new("stage3", Some("stage1"), Behavior::Succeed("c")))
            .build()
            .unwrap();

        let result = pipeline.run("/tmp/in.mp4", &CancelHandle::new(), &NoopSink).await;

        assert_eq!(result.outcome, Outcome::PartialSuccess);
        assert_eq!(result.stages.len(), 3);
        assert!(result.stage("stage2").unwrap().is_failed());
        // Not evaluated even though its own upstream succeeded
        assert_eq!(
            result.stage("stage3"),
            Some(&StageResult::Skipped(SkipReason::UpstreamFailed))
        );
        assert_eq!(result.output("stage1"), Some(&StageValue::Text("a".into())));
    }

    #[tokio::test]
    async fn test_skip_does_not_halt_independent_stage() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_stage(TestStage::new("stage1", None, Behavior::Succeed("a")))
            .add_stage(
                TestStage::new("stage2", Some("stage1"), Behavior::Succeed("b")).unavailable(),
            )
            .add_stage(TestStage::new("stage3", Some("stage1"), Behavior::Succeed("c")))
            .build()
            .unwrap();

        let result = pipeline.run("/tmp/in.mp4", &CancelHandle::new(), &NoopSink).await;

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.skipped_stages(), 1);
        assert_eq!(result.executed_stages(), 2);
    }

    #[tokio::test]
    async fn test_panic_becomes_provider_error() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_stage(TestStage::new("stage1", None, Behavior::Succeed("a")))
            .add_stage(TestStage::new("stage2", Some("stage1"), Behavior::Panic))
            .build()
            .unwrap();

        let result = pipeline.run("/tmp/in.mp4", &CancelHandle::new(), &NoopSink).await;

        match result.stage("stage2") {
            Some(StageResult::Failed { kind, message }) => {
                assert_eq!(*kind, ErrorKind::ProviderError);
                assert!(message.contains("provider exploded"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(result.outcome, Outcome::PartialSuccess);
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_stage(
                TestStage::new("slow", None, Behavior::Sleep(Duration::from_secs(5)))
                    .with_timeout(Duration::from_millis(20)),
            )
            .build()
            .unwrap();

        let result = pipeline.run("/tmp/in.mp4", &CancelHandle::new(), &NoopSink).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failure.unwrap().kind, ErrorKind::TimeoutError);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_stage(TestStage::new("stage1", None, Behavior::Succeed("a")))
            .add_stage(TestStage::new("stage2", Some("stage1"), Behavior::Succeed("b")))
            .build()
            .unwrap();

        let cancel = CancelHandle::new();
        cancel.cancel();
        let result = pipeline.run("/tmp/in.mp4", &cancel, &NoopSink).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(
            result.stage("stage1").unwrap().error_kind(),
            Some(ErrorKind::CancellationError)
        );
        assert_eq!(
            result.stage("stage2"),
            Some(&StageResult::Skipped(SkipReason::UpstreamFailed))
        );
    }

    #[test]
    fn test_builder_rejects_empty() {
        assert!(matches!(
            Pipeline::builder("empty").build(),
            Err(PressError::BuilderError(_))
        ));
    }

    #[test]
    fn test_builder_rejects_duplicate_ids() {
        let built = Pipeline::builder("dup")
            .add_stage(TestStage::new("a", None, Behavior::Succeed("x")))
            .add_stage(TestStage::new("a", Some("a"), Behavior::Succeed("y")))
            .build();
        assert!(matches!(built, Err(PressError::BuilderError(m)) if m.contains("duplicate")));
    }

    #[test]
    fn test_builder_rejects_forward_reference() {
        let built = Pipeline::builder("forward")
            .add_stage(TestStage::new("a", None, Behavior::Succeed("x")))
            .add_stage(TestStage::new("b", Some("c"), Behavior::Succeed("y")))
            .add_stage(TestStage::new("c", Some("a"), Behavior::Succeed("z")))
            .build();
        assert!(built.is_err());
    }

    #[test]
    fn test_builder_rejects_self_reference() {
        let built = Pipeline::builder("self")
            .add_stage(TestStage::new("a", None, Behavior::Succeed("x")))
            .add_stage(TestStage::new("b", Some("b"), Behavior::Succeed("y")))
            .build();
        assert!(built.is_err());
    }

    #[test]
    fn test_builder_rejects_second_root() {
        let built = Pipeline::builder("roots")
            .add_stage(TestStage::new("a", None, Behavior::Succeed("x")))
            .add_stage(TestStage::new("b", None, Behavior::Succeed("y")))
            .build();
        assert!(built.is_err());
    }

    #[test]
    fn test_builder_rejects_unknown_upstream_on_first_stage() {
        let built = Pipeline::builder("bad-root")
            .add_stage(TestStage::new("a", Some("nowhere"), Behavior::Succeed("x")))
            .build();
        assert!(built.is_err());
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
