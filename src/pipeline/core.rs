use crate::error::{ErrorKind, PressError, PressResult};
use crate::providers::PublishReceipt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::registry::ResourceRegistry;

/// A single named stage of a pipeline
///
/// A stage is an immutable definition: it declares which earlier stage feeds
/// it, reports whether its backing provider is configured, and transforms the
/// upstream value. It never touches the run context directly; the executor
/// records whatever `execute` returns.
///
/// # Example
/// ```ignore
/// use mediapress::pipeline::{ResourceRegistry, Stage, StageValue};
/// use mediapress::error::PressResult;
///
/// struct Shout;
///
/// #[async_trait::async_trait]
/// impl Stage for Shout {
///     fn id(&self) -> &str { "shout" }
///     fn upstream(&self) -> Option<&str> { Some("transcribe") }
///     fn is_available(&self) -> bool { true }
///
///     async fn execute(
///         &self,
///         input: &StageValue,
///         _: &ResourceRegistry,
///     ) -> PressResult<StageValue> {
///         Ok(StageValue::Text(input.as_text()?.to_uppercase()))
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync {
    /// Identifier, unique within a pipeline definition
    fn id(&self) -> &str;

    /// Human-readable name for logging
    fn name(&self) -> &str {
        self.id()
    }

    /// Identifier of the stage whose output feeds this one.
    ///
    /// `None` means the stage consumes the run input (only valid for the
    /// first declared stage).
    fn upstream(&self) -> Option<&str>;

    /// Whether the backing provider is configured. Must be cheap and free of I/O.
    fn is_available(&self) -> bool;

    /// Upper bound for one invocation, enforced by the executor
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Transform the upstream value.
    ///
    /// Transient resources must be registered with `resources` as soon as they
    /// are created so they are released even if this call fails.
    async fn execute(
        &self,
        input: &StageValue,
        resources: &ResourceRegistry,
    ) -> PressResult<StageValue>;
}

/// Value flowing between stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StageValue {
    /// A file on disk (source media, extracted audio)
    Path(PathBuf),
    /// Transcript, draft or final text
    Text(String),
    /// Result of publishing
    Receipt(PublishReceipt),
}

impl StageValue {
    pub fn as_path(&self) -> PressResult<&Path> {
        match self {
            StageValue::Path(path) => Ok(path),
            other => Err(PressError::Internal(format!(
                "expected a path, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_text(&self) -> PressResult<&str> {
        match self {
            StageValue::Text(text) => Ok(text),
            other => Err(PressError::Internal(format!(
                "expected text, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_receipt(&self) -> PressResult<&PublishReceipt> {
        match self {
            StageValue::Receipt(receipt) => Ok(receipt),
            other => Err(PressError::Internal(format!(
                "expected a publish receipt, got {}",
                other.type_name()
            ))),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            StageValue::Path(_) => "path",
            StageValue::Text(_) => "text",
            StageValue::Receipt(_) => "receipt",
        }
    }

    /// Short single-line rendering for reports
    pub fn summary(&self) -> String {
        match self {
            StageValue::Path(path) => path.display().to_string(),
            StageValue::Text(text) => {
                let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if flat.chars().count() > 60 {
                    let cut: String = flat.chars().take(57).collect();
                    format!("{}... ({} chars)", cut, text.chars().count())
                } else {
                    flat
                }
            }
            StageValue::Receipt(receipt) => match &receipt.locator {
                Some(locator) => locator.clone(),
                None => receipt.message.clone(),
            },
        }
    }
}

/// Why a stage did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The declared upstream stage produced no value
    UpstreamUnavailable,
    /// The backing provider reported itself unconfigured
    ProviderNotConfigured,
    /// An earlier stage failed and the run stopped invoking providers
    UpstreamFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UpstreamUnavailable => "upstream unavailable",
            SkipReason::ProviderNotConfigured => "provider not configured",
            SkipReason::UpstreamFailed => "upstream failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged outcome of one stage execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StageResult<T = StageValue> {
    Succeeded(T),
    Skipped(SkipReason),
    Failed { kind: ErrorKind, message: String },
}

impl<T> StageResult<T> {
    /// Create a failed result from an error
    pub fn from_error(error: &PressError) -> Self {
        StageResult::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, StageResult::Succeeded(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageResult::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed { .. })
    }

    /// The produced value; `None` for skipped and failed results
    pub fn value(&self) -> Option<&T> {
        match self {
            StageResult::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            StageResult::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            StageResult::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Diagnostic message for skipped and failed results
    pub fn message(&self) -> Option<&str> {
        match self {
            StageResult::Succeeded(_) => None,
            StageResult::Skipped(reason) => Some(reason.as_str()),
            StageResult::Failed { message, .. } => Some(message),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageResult<U> {
        match self {
            StageResult::Succeeded(value) => StageResult::Succeeded(f(value)),
            StageResult::Skipped(reason) => StageResult::Skipped(reason),
            StageResult::Failed { kind, message } => StageResult::Failed { kind, message },
        }
    }
}

/// A stage result as recorded in the run context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage identifier
    pub stage_id: String,

    /// Stage display name
    pub stage_name: String,

    /// What happened
    pub result: StageResult,

    /// Wall time spent in the stage, in milliseconds (zero when skipped)
    pub duration_ms: u64,
}

impl StageRecord {
    pub fn new(
        stage_id: impl Into<String>,
        stage_name: impl Into<String>,
        result: StageResult,
        duration: Duration,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            stage_name: stage_name.into(),
            result,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The final declared stage succeeded
    Success,
    /// At least one stage succeeded but the final one did not
    PartialSuccess,
    /// The first stage could not run or failed, or the run was cancelled
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::PartialSuccess => f.write_str("partial success"),
            Outcome::Failed => f.write_str("failed"),
        }
    }
}

/// Where a run went wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub stage_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Immutable report produced once at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Pipeline name
    pub pipeline_name: String,

    /// Run identifier
    pub run_id: String,

    /// Overall outcome
    pub outcome: Outcome,

    /// Last stage that produced a value
    pub last_succeeded: Option<String>,

    /// Results from each stage, in declaration order
    pub stages: Vec<StageRecord>,

    /// Originating stage and error when the run did not fully succeed
    pub failure: Option<FailureInfo>,

    /// Total duration in milliseconds
    pub total_duration_ms: u64,

    /// Non-fatal problems met while releasing transient resources
    pub cleanup_warnings: Vec<String>,
}

impl PipelineResult {
    /// Build the terminal report from the recorded stages.
    ///
    /// `forced_failure` overrides the computed outcome with `Failed` (used for
    /// cancellation and input validation).
    pub fn assemble(
        pipeline_name: impl Into<String>,
        run_id: impl Into<String>,
        stages: Vec<StageRecord>,
        forced_failure: Option<FailureInfo>,
        total_duration: Duration,
        cleanup_warnings: Vec<String>,
    ) -> Self {
        let last_succeeded = stages
            .iter()
            .rev()
            .find(|r| r.result.is_succeeded())
            .map(|r| r.stage_id.clone());

        let (outcome, failure) = match forced_failure {
            Some(failure) => (Outcome::Failed, Some(failure)),
            None => Self::compute_outcome(&stages),
        };

        Self {
            pipeline_name: pipeline_name.into(),
            run_id: run_id.into(),
            outcome,
            last_succeeded,
            stages,
            failure,
            total_duration_ms: total_duration.as_millis() as u64,
            cleanup_warnings,
        }
    }

    fn compute_outcome(stages: &[StageRecord]) -> (Outcome, Option<FailureInfo>) {
        let first_failure = stages.iter().find_map(|r| match &r.result {
            StageResult::Failed { kind, message } => Some(FailureInfo {
                stage_id: r.stage_id.clone(),
                kind: *kind,
                message: message.clone(),
            }),
            _ => None,
        });

        let (first, last) = match (stages.first(), stages.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return (
                    Outcome::Failed,
                    Some(FailureInfo {
                        stage_id: String::new(),
                        kind: ErrorKind::ProviderError,
                        message: "pipeline has no stages".to_string(),
                    }),
                )
            }
        };

        if last.result.is_succeeded() {
            return (Outcome::Success, None);
        }

        if !first.result.is_succeeded() {
            let failure = first_failure.unwrap_or_else(|| FailureInfo {
                stage_id: first.stage_id.clone(),
                kind: match first.result.skip_reason() {
                    Some(SkipReason::ProviderNotConfigured) => ErrorKind::ConfigurationSkip,
                    _ => ErrorKind::InputValidationError,
                },
                message: first.result.message().unwrap_or_default().to_string(),
            });
            return (Outcome::Failed, Some(failure));
        }

        (Outcome::PartialSuccess, first_failure)
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Get the result recorded for a stage
    pub fn stage(&self, stage_id: &str) -> Option<&StageResult> {
        self.stages
            .iter()
            .find(|r| r.stage_id == stage_id)
            .map(|r| &r.result)
    }

    /// Value produced by a stage, if it succeeded
    pub fn output(&self, stage_id: &str) -> Option<&StageValue> {
        self.stage(stage_id).and_then(|r| r.value())
    }

    /// All produced values, in declaration order
    pub fn outputs(&self) -> Vec<(&str, &StageValue)> {
        self.stages
            .iter()
            .filter_map(|r| r.result.value().map(|v| (r.stage_id.as_str(), v)))
            .collect()
    }

    /// Value of the last stage that succeeded.
    ///
    /// Callers that want to treat the last good value as the final artifact
    /// (for example an unevaluated draft) apply that policy with this.
    pub fn last_succeeded_value(&self) -> Option<&StageValue> {
        self.last_succeeded
            .as_deref()
            .and_then(|id| self.output(id))
    }

    /// Get the number of stages that were executed (not skipped)
    pub fn executed_stages(&self) -> usize {
        self.stages.iter().filter(|r| !r.result.is_skipped()).count()
    }

    /// Get the number of stages that were skipped
    pub fn skipped_stages(&self) -> usize {
        self.stages.iter().filter(|r| r.result.is_skipped()).count()
    }

    /// Get the number of stages that succeeded
    pub fn succeeded_stages(&self) -> usize {
        self.stages.iter().filter(|r| r.result.is_succeeded()).count()
    }

    /// Get the stage that failed (if any)
    pub fn failed_stage(&self) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.result.is_failed())
    }
}
