use crate::app_log;
use crate::error::ErrorKind;
use crate::logger::LogLevel;
use crate::pipeline::{Outcome, SkipReason};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event names - centralized for consistency
pub mod event_names {
    pub const PIPELINE_STARTED: &str = "pipeline:started";
    pub const PIPELINE_STAGE_STARTED: &str = "pipeline:stage-started";
    pub const PIPELINE_STAGE_SUCCEEDED: &str = "pipeline:stage-succeeded";
    pub const PIPELINE_STAGE_SKIPPED: &str = "pipeline:stage-skipped";
    pub const PIPELINE_STAGE_FAILED: &str = "pipeline:stage-failed";
    pub const PIPELINE_CLEANUP_WARNING: &str = "pipeline:cleanup-warning";
    pub const PIPELINE_COMPLETED: &str = "pipeline:completed";
}

/// Progress event emitted by a pipeline run.
///
/// Stage events arrive in stage declaration order, bracketed by exactly one
/// `RunStarted` and one `RunFinished`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PipelineEvent {
    #[serde(rename_all = "camelCase")]
    RunStarted {
        run_id: String,
        pipeline_name: String,
        total_stages: usize,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    StageStarted {
        run_id: String,
        stage_id: String,
        stage_index: usize,
        total_stages: usize,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    StageSucceeded {
        run_id: String,
        stage_id: String,
        stage_index: usize,
        total_stages: usize,
        duration_ms: u64,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    StageSkipped {
        run_id: String,
        stage_id: String,
        stage_index: usize,
        total_stages: usize,
        reason: SkipReason,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    StageFailed {
        run_id: String,
        stage_id: String,
        stage_index: usize,
        total_stages: usize,
        kind: ErrorKind,
        message: String,
        duration_ms: u64,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    CleanupWarning {
        run_id: String,
        message: String,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    RunFinished {
        run_id: String,
        pipeline_name: String,
        outcome: Outcome,
        stages_succeeded: usize,
        stages_skipped: usize,
        total_duration_ms: u64,
        timestamp: String,
    },
}

impl PipelineEvent {
    /// Stable event name, e.g. `pipeline:stage-started`
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::RunStarted { .. } => event_names::PIPELINE_STARTED,
            PipelineEvent::StageStarted { .. } => event_names::PIPELINE_STAGE_STARTED,
            PipelineEvent::StageSucceeded { .. } => event_names::PIPELINE_STAGE_SUCCEEDED,
            PipelineEvent::StageSkipped { .. } => event_names::PIPELINE_STAGE_SKIPPED,
            PipelineEvent::StageFailed { .. } => event_names::PIPELINE_STAGE_FAILED,
            PipelineEvent::CleanupWarning { .. } => event_names::PIPELINE_CLEANUP_WARNING,
            PipelineEvent::RunFinished { .. } => event_names::PIPELINE_COMPLETED,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            PipelineEvent::RunStarted { run_id, .. }
            | PipelineEvent::StageStarted { run_id, .. }
            | PipelineEvent::StageSucceeded { run_id, .. }
            | PipelineEvent::StageSkipped { run_id, .. }
            | PipelineEvent::StageFailed { run_id, .. }
            | PipelineEvent::CleanupWarning { run_id, .. }
            | PipelineEvent::RunFinished { run_id, .. } => run_id,
        }
    }

    /// Stage the event refers to, for stage transitions
    pub fn stage_id(&self) -> Option<&str> {
        match self {
            PipelineEvent::StageStarted { stage_id, .. }
            | PipelineEvent::StageSucceeded { stage_id, .. }
            | PipelineEvent::StageSkipped { stage_id, .. }
            | PipelineEvent::StageFailed { stage_id, .. } => Some(stage_id),
            _ => None,
        }
    }
}

/// Receiver of pipeline events.
///
/// Called synchronously from the run loop, so implementations should return
/// quickly and must not fail the run.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn emit(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// Writes a one-line summary of each event to the global logger
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn emit(&self, event: &PipelineEvent) {
        let (level, message) = match event {
            PipelineEvent::RunStarted {
                pipeline_name,
                total_stages,
                ..
            } => (
                LogLevel::Info,
                format!("{} started with {} stages", pipeline_name, total_stages),
            ),
            PipelineEvent::StageStarted {
                stage_id,
                stage_index,
                total_stages,
                ..
            } => (
                LogLevel::Info,
                format!("[{}/{}] {} started", stage_index + 1, total_stages, stage_id),
            ),
            PipelineEvent::StageSucceeded {
                stage_id,
                duration_ms,
                ..
            } => (
                LogLevel::Info,
                format!("{} succeeded in {}ms", stage_id, duration_ms),
            ),
            PipelineEvent::StageSkipped {
                stage_id, reason, ..
            } => (
                LogLevel::Info,
                format!("{} skipped: {}", stage_id, reason),
            ),
            PipelineEvent::StageFailed {
                stage_id,
                kind,
                message,
                ..
            } => (
                LogLevel::Warn,
                format!("{} failed ({}): {}", stage_id, kind, message),
            ),
            PipelineEvent::CleanupWarning { message, .. } => {
                (LogLevel::Warn, format!("cleanup: {}", message))
            }
            PipelineEvent::RunFinished {
                outcome,
                total_duration_ms,
                ..
            } => (
                LogLevel::Info,
                format!("finished: {} in {}ms", outcome, total_duration_ms),
            ),
        };

        app_log!(
            level,
            "events",
            "{} {} (run: {})",
            event.name(),
            message,
            event.run_id()
        );
    }
}

/// Forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &PipelineEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.sender.send(event.clone());
    }
}

/// Event emitter helper bound to one run
pub struct EventEmitter<'a> {
    sink: &'a dyn EventSink,
    run_id: String,
    pipeline_name: String,
    total_stages: usize,
}

impl<'a> EventEmitter<'a> {
    pub fn new(
        sink: &'a dyn EventSink,
        run_id: impl Into<String>,
        pipeline_name: impl Into<String>,
        total_stages: usize,
    ) -> Self {
        Self {
            sink,
            run_id: run_id.into(),
            pipeline_name: pipeline_name.into(),
            total_stages,
        }
    }

    fn timestamp() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    /// Emit pipeline started event
    pub fn run_started(&self) {
        self.sink.emit(&PipelineEvent::RunStarted {
            run_id: self.run_id.clone(),
            pipeline_name: self.pipeline_name.clone(),
            total_stages: self.total_stages,
            timestamp: Self::timestamp(),
        });
    }

    /// Emit pipeline stage started event
    pub fn stage_started(&self, stage_id: &str, stage_index: usize) {
        self.sink.emit(&PipelineEvent::StageStarted {
            run_id: self.run_id.clone(),
            stage_id: stage_id.to_string(),
            stage_index,
            total_stages: self.total_stages,
            timestamp: Self::timestamp(),
        });
    }

    /// Emit pipeline stage succeeded event
    pub fn stage_succeeded(&self, stage_id: &str, stage_index: usize, duration_ms: u64) {
        self.sink.emit(&PipelineEvent::StageSucceeded {
            run_id: self.run_id.clone(),
            stage_id: stage_id.to_string(),
            stage_index,
            total_stages: self.total_stages,
            duration_ms,
            timestamp: Self::timestamp(),
        });
    }

    /// Emit pipeline stage skipped event
    pub fn stage_skipped(&self, stage_id: &str, stage_index: usize, reason: SkipReason) {
        self.sink.emit(&PipelineEvent::StageSkipped {
            run_id: self.run_id.clone(),
            stage_id: stage_id.to_string(),
            stage_index,
            total_stages: self.total_stages,
            reason,
            timestamp: Self::timestamp(),
        });
    }

    /// Emit pipeline stage failed event
    pub fn stage_failed(
        &self,
        stage_id: &str,
        stage_index: usize,
        kind: ErrorKind,
        message: &str,
        duration_ms: u64,
    ) {
        self.sink.emit(&PipelineEvent::StageFailed {
            run_id: self.run_id.clone(),
            stage_id: stage_id.to_string(),
            stage_index,
            total_stages: self.total_stages,
            kind,
            message: message.to_string(),
            duration_ms,
            timestamp: Self::timestamp(),
        });
    }

    pub fn cleanup_warning(&self, message: &str) {
        self.sink.emit(&PipelineEvent::CleanupWarning {
            run_id: self.run_id.clone(),
            message: message.to_string(),
            timestamp: Self::timestamp(),
        });
    }

    /// Emit pipeline completed event
    pub fn run_finished(
        &self,
        outcome: Outcome,
        stages_succeeded: usize,
        stages_skipped: usize,
        total_duration_ms: u64,
    ) {
        self.sink.emit(&PipelineEvent::RunFinished {
            run_id: self.run_id.clone(),
            pipeline_name: self.pipeline_name.clone(),
            outcome,
            stages_succeeded,
            stages_skipped,
            total_duration_ms,
            timestamp: Self::timestamp(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink_receives_events() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &PipelineEvent| {
            seen.lock().unwrap().push(event.name());
        };

        let emitter = EventEmitter::new(&sink, "run-1", "test", 2);
        emitter.run_started();
        emitter.stage_started("a", 0);
        emitter.stage_skipped("b", 1, SkipReason::ProviderNotConfigured);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                event_names::PIPELINE_STARTED,
                event_names::PIPELINE_STAGE_STARTED,
                event_names::PIPELINE_STAGE_SKIPPED,
            ]
        );
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        let emitter = EventEmitter::new(&sink, "run-1", "test", 1);
        emitter.stage_succeeded("a", 0, 12);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.stage_id(), Some("a"));
        assert_eq!(event.run_id(), "run-1");
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let emitter = EventEmitter::new(&sink, "run-1", "test", 1);
        emitter.cleanup_warning("gone");
    }

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::StageFailed {
            run_id: "run-1".into(),
            stage_id: "extract".into(),
            stage_index: 0,
            total_stages: 5,
            kind: ErrorKind::ToolInvocationError,
            message: "exit 1".into(),
            duration_ms: 3,
            timestamp: "2024-01-01T00:00:00Z".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stageFailed");
        assert_eq!(json["stageId"], "extract");
        assert_eq!(json["kind"], "ToolInvocationError");
    }
}
