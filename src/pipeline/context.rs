use crate::app_log;
use crate::logger::LogLevel;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::core::{StageRecord, StageResult, StageValue};
use super::registry::ResourceRegistry;

/// Run-scoped state threaded through the stages of one pipeline run
///
/// The context holds the original input (read-only), the records of every
/// stage in insertion order, and the registry of transient resources. It is
/// created at run start, mutated only by the executor, and dropped at run end.
///
/// # Example
/// ```
/// use mediapress::pipeline::{PipelineContext, StageRecord, StageResult, StageValue};
/// use std::time::Duration;
///
/// let mut context = PipelineContext::new("/tmp/talk.mp4");
/// context.record(StageRecord::new(
///     "extract",
///     "Extract Audio",
///     StageResult::Succeeded(StageValue::Path("/tmp/talk.wav".into())),
///     Duration::from_millis(10),
/// ));
///
/// assert!(context.value_of("extract").is_some());
/// ```
#[derive(Debug)]
pub struct PipelineContext {
    /// Run identifier
    run_id: String,

    /// Original input, handed to the first stage
    input: StageValue,

    /// Stage records, never reordered
    records: Vec<StageRecord>,

    /// Transient resources created during the run
    resources: ResourceRegistry,

    /// Free-form metadata about the run
    metadata: HashMap<String, String>,
}

impl PipelineContext {
    /// Create a context with a fresh run id
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self::with_run_id(Uuid::new_v4().to_string(), source)
    }

    pub fn with_run_id(run_id: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        let run_id = run_id.into();
        Self {
            resources: ResourceRegistry::new(run_id.clone()),
            run_id,
            input: StageValue::Path(source.into()),
            records: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Get the run ID
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn source(&self) -> &Path {
        match &self.input {
            StageValue::Path(path) => path,
            // Constructed from a path and never replaced
            _ => Path::new(""),
        }
    }

    /// Record a stage result.
    ///
    /// Returns `false` and keeps the existing record if the stage was already
    /// recorded in this run.
    pub fn record(&mut self, record: StageRecord) -> bool {
        if self.records.iter().any(|r| r.stage_id == record.stage_id) {
            app_log!(
                LogLevel::Error,
                "pipeline::context",
                "Stage '{}' already recorded, keeping the first result (run: {})",
                record.stage_id,
                self.run_id
            );
            debug_assert!(false, "stage '{}' recorded twice", record.stage_id);
            return false;
        }
        self.records.push(record);
        true
    }

    /// Result recorded for a stage
    pub fn result(&self, stage_id: &str) -> Option<&StageResult> {
        self.records
            .iter()
            .find(|r| r.stage_id == stage_id)
            .map(|r| &r.result)
    }

    /// Value produced by a stage, only if it succeeded
    pub fn value_of(&self, stage_id: &str) -> Option<&StageValue> {
        self.result(stage_id).and_then(|r| r.value())
    }

    /// Input for a stage: the upstream value, or the run input when the stage
    /// has no upstream
    pub fn input_for(&self, upstream: Option<&str>) -> Option<&StageValue> {
        match upstream {
            Some(stage_id) => self.value_of(stage_id),
            None => Some(&self.input),
        }
    }

    /// All records, in insertion order
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn has_record(&self, stage_id: &str) -> bool {
        self.result(stage_id).is_some()
    }

    /// Registry of transient resources for this run
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Set metadata
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get metadata
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// Get all metadata
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Consume the context, keeping only the stage records.
    ///
    /// Dropping the registry here releases anything still registered.
    pub fn into_records(self) -> Vec<StageRecord> {
        self.records
    }
}
