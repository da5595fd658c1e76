use super::context::PipelineContext;
use super::core::{SkipReason, Stage, StageResult};

/// Decision for the next stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Skip(SkipReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Decide whether `stage` may run given what the run has recorded so far.
///
/// Pure: reads the context and the stage's availability flag, nothing else.
/// Upstream problems are reported before provider configuration so the
/// reason points at the cause closest to the failure.
pub fn evaluate(context: &PipelineContext, stage: &dyn Stage) -> Eligibility {
    if let Some(upstream) = stage.upstream() {
        match context.result(upstream) {
            Some(StageResult::Succeeded(_)) => {}
            Some(StageResult::Failed { .. })
            | Some(StageResult::Skipped(SkipReason::UpstreamFailed)) => {
                return Eligibility::Skip(SkipReason::UpstreamFailed)
            }
            Some(StageResult::Skipped(_)) | None => {
                return Eligibility::Skip(SkipReason::UpstreamUnavailable)
            }
        }
    }

    if !stage.is_available() {
        return Eligibility::Skip(SkipReason::ProviderNotConfigured);
    }

    Eligibility::Eligible
}
