use crate::error::{PressError, PressResult};
use std::fmt;

/// Phase of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    /// Working on the stage at this index
    Running(usize),
    /// The loop finished but at least one stage was skipped
    SkippedTail,
    /// A stage failed or the run was cancelled
    Aborted,
    /// Releasing transient resources
    Finalizing,
    Done,
}

impl RunPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, next: &RunPhase) -> bool {
        use RunPhase::*;

        matches!(
            (self, next),
            (NotStarted, Running(0))
                | (NotStarted, Aborted)
                | (Running(_), SkippedTail)
                | (Running(_), Aborted)
                | (Running(_), Finalizing)
                | (SkippedTail, Finalizing)
                | (Aborted, Finalizing)
                | (Finalizing, Done)
        ) || matches!((self, next), (Running(i), Running(j)) if *j == i + 1)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::NotStarted => write!(f, "not started"),
            RunPhase::Running(index) => write!(f, "running stage {}", index),
            RunPhase::SkippedTail => write!(f, "skipped tail"),
            RunPhase::Aborted => write!(f, "aborted"),
            RunPhase::Finalizing => write!(f, "finalizing"),
            RunPhase::Done => write!(f, "done"),
        }
    }
}

/// Tracks the phase of one run and rejects illegal transitions
#[derive(Debug)]
pub struct RunState {
    phase: RunPhase,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::NotStarted,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn advance(&mut self, next: RunPhase) -> PressResult<()> {
        if !self.phase.can_transition_to(&next) {
            return Err(PressError::Internal(format!(
                "invalid run transition: {} -> {}",
                self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = RunState::new();
        state.advance(RunPhase::Running(0)).unwrap();
        state.advance(RunPhase::Running(1)).unwrap();
        state.advance(RunPhase::Running(2)).unwrap();
        state.advance(RunPhase::Finalizing).unwrap();
        state.advance(RunPhase::Done).unwrap();
        assert!(state.phase().is_terminal());
    }

    #[test]
    fn test_abort_and_skip_paths() {
        let mut aborted = RunState::new();
        aborted.advance(RunPhase::Running(0)).unwrap();
        aborted.advance(RunPhase::Aborted).unwrap();
        aborted.advance(RunPhase::Finalizing).unwrap();

        let mut skipped = RunState::new();
        skipped.advance(RunPhase::Running(0)).unwrap();
        skipped.advance(RunPhase::SkippedTail).unwrap();
        skipped.advance(RunPhase::Finalizing).unwrap();

        let mut cancelled_early = RunState::new();
        cancelled_early.advance(RunPhase::Aborted).unwrap();
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = RunState::new();
        assert!(state.advance(RunPhase::Running(1)).is_err());
        assert!(state.advance(RunPhase::Done).is_err());

        state.advance(RunPhase::Running(0)).unwrap();
        assert!(state.advance(RunPhase::Running(2)).is_err());
        assert!(state.advance(RunPhase::Running(0)).is_err());
        assert_eq!(state.phase(), RunPhase::Running(0));
    }

    #[test]
    fn test_done_is_terminal() {
        let mut state = RunState::new();
        state.advance(RunPhase::Aborted).unwrap();
        state.advance(RunPhase::Finalizing).unwrap();
        state.advance(RunPhase::Done).unwrap();

        for next in [
            RunPhase::NotStarted,
            RunPhase::Running(0),
            RunPhase::Aborted,
            RunPhase::Finalizing,
        ] {
            assert!(state.advance(next).is_err());
        }
    }
}
