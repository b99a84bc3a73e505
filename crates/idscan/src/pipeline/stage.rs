use async_trait::async_trait;

use super::state::PipelineState;

/// What a stage hands to the next one.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Continue(PipelineState),
    Halted(PipelineState),
}

impl StageOutcome {
    /// `Halted` when the state has failed, `Continue` otherwise.
    pub fn from_state(state: PipelineState) -> Self {
        if state.is_failed() {
            StageOutcome::Halted(state)
        } else {
            StageOutcome::Continue(state)
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, StageOutcome::Halted(_))
    }

    pub fn state(&self) -> &PipelineState {
        match self {
            StageOutcome::Continue(state) | StageOutcome::Halted(state) => state,
        }
    }

    pub fn into_state(self) -> PipelineState {
        match self {
            StageOutcome::Continue(state) | StageOutcome::Halted(state) => state,
        }
    }
}

/// One sequential phase of the pipeline.
///
/// Implementations record their own failures in the state and must return a
/// failed input untouched as `Halted`.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: PipelineState) -> StageOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_state() {
        let mut state = PipelineState::new("/tmp/a.png", "a.png", 1);
        assert!(!StageOutcome::from_state(state.clone()).is_halted());
        state.add_error("bad");
        let outcome = StageOutcome::from_state(state);
        assert!(outcome.is_halted());
        assert!(outcome.state().is_failed());
    }
}
