use std::sync::atomic::{AtomicU8, Ordering};

use crate::foundation::error::PipelineError;

/// Lifecycle of a single-use pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed, `start` not yet called.
    Idle,
    /// Frames are being produced.
    Writing,
    /// All frames submitted; container finalize pending.
    Finished,
    /// Terminal. Reached after finalize reports or on any session error.
    Discarded,
}

impl PipelineState {
    fn to_u8(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Writing => 1,
            PipelineState::Finished => 2,
            PipelineState::Discarded => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => PipelineState::Idle,
            1 => PipelineState::Writing,
            2 => PipelineState::Finished,
            _ => PipelineState::Discarded,
        }
    }
}

/// Atomic holder for [`PipelineState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(PipelineState::Idle.to_u8()))
    }

    pub(crate) fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, to: PipelineState) {
        self.0.store(to.to_u8(), Ordering::Release);
    }

    /// Move `from -> to` only if the current state is `from`.
    pub(crate) fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the single session: `Idle -> Writing`.
    ///
    /// A session still in flight (`Writing` or `Finished`) rejects the call as concurrent; a
    /// completed one reports `AlreadyDiscarded`.
    pub(crate) fn try_begin(&self) -> Result<(), PipelineError> {
        match self.0.compare_exchange(
            PipelineState::Idle.to_u8(),
            PipelineState::Writing.to_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => match PipelineState::from_u8(current) {
                PipelineState::Discarded => Err(PipelineError::AlreadyDiscarded),
                _ => Err(PipelineError::ConcurrentSessionRejected),
            },
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/state.rs"]
mod tests;
