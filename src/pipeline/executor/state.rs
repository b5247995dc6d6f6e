use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the single extraction slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecutorState {
    Idle = 0,
    Requested = 1,
    Running = 2,
    Stopped = 3,
}

impl ExecutorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ExecutorState::Idle,
            1 => ExecutorState::Requested,
            2 => ExecutorState::Running,
            _ => ExecutorState::Stopped,
        }
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Requested => "requested",
            ExecutorState::Running => "running",
            ExecutorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: ExecutorState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> ExecutorState {
        ExecutorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: ExecutorState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `from` -> `to` only if the current state is `from`.
    pub(crate) fn transition(&self, from: ExecutorState, to: ExecutorState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
