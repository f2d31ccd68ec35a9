use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use event_listener::Event;

const DEFAULT_STATE_ORDERING: Ordering = Ordering::SeqCst;

/// Lifecycle of a consumer instance.
///
/// Transitions are monotonic: `Idle -> Running -> Stopping -> Stopped`.
/// `Stopping` is entered whichever way the loop ends (cancellation, fatal
/// error or normal exit) and `Stopped` is only reached after the broker
/// connection has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Idle,
            1 => RunState::Running,
            2 => RunState::Stopping,
            _ => RunState::Stopped,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Stopping => write!(f, "stopping"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Publishes the current [`RunState`] to listeners in a lock-free fashion.
#[derive(Debug)]
pub(crate) struct StateCell {
    current: AtomicU8,
    event: Event,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            current: AtomicU8::new(RunState::Idle as u8),
            event: Event::new(),
        }
    }

    pub(crate) fn get(&self) -> RunState {
        RunState::from_u8(self.current.load(DEFAULT_STATE_ORDERING))
    }

    pub(crate) fn set(&self, state: RunState) {
        self.current.store(state as u8, DEFAULT_STATE_ORDERING);
        self.event.notify(usize::MAX);
    }

    /// Wait until the state has reached `target` (or moved past it).
    pub(crate) async fn wait_for(&self, target: RunState) {
        loop {
            let listener = self.event.listen();
            if self.get() >= target {
                return;
            }
            listener.await;
        }
    }
}
