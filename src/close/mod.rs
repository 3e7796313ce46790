use std::sync::Mutex;

use tracing::{info, warn};

use crate::api::ApiError;

/// Where the close sequence currently stands. The sequence is one-way:
/// once `Closed` is reached only a fresh session resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseState {
    #[default]
    Idle,
    Closing,
    Liquidating,
    Closed,
}

/// Outcome of one active-orders poll while liquidating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidationStep {
    /// Orders still open (or the probe failed); keep polling
    Waiting,
    /// Exchange reports no active orders; teardown may proceed
    Done,
}

/// Guards the position-close sequence so it runs at most once at a time.
/// Holds no I/O itself; the controller drives it and reports poll results.
#[derive(Debug, Default)]
pub struct CloseSequencer {
    state: Mutex<CloseState>,
}

impl CloseSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CloseState {
        *self.state.lock().unwrap()
    }

    /// Try to enter the close sequence. Returns false when a close is
    /// already in flight (or finished), in which case the caller must not
    /// issue a second close request.
    pub fn begin(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            CloseState::Idle => {
                *state = CloseState::Closing;
                true
            }
            other => {
                warn!(state = ?other, "close requested while sequence already in flight");
                false
            }
        }
    }

    /// The close request itself was rejected; back out so the operator can
    /// retry
    pub fn abort_entry(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == CloseState::Closing {
            *state = CloseState::Idle;
        }
    }

    /// Close request accepted; the liquidation poll starts now
    pub fn mark_liquidating(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == CloseState::Closing {
            *state = CloseState::Liquidating;
        }
    }

    /// Digest one active-orders probe. Fail-open: a probe error keeps the
    /// sequence waiting rather than tearing the session down on a guess.
    pub fn on_poll(&self, probe: Result<bool, ApiError>) -> LiquidationStep {
        match probe {
            Ok(true) => LiquidationStep::Waiting,
            Ok(false) => {
                let mut state = self.state.lock().unwrap();
                if *state == CloseState::Liquidating {
                    *state = CloseState::Closed;
                }
                info!("liquidation complete, no active orders remain");
                LiquidationStep::Done
            }
            Err(e) => {
                warn!("active-orders probe failed, still waiting: {}", e);
                LiquidationStep::Waiting
            }
        }
    }

    /// A new session started; the button may read Close again
    pub fn reset(&self) {
        *self.state.lock().unwrap() = CloseState::Idle;
    }
}
