//! Reusable counting rendezvous for frame-lockstep coordination
//!
//! N parties call [`Barrier::enter`]; none proceeds until all N have
//! arrived. Each caller receives its 0-based arrival rank; rank 0 is
//! conventionally the master that performs post-rendezvous bookkeeping
//! such as timing. The barrier resets itself on release and is reused
//! across frames without re-creation.

use std::sync::{Condvar, Mutex};
use thiserror::Error;

/// Rendezvous errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// `enter` was called with a party count that could never release
    #[error("barrier party count must be at least 1 (got {0})")]
    InvalidPartyCount(usize),
}

/// Result type for rendezvous operations
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// Counting N-way rendezvous, reusable across generations.
///
/// The expected party count is supplied per call, so the participant set
/// may shrink between phases (a cluster dropping nodes between runs, for
/// example). All parties of one generation must pass the same count.
///
/// There is deliberately no timeout: in a lock-step cluster a missing
/// party is a fatal fault that an external liveness monitor must surface.
/// Masking it here would trade a visible hang for silent
/// desynchronization of the displayed frames.
#[derive(Debug, Default)]
pub struct Barrier {
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl Barrier {
    /// Create an idle barrier
    pub fn new() -> Self {
        Self::default()
    }

    /// Register arrival and block until `expected` parties have arrived
    /// for the current generation.
    ///
    /// Returns the caller's 0-based arrival rank. Release is atomic with
    /// respect to new entries: the generation counter advances before any
    /// waiter wakes, so a party arriving after the release is counted
    /// toward the next generation only.
    pub fn enter(&self, expected: usize) -> SyncResult<usize> {
        if expected == 0 {
            return Err(SyncError::InvalidPartyCount(expected));
        }

        let mut state = self.state.lock().unwrap();
        let generation = state.generation;
        let rank = state.arrived;
        state.arrived += 1;

        if state.arrived >= expected {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
        } else {
            while state.generation == generation {
                state = self.released.wait(state).unwrap();
            }
        }

        Ok(rank)
    }
}
