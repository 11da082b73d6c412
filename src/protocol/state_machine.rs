//! Round State Machine.
//!
//! Tracks where the input peer is in the current time slot and rejects
//! out-of-order transitions.
//!
//! # States
//! - **Idle**: Initialized, no connections yet.
//! - **ConnectionsReady**: The privacy-peer quorum is connected.
//! - **DatasetLoaded**: Per-round state reset and private data (re)loaded.
//! - **SharesGenerated**: All share families exist for this round.
//! - **SessionsRunning**: One session per privacy peer has been spawned.
//! - **AwaitingResults**: Waiting for every session's final result.
//! - **Halted**: The round could not start (load or share failure).
//! - **Terminated**: Last time slot done, sessions told to stop.
//!
//! Rounds loop `AwaitingResults -> DatasetLoaded` while time slots remain.

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::events::RoundObserver;
use super::ProtocolError;

/// Possible states of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoundState {
    Idle,
    ConnectionsReady,
    DatasetLoaded,
    SharesGenerated,
    SessionsRunning,
    AwaitingResults,
    Halted,
    Terminated,
}

/// RAII guard for state transitions.
/// If dropped without `commit()`, it rolls back the state.
pub struct StateTransition<'a> {
    sm: &'a mut RoundStateMachine,
    original_state: RoundState,
    committed: bool,
}

impl<'a> StateTransition<'a> {
    /// Commits the state transition.
    pub fn commit(mut self) {
        self.committed = true;
        self.sm.notify_observers(self.original_state, self.sm.current_state);
    }
}

impl<'a> Drop for StateTransition<'a> {
    fn drop(&mut self) {
        if !self.committed {
            log::warn!("Rolling back state: {:?} -> {:?}", self.sm.current_state, self.original_state);
            self.sm.current_state = self.original_state;
        }
    }
}

pub struct RoundStateMachine {
    current_state: RoundState,
    observers: Vec<Arc<dyn RoundObserver>>,
}

impl RoundStateMachine {
    /// Creates a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            current_state: RoundState::Idle,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> RoundState {
        self.current_state
    }

    pub fn add_observer(&mut self, observer: Arc<dyn RoundObserver>) {
        self.observers.push(observer);
    }

    pub fn observers(&self) -> &[Arc<dyn RoundObserver>] {
        &self.observers
    }

    fn notify_observers(&self, from: RoundState, to: RoundState) {
        for obs in &self.observers {
            obs.on_state_change(from, to);
        }
    }

    fn begin_transition(&mut self, new_state: RoundState) -> StateTransition<'_> {
        let original_state = self.current_state;
        log::info!("Round state: {:?} -> {:?}", original_state, new_state);
        self.current_state = new_state;
        StateTransition {
            sm: self,
            original_state,
            committed: false,
        }
    }

    fn begin_checked(
        &mut self,
        allowed: &[RoundState],
        to: RoundState,
    ) -> Result<StateTransition<'_>, ProtocolError> {
        if !allowed.contains(&self.current_state) {
            return Err(ProtocolError::InvalidState {
                from: self.current_state,
                to,
            });
        }
        Ok(self.begin_transition(to))
    }

    fn transition(&mut self, allowed: &[RoundState], to: RoundState) -> Result<(), ProtocolError> {
        self.begin_checked(allowed, to)?.commit();
        Ok(())
    }

    /// Quorum reached for the first round.
    pub fn connections_ready(&mut self) -> Result<(), ProtocolError> {
        if self.current_state == RoundState::ConnectionsReady {
            return Ok(());
        }
        self.transition(&[RoundState::Idle], RoundState::ConnectionsReady)
    }

    /// A round begins: state reset and dataset (re)loaded.
    ///
    /// Reachable from `Halted` so a failed round can be retried.
    pub fn dataset_loaded(&mut self) -> Result<(), ProtocolError> {
        self.transition(
            &[RoundState::ConnectionsReady, RoundState::AwaitingResults, RoundState::Halted],
            RoundState::DatasetLoaded,
        )
    }

    pub fn shares_generated(&mut self) -> Result<(), ProtocolError> {
        self.begin_share_generation()?.commit();
        Ok(())
    }

    /// Enters `SharesGenerated` provisionally. Commit once every share exists;
    /// dropping the guard returns to `DatasetLoaded` so the round can halt.
    pub fn begin_share_generation(&mut self) -> Result<StateTransition<'_>, ProtocolError> {
        self.begin_checked(&[RoundState::DatasetLoaded], RoundState::SharesGenerated)
    }

    pub fn sessions_running(&mut self) -> Result<(), ProtocolError> {
        self.transition(&[RoundState::SharesGenerated], RoundState::SessionsRunning)
    }

    pub fn awaiting_results(&mut self) -> Result<(), ProtocolError> {
        self.transition(&[RoundState::SessionsRunning], RoundState::AwaitingResults)
    }

    /// The round cannot proceed; nothing is spawned and the slot does not advance.
    pub fn halt(&mut self) -> Result<(), ProtocolError> {
        self.transition(
            &[RoundState::DatasetLoaded, RoundState::SharesGenerated],
            RoundState::Halted,
        )
    }

    pub fn terminate(&mut self) -> Result<(), ProtocolError> {
        if self.current_state == RoundState::Terminated {
            return Ok(());
        }
        self.transition(&[RoundState::AwaitingResults], RoundState::Terminated)
    }
}

impl Default for RoundStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
