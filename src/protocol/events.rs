//! Upward events.
//!
//! Observers outside the input peer learn about state changes, the round's
//! final result and protocol violations through [`RoundObserver`].

use super::messaging::{FinalResult, PeerId};
use super::state_machine::RoundState;
use super::ProtocolError;

/// Emitted once per completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FinalResultEvent {
    pub time_slot: u32,
    /// Session whose message completed the round.
    pub sender: PeerId,
    /// Retained result, or an empty placeholder when no session supplied one.
    pub payload: FinalResult,
    /// Whether `payload` came from a session.
    pub has_result: bool,
    pub verification_successful: bool,
}

/// Observer trait for round events. All methods default to no-ops.
pub trait RoundObserver: Send + Sync {
    fn on_state_change(&self, _from: RoundState, _to: RoundState) {}

    fn on_final_result(&self, _event: &FinalResultEvent) {}

    fn on_protocol_error(&self, _error: &ProtocolError) {}
}
