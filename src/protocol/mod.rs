//! Protocol Layer.
//!
//! Everything the input peer needs to reason about a round without touching
//! I/O or the runtime:
//! - The message contract between sessions and the controller (`messaging`)
//! - The round life-cycle state machine (`state_machine`)
//! - Completion detection and result retention (`aggregator`)
//! - Upward events and observers (`events`)

pub mod aggregator;
pub mod events;
pub mod messaging;
pub mod state_machine;

use core::fmt;

use messaging::{MessageKind, PeerId};
use state_machine::RoundState;

pub use aggregator::{ResultAggregator, RoundCompletion};
pub use events::{FinalResultEvent, RoundObserver};
pub use messaging::{FinalResult, IdrMessage, Route, SessionMessage};
pub use state_machine::RoundStateMachine;

/// Errors related to protocol execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Operation cannot be performed in the current state.
    InvalidState { from: RoundState, to: RoundState },
    /// A session sent something other than a final result.
    UnexpectedMessage { sender: PeerId, kind: MessageKind },
    /// A message arrived after the round had already completed.
    RoundAlreadyComplete { sender: PeerId },
    /// The same session reported a final result twice.
    DuplicateFinalResult { sender: PeerId },
    /// A message tagged with another time slot.
    StaleMessage { sender: PeerId, time_slot: u32 },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidState { from, to } => {
                write!(f, "Invalid state transition {:?} -> {:?}", from, to)
            }
            ProtocolError::UnexpectedMessage { sender, kind } => {
                write!(f, "Didn't receive final result from {}: got {:?}", sender, kind)
            }
            ProtocolError::RoundAlreadyComplete { sender } => {
                write!(f, "Message from {} after round completion", sender)
            }
            ProtocolError::DuplicateFinalResult { sender } => {
                write!(f, "Duplicate final result from {}", sender)
            }
            ProtocolError::StaleMessage { sender, time_slot } => {
                write!(f, "Message from {} for stale time slot {}", sender, time_slot)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}
